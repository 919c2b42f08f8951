//! Routes and the layout of their handler arguments.
//!
//! A [`Route`] ties a method + path pattern to one method on a handler type.
//! Its parameters are declared in order with [`Param`]; that order is the
//! order of the values the handler receives in [`Call::args`]. Where each
//! value comes from (path, query, header, body) is compiled into a
//! [`BindingPlan`] when the route is registered, so nothing has to be
//! discovered while serving.

use std::sync::Arc;

use http::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::binder::BindError;
use crate::container::{Container, Injectable};
use crate::error::{Error, RegistrationError};
use crate::handler::{BoxFuture, BoxedAction, TypedAction};
use crate::request::Request;
use crate::response::Response;

/// Name given to the query bundle parameter unless another is chosen.
pub const QUERY_BUNDLE: &str = "queryParam";

// ── Parameter descriptors ─────────────────────────────────────────────────────

/// Where one handler argument's value comes from.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ParamKind {
    /// A `{placeholder}` segment of the path pattern.
    Path,
    /// One key of the query string.
    Query,
    /// One request header.
    Header,
    /// The decoded request body (non-GET requests only).
    Body,
    /// Every query string pair, as an object.
    QueryBundle,
}

/// Declares one handler argument.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Param {
    pub name: String,
    pub kind: ParamKind,
    /// Position in the argument list. Assigned by [`Route::param`].
    pub ordinal: usize,
}

impl Param {
    fn new(name: impl Into<String>, kind: ParamKind) -> Self {
        Self { name: name.into(), kind, ordinal: 0 }
    }

    pub fn path(name: impl Into<String>) -> Self { Self::new(name, ParamKind::Path) }
    pub fn query(name: impl Into<String>) -> Self { Self::new(name, ParamKind::Query) }
    pub fn header(name: impl Into<String>) -> Self { Self::new(name, ParamKind::Header) }
    pub fn body(name: impl Into<String>) -> Self { Self::new(name, ParamKind::Body) }

    /// The whole query string as an object of `key -> value | null`.
    pub fn query_bundle() -> Self { Self::new(QUERY_BUNDLE, ParamKind::QueryBundle) }
}

// ── Binding plan ──────────────────────────────────────────────────────────────

/// Slot assignments for one route, computed once at registration.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct BindingPlan {
    pub(crate) len: usize,
    pub(crate) query_bundle: Option<usize>,
    pub(crate) body: Option<usize>,
    pub(crate) path: Vec<(usize, String)>,
    pub(crate) query: Vec<(usize, String)>,
    pub(crate) headers: Vec<(usize, String)>,
}

impl BindingPlan {
    pub(crate) fn compile(pattern: &str, params: &[Param]) -> Result<Self, RegistrationError> {
        let mut plan = BindingPlan { len: params.len(), ..Default::default() };

        for param in params {
            let slot = param.ordinal;
            match param.kind {
                ParamKind::Body => {
                    if plan.body.replace(slot).is_some() {
                        return Err(RegistrationError::DuplicateBody { path: pattern.to_owned() });
                    }
                }
                ParamKind::QueryBundle => {
                    if plan.query_bundle.replace(slot).is_some() {
                        return Err(RegistrationError::DuplicateQueryBundle {
                            path: pattern.to_owned(),
                        });
                    }
                }
                ParamKind::Path => {
                    if !has_placeholder(pattern, &param.name) {
                        return Err(RegistrationError::UnknownPathParam {
                            path: pattern.to_owned(),
                            name: param.name.clone(),
                        });
                    }
                    plan.path.push((slot, param.name.clone()));
                }
                ParamKind::Query => plan.query.push((slot, param.name.clone())),
                ParamKind::Header => plan.headers.push((slot, param.name.clone())),
            }
        }
        Ok(plan)
    }

    /// One `Null` per declared parameter.
    pub(crate) fn empty_slots(&self) -> Vec<Value> {
        vec![Value::Null; self.len]
    }

    pub fn body_slot(&self) -> Option<usize> { self.body }
    pub fn query_bundle_slot(&self) -> Option<usize> { self.query_bundle }
}

fn has_placeholder(pattern: &str, name: &str) -> bool {
    pattern.split('/').any(|segment| {
        segment == format!("{{{name}}}") || segment == format!("{{*{name}}}")
    })
}

// ── Handler arguments ─────────────────────────────────────────────────────────

/// The bound argument values of one call, in declaration order.
/// Unbound slots hold `Null`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Args(Vec<Value>);

impl Args {
    pub(crate) fn new(values: Vec<Value>) -> Self { Self(values) }

    pub fn len(&self) -> usize { self.0.len() }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
    pub fn get(&self, slot: usize) -> Option<&Value> { self.0.get(slot) }
    pub fn iter(&self) -> std::slice::Iter<'_, Value> { self.0.iter() }
    pub fn into_vec(self) -> Vec<Value> { self.0 }

    /// The slot as a string, if it holds one.
    pub fn str(&self, slot: usize) -> Option<&str> {
        self.0.get(slot).and_then(Value::as_str)
    }

    /// Moves the slot out (leaving `Null`) and deserializes it.
    pub fn take<T: DeserializeOwned>(&mut self, slot: usize) -> Result<T, Error> {
        let value = self
            .0
            .get_mut(slot)
            .map(Value::take)
            .ok_or(BindError::MissingSlot(slot))?;
        serde_json::from_value(value)
            .map_err(|source| Error::Bind(BindError::Deserialize { slot, source }))
    }
}

/// Everything a handler method receives: its bound arguments followed by
/// the request and the response being built.
pub struct Call<'a> {
    pub args: Args,
    pub request: &'a Request,
    pub response: &'a mut Response,
}

// ── Route ─────────────────────────────────────────────────────────────────────

/// A registered method + path pattern and the handler method behind it.
pub struct Route {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) handler_type: &'static str,
    pub(crate) handler_name: &'static str,
    pub(crate) params: Vec<Param>,
    pub(crate) authorization: Option<Vec<String>>,
    pub(crate) plan: BindingPlan,
    pub(crate) action: BoxedAction,
    pub(crate) register: fn(&mut Container) -> Result<(), RegistrationError>,
}

impl Route {
    /// A route handled by `action`, which receives a fresh `T` (built by the
    /// container) and the call. The result is sent as JSON; a `()` result
    /// sends no body at all.
    ///
    /// ```rust
    /// use kiwi::{BoxFuture, Call, Error, Injectable, Param, ResolveError, Resolver, Route};
    /// use http::Method;
    ///
    /// struct Items;
    ///
    /// impl Injectable for Items {
    ///     fn construct(_: &Resolver<'_>) -> Result<Self, ResolveError> { Ok(Items) }
    /// }
    ///
    /// impl Items {
    ///     fn find<'a>(self, call: Call<'a>) -> BoxFuture<'a, Result<String, Error>> {
    ///         Box::pin(async move { Ok(call.args.str(0).unwrap_or_default().to_owned()) })
    ///     }
    /// }
    ///
    /// let route = Route::new(Method::GET, "/items/{id}", Items::find)
    ///     .named("find")
    ///     .param(Param::path("id"));
    /// ```
    pub fn new<T, F, R>(method: Method, path: &str, action: F) -> Self
    where
        T: Injectable,
        F: for<'a> Fn(T, Call<'a>) -> BoxFuture<'a, Result<R, Error>> + Send + Sync + 'static,
        R: Serialize + Send + 'static,
    {
        Self {
            method,
            path: path.to_owned(),
            handler_type: std::any::type_name::<T>(),
            handler_name: "call",
            params: Vec::new(),
            authorization: None,
            plan: BindingPlan::default(),
            action: Arc::new(TypedAction::<T, F, R>::new(action)),
            register: Container::register::<T>,
        }
    }

    pub fn get<T, F, R>(path: &str, action: F) -> Self
    where
        T: Injectable,
        F: for<'a> Fn(T, Call<'a>) -> BoxFuture<'a, Result<R, Error>> + Send + Sync + 'static,
        R: Serialize + Send + 'static,
    {
        Self::new(Method::GET, path, action)
    }

    pub fn post<T, F, R>(path: &str, action: F) -> Self
    where
        T: Injectable,
        F: for<'a> Fn(T, Call<'a>) -> BoxFuture<'a, Result<R, Error>> + Send + Sync + 'static,
        R: Serialize + Send + 'static,
    {
        Self::new(Method::POST, path, action)
    }

    pub fn put<T, F, R>(path: &str, action: F) -> Self
    where
        T: Injectable,
        F: for<'a> Fn(T, Call<'a>) -> BoxFuture<'a, Result<R, Error>> + Send + Sync + 'static,
        R: Serialize + Send + 'static,
    {
        Self::new(Method::PUT, path, action)
    }

    pub fn delete<T, F, R>(path: &str, action: F) -> Self
    where
        T: Injectable,
        F: for<'a> Fn(T, Call<'a>) -> BoxFuture<'a, Result<R, Error>> + Send + Sync + 'static,
        R: Serialize + Send + 'static,
    {
        Self::new(Method::DELETE, path, action)
    }

    /// Names the handler method, for logs and the route catalog.
    pub fn named(mut self, name: &'static str) -> Self {
        self.handler_name = name;
        self
    }

    /// Appends the next argument.
    pub fn param(mut self, mut param: Param) -> Self {
        param.ordinal = self.params.len();
        self.params.push(param);
        self
    }

    /// Requires the configured authorization function to admit the request,
    /// passing it `roles`.
    pub fn authorize<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.authorization = Some(roles.into_iter().map(Into::into).collect());
        self
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn path(&self) -> &str { &self.path }
    pub fn handler_type(&self) -> &'static str { self.handler_type }
    pub fn handler_name(&self) -> &'static str { self.handler_name }
    pub fn params(&self) -> &[Param] { &self.params }
    pub fn plan(&self) -> &BindingPlan { &self.plan }
    pub fn requires_authorization(&self) -> bool { self.authorization.is_some() }

    /// Roles handed to the authorization function. Empty when none were given.
    pub fn roles(&self) -> &[String] {
        self.authorization.as_deref().unwrap_or_default()
    }

    pub(crate) fn compile(&mut self) -> Result<(), RegistrationError> {
        self.plan = BindingPlan::compile(&self.path, &self.params)?;
        Ok(())
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("handler", &format_args!("{}::{}", self.handler_type, self.handler_name))
            .field("params", &self.params)
            .field("authorization", &self.authorization)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn params(list: Vec<Param>) -> Vec<Param> {
        list.into_iter()
            .enumerate()
            .map(|(ordinal, p)| Param { ordinal, ..p })
            .collect()
    }

    #[test]
    fn plan_assigns_slots_by_declaration_order() {
        let declared = params(vec![
            Param::header("x-token"),
            Param::body("item"),
            Param::path("id"),
            Param::query_bundle(),
            Param::query("active"),
        ]);
        let plan = BindingPlan::compile("/items/{id}", &declared).unwrap();

        assert_eq!(plan.len, 5);
        assert_eq!(plan.body_slot(), Some(1));
        assert_eq!(plan.query_bundle_slot(), Some(3));
        assert_eq!(plan.headers, vec![(0, "x-token".to_owned())]);
        assert_eq!(plan.path, vec![(2, "id".to_owned())]);
        assert_eq!(plan.query, vec![(4, "active".to_owned())]);
    }

    #[test]
    fn two_bodies_are_rejected() {
        let declared = params(vec![Param::body("a"), Param::body("b")]);
        assert!(matches!(
            BindingPlan::compile("/items", &declared),
            Err(RegistrationError::DuplicateBody { .. })
        ));
    }

    #[test]
    fn two_query_bundles_are_rejected() {
        let declared = params(vec![Param::query_bundle(), Param::query_bundle()]);
        assert!(matches!(
            BindingPlan::compile("/items", &declared),
            Err(RegistrationError::DuplicateQueryBundle { .. })
        ));
    }

    #[test]
    fn path_param_must_exist_in_pattern() {
        let declared = params(vec![Param::path("id")]);
        assert!(matches!(
            BindingPlan::compile("/items/{name}", &declared),
            Err(RegistrationError::UnknownPathParam { .. })
        ));
        assert!(BindingPlan::compile("/files/{*id}", &declared).is_ok());
    }

    #[test]
    fn take_moves_and_deserializes() {
        let mut args = Args::new(vec![json!({ "name": "x" }), json!("7")]);
        let body: Value = args.take(0).unwrap();
        assert_eq!(body, json!({ "name": "x" }));
        assert_eq!(args.get(0), Some(&Value::Null));
        assert_eq!(args.str(1), Some("7"));

        assert!(matches!(args.take::<u32>(1), Err(Error::Bind(BindError::Deserialize { slot: 1, .. }))));
        assert!(matches!(args.take::<Value>(9), Err(Error::Bind(BindError::MissingSlot(9)))));
    }
}
