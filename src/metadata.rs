//! Metadata store: the routes, middleware lists and dependency container
//! collected before the server starts.
//!
//! Registration code builds one [`MetadataStore`] and hands it to
//! [`Dispatcher::new`](crate::Dispatcher::new) or
//! [`Server::serve`](crate::Server::serve). From then on it is read-only.
//!
//! ```rust
//! use kiwi::{BoxFuture, Call, Error, Injectable, MetadataStore, Param, ResolveError, Resolver, Route};
//!
//! struct Items;
//!
//! impl Injectable for Items {
//!     fn construct(_: &Resolver<'_>) -> Result<Self, ResolveError> { Ok(Items) }
//! }
//!
//! impl Items {
//!     fn create<'a>(self, mut call: Call<'a>) -> BoxFuture<'a, Result<serde_json::Value, Error>> {
//!         Box::pin(async move { call.args.take(0) })
//!     }
//! }
//!
//! # fn main() -> Result<(), kiwi::RegistrationError> {
//! let store = MetadataStore::new()
//!     .route(Route::post("/items", Items::create).named("create").param(Param::body("item")))?;
//! assert_eq!(store.routes().len(), 1);
//! # Ok(())
//! # }
//! ```

use tracing::debug;

use crate::container::{Container, Injectable};
use crate::error::RegistrationError;
use crate::middleware::{Middleware, MiddlewareEntry};
use crate::route::Route;

/// Routes, middleware and dependencies of one application.
#[derive(Default)]
pub struct MetadataStore {
    pub(crate) routes: Vec<Route>,
    pub(crate) before: Vec<MiddlewareEntry>,
    pub(crate) after: Vec<MiddlewareEntry>,
    pub(crate) container: Container,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a route. Its argument layout is checked and compiled, and its
    /// handler type is registered with the container.
    pub fn route(mut self, mut route: Route) -> Result<Self, RegistrationError> {
        route.compile()?;
        (route.register)(&mut self.container)?;
        debug!(method = %route.method, path = %route.path, handler = route.handler_type, "route registered");
        self.routes.push(route);
        Ok(self)
    }

    /// Appends a middleware run before route matching.
    pub fn before<M: Middleware + Injectable>(mut self) -> Result<Self, RegistrationError> {
        self.container.register::<M>()?;
        self.before.push(MiddlewareEntry::of::<M>());
        Ok(self)
    }

    /// Appends a middleware run after the handler, before serialization.
    pub fn after<M: Middleware + Injectable>(mut self) -> Result<Self, RegistrationError> {
        self.container.register::<M>()?;
        self.after.push(MiddlewareEntry::of::<M>());
        Ok(self)
    }

    /// Makes `value` available as a provided dependency.
    pub fn provide<T: Clone + Send + Sync + 'static>(mut self, value: T) -> Self {
        self.container.provide(value);
        self
    }

    pub fn routes(&self) -> &[Route] { &self.routes }
    pub fn middlewares_before(&self) -> &[MiddlewareEntry] { &self.before }
    pub fn middlewares_after(&self) -> &[MiddlewareEntry] { &self.after }
    pub fn container(&self) -> &Container { &self.container }

    /// Puts `entries` in front of the `before` list, keeping their order.
    pub(crate) fn prepend_before(&mut self, entries: Vec<MiddlewareEntry>) {
        self.before.splice(0..0, entries);
    }
}
