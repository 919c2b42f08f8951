//! Route catalog endpoint, enabled with `ServerOptions::documentation`.
//!
//! Serves a JSON description of every registered route: method, full path,
//! handler, parameters and authorization requirements.

use std::sync::Arc;

use http::{Method, StatusCode};
use serde::Serialize;

use super::{Flow, Middleware};
use crate::container::{Dependency, Injectable, ResolveError, Resolver};
use crate::error::Error;
use crate::handler::BoxFuture;
use crate::request::Request;
use crate::response::Response;
use crate::route::{Param, Route};
use crate::router::join_prefix;

/// One route as listed in the catalog.
#[derive(Clone, Debug, Serialize)]
pub struct RouteSummary {
    pub method: String,
    pub path: String,
    pub handler: String,
    pub parameters: Vec<Param>,
    pub authorize: bool,
    pub roles: Vec<String>,
}

/// The routes known at startup and the path the catalog is served on.
#[derive(Clone, Debug)]
pub struct RouteCatalog {
    path: String,
    routes: Arc<Vec<RouteSummary>>,
}

impl RouteCatalog {
    pub(crate) fn new(path: String, routes: &[Route], prefix: &str) -> Self {
        let routes = routes
            .iter()
            .map(|route| RouteSummary {
                method: route.method().to_string(),
                path: join_prefix(prefix, route.path()),
                handler: format!("{}::{}", route.handler_type(), route.handler_name()),
                parameters: route.params().to_vec(),
                authorize: route.requires_authorization(),
                roles: route.roles().to_vec(),
            })
            .collect();
        Self { path, routes: Arc::new(routes) }
    }

    pub fn path(&self) -> &str { &self.path }
    pub fn routes(&self) -> &[RouteSummary] { &self.routes }
}

/// Answers `GET` on the catalog path with the catalog; lets everything else
/// through.
pub struct DocsMiddleware {
    catalog: RouteCatalog,
}

impl Injectable for DocsMiddleware {
    fn dependencies() -> Vec<Dependency> {
        vec![Dependency::provided::<RouteCatalog>()]
    }

    fn construct(deps: &Resolver<'_>) -> Result<Self, ResolveError> {
        Ok(DocsMiddleware { catalog: deps.resolve()? })
    }
}

impl Middleware for DocsMiddleware {
    fn execute<'a>(&'a mut self, request: &'a Request, response: &'a mut Response) -> BoxFuture<'a, Result<Flow, Error>> {
        Box::pin(async move {
            if *request.method() != Method::GET || request.path() != self.catalog.path {
                return Ok(Flow::Continue);
            }
            response.set_status(StatusCode::OK);
            response.send_json(self.catalog.routes())?;
            Ok(Flow::Halt)
        })
    }
}
