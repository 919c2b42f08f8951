//! Middleware layer.
//!
//! Middleware intercepts a request before the route is matched (`before`
//! list) or after the handler returned and before its result is serialized
//! (`after` list). It is the place for cross-cutting concerns: logging,
//! CORS, authentication headers, request-scoped bookkeeping.
//!
//! Each middleware answers with a [`Flow`]. [`Flow::Continue`] hands over
//! to the next entry; [`Flow::Halt`] ends processing, and the response as
//! the middleware left it is what the client receives.
//!
//! ```rust
//! use http::StatusCode;
//! use kiwi::{BoxFuture, ContentType, Error, Flow, Injectable, Middleware, Request,
//!            ResolveError, Resolver, Response};
//!
//! struct RequireApiKey;
//!
//! impl Injectable for RequireApiKey {
//!     fn construct(_: &Resolver<'_>) -> Result<Self, ResolveError> { Ok(RequireApiKey) }
//! }
//!
//! impl Middleware for RequireApiKey {
//!     fn execute<'a>(&'a mut self, req: &'a Request, res: &'a mut Response)
//!         -> BoxFuture<'a, Result<Flow, Error>>
//!     {
//!         Box::pin(async move {
//!             if req.header("x-api-key").is_some() {
//!                 return Ok(Flow::Continue);
//!             }
//!             res.send(StatusCode::FORBIDDEN, ContentType::Text, "missing api key");
//!             Ok(Flow::Halt)
//!         })
//!     }
//! }
//! ```

mod cors;
mod docs;
mod log;

use std::time::Duration;

use tracing::debug;

use crate::container::{Container, Injectable, ResolveError};
use crate::error::Error;
use crate::handler::BoxFuture;
use crate::request::Request;
use crate::response::Response;

pub use cors::CorsMiddleware;
pub use docs::{DocsMiddleware, RouteCatalog, RouteSummary};
pub use log::LogMiddleware;

/// What the chain should do after a middleware ran.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Flow {
    /// Run the next middleware (or carry on with the pipeline).
    Continue,
    /// Stop. The response has already been written.
    Halt,
}

/// A cross-cutting step run around every request.
///
/// Instances are built fresh for each request by the container, so `&mut
/// self` state never leaks between requests.
pub trait Middleware: Send + 'static {
    fn execute<'a>(
        &'a mut self,
        request: &'a Request,
        response: &'a mut Response,
    ) -> BoxFuture<'a, Result<Flow, Error>>;
}

type BuildFn = fn(&Container) -> Result<Box<dyn Middleware>, ResolveError>;

/// One registered middleware type.
#[derive(Clone, Copy)]
pub struct MiddlewareEntry {
    name: &'static str,
    build: BuildFn,
}

impl MiddlewareEntry {
    pub fn of<M: Middleware + Injectable>() -> Self {
        Self { name: std::any::type_name::<M>(), build: build::<M> }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl std::fmt::Debug for MiddlewareEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("MiddlewareEntry").field(&self.name).finish()
    }
}

fn build<M: Middleware + Injectable>(container: &Container) -> Result<Box<dyn Middleware>, ResolveError> {
    Ok(Box::new(container.get_instance::<M>()?))
}

/// Runs `chain` in order, one fresh instance per entry.
///
/// Returns [`Flow::Halt`] as soon as an entry halts, [`Flow::Continue`]
/// once every entry continued. With `step_timeout` set, an entry that does
/// not answer in time fails the request with [`Error::MiddlewareTimeout`].
pub async fn run_chain(
    chain: &[MiddlewareEntry],
    container: &Container,
    request: &Request,
    response: &mut Response,
    step_timeout: Option<Duration>,
) -> Result<Flow, Error> {
    for entry in chain {
        let mut instance = (entry.build)(container)?;
        let step = instance.execute(request, response);
        let flow = match step_timeout {
            Some(limit) => tokio::time::timeout(limit, step)
                .await
                .map_err(|_| Error::MiddlewareTimeout { name: entry.name, limit })??,
            None => step.await?,
        };
        if flow == Flow::Halt {
            debug!(middleware = entry.name, "chain halted");
            return Ok(Flow::Halt);
        }
    }
    Ok(Flow::Continue)
}
