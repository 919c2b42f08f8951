//! Per-request access log, enabled with `ServerOptions::log`.

use tracing::info;

use super::{Flow, Middleware};
use crate::container::{Injectable, ResolveError, Resolver};
use crate::error::Error;
use crate::handler::BoxFuture;
use crate::request::Request;
use crate::response::Response;

/// Emits one `info` event per request with method, path and peer.
pub struct LogMiddleware;

impl Injectable for LogMiddleware {
    fn construct(_: &Resolver<'_>) -> Result<Self, ResolveError> {
        Ok(LogMiddleware)
    }
}

impl Middleware for LogMiddleware {
    fn execute<'a>(&'a mut self, request: &'a Request, _: &'a mut Response) -> BoxFuture<'a, Result<Flow, Error>> {
        Box::pin(async move {
            match request.remote_addr() {
                Some(peer) => info!(method = %request.method(), path = request.path(), peer = %peer, "request"),
                None => info!(method = %request.method(), path = request.path(), "request"),
            }
            Ok(Flow::Continue)
        })
    }
}
