//! Unified error types.
//!
//! Two families live here:
//!
//! - [`Error`]: anything that can go wrong while serving. Inside the
//!   dispatcher every `Error` ends the same way: it is logged and the client
//!   receives `500 Internal error`. Outside it (binding a port, loading
//!   options) it is returned to the caller.
//! - [`RegistrationError`]: mistakes in the route / middleware / dependency
//!   tables. These are caught once at startup, before the listener opens.
//!
//! Expected application outcomes (404, 401, a middleware that halts) are
//! HTTP responses, not errors.

use std::time::Duration;

use thiserror::Error;

use crate::binder::BindError;
use crate::body::ParseError;
use crate::container::ResolveError;

/// The error type returned by kiwi's fallible operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Binding the listener or accepting a connection failed.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// The request body could not be decoded.
    #[error("body: {0}")]
    Parse(#[from] ParseError),

    /// Request data could not be placed into handler arguments.
    #[error("binding: {0}")]
    Bind(#[from] BindError),

    /// A handler or middleware instance could not be built.
    #[error("resolve: {0}")]
    Resolve(#[from] ResolveError),

    /// The route / middleware / dependency tables are inconsistent.
    #[error("registration: {0}")]
    Registration(#[from] RegistrationError),

    /// A handler result could not be serialized.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    /// A middleware step exceeded `middleware_timeout_ms`.
    #[error("middleware `{name}` did not finish within {limit:?}")]
    MiddlewareTimeout { name: &'static str, limit: Duration },

    /// An authorization collaborator asked for a status code HTTP cannot carry.
    #[error("invalid status code {0}")]
    InvalidStatus(u16),

    /// Server options could not be loaded.
    #[error("config: {0}")]
    Config(String),

    /// Raised by application handlers and middleware.
    #[error("{0}")]
    Handler(String),
}

impl Error {
    /// Shorthand for failing a handler with a message.
    pub fn handler(message: impl Into<String>) -> Self {
        Self::Handler(message.into())
    }
}

/// Startup-time inconsistencies in the metadata tables.
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// The radix tree rejected the pattern (duplicate or conflicting route).
    #[error("invalid route `{method} {path}`: {source}")]
    Route {
        method: http::Method,
        path: String,
        #[source]
        source: matchit::InsertError,
    },

    #[error("route `{path}` declares more than one body parameter")]
    DuplicateBody { path: String },

    #[error("route `{path}` declares more than one query bundle parameter")]
    DuplicateQueryBundle { path: String },

    #[error("route `{path}` binds path parameter `{name}` which the pattern does not contain")]
    UnknownPathParam { path: String, name: String },

    /// The declared dependency graph loops back on itself. The path lists
    /// every type on the loop, starting and ending with the same type.
    #[error("dependency cycle: {}", .0.join(" -> "))]
    Cycle(Vec<&'static str>),

    /// A declared dependency was never registered or provided.
    #[error("`{owner}` depends on `{dependency}`, which is neither registered nor provided")]
    Missing {
        owner: &'static str,
        dependency: &'static str,
    },
}
