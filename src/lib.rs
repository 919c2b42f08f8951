//! # kiwi
//!
//! A small HTTP dispatch engine: declared routes, declarative argument
//! binding, before/after middleware chains and a per-request dependency
//! injection container, served over hyper.
//!
//! ## Request lifecycle
//!
//! 1. `before` middleware, in registration order (built-ins first).
//! 2. Route matching on method + path. No match is a `404`.
//! 3. Authorization, for routes that ask for it.
//! 4. Argument binding: query string, body (non-GET), headers, path.
//! 5. A fresh handler instance is built by the container and called.
//! 6. `after` middleware.
//! 7. The handler's result is serialized as JSON.
//!
//! Any middleware can end the request early by answering [`Flow::Halt`].
//! Any error becomes `500 Internal error`.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use kiwi::{BoxFuture, Call, Error, Injectable, MetadataStore, Param, ResolveError,
//!            Resolver, Route, Server, ServerOptions};
//! use serde_json::{Value, json};
//!
//! struct Items;
//!
//! impl Injectable for Items {
//!     fn construct(_: &Resolver<'_>) -> Result<Self, ResolveError> { Ok(Items) }
//! }
//!
//! impl Items {
//!     fn list<'a>(self, call: Call<'a>) -> BoxFuture<'a, Result<Value, Error>> {
//!         Box::pin(async move {
//!             let active = call.args.str(0) == Some("true");
//!             Ok(json!({ "active": active, "count": 3 }))
//!         })
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let store = MetadataStore::new()
//!         .route(Route::get("/items", Items::list).named("list").param(Param::query("active")))?;
//!
//!     Server::new(ServerOptions::default().port(3000).log(true))
//!         .serve(store)
//!         .await
//! }
//! ```

mod auth;
mod body;
mod config;
mod container;
mod dispatcher;
mod error;
mod handler;
mod metadata;
mod request;
mod response;
mod route;
mod router;
mod server;
mod socket;

pub mod binder;
pub mod middleware;

pub use auth::{AuthDecision, Authorize};
pub use binder::{BindError, QueryBundle};
pub use body::{BoxError, ParseError, parse_body};
pub use config::{CorsOptions, DocumentationOptions, ServerOptions};
pub use container::{Container, Dependency, Injectable, ResolveError, Resolver};
pub use dispatcher::{Dispatcher, INTERNAL_ERROR_BODY, NOT_FOUND_BODY, UNAUTHORIZED_BODY};
pub use error::{Error, RegistrationError};
pub use handler::BoxFuture;
pub use metadata::MetadataStore;
pub use middleware::{
    CorsMiddleware, DocsMiddleware, Flow, LogMiddleware, Middleware, MiddlewareEntry, RouteCatalog,
    RouteSummary, run_chain,
};
pub use request::Request;
pub use response::{ContentType, Response};
pub use route::{Args, BindingPlan, Call, Param, ParamKind, QUERY_BUNDLE, Route};
pub use server::Server;
pub use socket::{Event, EventChannel};
