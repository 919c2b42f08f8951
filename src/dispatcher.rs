//! Per-request dispatch pipeline.
//!
//! ```text
//! before chain ─ Halt ──────────────────────────────────────────→ (sent as is)
//!      │ Continue
//! match route ── none ──────────────────────────────────────────→ 404
//!      │
//! authorize ──── Deny / Reject ─────────────────────────────────→ 401 / status
//!      │ Allow
//! bind query bundle → body (non-GET) → headers → path
//!      │
//! build handler instance, call it with (args…, request, response)
//!      │
//! after chain ── Halt ──────────────────────────────────────────→ (sent as is)
//!      │ Continue
//! serialize result as JSON (no body for `()`) ──────────────────→ 200 (or as set)
//! ```
//!
//! Any error on the way is logged and answered with `500 Internal error`.
//! Headers already set (CORS, for one) stay; status and body are replaced.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{Method, StatusCode};
use http_body_util::Full;
use hyper::body::Body;
use tracing::{debug, error, warn};

use crate::auth::AuthDecision;
use crate::binder;
use crate::body::{BoxError, parse_body};
use crate::config::ServerOptions;
use crate::container::Container;
use crate::error::{Error, RegistrationError};
use crate::metadata::MetadataStore;
use crate::middleware::{
    CorsMiddleware, DocsMiddleware, Flow, LogMiddleware, MiddlewareEntry, RouteCatalog, run_chain,
};
use crate::request::Request;
use crate::response::{ContentType, Response};
use crate::route::{Args, Call, Route};
use crate::router::{Router, join_prefix};
use crate::socket::EventChannel;

/// Body of every 404.
pub const NOT_FOUND_BODY: &str = "Method doesnt match";
/// Body of a plain authorization denial.
pub const UNAUTHORIZED_BODY: &str = "Not authorized";
/// Body of every 500.
pub const INTERNAL_ERROR_BODY: &str = "Internal error";

/// The request handler shared by every connection.
///
/// Holds only data fixed at startup; each request gets its own handler and
/// middleware instances from the container.
pub struct Dispatcher {
    router: Router,
    routes: Vec<Route>,
    before: Vec<MiddlewareEntry>,
    after: Vec<MiddlewareEntry>,
    container: Container,
    options: Arc<ServerOptions>,
    socket: Option<EventChannel>,
}

impl Dispatcher {
    /// Finishes initialization of `store` under `options`:
    /// prepends the built-in middleware the options enable (documentation,
    /// log, CORS, in that order), checks the dependency graph and builds the
    /// route trees.
    pub fn new(store: MetadataStore, options: ServerOptions) -> Result<Self, RegistrationError> {
        let socket = options.socket.then(EventChannel::new);
        Self::with_socket(store, options, socket)
    }

    pub(crate) fn with_socket(
        mut store: MetadataStore,
        options: ServerOptions,
        socket: Option<EventChannel>,
    ) -> Result<Self, RegistrationError> {
        let mut builtins = Vec::new();
        if options.documentation.enabled {
            let path = join_prefix(&options.prefix, &options.documentation.path);
            let catalog = RouteCatalog::new(path, &store.routes, &options.prefix);
            store.container.provide(catalog);
            store.container.register::<DocsMiddleware>()?;
            builtins.push(MiddlewareEntry::of::<DocsMiddleware>());
        }
        if options.log {
            store.container.register::<LogMiddleware>()?;
            builtins.push(MiddlewareEntry::of::<LogMiddleware>());
        }
        if options.cors.enabled {
            store.container.provide(options.cors.clone());
            store.container.register::<CorsMiddleware>()?;
            builtins.push(MiddlewareEntry::of::<CorsMiddleware>());
        }
        store.prepend_before(builtins);

        if let Some(socket) = &socket {
            store.container.provide(socket.clone());
        }
        store.container.validate()?;

        let router = Router::build(&store.routes, &options.prefix)?;
        let MetadataStore { routes, before, after, container } = store;

        Ok(Self { router, routes, before, after, container, options: Arc::new(options), socket })
    }

    pub fn options(&self) -> &ServerOptions { &self.options }
    pub fn routes(&self) -> &[Route] { &self.routes }
    pub fn middlewares_before(&self) -> &[MiddlewareEntry] { &self.before }
    pub fn middlewares_after(&self) -> &[MiddlewareEntry] { &self.after }

    /// The event channel, when `options.socket` is set.
    pub fn socket(&self) -> Option<&EventChannel> { self.socket.as_ref() }

    /// Runs the whole pipeline for one request and produces exactly one
    /// response. Never fails: errors become a 500.
    pub async fn dispatch<B>(
        &self,
        req: http::Request<B>,
        remote_addr: Option<SocketAddr>,
    ) -> http::Response<Full<Bytes>>
    where
        B: Body<Data = Bytes> + Send,
        B::Error: Into<BoxError>,
    {
        let (parts, body) = req.into_parts();
        let mut request = Request::new(parts, remote_addr);
        let mut response = Response::new();

        match self.process(&mut request, &mut response, body).await {
            Ok(()) => response.into_inner(),
            Err(e) => {
                error!(method = %request.method(), path = request.path(), "request failed: {e}");
                response.send(StatusCode::INTERNAL_SERVER_ERROR, ContentType::Text, INTERNAL_ERROR_BODY);
                response.into_inner()
            }
        }
    }

    async fn process<B>(&self, request: &mut Request, response: &mut Response, body: B) -> Result<(), Error>
    where
        B: Body<Data = Bytes> + Send,
        B::Error: Into<BoxError>,
    {
        let step_timeout = self.options.step_timeout();

        if run_chain(&self.before, &self.container, request, response, step_timeout).await? == Flow::Halt {
            return Ok(());
        }

        let Some((index, params)) = self.router.lookup(request.method(), request.path()) else {
            debug!(method = %request.method(), path = request.path(), "no route");
            response.send(StatusCode::NOT_FOUND, ContentType::Text, NOT_FOUND_BODY);
            return Ok(());
        };
        let route = &self.routes[index];
        request.params = params;

        if route.requires_authorization() {
            if let Some(authorizer) = &self.options.authorization {
                match authorizer.authorize(request, route.roles()).await {
                    AuthDecision::Allow => {}
                    AuthDecision::Deny => {
                        warn!(path = request.path(), "authorization denied");
                        response.send(StatusCode::UNAUTHORIZED, ContentType::Text, UNAUTHORIZED_BODY);
                        return Ok(());
                    }
                    AuthDecision::Reject { status, message } => {
                        let status = StatusCode::from_u16(status).map_err(|_| Error::InvalidStatus(status))?;
                        warn!(path = request.path(), status = status.as_u16(), "authorization rejected");
                        response.send(status, ContentType::Text, message);
                        return Ok(());
                    }
                }
            }
        }

        let plan = route.plan();
        let mut slots = plan.empty_slots();

        let bundle = binder::bind_query(request.query())?;
        binder::bind_query_params(bundle.as_ref(), plan, &mut slots);

        if *request.method() != Method::GET {
            let content_type = request.headers().get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
            let decoded = parse_body(content_type, body).await?;
            binder::bind_body(decoded, plan, &mut slots);
        }

        binder::bind_headers(request, plan, &mut slots);
        binder::bind_path(request, plan, &mut slots)?;

        let request: &Request = request;
        let call = Call { args: Args::new(slots), request, response: &mut *response };
        let result = route.action.invoke(&self.container, call).await?;

        if run_chain(&self.after, &self.container, request, response, step_timeout).await? == Flow::Halt {
            return Ok(());
        }

        if let Some(result) = result {
            response.send_json(&result)?;
        }
        Ok(())
    }
}
