//! HTTP server and graceful shutdown.
//!
//! # Graceful shutdown
//!
//! On **SIGTERM** (Kubernetes, systemd) or **Ctrl-C** the server:
//! 1. Immediately stops `listener.accept()`, so no new connections are made.
//! 2. Lets every in-flight connection task run to completion.
//! 3. Returns from [`Server::serve`], which lets `main` exit cleanly.
//!
//! Use [`Server::serve_until`] to drive shutdown from your own future
//! instead (tests, embedding).

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::ServerOptions;
use crate::dispatcher::Dispatcher;
use crate::error::Error;
use crate::metadata::MetadataStore;
use crate::socket::EventChannel;

type ListeningCallback = Box<dyn FnOnce(SocketAddr) + Send>;

/// The HTTP server.
///
/// ```rust,no_run
/// use kiwi::{MetadataStore, Server, ServerOptions};
///
/// #[tokio::main]
/// async fn main() -> Result<(), kiwi::Error> {
///     let store = MetadataStore::new(); // .route(...)?.before::<...>()?
///     Server::new(ServerOptions::default().port(3000))
///         .on_listening(|addr| println!("listening on {addr}"))
///         .serve(store)
///         .await
/// }
/// ```
pub struct Server {
    options: ServerOptions,
    on_listening: Option<ListeningCallback>,
    socket: Option<EventChannel>,
}

impl Server {
    pub fn new(options: ServerOptions) -> Self {
        let socket = options.socket.then(EventChannel::new);
        Self { options, on_listening: None, socket }
    }

    /// Called once with the bound address when the listener is ready.
    pub fn on_listening(mut self, callback: impl FnOnce(SocketAddr) + Send + 'static) -> Self {
        self.on_listening = Some(Box::new(callback));
        self
    }

    /// The event channel, when `options.socket` is set. Available before
    /// serving so the application can subscribe up front.
    pub fn socket(&self) -> Option<EventChannel> {
        self.socket.clone()
    }

    /// Serves `store` until SIGTERM or Ctrl-C, then drains in-flight
    /// connections.
    pub async fn serve(self, store: MetadataStore) -> Result<(), Error> {
        self.serve_until(store, shutdown_signal()).await
    }

    /// Serves `store` until `shutdown` resolves, then drains in-flight
    /// connections.
    pub async fn serve_until(
        self,
        store: MetadataStore,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), Error> {
        let addr = self.options.address();
        let dispatcher = Arc::new(Dispatcher::with_socket(store, self.options, self.socket)?);

        let listener = TcpListener::bind(&addr).await?;
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, routes = dispatcher.routes().len(), "kiwi listening");

        if let Some(callback) = self.on_listening {
            callback(local_addr);
        }

        // JoinSet tracks every spawned connection task so we can wait for
        // them all to finish during graceful shutdown.
        let mut tasks = tokio::task::JoinSet::new();

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // Check shutdown first so a signal immediately stops
                // accepting new connections, even if more are queued.
                biased;

                () = &mut shutdown => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let dispatcher = Arc::clone(&dispatcher);
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        // Called once per request on the connection.
                        let svc = service_fn(move |req| {
                            let dispatcher = Arc::clone(&dispatcher);
                            async move {
                                Ok::<_, std::convert::Infallible>(
                                    dispatcher.dispatch(req, Some(remote_addr)).await,
                                )
                            }
                        });

                        // HTTP/1.1 and HTTP/2, whatever the client negotiates.
                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connection tasks so the JoinSet does not grow
                // without bound on long-running servers.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}

        info!("kiwi stopped");
        Ok(())
    }
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first SIGTERM or SIGINT (Ctrl-C) the process receives.
/// On Windows only Ctrl-C is available. A signal handler that cannot be
/// installed is logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}
