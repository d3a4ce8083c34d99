//! The path-multiplexing upgrade server.
//!
//! One listening endpoint, many upgrade-capable paths. The route table maps
//! each registered path to a [`HandlerBuilder`]; a fresh handler is built
//! per inbound request, so per-connection dependencies are injected at
//! build time. Routing is exact-match; requests for unknown paths get the
//! default not-found response without touching any builder.

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::Full;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use tether_core::{BuildError, CancelScope, HandlerBuilder, HttpResponse, RequestContext};

use crate::config::ServerConfig;
use crate::shutdown::ConnectionTracker;

/// Server error types.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listener could not be set up. Fatal to server start.
    #[error("bind error: {0}")]
    Bind(String),

    /// I/O failure during serving.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Encodes a [`BuildError`] to the HTTP caller.
pub type BuildErrorEncodeFn = Arc<dyn Fn(&BuildError) -> HttpResponse + Send + Sync>;

/// Server construction options: the handler-builder registrations and the
/// encoder used when a builder fails.
pub struct ServerOptions {
    builders: Vec<Arc<dyn HandlerBuilder>>,
    error_encode: BuildErrorEncodeFn,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            builders: Vec::new(),
            error_encode: Arc::new(|err| {
                json_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    &serde_json::json!({ "code": 500, "msg": err.to_string() }),
                )
            }),
        }
    }
}

impl ServerOptions {
    /// Creates empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one handler builder.
    #[must_use]
    pub fn handler_builder(mut self, builder: impl HandlerBuilder) -> Self {
        self.builders.push(Arc::new(builder));
        self
    }

    /// Registers a set of handler builders, preserving order. When two
    /// registrations share a path, the later one wins at route-table build
    /// time.
    #[must_use]
    pub fn handler_builders(mut self, builders: Vec<Arc<dyn HandlerBuilder>>) -> Self {
        self.builders.extend(builders);
        self
    }

    /// Overrides how handler-build failures are framed to HTTP callers.
    #[must_use]
    pub fn with_error_encode(
        mut self,
        f: impl Fn(&BuildError) -> HttpResponse + Send + Sync + 'static,
    ) -> Self {
        self.error_encode = Arc::new(f);
        self
    }
}

/// Routing state shared by every accepted connection. Read-only at serve
/// time.
struct ServerInner {
    routes: HashMap<String, Arc<dyn HandlerBuilder>>,
    error_encode: BuildErrorEncodeFn,
    shutdown: CancelScope,
}

/// A cloneable handle that stops a running [`Server`].
///
/// Obtained from [`Server::handle`] before `start` consumes the server.
#[derive(Clone)]
pub struct ServerHandle {
    shutdown: CancelScope,
}

impl ServerHandle {
    /// Stops the server: closes the listener and cancels every connection
    /// built from it. Idempotent.
    pub fn stop(&self) {
        self.shutdown.trigger();
    }

    /// Returns whether stop has been requested.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

/// The Tether upgrade server.
///
/// ```rust,ignore
/// let server = Server::bind(
///     ServerConfig::builder().addr("0.0.0.0:8080").build(),
///     ServerOptions::new().handler_builder(my_builder),
/// )
/// .await?;
///
/// let handle = server.handle();
/// server.start().await?; // blocks until handle.stop()
/// ```
pub struct Server {
    listener: TcpListener,
    inner: Arc<ServerInner>,
    config: ServerConfig,
}

impl Server {
    /// Binds the listening socket and builds the route table.
    ///
    /// # Errors
    ///
    /// [`ServerError::Bind`] when the address is malformed or unavailable.
    pub async fn bind(config: ServerConfig, options: ServerOptions) -> Result<Self, ServerError> {
        let addr = config
            .socket_addr()
            .map_err(|e| ServerError::Bind(format!("invalid address '{}': {e}", config.addr())))?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind(format!("failed to bind {addr}: {e}")))?;

        let mut routes = HashMap::new();
        for builder in options.builders {
            // Insertion order is registration order: last wins.
            routes.insert(builder.path().to_string(), builder);
        }

        Ok(Self {
            listener,
            inner: Arc::new(ServerInner {
                routes,
                error_encode: options.error_encode,
                shutdown: CancelScope::new(),
            }),
            config,
        })
    }

    /// Returns the bound address (useful with `:0` binds).
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Returns a handle that stops this server from another task.
    #[must_use]
    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            shutdown: self.inner.shutdown.clone(),
        }
    }

    /// Returns whether a builder is registered for `path`.
    #[must_use]
    pub fn has_route(&self, path: &str) -> bool {
        self.inner.routes.contains_key(path)
    }

    /// Returns the number of registered routes.
    #[must_use]
    pub fn route_count(&self) -> usize {
        self.inner.routes.len()
    }

    /// Serves connections until the shutdown scope triggers.
    ///
    /// Closing the listener is the normal termination of `start`, not an
    /// error: the return value is `Ok(())` after a drain bounded by the
    /// configured shutdown timeout.
    pub async fn start(self) -> Result<(), ServerError> {
        let addr = self.local_addr()?;
        info!(%addr, routes = self.inner.routes.len(), "server listening");

        let tracker = ConnectionTracker::new();
        let shutdown = self.inner.shutdown.clone();

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, remote_addr)) => {
                            let inner = Arc::clone(&self.inner);
                            let token = tracker.acquire();
                            tokio::spawn(async move {
                                if let Err(err) =
                                    serve_connection(inner, stream, remote_addr).await
                                {
                                    debug!(%remote_addr, error = %err, "connection ended with error");
                                }
                                drop(token);
                            });
                        }
                        Err(err) => {
                            error!(error = %err, "failed to accept connection");
                        }
                    }
                }

                () = shutdown.cancelled() => {
                    info!("shutdown triggered, closing listener");
                    break;
                }
            }
        }

        // The listener closes here; wait (bounded) for in-flight requests.
        drop(self.listener);
        tokio::select! {
            () = tracker.drained() => {
                info!("all connections drained");
            }
            () = tokio::time::sleep(self.config.shutdown_timeout()) => {
                warn!(active = tracker.active(), "shutdown timeout reached");
            }
        }

        Ok(())
    }

    /// Serves until an OS signal (SIGTERM/SIGINT) or the handle stops it.
    pub async fn run(self) -> Result<(), ServerError> {
        crate::shutdown::trigger_on_os_signals(self.inner.shutdown.clone());
        self.start().await
    }
}

/// Serves one accepted TCP connection over HTTP/1, upgrades included.
async fn serve_connection(
    inner: Arc<ServerInner>,
    stream: tokio::net::TcpStream,
    remote_addr: SocketAddr,
) -> Result<(), hyper::Error> {
    let io = TokioIo::new(stream);
    let service = service_fn(move |request| {
        let inner = Arc::clone(&inner);
        async move { Ok::<_, Infallible>(route_request(inner, remote_addr, request).await) }
    });

    http1::Builder::new()
        .serve_connection(io, service)
        .with_upgrades()
        .await
}

/// Routes one request: exact path match, fresh handler per request.
async fn route_request(
    inner: Arc<ServerInner>,
    remote_addr: SocketAddr,
    request: http::Request<hyper::body::Incoming>,
) -> HttpResponse {
    let path = request.uri().path().to_string();

    let Some(builder) = inner.routes.get(&path) else {
        debug!(%path, "no route registered");
        return not_found(&path);
    };

    let ctx = RequestContext::new(path.as_str())
        .with_remote_addr(remote_addr)
        .with_scope(inner.shutdown.clone());

    match builder.build(&ctx) {
        Ok(handler) => handler.handle_connection(ctx, request).await,
        Err(err) => {
            warn!(%path, error = %err, "handler build failed");
            (inner.error_encode)(&err)
        }
    }
}

/// The default not-found response.
fn not_found(path: &str) -> HttpResponse {
    json_response(
        StatusCode::NOT_FOUND,
        &serde_json::json!({ "error": "not found", "path": path }),
    )
}

fn json_response(status: StatusCode, body: &serde_json::Value) -> HttpResponse {
    http::Response::builder()
        .status(status)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap_or_else(|_| http::Response::new(Full::new(Bytes::new())))
}
