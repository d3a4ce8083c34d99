//! The duplex connection engine.
//!
//! An [`Endpoint`] owns one upgrade-capable route: it runs the pre-upgrade
//! middleware chain, performs the protocol switch and then drives two
//! concurrent loops against the bound [`Replier`]. The read loop feeds
//! decoded messages to `apply`; the write loop frames whatever `reply`
//! yields. A shared [`CancelScope`] is the only cross-loop coordination;
//! teardown runs exactly once after both loops return.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use http::StatusCode;
use hyper_util::rt::TokioIo;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, warn};
use tungstenite::protocol::Role;

use tether_core::{
    BoxFuture, CancelScope, ConnectionHandler, HttpRequest, HttpResponse, Replier, ReplierError,
    RequestContext, RequestHead, Validate,
};
use tether_middleware::{compose, pre_handle, PreHandle, WsMiddleware};

use crate::config::WsConfig;
use crate::connection::{Connection, ConnectionSender};
use crate::encoding::{json_response, Encoding};
use crate::message::Message;
use crate::upgrade::{upgrade_response, validate_upgrade};

/// Configuration of one endpoint: encoding policy, middleware chain and
/// connection settings. Immutable once the endpoint is constructed.
pub struct WsOptions<T, R> {
    pub(crate) encoding: Encoding<T, R>,
    pub(crate) middlewares: Vec<WsMiddleware>,
    pub(crate) config: WsConfig,
}

impl<T, R> Clone for WsOptions<T, R> {
    fn clone(&self) -> Self {
        Self {
            encoding: self.encoding.clone(),
            middlewares: self.middlewares.clone(),
            config: self.config.clone(),
        }
    }
}

impl<T, R> Default for WsOptions<T, R>
where
    T: Serialize + 'static,
    R: DeserializeOwned + 'static,
{
    fn default() -> Self {
        Self {
            encoding: Encoding::default(),
            middlewares: Vec::new(),
            config: WsConfig::default(),
        }
    }
}

impl<T, R> WsOptions<T, R>
where
    T: Serialize + 'static,
    R: DeserializeOwned + 'static,
{
    /// Creates the default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<T, R> WsOptions<T, R> {
    /// Replaces the middleware chain. Order is registration order; the
    /// last element becomes the outermost wrapper.
    #[must_use]
    pub fn with_middlewares(mut self, middlewares: Vec<WsMiddleware>) -> Self {
        self.middlewares = middlewares;
        self
    }

    /// Appends one middleware to the chain.
    #[must_use]
    pub fn with_middleware(mut self, middleware: WsMiddleware) -> Self {
        self.middlewares.push(middleware);
        self
    }

    /// Sets the connection configuration.
    #[must_use]
    pub fn with_config(mut self, config: WsConfig) -> Self {
        self.config = config;
        self
    }

    /// Overrides how successful HTTP responses are framed.
    #[must_use]
    pub fn with_response_encode(
        mut self,
        f: impl Fn(&T) -> HttpResponse + Send + Sync + 'static,
    ) -> Self {
        self.encoding.response_encode = Arc::new(f);
        self
    }

    /// Overrides how pre-upgrade failures are framed to HTTP callers.
    #[must_use]
    pub fn with_error_encode(
        mut self,
        f: impl Fn(&tether_core::BoxError) -> HttpResponse + Send + Sync + 'static,
    ) -> Self {
        self.encoding.error_encode = Arc::new(f);
        self
    }

    /// Overrides how inbound HTTP bodies are parsed (pre-upgrade path only).
    #[must_use]
    pub fn with_request_decode(
        mut self,
        f: impl Fn(&[u8]) -> Result<R, tether_core::BoxError> + Send + Sync + 'static,
    ) -> Self {
        self.encoding.request_decode = Arc::new(f);
        self
    }

    /// Overrides how socket replies are framed.
    #[must_use]
    pub fn with_reply_encode(mut self, f: impl Fn(&T) -> Message + Send + Sync + 'static) -> Self {
        self.encoding.reply_encode = Arc::new(f);
        self
    }

    /// Overrides how socket-side failures are framed.
    #[must_use]
    pub fn with_reply_error_encode(
        mut self,
        f: impl Fn(&dyn std::error::Error) -> Message + Send + Sync + 'static,
    ) -> Self {
        self.encoding.reply_error_encode = Arc::new(f);
        self
    }

    /// Returns the encoding policy.
    #[must_use]
    pub fn encoding(&self) -> &Encoding<T, R> {
        &self.encoding
    }
}

/// One upgrade-capable route bound to a [`Replier`].
///
/// Endpoints are built fresh per inbound request by a
/// [`tether_core::HandlerBuilder`], so each instance serves exactly one
/// connection.
pub struct Endpoint<P: Replier> {
    replier: Arc<P>,
    options: WsOptions<P::Response, P::Request>,
    torn_down: AtomicBool,
}

impl<P: Replier> Endpoint<P> {
    /// Creates an endpoint for one connection.
    pub fn new(replier: P, options: WsOptions<P::Response, P::Request>) -> Self {
        Self {
            replier: Arc::new(replier),
            options,
            torn_down: AtomicBool::new(false),
        }
    }

    /// Runs the pre-upgrade chain and, on success, spawns the connection
    /// driver. Returns the HTTP response for the upgrade request.
    async fn serve(self: Arc<Self>, ctx: RequestContext, request: HttpRequest) -> HttpResponse {
        let head = Arc::new(RequestHead::of(&request));
        let response_slot: Arc<Mutex<Option<HttpResponse>>> = Arc::new(Mutex::new(None));
        let request_cell = Arc::new(Mutex::new(Some(request)));

        // The innermost step: validate the handshake, take over the stream
        // and schedule the duplex loops. Middleware wraps around this.
        let inner: PreHandle = {
            let endpoint = Arc::clone(&self);
            let response_slot = Arc::clone(&response_slot);
            let request_cell = Arc::clone(&request_cell);
            pre_handle(move |ctx, head| {
                let endpoint = Arc::clone(&endpoint);
                let response_slot = Arc::clone(&response_slot);
                let request_cell = Arc::clone(&request_cell);
                async move {
                    let mut request = request_cell
                        .lock()
                        .await
                        .take()
                        .ok_or_else(|| crate::WsError::upgrade("request already consumed"))?;

                    let accept_key =
                        validate_upgrade(&head, endpoint.options.config.origin_policy())?;

                    let on_upgrade = hyper::upgrade::on(&mut request);
                    drop(request);

                    let conn_ctx = ctx.clone();
                    tokio::spawn(async move {
                        match on_upgrade.await {
                            Ok(upgraded) => {
                                let stream = WebSocketStream::from_raw_socket(
                                    TokioIo::new(upgraded),
                                    Role::Server,
                                    Some(endpoint.options.config.to_protocol()),
                                )
                                .await;
                                endpoint.drive(conn_ctx, Connection::new(stream)).await;
                            }
                            Err(err) => {
                                warn!(
                                    request_id = %conn_ctx.request_id(),
                                    error = %err,
                                    "upgrade handshake did not complete"
                                );
                            }
                        }
                    });

                    *response_slot.lock().await = Some(upgrade_response(&accept_key));
                    Ok(())
                }
            })
        };

        let chain = compose(&self.options.middlewares, inner);
        match chain(ctx, head).await {
            Ok(()) => response_slot.lock().await.take().unwrap_or_else(|| {
                json_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    &json!({ "code": 500, "msg": "upgrade step produced no response" }),
                )
            }),
            Err(err) => self.options.encoding.encode_error(&err),
        }
    }

    /// Drives one upgraded connection to completion.
    ///
    /// Public so callers with their own transport (tests, tunnels) can
    /// hand the engine an already-upgraded stream.
    pub async fn drive<S>(self: Arc<Self>, ctx: RequestContext, conn: Connection<S>)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let cancel = ctx.scope().child();
        let sender = conn.sender();
        let connection_id = conn.id();
        debug!(
            request_id = %ctx.request_id(),
            connection = %connection_id,
            path = %ctx.path(),
            "connection upgraded"
        );

        let read = tokio::spawn(Arc::clone(&self).read_loop(
            ctx.clone(),
            cancel.clone(),
            conn,
            sender.clone(),
        ));
        let write =
            tokio::spawn(Arc::clone(&self).write_loop(ctx.clone(), cancel.clone(), sender.clone()));

        // The read loop ends the connection on transport failure and close
        // frames; the scope is the only signal the write loop observes.
        let _ = read.await;
        cancel.trigger();
        let _ = write.await;

        self.teardown(&ctx, &sender).await;
        debug!(
            request_id = %ctx.request_id(),
            connection = %connection_id,
            "connection closed"
        );
    }

    async fn read_loop<S>(
        self: Arc<Self>,
        ctx: RequestContext,
        cancel: CancelScope,
        mut conn: Connection<S>,
        sender: ConnectionSender<S>,
    ) where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        loop {
            if cancel.is_cancelled() {
                return;
            }
            let received = tokio::select! {
                () = cancel.cancelled() => return,
                received = conn.recv() => received,
            };
            let message = match received {
                // Stream ended without a close handshake: peer went away.
                None => return,
                Some(Err(err)) if err.is_fatal_read() => {
                    debug!(
                        request_id = %ctx.request_id(),
                        error = %err,
                        "read loop ending on transport error"
                    );
                    return;
                }
                Some(Err(err)) => {
                    debug!(request_id = %ctx.request_id(), error = %err, "skipping unreadable frame");
                    continue;
                }
                Some(Ok(message)) => message,
            };

            match message {
                Message::Close(_) => {
                    // Answer the close handshake and wake the write loop.
                    let _ = sender.send(Message::close_empty()).await;
                    cancel.trigger();
                    return;
                }
                // Control frames are transport-level; the protocol layer
                // answers pings when the sink flushes.
                Message::Ping(_) | Message::Pong(_) => continue,
                message => {
                    let request: P::Request = match message.json() {
                        Ok(request) => request,
                        Err(err) => {
                            debug!(
                                request_id = %ctx.request_id(),
                                error = %err,
                                "skipping malformed payload"
                            );
                            continue;
                        }
                    };

                    if let Err(err) = request.validate() {
                        let _ = sender
                            .send(self.options.encoding.encode_reply_error(&err))
                            .await;
                        cancel.trigger();
                        return;
                    }

                    match self.replier.apply(&ctx, request).await {
                        Ok(()) | Err(ReplierError::Cancelled) => {}
                        Err(err) => {
                            let _ = sender
                                .send(self.options.encoding.encode_reply_error(&err))
                                .await;
                        }
                    }
                }
            }
        }
    }

    async fn write_loop<S>(
        self: Arc<Self>,
        ctx: RequestContext,
        cancel: CancelScope,
        sender: ConnectionSender<S>,
    ) where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        loop {
            if cancel.is_cancelled() {
                return;
            }
            let produced = tokio::select! {
                () = cancel.cancelled() => return,
                produced = self.replier.reply(&ctx) => produced,
            };
            match produced {
                Err(ReplierError::Cancelled) => continue,
                Err(err) => {
                    // Nothing was produced; skip the encoder rather than
                    // frame a placeholder.
                    debug!(request_id = %ctx.request_id(), error = %err, "reply yielded no response");
                    continue;
                }
                Ok(response) => {
                    let frame = self.options.encoding.encode_reply(&response);
                    if let Err(err) = sender.send(frame).await {
                        // Fire-and-forget: write failures surface only here.
                        debug!(request_id = %ctx.request_id(), error = %err, "reply write failed");
                    }
                }
            }
        }
    }

    /// Releases the replier and the socket. Runs at most once per endpoint
    /// no matter how many exit paths race into it.
    async fn teardown<S>(&self, ctx: &RequestContext, sender: &ConnectionSender<S>)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        if self
            .torn_down
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        if let Err(err) = self.replier.close(ctx).await {
            warn!(request_id = %ctx.request_id(), error = %err, "replier close failed");
        }
        if let Err(err) = sender.close().await {
            debug!(request_id = %ctx.request_id(), error = %err, "socket close failed");
        }
    }
}

impl<P: Replier> ConnectionHandler for Endpoint<P> {
    fn handle_connection(
        self: Arc<Self>,
        ctx: RequestContext,
        request: HttpRequest,
    ) -> BoxFuture<'static, HttpResponse> {
        Box::pin(async move { self.serve(ctx, request).await })
    }
}
