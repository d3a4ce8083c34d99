//! Connection handler and handler-builder capabilities.
//!
//! The server owns a table of [`HandlerBuilder`]s, one per path. For every
//! inbound request it builds a fresh [`ConnectionHandler`] (the
//! per-connection dependency-injection point) and delegates the request to
//! it. The WebSocket endpoint in `tether-ws` is the stock implementation.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::Full;

use crate::context::RequestContext;
use crate::error::BuildError;

/// A boxed future, used to keep the handler traits object-safe.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The HTTP response type produced on the pre-upgrade path.
pub type HttpResponse = http::Response<Full<Bytes>>;

/// The inbound HTTP request type handed to connection handlers.
pub type HttpRequest = http::Request<hyper::body::Incoming>;

/// Handles one upgrade-capable request end to end.
///
/// Implementations run the pre-upgrade middleware chain, perform the
/// protocol switch and drive the connection until teardown. The returned
/// response is the pre-upgrade HTTP answer (a `101 Switching Protocols` on
/// success, an encoded error otherwise).
pub trait ConnectionHandler: Send + Sync + 'static {
    /// Handles a single inbound request.
    fn handle_connection(
        self: Arc<Self>,
        ctx: RequestContext,
        request: HttpRequest,
    ) -> BoxFuture<'static, HttpResponse>;
}

/// Factory capability producing a fresh handler per inbound request.
///
/// `build` may fail (e.g. a dependency is unavailable); the server frames
/// that failure through its error encoder and the request terminates
/// without any upgrade.
pub trait HandlerBuilder: Send + Sync + 'static {
    /// The route path this builder serves (exact match).
    fn path(&self) -> &str;

    /// Builds a handler instance for one inbound request.
    fn build(&self, ctx: &RequestContext) -> Result<Arc<dyn ConnectionHandler>, BuildError>;
}

/// A [`HandlerBuilder`] backed by a closure.
///
/// ```rust,ignore
/// let builder = FnHandlerBuilder::new("/ws", move |_ctx| {
///     Ok(Arc::new(Endpoint::new(EchoReplier::new(), options.clone())) as Arc<dyn ConnectionHandler>)
/// });
/// ```
pub struct FnHandlerBuilder<F> {
    path: String,
    build_fn: F,
}

impl<F> FnHandlerBuilder<F>
where
    F: Fn(&RequestContext) -> Result<Arc<dyn ConnectionHandler>, BuildError>
        + Send
        + Sync
        + 'static,
{
    /// Creates a builder for `path` backed by `build_fn`.
    pub fn new(path: impl Into<String>, build_fn: F) -> Self {
        Self {
            path: path.into(),
            build_fn,
        }
    }
}

impl<F> HandlerBuilder for FnHandlerBuilder<F>
where
    F: Fn(&RequestContext) -> Result<Arc<dyn ConnectionHandler>, BuildError>
        + Send
        + Sync
        + 'static,
{
    fn path(&self) -> &str {
        &self.path
    }

    fn build(&self, ctx: &RequestContext) -> Result<Arc<dyn ConnectionHandler>, BuildError> {
        (self.build_fn)(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopHandler;

    impl ConnectionHandler for NoopHandler {
        fn handle_connection(
            self: Arc<Self>,
            _ctx: RequestContext,
            _request: HttpRequest,
        ) -> BoxFuture<'static, HttpResponse> {
            Box::pin(async {
                http::Response::builder()
                    .status(http::StatusCode::OK)
                    .body(Full::new(Bytes::new()))
                    .unwrap()
            })
        }
    }

    #[test]
    fn fn_builder_reports_path() {
        let builder = FnHandlerBuilder::new("/ws", |_ctx| {
            Ok(Arc::new(NoopHandler) as Arc<dyn ConnectionHandler>)
        });
        assert_eq!(builder.path(), "/ws");
    }

    #[test]
    fn fn_builder_builds_per_request() {
        let builder = FnHandlerBuilder::new("/ws", |_ctx| {
            Ok(Arc::new(NoopHandler) as Arc<dyn ConnectionHandler>)
        });
        let ctx = RequestContext::mock();
        assert!(builder.build(&ctx).is_ok());
        assert!(builder.build(&ctx).is_ok());
    }

    #[test]
    fn fn_builder_propagates_failure() {
        let builder =
            FnHandlerBuilder::new("/ws", |_ctx| Err(BuildError::new("queue unavailable")));
        let ctx = RequestContext::mock();
        let err = builder.build(&ctx).err().unwrap();
        assert!(err.to_string().contains("queue unavailable"));
    }
}
