//! The pre-upgrade middleware chain.
//!
//! A middleware is a transform over a [`PreHandle`]: the function that,
//! given the request context and head, decides whether the upgrade may
//! proceed. The chain composes outside-in *before* the protocol switch, so
//! no middleware ever observes a half-upgraded socket.
//!
//! # Composition order
//!
//! The **last**-registered middleware becomes the **outermost** wrapper and
//! runs first; `chain[0]` is innermost, nearest the actual upgrade step. An
//! error from any wrapper short-circuits the chain: the inner step never
//! runs and the configured HTTP error encoder frames the failure.

use std::future::Future;
use std::sync::Arc;

use tether_core::{BoxError, BoxFuture, RequestContext, RequestHead};

/// The pre-handle entry point wrapped by middleware.
///
/// Returning `Ok(())` lets the request proceed toward the upgrade;
/// returning an error aborts it pre-upgrade.
pub type PreHandle =
    Arc<dyn Fn(RequestContext, Arc<RequestHead>) -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync>;

/// A middleware: a transform from one [`PreHandle`] to another.
pub type WsMiddleware = Arc<dyn Fn(PreHandle) -> PreHandle + Send + Sync>;

/// Wraps an async closure into a [`PreHandle`].
pub fn pre_handle<F, Fut>(f: F) -> PreHandle
where
    F: Fn(RequestContext, Arc<RequestHead>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    Arc::new(move |ctx, head| {
        let fut: BoxFuture<'static, Result<(), BoxError>> = Box::pin(f(ctx, head));
        fut
    })
}

/// Wraps a transform closure into a [`WsMiddleware`].
pub fn middleware<F>(f: F) -> WsMiddleware
where
    F: Fn(PreHandle) -> PreHandle + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Composes a middleware chain around `inner`.
///
/// Registration order is preserved in the slice; each middleware wraps the
/// result of the previous composition, so the last element ends up
/// outermost and is entered first at request time.
#[must_use]
pub fn compose(middlewares: &[WsMiddleware], inner: PreHandle) -> PreHandle {
    let mut handle = inner;
    for mw in middlewares {
        handle = mw(handle);
    }
    handle
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recording(label: &'static str, log: Arc<Mutex<Vec<&'static str>>>) -> WsMiddleware {
        middleware(move |next| {
            let log = Arc::clone(&log);
            pre_handle(move |ctx, head| {
                let log = Arc::clone(&log);
                let next = Arc::clone(&next);
                async move {
                    log.lock().unwrap().push(label);
                    next(ctx, head).await
                }
            })
        })
    }

    fn inner_step(log: Arc<Mutex<Vec<&'static str>>>) -> PreHandle {
        pre_handle(move |_ctx, _head| {
            let log = Arc::clone(&log);
            async move {
                log.lock().unwrap().push("inner");
                Ok(())
            }
        })
    }

    fn head() -> Arc<RequestHead> {
        let request = http::Request::builder().uri("/ws").body(()).unwrap();
        Arc::new(RequestHead::of(&request))
    }

    #[tokio::test]
    async fn empty_chain_runs_inner_directly() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = compose(&[], inner_step(Arc::clone(&log)));
        chain(RequestContext::mock(), head()).await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["inner"]);
    }

    #[tokio::test]
    async fn last_registered_runs_first() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = compose(
            &[
                recording("first", Arc::clone(&log)),
                recording("second", Arc::clone(&log)),
                recording("third", Arc::clone(&log)),
            ],
            inner_step(Arc::clone(&log)),
        );
        chain(RequestContext::mock(), head()).await.unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            vec!["third", "second", "first", "inner"]
        );
    }

    #[tokio::test]
    async fn error_short_circuits_inner() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let failing: WsMiddleware = middleware(|_next| {
            pre_handle(|_ctx, _head| async {
                Err::<(), BoxError>("denied".to_string().into())
            })
        });
        let chain = compose(
            &[failing, recording("outer", Arc::clone(&log))],
            inner_step(Arc::clone(&log)),
        );
        let err = chain(RequestContext::mock(), head()).await.unwrap_err();
        assert_eq!(err.to_string(), "denied");
        // Outer ran, the failing wrapper stopped everything beneath it.
        assert_eq!(*log.lock().unwrap(), vec!["outer"]);
    }
}
