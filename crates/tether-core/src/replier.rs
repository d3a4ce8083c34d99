//! The replier capability: business logic plugged into a connection.
//!
//! A [`Replier`] is bound to exactly one connection. The engine's read loop
//! feeds decoded inbound messages to [`Replier::apply`]; the write loop
//! polls [`Replier::reply`] for outbound messages. The two loops run
//! concurrently and the engine never serializes between them; a replier
//! implementation owns that discipline itself (typically via channels).

use std::future::Future;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::context::RequestContext;
use crate::error::ValidationError;

/// Errors a replier can produce.
///
/// [`ReplierError::Cancelled`] is the cancellation-class error: both loops
/// treat it as benign and keep polling. Anything else is a business-logic
/// failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplierError {
    /// The operation observed cooperative cancellation. Benign.
    #[error("operation cancelled")]
    Cancelled,

    /// Business logic rejected the message. Reported to the peer; the
    /// connection continues.
    #[error("{0}")]
    Rejected(String),

    /// The replier itself failed (lost upstream, poisoned state, ...).
    #[error("replier error: {0}")]
    Internal(String),
}

impl ReplierError {
    /// Creates a rejection carrying a peer-visible reason.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected(reason.into())
    }

    /// Creates an internal replier failure.
    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal(reason.into())
    }

    /// Returns `true` for the cancellation-class error.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Validation hook for inbound request types.
///
/// The read loop invokes `validate` on every decoded message before handing
/// it to [`Replier::apply`]. The default accepts everything, so request
/// types without invariants implement the trait with an empty body:
///
/// ```rust
/// use tether_core::Validate;
///
/// #[derive(serde::Deserialize)]
/// struct Frame { seq: u64 }
///
/// impl Validate for Frame {}
/// ```
///
/// A failing validation is framed back to the peer and terminates the
/// connection.
pub trait Validate {
    /// Checks message invariants.
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

/// Business state machine bound to one connection.
///
/// # Concurrency contract
///
/// `apply` and `reply` are invoked concurrently from the connection's two
/// loops on the same instance; each individual method is never invoked from
/// more than one task at a time. `close` may be called from either teardown
/// path and must be idempotent-safe.
///
/// # Example
///
/// ```rust,ignore
/// struct Ticker { rx: tokio::sync::Mutex<mpsc::Receiver<Tick>> }
///
/// impl Replier for Ticker {
///     type Request = Subscribe;
///     type Response = Tick;
///
///     async fn apply(&self, _ctx: &RequestContext, req: Subscribe) -> Result<(), ReplierError> {
///         self.subscribe(req.topic)
///     }
///
///     async fn reply(&self, _ctx: &RequestContext) -> Result<Tick, ReplierError> {
///         self.rx.lock().await.recv().await.ok_or(ReplierError::Cancelled)
///     }
///
///     async fn close(&self, _ctx: &RequestContext) -> Result<(), ReplierError> {
///         Ok(())
///     }
/// }
/// ```
pub trait Replier: Send + Sync + 'static {
    /// Decoded inbound message type.
    type Request: DeserializeOwned + Validate + Send + 'static;

    /// Outbound message type.
    type Response: Serialize + Send + 'static;

    /// Consumes one decoded inbound message.
    ///
    /// # Errors
    ///
    /// [`ReplierError::Cancelled`] is swallowed by the read loop; any other
    /// error is framed back to the peer without ending the connection.
    fn apply(
        &self,
        ctx: &RequestContext,
        request: Self::Request,
    ) -> impl Future<Output = Result<(), ReplierError>> + Send;

    /// Produces the next outbound message, blocking until one is available.
    ///
    /// Must return [`ReplierError::Cancelled`] (or simply stay pending and
    /// rely on the scope-driven drop) when the connection is cancelled.
    fn reply(
        &self,
        ctx: &RequestContext,
    ) -> impl Future<Output = Result<Self::Response, ReplierError>> + Send;

    /// Releases resources. Must be safe to call more than once: the
    /// close-frame path and engine teardown can race.
    fn close(
        &self,
        ctx: &RequestContext,
    ) -> impl Future<Output = Result<(), ReplierError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, serde::Deserialize)]
    struct Ping {
        #[allow(dead_code)]
        seq: u64,
    }

    impl Validate for Ping {}

    #[derive(Debug, serde::Serialize)]
    struct Pong {
        seq: u64,
    }

    struct Echo {
        applied: AtomicUsize,
    }

    impl Replier for Echo {
        type Request = Ping;
        type Response = Pong;

        async fn apply(&self, _ctx: &RequestContext, _req: Ping) -> Result<(), ReplierError> {
            self.applied.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn reply(&self, _ctx: &RequestContext) -> Result<Pong, ReplierError> {
            Ok(Pong { seq: 1 })
        }

        async fn close(&self, _ctx: &RequestContext) -> Result<(), ReplierError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn replier_methods_are_callable() {
        let echo = Echo {
            applied: AtomicUsize::new(0),
        };
        let ctx = RequestContext::mock();

        echo.apply(&ctx, Ping { seq: 7 }).await.unwrap();
        assert_eq!(echo.applied.load(Ordering::SeqCst), 1);

        let pong = echo.reply(&ctx).await.unwrap();
        assert_eq!(pong.seq, 1);

        echo.close(&ctx).await.unwrap();
        echo.close(&ctx).await.unwrap();
    }

    #[test]
    fn default_validate_accepts() {
        let ping = Ping { seq: 0 };
        assert!(ping.validate().is_ok());
    }

    #[test]
    fn cancellation_classification() {
        assert!(ReplierError::Cancelled.is_cancelled());
        assert!(!ReplierError::rejected("nope").is_cancelled());
        assert!(!ReplierError::internal("boom").is_cancelled());
    }
}
