//! Pre-upgrade middleware chain for the Tether framework.
//!
//! Middleware wraps the "pre-handle" step that runs before a WebSocket
//! upgrade: auth checks, rate limiting, logging, anything cross-cutting
//! that must be able to veto the protocol switch without the connection
//! engine knowing about it.
//!
//! # Example
//!
//! ```rust
//! use tether_middleware::{compose, middleware, pre_handle, PreHandle};
//!
//! let inner: PreHandle = pre_handle(|_ctx, _head| async { Ok(()) });
//! let chain = compose(
//!     &[
//!         tether_middleware::stages::logging(),
//!         tether_middleware::stages::bearer_auth("token"),
//!     ],
//!     inner,
//! );
//! // bearer_auth was registered last, so it runs first.
//! ```

pub mod chain;
pub mod stages;

pub use chain::{compose, middleware, pre_handle, PreHandle, WsMiddleware};
