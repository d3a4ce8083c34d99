//! Stock middleware stages.
//!
//! These cover the common cross-cutting pre-upgrade concerns; anything else
//! is a [`crate::WsMiddleware`] closure away.

pub mod bearer_auth;
pub mod logging;

pub use bearer_auth::{bearer_auth, Unauthorized};
pub use logging::logging;
