//! Core types and traits for the Tether duplex WebSocket framework.
//!
//! This crate holds the leaf abstractions the rest of the workspace builds
//! on:
//!
//! - [`Replier`]: the business capability bound to one connection
//! - [`Validate`]: optional invariant checking for inbound messages
//! - [`ConnectionHandler`] / [`HandlerBuilder`]: the per-request factory
//!   seam between the server and the connection engine
//! - [`RequestContext`] / [`RequestHead`]: per-request state
//! - [`CancelScope`]: the cooperative cancellation primitive shared by a
//!   connection's read and write loops
//! - error types: [`BuildError`], [`ValidationError`], [`ReplierError`]

pub mod cancel;
pub mod context;
pub mod error;
pub mod handler;
pub mod replier;

pub use cancel::CancelScope;
pub use context::{RequestContext, RequestHead, RequestId};
pub use error::{BoxError, BuildError, ValidationError};
pub use handler::{
    BoxFuture, ConnectionHandler, FnHandlerBuilder, HandlerBuilder, HttpRequest, HttpResponse,
};
pub use replier::{Replier, ReplierError, Validate};
