//! # Tether
//!
//! **A generic duplex WebSocket connection framework.**
//!
//! Tether multiplexes many upgrade-capable paths onto one listening
//! endpoint and runs, per connection, independent read and write loops
//! against a pluggable business handler (the [`Replier`]):
//!
//! - the read loop decodes inbound frames and feeds them to
//!   [`Replier::apply`];
//! - the write loop polls [`Replier::reply`] and frames the results back;
//! - a shared cancellation scope coordinates their lifetimes; close
//!   frames, transport failures and server shutdown all funnel through it;
//! - a composable middleware chain wraps the upgrade step, strictly
//!   pre-upgrade.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tether::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let options = ServerOptions::new().handler_builder(FnHandlerBuilder::new(
//!         "/ws",
//!         |_ctx| {
//!             Ok(Arc::new(Endpoint::new(MyReplier::new(), WsOptions::default()))
//!                 as Arc<dyn ConnectionHandler>)
//!         },
//!     ));
//!     let server = Server::bind(ServerConfig::default(), options).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

// Re-export the component crates.
pub use tether_core as core;
pub use tether_middleware as middleware;
pub use tether_server as server;
pub use tether_telemetry as telemetry;
pub use tether_ws as ws;

// Flat re-exports of the common surface.
pub use tether_core::{
    BoxError, BoxFuture, BuildError, CancelScope, ConnectionHandler, FnHandlerBuilder,
    HandlerBuilder, HttpRequest, HttpResponse, Replier, ReplierError, RequestContext, RequestHead,
    RequestId, ValidationError, Validate,
};
pub use tether_middleware::{compose, middleware as middleware_fn, pre_handle, stages, WsMiddleware};
pub use tether_server::{Server, ServerConfig, ServerError, ServerHandle, ServerOptions};
pub use tether_ws::{
    CloseCode, Connection, ConnectionId, Encoding, Endpoint, Message, OriginPolicy, WsConfig,
    WsError, WsOptions,
};

/// Convenience prelude for applications.
pub mod prelude {
    pub use tether_core::{
        BuildError, ConnectionHandler, FnHandlerBuilder, HandlerBuilder, Replier, ReplierError,
        RequestContext, ValidationError, Validate,
    };
    pub use tether_server::{Server, ServerConfig, ServerError, ServerHandle, ServerOptions};
    pub use tether_telemetry::{init_logging, LogConfig};
    pub use tether_ws::{Endpoint, Message, OriginPolicy, WsConfig, WsOptions};
}
