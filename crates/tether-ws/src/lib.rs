//! Duplex WebSocket connection engine for the Tether framework.
//!
//! An [`Endpoint`] binds a [`tether_core::Replier`] to one upgrade-capable
//! route. For every accepted connection it runs two concurrent loops:
//!
//! - the **read loop** decodes inbound frames and feeds them to
//!   `Replier::apply`;
//! - the **write loop** polls `Replier::reply` and frames whatever it
//!   yields back onto the socket.
//!
//! The loops share a single cancellable scope (the connection's only
//! cross-loop coordination), and teardown (replier close + socket close)
//! runs exactly once, whichever exit path fires first.
//!
//! # Flow
//!
//! ```text
//! HTTP request ─► middleware chain (outside-in) ─► upgrade handshake
//!                       │ error                        │ 101
//!                       ▼                              ▼
//!                error encoder              ┌── read loop ──► apply
//!                                           │
//!                                  CancelScope (shared)
//!                                           │
//!                                           └── write loop ◄─ reply
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! let options = WsOptions::default()
//!     .with_middlewares(vec![stages::logging()])
//!     .with_config(WsConfig::new().max_message_size(1 << 20));
//! let endpoint = Endpoint::new(MyReplier::new(), options);
//! ```

pub mod config;
pub mod connection;
pub mod encoding;
pub mod endpoint;
pub mod error;
pub mod message;
pub mod upgrade;

pub use config::{OriginPolicy, WsConfig};
pub use connection::{Connection, ConnectionId, ConnectionSender};
pub use encoding::{
    Encoding, ErrorEncodeFn, ReplyEncodeFn, ReplyErrorEncodeFn, RequestDecodeFn, ResponseEncodeFn,
};
pub use endpoint::{Endpoint, WsOptions};
pub use error::{CloseCode, WsError, WsResult};
pub use message::{CloseFrame, Message};
pub use upgrade::{is_websocket_request, upgrade_response, validate_upgrade};
