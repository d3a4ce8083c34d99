//! Path-multiplexing upgrade server for the Tether framework.
//!
//! A [`Server`] owns one listening endpoint and routes inbound
//! upgrade-capable requests to registered
//! [`tether_core::HandlerBuilder`]s by exact path match. Each inbound
//! request gets a freshly built handler; connections share nothing but the
//! immutable route table.
//!
//! Shutdown is cooperative: [`Server::stop`] (or an OS signal via
//! [`Server::run`]) triggers the shutdown scope, which closes the listener
//! and cancels every connection built from this server.

pub mod config;
pub mod server;
pub mod shutdown;

pub use config::{ServerConfig, ServerConfigBuilder};
pub use server::{BuildErrorEncodeFn, Server, ServerError, ServerHandle, ServerOptions};
pub use shutdown::{ConnectionTracker, ConnectionToken};
