//! Structured logging for the Tether framework.
//!
//! The framework itself only *emits* `tracing` events; this crate is the
//! binary-side initialization: [`init_logging`] installs a JSON (or pretty)
//! subscriber with env-filter support.

pub mod error;
pub mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{init_logging, LogConfig};
