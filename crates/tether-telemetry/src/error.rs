//! Telemetry error types.

use thiserror::Error;

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Errors from telemetry initialization.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Logging could not be initialized.
    #[error("logging initialization failed: {0}")]
    LoggingInit(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_reason() {
        let err = TelemetryError::LoggingInit("bad filter".into());
        assert!(err.to_string().contains("bad filter"));
    }
}
