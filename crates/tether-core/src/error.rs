//! Core error types shared across the framework.
//!
//! Pre-upgrade failures ([`BuildError`]) are framed to the HTTP caller by
//! the server's error encoder; [`ValidationError`]s are framed to the peer
//! over the socket and terminate the one connection they occur on.

use thiserror::Error;

/// A boxed error, used where the pre-upgrade chain carries arbitrary
/// failures (middleware rejections, upgrade errors) to the error encoder.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Handler construction failed for one inbound request.
///
/// Fatal to that request only: the configured HTTP error encoder frames it
/// and no upgrade takes place.
#[derive(Debug, Error)]
#[error("handler build failed: {message}")]
pub struct BuildError {
    /// Reason the builder could not produce a handler.
    message: String,
}

impl BuildError {
    /// Creates a new build error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the failure reason.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// An inbound message failed validation.
///
/// Surfaced to the peer through the error-reply encoder; terminates the
/// connection it occurred on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid message: {message}")]
pub struct ValidationError {
    /// What the message violated.
    message: String,
}

impl ValidationError {
    /// Creates a new validation error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the violation description.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_error_display() {
        let err = BuildError::new("redis unavailable");
        assert_eq!(err.to_string(), "handler build failed: redis unavailable");
        assert_eq!(err.message(), "redis unavailable");
    }

    #[test]
    fn validation_error_display() {
        let err = ValidationError::new("seq must be positive");
        assert!(err.to_string().contains("seq must be positive"));
    }

    #[test]
    fn build_error_boxes_into_box_error() {
        let err: BoxError = Box::new(BuildError::new("nope"));
        assert!(err.to_string().contains("nope"));
    }
}
