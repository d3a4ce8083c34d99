//! Structured logging initialization.
//!
//! JSON output for production, pretty output for development, both driven
//! by the tracing-subscriber ecosystem. Level strings accept anything an
//! `EnvFilter` does (`"info"`, `"tether_ws=debug,info"`, ...).

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::error::{TelemetryError, TelemetryResult};

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Whether logging is enabled.
    pub enabled: bool,

    /// Filter directive (e.g. "info", "debug", "tether_ws=trace").
    pub level: String,

    /// Whether to emit JSON instead of the pretty format.
    pub json_format: bool,

    /// Whether to emit span enter/close events.
    pub span_events: bool,

    /// Whether to include the module path of each event.
    pub include_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            json_format: true,
            span_events: false,
            include_target: true,
        }
    }
}

impl LogConfig {
    /// Development configuration: pretty output, debug level.
    #[must_use]
    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            json_format: false,
            span_events: true,
            ..Self::default()
        }
    }

    /// Production configuration: JSON output, info level.
    #[must_use]
    pub fn production() -> Self {
        Self::default()
    }
}

/// Initializes the global tracing subscriber.
///
/// # Errors
///
/// [`TelemetryError::LoggingInit`] when the filter is invalid or a
/// subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let filter = EnvFilter::try_new(&config.level)
        .map_err(|e| TelemetryError::LoggingInit(format!("invalid log level: {e}")))?;

    let span_events = if config.span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    if config.json_format {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_span_events(span_events)
            .with_target(config.include_target)
            .with_filter(filter);

        tracing_subscriber::registry()
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .pretty()
            .with_span_events(span_events)
            .with_target(config.include_target)
            .with_filter(filter);

        tracing_subscriber::registry()
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = LogConfig::default();
        assert!(config.enabled);
        assert_eq!(config.level, "info");
        assert!(config.json_format);
    }

    #[test]
    fn development_config_is_pretty() {
        let config = LogConfig::development();
        assert!(!config.json_format);
        assert_eq!(config.level, "debug");
    }

    #[test]
    fn disabled_config_is_a_no_op() {
        let config = LogConfig {
            enabled: false,
            ..LogConfig::default()
        };
        assert!(init_logging(&config).is_ok());
    }

    #[test]
    fn invalid_level_is_rejected() {
        let config = LogConfig {
            level: "not&a&filter!!!".to_string(),
            ..LogConfig::default()
        };
        let err = init_logging(&config).unwrap_err();
        assert!(matches!(err, TelemetryError::LoggingInit(_)));
    }
}
