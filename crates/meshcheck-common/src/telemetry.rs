//! Logging initialization
//!
//! Installs a `tracing-subscriber` registry with an `EnvFilter` (overridable
//! through `RUST_LOG`) and either a human-readable or JSON fmt layer. Logs go
//! to stderr; stdout belongs to command output.

use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Errors that can occur during logging initialization
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The filter directive could not be parsed
    #[error("invalid log filter '{filter}': {message}")]
    Filter {
        /// Directive as given
        filter: String,
        /// Parser message
        message: String,
    },

    /// Failed to install the global subscriber
    #[error("failed to initialize tracing subscriber: {0}")]
    SubscriberInit(String),
}

/// Configuration for logging initialization
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is unset (e.g. "info")
    pub default_filter: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            default_filter: "info".to_string(),
            json: false,
        }
    }
}

/// Build the filter: `RUST_LOG` wins, then the configured default
pub fn build_filter(config: &LogConfig) -> Result<EnvFilter, TelemetryError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.default_filter).map_err(|e| TelemetryError::Filter {
            filter: config.default_filter.clone(),
            message: e.to_string(),
        }),
    }
}

/// Install the global subscriber
///
/// # Example
///
/// ```ignore
/// use meshcheck_common::telemetry::{init_logging, LogConfig};
///
/// init_logging(LogConfig { json: true, ..Default::default() })?;
/// ```
pub fn init_logging(config: LogConfig) -> Result<(), TelemetryError> {
    let filter = build_filter(&config)?;
    let registry = tracing_subscriber::registry().with(filter);

    let result = if config.json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
    };

    result.map_err(|e| TelemetryError::SubscriberInit(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert_eq!(config.default_filter, "info");
        assert!(!config.json);
    }

    #[test]
    fn test_invalid_default_filter() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let config = LogConfig {
            default_filter: "meshcheck=notalevel".to_string(),
            json: false,
        };
        let err = build_filter(&config).unwrap_err();
        assert!(err.to_string().contains("notalevel"));
    }
}
