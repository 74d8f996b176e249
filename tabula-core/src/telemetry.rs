//! Tracing subscriber initialization

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{ConfigError, TabulaResult};

/// Default filter when neither `TABULA_LOG` nor `RUST_LOG` is set.
pub const DEFAULT_LOG_FILTER: &str = "tabula=info";

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

/// Telemetry configuration from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// `EnvFilter` directive string.
    pub filter: String,
    pub format: LogFormat,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_string(),
            format: LogFormat::Plain,
        }
    }
}

impl TelemetryConfig {
    /// Environment variables:
    /// - `TABULA_LOG` (falls back to `RUST_LOG`, then `tabula=info`)
    /// - `TABULA_LOG_FORMAT` (`plain` or `json`, default: plain)
    pub fn from_env() -> Self {
        let filter = std::env::var("TABULA_LOG")
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string());
        let format = match std::env::var("TABULA_LOG_FORMAT") {
            Ok(value) if value.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Plain,
        };
        Self { filter, format }
    }
}

/// Install the global tracing subscriber.
///
/// Fails instead of panicking when a subscriber is already installed or the
/// filter does not parse.
pub fn init_tracing(config: &TelemetryConfig) -> TabulaResult<()> {
    let env_filter = EnvFilter::try_new(&config.filter).map_err(|e| ConfigError::InvalidValue {
        field: "telemetry.filter".to_string(),
        value: config.filter.clone(),
        reason: e.to_string(),
    })?;

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = match config.format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).try_init(),
        LogFormat::Plain => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    };
    result.map_err(|e| ConfigError::InvalidValue {
        field: "telemetry.subscriber".to_string(),
        value: format!("{:?}", config.format),
        reason: format!("Failed to init subscriber: {}", e),
    })?;

    tracing::info!(filter = %config.filter, format = ?config.format, "Telemetry initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telemetry_config_default() {
        let config = TelemetryConfig::default();
        assert_eq!(config.filter, "tabula=info");
        assert_eq!(config.format, LogFormat::Plain);
    }

    #[test]
    fn test_init_rejects_bad_filter() {
        let config = TelemetryConfig {
            filter: "tabula=notalevel".to_string(),
            format: LogFormat::Plain,
        };
        assert!(init_tracing(&config).is_err());
    }

    #[test]
    fn test_second_init_is_an_error() {
        let config = TelemetryConfig::default();
        // Another test may have installed the subscriber first.
        let _ = init_tracing(&config);
        assert!(init_tracing(&config).is_err());
    }
}
