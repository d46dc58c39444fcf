//! Tracing subscriber initialization.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::env_lookup;
use crate::error::{ApiError, ApiResult};

const DEFAULT_FILTER: &str = "lectern_api=debug,lectern_storage=info,lectern_llm=info,tower_http=debug,info";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line on stdout.
    Json,
    /// Human-readable lines on stderr, leaving stdout for program output.
    Compact,
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub service_version: String,
    /// Environment (production, staging, development)
    pub environment: String,
    pub format: LogFormat,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self::from_lookup(env_lookup)
    }
}

impl TelemetryConfig {
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            service_name: lookup("LECTERN_SERVICE_NAME").unwrap_or_else(|| "lectern-api".to_string()),
            service_version: lookup("LECTERN_SERVICE_VERSION")
                .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string()),
            environment: lookup("LECTERN_ENVIRONMENT").unwrap_or_else(|| "development".to_string()),
            format: match lookup("LECTERN_LOG_FORMAT").as_deref().map(str::trim) {
                Some(f) if f.eq_ignore_ascii_case("compact") => LogFormat::Compact,
                _ => LogFormat::Json,
            },
        }
    }

    /// Compact stderr logging for command-line tools.
    pub fn for_cli(service_name: &str) -> Self {
        Self {
            service_name: service_name.to_string(),
            format: LogFormat::Compact,
            ..Self::from_lookup(|_| None)
        }
    }
}

/// Install the global subscriber. Call once at startup, before anything
/// logs. The filter comes from `RUST_LOG` when set.
pub fn init_tracer(config: &TelemetryConfig) -> ApiResult<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let json = (config.format == LogFormat::Json).then(|| tracing_subscriber::fmt::layer().json());
    let compact = (config.format == LogFormat::Compact).then(|| {
        tracing_subscriber::fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json)
        .with(compact)
        .try_init()
        .map_err(|e| ApiError::internal_error(format!("Failed to init subscriber: {}", e)))?;

    tracing::info!(
        service_name = %config.service_name,
        service_version = %config.service_version,
        environment = %config.environment,
        format = ?config.format,
        "Telemetry initialized"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telemetry_config_defaults() {
        let config = TelemetryConfig::from_lookup(|_| None);
        assert_eq!(config.service_name, "lectern-api");
        assert_eq!(config.environment, "development");
        assert_eq!(config.format, LogFormat::Json);
    }

    #[test]
    fn test_compact_format_from_lookup() {
        let config = TelemetryConfig::from_lookup(|k| {
            (k == "LECTERN_LOG_FORMAT").then(|| "Compact".to_string())
        });
        assert_eq!(config.format, LogFormat::Compact);
    }

    #[test]
    fn test_cli_config() {
        let config = TelemetryConfig::for_cli("reader-history");
        assert_eq!(config.service_name, "reader-history");
        assert_eq!(config.format, LogFormat::Compact);
    }
}
