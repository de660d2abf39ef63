//! Telemetry configuration from environment variables.

use std::env;

/// Configuration for logging and metrics.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to the startup log line
    pub service_name: String,

    /// Log filter directive (trace, debug, info, warn, error, or a full
    /// `EnvFilter` expression)
    pub log_level: String,

    /// Emit JSON formatted logs
    pub json_logs: bool,

    /// Register Prometheus metrics
    pub metrics_enabled: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "orbit-gateway".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: true,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// - `OG_SERVICE_NAME`: Service name (default: orbit-gateway)
    /// - `OG_LOG_LEVEL` or `RUST_LOG`: Log filter (default: info)
    /// - `OG_JSON_LOGS`: JSON logs (default: false, true in containers)
    /// - `OG_METRICS_ENABLED`: Register metrics (default: true)
    pub fn from_env() -> Self {
        let is_container =
            env::var("KUBERNETES_SERVICE_HOST").is_ok() || env::var("DOCKER_CONTAINER").is_ok();

        Self {
            service_name: env::var("OG_SERVICE_NAME")
                .unwrap_or_else(|_| "orbit-gateway".to_string()),

            log_level: env::var("OG_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),

            json_logs: env::var("OG_JSON_LOGS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(is_container),

            metrics_enabled: env::var("OG_METRICS_ENABLED")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(true),
        }
    }

    /// Configuration for tests: debug logs, no metrics registration.
    pub fn for_testing() -> Self {
        Self {
            log_level: "debug".to_string(),
            metrics_enabled: false,
            ..Self::default()
        }
    }
}
