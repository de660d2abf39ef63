//! # Orbit Gateway Telemetry
//!
//! Logging and metrics for the gateway components.
//!
//! - **Logs**: `tracing` events rendered by `tracing-subscriber` (plain text
//!   or JSON), filtered by `EnvFilter`.
//! - **Metrics**: a Prometheus registry with the counters and gauges the
//!   session core updates.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use og_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let _guard = init_telemetry(TelemetryConfig::from_env())?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `OG_SERVICE_NAME` | `orbit-gateway` | Service name attached to logs |
//! | `OG_LOG_LEVEL` / `RUST_LOG` | `info` | Log filter |
//! | `OG_JSON_LOGS` | `false` (`true` in containers) | JSON log output |
//! | `OG_METRICS_ENABLED` | `true` | Register Prometheus metrics |

mod config;
mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use logging::init_logging;
pub use metrics::{
    encode_metrics, register_metrics, MetricsHandle, COMPONENT_ERRORS, DBS_OPEN, DB_OPENS,
    EVENTS_FORWARDED, EVENT_SUBSCRIPTIONS_ACTIVE, OPEN_FAILURES, PEERS_KNOWN, PEER_SEARCHES,
    SEARCHES_IN_FLIGHT,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Install the log subscriber and register metrics.
///
/// The returned guard should be held for the lifetime of the process.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let metrics = if config.metrics_enabled {
        Some(register_metrics()?)
    } else {
        None
    };

    init_logging(&config)?;

    tracing::info!(
        service = %config.service_name,
        json_logs = config.json_logs,
        metrics = config.metrics_enabled,
        "Telemetry initialized"
    );

    Ok(TelemetryGuard { _metrics: metrics })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    _metrics: Option<MetricsHandle>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!("Shutting down telemetry...");
    }
}

/// Structured log line tagged with the emitting component.
///
/// ```rust,ignore
/// og_telemetry::log_event!(info, "handle_cache", "Database opened", db = %name);
/// ```
#[macro_export]
macro_rules! log_event {
    (info, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::info!(component = $component, $($($field)*,)? $msg)
    };
    (warn, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::warn!(component = $component, $($($field)*,)? $msg)
    };
    (error, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::error!(component = $component, $($($field)*,)? $msg)
    };
    (debug, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::debug!(component = $component, $($($field)*,)? $msg)
    };
}

/// Increment a metric, optionally with label values.
#[macro_export]
macro_rules! metric_inc {
    ($metric:expr) => {
        $metric.inc()
    };
    ($metric:expr, $labels:expr) => {
        $metric.with_label_values($labels).inc()
    };
}
