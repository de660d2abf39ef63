//! Prometheus metrics for the gateway.
//!
//! Naming convention: `og_<component>_<metric>_<unit>`

use lazy_static::lazy_static;
use prometheus::{CounterVec, Encoder, IntCounter, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // HANDLE CACHE
    // =========================================================================

    /// Store opens that completed
    pub static ref DB_OPENS: IntCounter = IntCounter::new(
        "og_cache_db_opens_total",
        "Total databases opened through the store"
    ).expect("metric creation failed");

    /// Databases currently cached
    pub static ref DBS_OPEN: IntGauge = IntGauge::new(
        "og_cache_dbs_open",
        "Number of open database handles"
    ).expect("metric creation failed");

    /// Store opens that failed
    pub static ref OPEN_FAILURES: IntCounter = IntCounter::new(
        "og_cache_open_failures_total",
        "Total failed database opens"
    ).expect("metric creation failed");

    // =========================================================================
    // PEER DISCOVERY
    // =========================================================================

    /// Searches by subject kind and outcome
    pub static ref PEER_SEARCHES: CounterVec = CounterVec::new(
        Opts::new("og_discovery_searches_total", "Peer searches started and settled"),
        &["kind", "outcome"]  // kind: db/peer, outcome: started/joined/found/failed
    ).expect("metric creation failed");

    /// Searches currently in flight
    pub static ref SEARCHES_IN_FLIGHT: IntGauge = IntGauge::new(
        "og_discovery_searches_in_flight",
        "Number of peer searches in flight"
    ).expect("metric creation failed");

    /// Peers in the directory
    pub static ref PEERS_KNOWN: IntGauge = IntGauge::new(
        "og_discovery_peers_known",
        "Number of peers in the directory"
    ).expect("metric creation failed");

    // =========================================================================
    // EVENT BRIDGE
    // =========================================================================

    /// Live client subscriptions
    pub static ref EVENT_SUBSCRIPTIONS_ACTIVE: IntGauge = IntGauge::new(
        "og_bridge_subscriptions_active",
        "Number of active event subscriptions"
    ).expect("metric creation failed");

    /// Frames pushed to client sinks
    pub static ref EVENTS_FORWARDED: IntCounter = IntCounter::new(
        "og_bridge_events_forwarded_total",
        "Total event frames forwarded to clients"
    ).expect("metric creation failed");

    // =========================================================================
    // ERRORS
    // =========================================================================

    /// Errors by component and type
    pub static ref COMPONENT_ERRORS: CounterVec = CounterVec::new(
        Opts::new("og_component_errors_total", "Errors by component and type"),
        &["component", "error_type"]
    ).expect("metric creation failed");
}

/// Keeps the registry referenced while telemetry is active.
pub struct MetricsHandle {
    _registry: Arc<Registry>,
}

/// Register all metrics with the global registry.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Cache
        Box::new(DB_OPENS.clone()),
        Box::new(DBS_OPEN.clone()),
        Box::new(OPEN_FAILURES.clone()),
        // Discovery
        Box::new(PEER_SEARCHES.clone()),
        Box::new(SEARCHES_IN_FLIGHT.clone()),
        Box::new(PEERS_KNOWN.clone()),
        // Bridge
        Box::new(EVENT_SUBSCRIPTIONS_ACTIVE.clone()),
        Box::new(EVENTS_FORWARDED.clone()),
        // Errors
        Box::new(COMPONENT_ERRORS.clone()),
    ];

    for metric in metrics {
        REGISTRY
            .register(metric)
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    }

    Ok(MetricsHandle {
        _registry: Arc::new(REGISTRY.clone()),
    })
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}
