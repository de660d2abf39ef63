//! Shared fixtures for the integration flows.

use og_session_core::{
    FixedTimeSource, Gateway, GatewayConfig, InMemoryStore, MockDht, OpenParams,
};
use og_types::DbKind;
use std::sync::Arc;

/// Millisecond clock value every fixture starts at.
pub const START_MILLIS: u64 = 1_700_000_000_000;

/// A gateway plus handles on its collaborators.
pub struct Harness {
    pub gateway: Gateway,
    pub store: Arc<InMemoryStore>,
    pub dht: Arc<MockDht>,
    pub clock: Arc<FixedTimeSource>,
}

impl Harness {
    /// Test configuration over a fresh store.
    pub fn new() -> Self {
        Self::with(InMemoryStore::new(), GatewayConfig::for_testing())
    }

    /// Custom store and configuration.
    pub fn with(store: InMemoryStore, config: GatewayConfig) -> Self {
        let store = Arc::new(store);
        let dht = Arc::new(MockDht::new());
        let clock = Arc::new(FixedTimeSource::new(START_MILLIS));
        let gateway = Gateway::new(config, store.clone(), dht.clone(), clock.clone());
        Self {
            gateway,
            store,
            dht,
            clock,
        }
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

/// Open parameters that create the database if needed.
pub fn create(kind: DbKind) -> OpenParams {
    OpenParams::of_kind(kind).create()
}
