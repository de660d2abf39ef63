//! Scriptable DHT network.
//!
//! Providers, peer records and the connection table are set by the test.
//! Every call is counted so single-flight behaviour can be asserted.

use crate::domain::SearchOptions;
use crate::ports::{DhtNetwork, NetworkError};
use async_trait::async_trait;
use og_types::{PeerRecord, SwarmPeer};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Default)]
struct Delays {
    providers: Duration,
    find_peer: Duration,
    swarm: Duration,
}

#[derive(Default)]
struct Counters {
    provide: AtomicUsize,
    find_providers: AtomicUsize,
    find_peer: AtomicUsize,
    swarm: AtomicUsize,
    connect: AtomicUsize,
}

/// In-process [`DhtNetwork`] for tests.
#[derive(Default)]
pub struct MockDht {
    providers: RwLock<HashMap<String, Vec<PeerRecord>>>,
    peers: RwLock<HashMap<String, PeerRecord>>,
    swarm: RwLock<Vec<SwarmPeer>>,
    reachable: RwLock<BTreeSet<String>>,
    latency: RwLock<HashMap<String, u64>>,
    provided: RwLock<Vec<String>>,
    delays: RwLock<Delays>,
    counters: Counters,
    fail_provide: AtomicBool,
    fail_providers: RwLock<Option<String>>,
}

impl MockDht {
    /// Empty network.
    pub fn new() -> Self {
        Self::default()
    }

    /// Providers returned for `root`.
    pub fn set_providers(&self, root: impl Into<String>, peers: Vec<PeerRecord>) {
        self.providers.write().insert(root.into(), peers);
    }

    /// Make `record` resolvable through the DHT.
    pub fn add_peer(&self, record: PeerRecord) {
        self.peers.write().insert(record.id.clone(), record);
    }

    /// Add a live connection.
    pub fn add_swarm_peer(&self, peer: SwarmPeer) {
        self.swarm.write().push(peer);
    }

    /// Make `addr` dialable.
    pub fn add_reachable(&self, addr: impl Into<String>) {
        self.reachable.write().insert(addr.into());
    }

    /// Round-trip time reported for `peer_id`.
    pub fn set_latency(&self, peer_id: impl Into<String>, millis: u64) {
        self.latency.write().insert(peer_id.into(), millis);
    }

    /// Delay `find_providers`.
    pub fn set_providers_delay(&self, delay: Duration) {
        self.delays.write().providers = delay;
    }

    /// Delay `find_peer`.
    pub fn set_find_peer_delay(&self, delay: Duration) {
        self.delays.write().find_peer = delay;
    }

    /// Delay `swarm_peers`.
    pub fn set_swarm_delay(&self, delay: Duration) {
        self.delays.write().swarm = delay;
    }

    /// Fail `provide`.
    pub fn fail_provide(&self, fail: bool) {
        self.fail_provide.store(fail, Ordering::SeqCst);
    }

    /// Fail `find_providers` with `reason` until cleared with `None`.
    pub fn fail_find_providers(&self, reason: Option<&str>) {
        *self.fail_providers.write() = reason.map(str::to_string);
    }

    /// Roots provided so far, in call order.
    pub fn provided(&self) -> Vec<String> {
        self.provided.read().clone()
    }

    /// Number of `provide` calls.
    pub fn provide_calls(&self) -> usize {
        self.counters.provide.load(Ordering::SeqCst)
    }

    /// Number of `find_providers` calls.
    pub fn find_providers_calls(&self) -> usize {
        self.counters.find_providers.load(Ordering::SeqCst)
    }

    /// Number of `find_peer` calls.
    pub fn find_peer_calls(&self) -> usize {
        self.counters.find_peer.load(Ordering::SeqCst)
    }

    /// Number of `swarm_peers` calls.
    pub fn swarm_calls(&self) -> usize {
        self.counters.swarm.load(Ordering::SeqCst)
    }

    /// Number of `connect` calls.
    pub fn connect_calls(&self) -> usize {
        self.counters.connect.load(Ordering::SeqCst)
    }
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

#[async_trait]
impl DhtNetwork for MockDht {
    async fn provide(&self, root: &str) -> Result<(), NetworkError> {
        self.counters.provide.fetch_add(1, Ordering::SeqCst);
        if self.fail_provide.load(Ordering::SeqCst) {
            return Err(NetworkError::Other(format!("cannot provide {root}")));
        }
        self.provided.write().push(root.to_string());
        Ok(())
    }

    async fn find_providers(
        &self,
        root: &str,
        options: &SearchOptions,
    ) -> Result<Vec<PeerRecord>, NetworkError> {
        self.counters.find_providers.fetch_add(1, Ordering::SeqCst);
        let delay = self.delays.read().providers;
        pause(delay).await;
        if let Some(reason) = self.fail_providers.read().clone() {
            return Err(NetworkError::Unreachable(reason));
        }
        let mut peers = self.providers.read().get(root).cloned().unwrap_or_default();
        if let Some(max) = options.max_providers {
            peers.truncate(max);
        }
        Ok(peers)
    }

    async fn find_peer(&self, peer_id: &str) -> Result<PeerRecord, NetworkError> {
        self.counters.find_peer.fetch_add(1, Ordering::SeqCst);
        let delay = self.delays.read().find_peer;
        pause(delay).await;
        self.peers
            .read()
            .get(peer_id)
            .cloned()
            .ok_or_else(|| NetworkError::NotFound(peer_id.to_string()))
    }

    async fn swarm_peers(&self) -> Result<Vec<SwarmPeer>, NetworkError> {
        self.counters.swarm.fetch_add(1, Ordering::SeqCst);
        let delay = self.delays.read().swarm;
        pause(delay).await;
        Ok(self.swarm.read().clone())
    }

    async fn connect(&self, addr: &str) -> Result<(), NetworkError> {
        self.counters.connect.fetch_add(1, Ordering::SeqCst);
        if self.reachable.read().contains(addr) {
            Ok(())
        } else {
            Err(NetworkError::Unreachable(addr.to_string()))
        }
    }

    async fn ping(&self, peer_id: &str) -> Result<u64, NetworkError> {
        self.latency
            .read()
            .get(peer_id)
            .copied()
            .ok_or_else(|| NetworkError::NotConnected(peer_id.to_string()))
    }
}
