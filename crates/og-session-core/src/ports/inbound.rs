//! # Inbound Ports
//!
//! What the routing layer may ask of the session core. Every method
//! returns plain records that serialize directly as response bodies.

use crate::domain::{
    AccessList, DbInfo, GatewayError, IteratorOptions, OpenParams, QuerySpec, SearchDetails,
    SearchOptions, SearchTicket,
};
use crate::service::Registration;
use async_trait::async_trait;
use og_bus::StreamEvent;
use og_types::PeerRecord;
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::sync::mpsc;

/// Client stream that receives event frames.
pub type StreamSink = mpsc::Sender<StreamEvent>;

/// Database lifecycle and data operations.
#[async_trait]
pub trait DatabaseApi: Send + Sync {
    /// Open a database (or reuse the cached handle) and project its info.
    async fn open(&self, name: &str, params: &OpenParams) -> Result<DbInfo, GatewayError>;

    /// Close and forget a database. Unknown keys are a no-op.
    async fn close(&self, key: &str) -> Result<(), GatewayError>;

    /// Info for every open database, keyed by name.
    fn list(&self) -> BTreeMap<String, DbInfo>;

    /// Info for one database; `None` if it is not open.
    fn info(&self, key: &str) -> Option<DbInfo>;

    /// Write an entry. Returns its hash.
    async fn put(&self, key: &str, payload: Value) -> Result<String, GatewayError>;

    /// Append to a log. Returns the entry hash.
    async fn add(&self, key: &str, value: Value) -> Result<String, GatewayError>;

    /// Increment a counter. Returns the entry hash.
    async fn inc(&self, key: &str, amount: u64) -> Result<String, GatewayError>;

    /// Delete an entry. Returns the hash of the delete operation.
    async fn remove_entry(&self, key: &str, item: &str) -> Result<String, GatewayError>;

    /// Stored value of an entry, unwrapped from its log payload.
    fn get_entry(&self, key: &str, item: &str) -> Result<Value, GatewayError>;

    /// Stored contents of an entry as the store returns them.
    fn get_raw(&self, key: &str, item: &str) -> Result<Value, GatewayError>;

    /// Log values, unwrapped.
    fn iterator(&self, key: &str, options: &IteratorOptions) -> Result<Vec<Value>, GatewayError>;

    /// Log entries as the store returns them.
    fn raw_iterator(
        &self,
        key: &str,
        options: &IteratorOptions,
    ) -> Result<Vec<Value>, GatewayError>;

    /// Every value, unwrapped.
    fn all(&self, key: &str) -> Result<Value, GatewayError>;

    /// Index contents.
    fn index(&self, key: &str) -> Result<Value, GatewayError>;

    /// Aggregate value (counters).
    fn value(&self, key: &str) -> Result<Value, GatewayError>;

    /// Documents matching a query.
    fn query(&self, key: &str, spec: &QuerySpec) -> Result<Vec<Value>, GatewayError>;

    /// Resolved write access list.
    fn write_list(&self, key: &str) -> Result<AccessList, GatewayError>;

    /// Grant write access to an identity.
    async fn grant_write(&self, key: &str, id: &str) -> Result<(), GatewayError>;

    /// Identity id of the local node.
    fn identity(&self) -> String;
}

/// Peer discovery.
#[async_trait]
pub trait PeerDiscoveryApi: Send + Sync {
    /// Start or join a provider search for an open database.
    async fn find_db_peers(
        &self,
        key: &str,
        options: SearchOptions,
    ) -> Result<SearchTicket, GatewayError>;

    /// Peers known to replicate a database.
    fn db_peers(&self, key: &str) -> Result<Vec<PeerRecord>, GatewayError>;

    /// Start or join an address lookup without waiting for it.
    fn find_peer(&self, peer_id: &str) -> SearchTicket;

    /// Resolve a peer's addresses, racing the connection table against
    /// the DHT.
    async fn resolve_address(&self, peer_id: &str) -> Result<PeerRecord, GatewayError>;

    /// Searches currently in flight.
    fn list_active_searches(&self) -> Vec<SearchDetails>;

    /// Every known peer.
    fn all_peers(&self) -> Vec<PeerRecord>;

    /// Round-trip time to a peer in milliseconds.
    async fn ping_peer(&self, peer_id: &str) -> Result<u64, GatewayError>;

    /// Resolve a peer and dial its first reachable address.
    async fn connect_peer(&self, peer_id: &str) -> Result<PeerRecord, GatewayError>;

    /// Announce one database to the DHT.
    async fn announce(&self, key: &str) -> Result<(), GatewayError>;
}

/// Long-lived event streams.
#[async_trait]
pub trait EventStreamApi: Send + Sync {
    /// Forward comma-separated database events to `sink`.
    async fn subscribe_db(
        &self,
        key: &str,
        names: &str,
        sink: StreamSink,
    ) -> Result<Registration, GatewayError>;

    /// Forward comma-separated manager events to `sink`.
    async fn subscribe_manager(
        &self,
        names: &str,
        sink: StreamSink,
    ) -> Result<Registration, GatewayError>;
}
