//! # Outbound Ports
//!
//! Traits for the replicated store, its handles and access controllers,
//! the DHT network, and the clock.
//!
//! Optional data operations are separate traits. A handle advertises an
//! operation by returning `Some` from the matching accessor on
//! `StoreHandle`; the default is `None`.

use crate::domain::{AccessList, IteratorOptions, PutRequest, SearchOptions};
use async_trait::async_trait;
use og_bus::{DbEvent, EventEmitter};
use og_types::{DbAddress, DbKind, DbOptions, PeerRecord, SwarmPeer, Timestamp};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by the replicated store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("open failed: {0}")]
    Open(String),

    #[error("load failed: {0}")]
    Load(String),

    #[error("close failed: {0}")]
    Close(String),

    #[error("operation failed: {0}")]
    Operation(String),
}

/// Errors raised by the DHT network.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkError {
    #[error("peer not found: {0}")]
    NotFound(String),

    #[error("peer not connected: {0}")]
    NotConnected(String),

    #[error("unreachable: {0}")]
    Unreachable(String),

    #[error("network error: {0}")]
    Other(String),
}

// =============================================================================
// REPLICATED STORE
// =============================================================================

/// The replicated-store collaborator.
#[async_trait]
pub trait ReplicatedStore: Send + Sync {
    /// Open (or create) a database by name or address.
    async fn open(
        &self,
        name: &str,
        kind: &DbKind,
        options: &DbOptions,
    ) -> Result<Arc<dyn StoreHandle>, StoreError>;

    /// Identity id of the local node.
    fn identity(&self) -> String;
}

/// An opened database.
#[async_trait]
pub trait StoreHandle: Send + Sync {
    /// Database name.
    fn name(&self) -> &str;

    /// Canonical, content-derived id.
    fn id(&self) -> &str;

    /// Root and path.
    fn address(&self) -> &DbAddress;

    /// Store type.
    fn kind(&self) -> &DbKind;

    /// Options the database was opened with.
    fn options(&self) -> &DbOptions;

    /// Storage-level identifier.
    fn uid(&self) -> String;

    /// Current index contents.
    fn index(&self) -> Value;

    /// Entries in the index.
    fn index_len(&self) -> usize;

    /// Current log heads.
    fn heads(&self) -> Vec<String>;

    /// Every entry, as the store represents it.
    fn all(&self) -> Value {
        self.index()
    }

    /// Access controller guarding writes.
    fn access(&self) -> &dyn AccessController;

    /// Database-scoped event emitter.
    fn events(&self) -> &EventEmitter<DbEvent>;

    /// Load local state.
    async fn load(&self) -> Result<(), StoreError>;

    /// Close the database. Emits `closed`.
    async fn close(&self) -> Result<(), StoreError>;

    fn writable(&self) -> Option<&dyn Writable> {
        None
    }

    fn appendable(&self) -> Option<&dyn Appendable> {
        None
    }

    fn counting(&self) -> Option<&dyn Counting> {
        None
    }

    fn readable(&self) -> Option<&dyn Readable> {
        None
    }

    fn iterable(&self) -> Option<&dyn Iterable> {
        None
    }

    fn queryable(&self) -> Option<&dyn Queryable> {
        None
    }

    fn removable(&self) -> Option<&dyn Removable> {
        None
    }

    fn valued(&self) -> Option<&dyn Valued> {
        None
    }
}

/// `put`
#[async_trait]
pub trait Writable: Send + Sync {
    /// Returns the entry hash.
    async fn put(&self, request: PutRequest) -> Result<String, StoreError>;
}

/// `add`
#[async_trait]
pub trait Appendable: Send + Sync {
    /// Returns the entry hash.
    async fn add(&self, value: Value) -> Result<String, StoreError>;
}

/// `inc`
#[async_trait]
pub trait Counting: Send + Sync {
    /// Returns the entry hash.
    async fn inc(&self, amount: u64) -> Result<String, StoreError>;
}

/// `get`
pub trait Readable: Send + Sync {
    /// Raw contents stored under `key`.
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;
}

/// `iterator`
pub trait Iterable: Send + Sync {
    /// Raw log entries.
    fn iterator(&self, options: &IteratorOptions) -> Result<Vec<Value>, StoreError>;
}

/// Predicate passed to `query`.
pub type DocFilter<'a> = &'a (dyn Fn(&Value) -> bool + Send + Sync);

/// `query`
pub trait Queryable: Send + Sync {
    /// Documents matching the filter.
    fn query(&self, filter: DocFilter<'_>) -> Result<Vec<Value>, StoreError>;
}

/// `remove` / `del`
#[async_trait]
pub trait Removable: Send + Sync {
    /// Returns the entry hash.
    async fn remove(&self, key: &str) -> Result<String, StoreError>;
}

/// `value`
pub trait Valued: Send + Sync {
    /// Current aggregate value.
    fn value(&self) -> Value;
}

/// Write-access policy of one database.
///
/// Controllers expose their write list in one of three places; implement
/// whichever applies.
#[async_trait]
pub trait AccessController: Send + Sync {
    /// Controller type, `None` for custom controllers.
    fn controller_type(&self) -> Option<&str>;

    /// Direct `write` field.
    fn write_field(&self) -> Option<AccessList> {
        None
    }

    /// Role accessor, e.g. `get("write")`.
    fn get(&self, _role: &str) -> Option<AccessList> {
        None
    }

    /// `write` option the controller was created with.
    fn options_write(&self) -> Option<AccessList> {
        None
    }

    /// Grant `role` to `id`. `Ok(false)` means the controller cannot grant.
    async fn grant(&self, role: &str, id: &str) -> Result<bool, StoreError>;
}

// =============================================================================
// DHT NETWORK
// =============================================================================

/// The network / DHT collaborator.
#[async_trait]
pub trait DhtNetwork: Send + Sync {
    /// Announce that this node provides `root`.
    async fn provide(&self, root: &str) -> Result<(), NetworkError>;

    /// Find peers providing `root`.
    async fn find_providers(
        &self,
        root: &str,
        options: &SearchOptions,
    ) -> Result<Vec<PeerRecord>, NetworkError>;

    /// Look up the addresses of one peer.
    async fn find_peer(&self, peer_id: &str) -> Result<PeerRecord, NetworkError>;

    /// Current connection table.
    async fn swarm_peers(&self) -> Result<Vec<SwarmPeer>, NetworkError>;

    /// Dial an address.
    async fn connect(&self, addr: &str) -> Result<(), NetworkError>;

    /// Round-trip time to a peer in milliseconds.
    async fn ping(&self, peer_id: &str) -> Result<u64, NetworkError>;
}

// =============================================================================
// TIME
// =============================================================================

/// Clock abstraction for testability.
pub trait TimeSource: Send + Sync {
    /// Current time in milliseconds since the epoch.
    fn now(&self) -> Timestamp;
}
