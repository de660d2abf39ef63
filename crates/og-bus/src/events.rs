//! # Gateway Events
//!
//! Events emitted by database handles and by the handle manager, plus the
//! frames pushed to client event streams.
//!
//! Each event type has a matching name enum. Client subscriptions are
//! validated against the fixed allow-list of that enum.

use og_types::{DbAddress, PeerRecord};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Frame name used for keep-alive signals.
pub const KEEP_ALIVE_EVENT: &str = "keep-alive";

/// Frame name used to acknowledge a registration.
pub const REGISTERED_EVENT: &str = "registered";

/// An event name that is not on the allow-list for its source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unrecognized event name: {0}")]
pub struct UnknownEventName(pub String);

/// Common behaviour for events carried by an `EventEmitter`.
pub trait BusEvent: Clone + Send + Sync + fmt::Debug + 'static {
    /// Typed name of the event.
    type Name: Copy + Eq + fmt::Debug + fmt::Display + Send + Sync + 'static;

    /// The name of this event.
    fn name(&self) -> Self::Name;

    /// Render the event as a client stream frame.
    fn to_frame(&self) -> StreamEvent;

    /// True if no further events follow on this emitter.
    fn is_terminal(&self) -> bool {
        false
    }
}

// =============================================================================
// STREAM FRAMES
// =============================================================================

/// One frame pushed to a client stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    /// Frame name.
    pub event: String,
    /// Frame payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl StreamEvent {
    /// Create a frame with a payload.
    #[must_use]
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data: Some(data),
        }
    }

    /// Keep-alive frame.
    #[must_use]
    pub fn keep_alive() -> Self {
        Self {
            event: KEEP_ALIVE_EVENT.to_string(),
            data: None,
        }
    }

    /// Registration acknowledgement listing the accepted event names.
    #[must_use]
    pub fn registered(events: &[String]) -> Self {
        Self::new(REGISTERED_EVENT, json!({ "events": events }))
    }

    /// True for keep-alive frames.
    #[must_use]
    pub fn is_keep_alive(&self) -> bool {
        self.event == KEEP_ALIVE_EVENT
    }
}

// =============================================================================
// DATABASE-SCOPED EVENTS
// =============================================================================

/// Events emitted by one open database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DbEvent {
    /// Replication from a peer finished.
    Replicated { address: DbAddress },
    /// Replication from a peer started.
    Replicate { address: DbAddress },
    /// One entry was replicated.
    ReplicateProgress {
        address: DbAddress,
        hash: String,
        entry: Value,
        progress: u64,
        have: u64,
    },
    /// Local load started.
    Load { address: DbAddress, heads: Vec<String> },
    /// One entry was loaded from local storage.
    LoadProgress {
        address: DbAddress,
        hash: String,
        entry: Value,
        progress: u64,
        total: u64,
    },
    /// The database finished loading.
    Ready { address: DbAddress, heads: Vec<String> },
    /// A local write was appended.
    Write {
        address: DbAddress,
        hash: String,
        entry: Value,
    },
    /// The database was closed. Terminal.
    Closed { address: DbAddress },
    /// A peer exchanged heads with this database.
    Peer { peer: PeerRecord },
    /// A provider search for this database finished.
    SearchComplete {
        address: DbAddress,
        peers: Vec<PeerRecord>,
    },
    /// Providers were found for this database.
    PeersFound { peers: Vec<PeerRecord> },
}

/// Names of database-scoped events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DbEventName {
    Replicated,
    Replicate,
    ReplicateProgress,
    Load,
    LoadProgress,
    Ready,
    Write,
    Closed,
    Peer,
    SearchComplete,
    /// Emitted internally; not on the client allow-list.
    PeersFound,
}

impl DbEventName {
    /// Names clients may subscribe to.
    pub const SUBSCRIBABLE: [DbEventName; 10] = [
        Self::Replicated,
        Self::Replicate,
        Self::ReplicateProgress,
        Self::Load,
        Self::LoadProgress,
        Self::Ready,
        Self::Write,
        Self::Closed,
        Self::Peer,
        Self::SearchComplete,
    ];

    /// Wire name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Replicated => "replicated",
            Self::Replicate => "replicate",
            Self::ReplicateProgress => "replicate.progress",
            Self::Load => "load",
            Self::LoadProgress => "load.progress",
            Self::Ready => "ready",
            Self::Write => "write",
            Self::Closed => "closed",
            Self::Peer => "peer",
            Self::SearchComplete => "search.complete",
            Self::PeersFound => "peers.found",
        }
    }
}

impl fmt::Display for DbEventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DbEventName {
    type Err = UnknownEventName;

    /// Parses only names on the client allow-list.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::SUBSCRIBABLE
            .iter()
            .copied()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| UnknownEventName(s.to_string()))
    }
}

impl BusEvent for DbEvent {
    type Name = DbEventName;

    fn name(&self) -> DbEventName {
        match self {
            Self::Replicated { .. } => DbEventName::Replicated,
            Self::Replicate { .. } => DbEventName::Replicate,
            Self::ReplicateProgress { .. } => DbEventName::ReplicateProgress,
            Self::Load { .. } => DbEventName::Load,
            Self::LoadProgress { .. } => DbEventName::LoadProgress,
            Self::Ready { .. } => DbEventName::Ready,
            Self::Write { .. } => DbEventName::Write,
            Self::Closed { .. } => DbEventName::Closed,
            Self::Peer { .. } => DbEventName::Peer,
            Self::SearchComplete { .. } => DbEventName::SearchComplete,
            Self::PeersFound { .. } => DbEventName::PeersFound,
        }
    }

    fn to_frame(&self) -> StreamEvent {
        let data = match self {
            Self::Replicated { address }
            | Self::Replicate { address }
            | Self::Closed { address } => json!({ "address": address.to_string() }),
            Self::ReplicateProgress {
                address,
                hash,
                entry,
                progress,
                have,
            } => json!({
                "address": address.to_string(),
                "hash": hash,
                "entry": entry,
                "progress": progress,
                "have": have,
            }),
            Self::Load { address, heads } | Self::Ready { address, heads } => {
                json!({ "address": address.to_string(), "heads": heads })
            }
            Self::LoadProgress {
                address,
                hash,
                entry,
                progress,
                total,
            } => json!({
                "address": address.to_string(),
                "hash": hash,
                "entry": entry,
                "progress": progress,
                "total": total,
            }),
            Self::Write {
                address,
                hash,
                entry,
            } => json!({ "address": address.to_string(), "hash": hash, "entry": entry }),
            Self::Peer { peer } => json!({ "peer": peer }),
            Self::SearchComplete { address, peers } => {
                json!({ "address": address.to_string(), "peers": peers })
            }
            Self::PeersFound { peers } => json!({ "peers": peers }),
        };
        StreamEvent::new(self.name().as_str(), data)
    }

    fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed { .. })
    }
}

// =============================================================================
// MANAGER-SCOPED EVENTS
// =============================================================================

/// Events emitted by the handle manager as databases are opened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ManagerEvent {
    /// The store opened a database.
    Open { address: DbAddress },
    /// Initial load of a database started.
    Load { address: DbAddress },
    /// A database finished loading and was registered.
    Ready { address: DbAddress, heads: Vec<String> },
}

/// Names of manager-scoped events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ManagerEventName {
    Open,
    Load,
    Ready,
}

impl ManagerEventName {
    /// Names clients may subscribe to.
    pub const SUBSCRIBABLE: [ManagerEventName; 3] = [Self::Open, Self::Load, Self::Ready];

    /// Wire name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Load => "load",
            Self::Ready => "ready",
        }
    }

    /// Name of the stream frame, namespaced to the manager.
    #[must_use]
    pub fn frame_name(&self) -> &'static str {
        match self {
            Self::Open => "orbitdb.open",
            Self::Load => "orbitdb.load",
            Self::Ready => "orbitdb.ready",
        }
    }
}

impl fmt::Display for ManagerEventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ManagerEventName {
    type Err = UnknownEventName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::SUBSCRIBABLE
            .iter()
            .copied()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| UnknownEventName(s.to_string()))
    }
}

impl BusEvent for ManagerEvent {
    type Name = ManagerEventName;

    fn name(&self) -> ManagerEventName {
        match self {
            Self::Open { .. } => ManagerEventName::Open,
            Self::Load { .. } => ManagerEventName::Load,
            Self::Ready { .. } => ManagerEventName::Ready,
        }
    }

    fn to_frame(&self) -> StreamEvent {
        let data = match self {
            Self::Open { address } | Self::Load { address } => {
                json!({ "address": address.to_string() })
            }
            Self::Ready { address, heads } => {
                json!({ "address": address.to_string(), "heads": heads })
            }
        };
        StreamEvent::new(self.name().frame_name(), data)
    }
}
