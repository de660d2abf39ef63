//! # Orbit Gateway Session Core
//!
//! Coordination layer between client requests and a replicated-store / DHT
//! substrate.
//!
//! **Architecture:** Hexagonal (Ports/Adapters)
//!
//! ## Purpose
//!
//! - Share opened database handles across concurrent requests, opening each
//!   database at most once no matter how many callers race for it.
//! - Deduplicate concurrent peer lookups for the same subject and fan the
//!   result out to every waiter.
//! - Forward replication and peer events to long-lived client streams and
//!   detach every listener when the client goes away.
//!
//! ## Module Structure
//!
//! ```text
//! og-session-core/
//! ├── domain/     # Errors, projections, access lists, query predicates
//! ├── ports/      # API traits (inbound) + store / DHT / time traits (outbound)
//! ├── service/    # Cache, directory, coordinator, bridge, facade, announcer
//! ├── adapters/   # In-memory store, mock DHT, time sources
//! └── config.rs   # GatewayConfig
//! ```
//!
//! ## Request Flow
//!
//! ```text
//! request ──▶ DbFacade ──▶ DatabaseHandleCache ──▶ ReplicatedStore
//!                 │
//!                 ├──▶ PeerSearchCoordinator ──▶ DhtNetwork
//!                 │           │
//!                 │           └──▶ PeerDirectory + DbEvent::PeersFound
//!                 │
//!                 └──▶ EventBridge ──▶ client sink (StreamEvent)
//! ```

#![warn(clippy::all)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::{ControllerKind, FixedTimeSource, InMemoryStore, MockDht, SystemTimeSource};
pub use config::{ConfigError, GatewayConfig, IpfsMode};
pub use domain::{
    AccessList, Capability, ClientError, Comparator, DbInfo, GatewayError, IteratorOptions,
    OpenParams, PutRequest, QuerySpec, SearchDetails, SearchOptions, SearchTicket, SubjectKind,
    SubscriptionState,
};
pub use ports::{
    AccessController, DatabaseApi, DhtNetwork, EventStreamApi, NetworkError, PeerDiscoveryApi,
    ReplicatedStore, StoreError, StoreHandle, StreamSink, TimeSource,
};
pub use service::{
    AnnounceReport, Announcer, DatabaseHandleCache, DbFacade, EventBridge, Gateway,
    PeerDirectory, PeerSearchCoordinator, PendingSearch, Registration, SearchSubject,
    SubscriptionHandle,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    #[test]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
    }
}
