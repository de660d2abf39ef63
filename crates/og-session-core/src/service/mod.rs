//! # Service Module
//!
//! Application services. `Gateway` wires them together.

pub mod announcer;
pub mod event_bridge;
pub mod facade;
pub mod gateway;
pub mod handle_cache;
pub mod peer_directory;
pub mod search_coordinator;

pub use announcer::{AnnounceReport, Announcer};
pub use event_bridge::{EventBridge, Registration, SubscriptionHandle};
pub use facade::DbFacade;
pub use gateway::Gateway;
pub use handle_cache::DatabaseHandleCache;
pub use peer_directory::PeerDirectory;
pub use search_coordinator::{PeerSearchCoordinator, PendingSearch, SearchSubject};
