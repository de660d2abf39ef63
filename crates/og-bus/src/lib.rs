//! # Orbit Bus - Typed Event Emitters
//!
//! Replaces ad-hoc string-keyed event emitters with typed events and an
//! explicit listener handle.
//!
//! ```text
//! ┌──────────────┐   emit()    ┌──────────────┐   recv()   ┌──────────────┐
//! │ Store handle │ ──────────▶ │ EventEmitter │ ─────────▶ │   Listener   │
//! │ / Manager    │             │  (broadcast) │            │ (per client) │
//! └──────────────┘             └──────────────┘            └──────────────┘
//! ```
//!
//! - **Database scope**: `DbEvent` (replication, load, write, close, peers)
//! - **Manager scope**: `ManagerEvent` (open, load, ready)
//! - Dropping a `Listener` detaches it; there is no removal by closure identity.

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod emitter;
pub mod events;
pub mod listener;

pub use emitter::EventEmitter;
pub use events::{
    BusEvent, DbEvent, DbEventName, ManagerEvent, ManagerEventName, StreamEvent,
    UnknownEventName, KEEP_ALIVE_EVENT, REGISTERED_EVENT,
};
pub use listener::{Listener, ListenerError};

/// Maximum events buffered per listener before it starts lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
