//! # Adapters
//!
//! In-process implementations of the outbound ports. The session core has
//! no production store or network of its own; hosts plug theirs in.

mod memory;
mod mock_network;
mod time;

pub use memory::{ControllerKind, InMemoryStore, MemoryAccess, MemoryHandle};
pub use mock_network::MockDht;
pub use time::{FixedTimeSource, SystemTimeSource};
