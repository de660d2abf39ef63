//! # Shared Types Crate
//!
//! Entities shared by the event bus (`og-bus`) and the session core
//! (`og-session-core`).
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: types that cross crate boundaries live here.
//! - **Plain data**: everything is `Serialize`/`Deserialize` so it can be
//!   returned directly as a response body or carried in an event frame.

pub mod entities;
pub mod errors;

pub use entities::*;
pub use errors::*;
