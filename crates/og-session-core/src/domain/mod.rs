//! # Domain Module
//!
//! Errors, projections and value types of the session core.

pub mod access;
pub mod entities;
pub mod errors;
pub mod query;
pub mod value_objects;

pub use access::*;
pub use entities::*;
pub use errors::*;
pub use query::*;
pub use value_objects::*;
