//! # Integration Flows
//!
//! Every flow drives a real `Gateway` over the in-memory store and the
//! scriptable DHT.

pub mod access_flows;
pub mod discovery_flows;
pub mod event_flows;
pub mod fixtures;
pub mod handle_flows;
