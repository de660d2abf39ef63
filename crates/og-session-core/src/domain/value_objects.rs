//! # Value Objects

use serde::{Deserialize, Serialize};
use std::fmt;

/// Optional data operations a handle may support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Add,
    Get,
    Inc,
    Iterator,
    Put,
    Query,
    /// `remove` or `del`
    Remove,
    Value,
}

impl Capability {
    /// Every capability, in projection order.
    pub const ALL: [Capability; 8] = [
        Self::Add,
        Self::Get,
        Self::Inc,
        Self::Iterator,
        Self::Put,
        Self::Query,
        Self::Remove,
        Self::Value,
    ];

    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Get => "get",
            Self::Inc => "inc",
            Self::Iterator => "iterator",
            Self::Put => "put",
            Self::Query => "query",
            Self::Remove => "remove",
            Self::Value => "value",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a peer search is looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectKind {
    /// Providers of a database root.
    Db,
    /// Addresses of one peer.
    Peer,
}

impl SubjectKind {
    /// Metrics label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Db => "db",
            Self::Peer => "peer",
        }
    }
}

/// Lifecycle of one event subscription.
///
/// `Registered -> Active -> TornDown`; `TornDown` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionState {
    Registered,
    Active,
    TornDown,
}

impl SubscriptionState {
    /// Encoding for atomic storage.
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::Registered => 0,
            Self::Active => 1,
            Self::TornDown => 2,
        }
    }

    /// Decode from atomic storage. Unknown values read as `TornDown`.
    pub const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Registered,
            1 => Self::Active,
            _ => Self::TornDown,
        }
    }
}
