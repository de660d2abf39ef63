//! # Core Entities
//!
//! ## Clusters
//!
//! - **Databases**: `DbAddress`, `DbKind`, `DbOptions`
//! - **Networking**: `PeerRecord`, `SwarmPeer`
//! - **Time**: `Timestamp`

use crate::errors::TypeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// CLUSTER A: DATABASES
// =============================================================================

/// Address prefix used by the replicated store.
pub const ADDRESS_PREFIX: &str = "orbitdb";

/// Address of one replicated database: a content-derived root plus the
/// human-chosen path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DbAddress {
    /// Content-derived manifest root.
    pub root: String,
    /// Path (usually the database name).
    pub path: String,
}

impl DbAddress {
    /// Create a new address.
    #[must_use]
    pub fn new(root: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            path: path.into(),
        }
    }

    /// The `root/path` compound key used for cache lookups.
    #[must_use]
    pub fn compound_key(&self) -> String {
        format!("{}/{}", self.root, self.path)
    }
}

impl fmt::Display for DbAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}/{}", ADDRESS_PREFIX, self.root, self.path)
    }
}

impl FromStr for DbAddress {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim_start_matches('/');
        let mut parts = trimmed.splitn(3, '/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(ADDRESS_PREFIX), Some(root), Some(path)) if !root.is_empty() && !path.is_empty() => {
                Ok(Self::new(root, path))
            }
            _ => Err(TypeError::InvalidAddress(s.to_string())),
        }
    }
}

/// Data-structure variant of a database.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DbKind {
    /// Key/value store.
    Keyvalue,
    /// Append-only log.
    #[serde(rename = "eventlog")]
    Log,
    /// Grow/remove set.
    Set,
    /// Increment-only counter.
    Counter,
    /// Log with removable entries.
    Feed,
    /// Document store with queries.
    Docstore,
    /// Any store type registered by the host.
    Custom(String),
}

impl DbKind {
    /// Canonical type name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Keyvalue => "keyvalue",
            Self::Log => "eventlog",
            Self::Set => "set",
            Self::Counter => "counter",
            Self::Feed => "feed",
            Self::Docstore => "docstore",
            Self::Custom(name) => name,
        }
    }
}

impl Default for DbKind {
    fn default() -> Self {
        Self::Keyvalue
    }
}

impl fmt::Display for DbKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DbKind {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "" => return Err(TypeError::EmptyKind),
            "keyvalue" | "kvstore" => Self::Keyvalue,
            "eventlog" | "log" => Self::Log,
            "set" => Self::Set,
            "counter" => Self::Counter,
            "feed" => Self::Feed,
            "docstore" | "docs" => Self::Docstore,
            other => Self::Custom(other.to_string()),
        })
    }
}

/// Options a database was opened with. Immutable after open.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbOptions {
    /// Create the database if it does not exist.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create: Option<bool>,
    /// Document field used as the index key (docstore).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_by: Option<String>,
    /// Never fetch from the network.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_only: Option<bool>,
    /// Maximum history entries loaded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_history: Option<i64>,
    /// Overwrite an existing database of the same name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overwrite: Option<bool>,
    /// Local storage path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Replicate with peers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicate: Option<bool>,
}

// =============================================================================
// CLUSTER B: NETWORKING
// =============================================================================

/// A known peer and its transport addresses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerRecord {
    /// Stable peer identifier.
    pub id: String,
    /// Transport addresses.
    pub multiaddrs: Vec<String>,
}

impl PeerRecord {
    /// Create a new peer record.
    #[must_use]
    pub fn new(id: impl Into<String>, multiaddrs: Vec<String>) -> Self {
        Self {
            id: id.into(),
            multiaddrs,
        }
    }

    /// Sort and de-duplicate the addresses.
    pub fn normalize_addrs(&mut self) {
        self.multiaddrs.sort_unstable();
        self.multiaddrs.dedup();
    }

    /// Merge another record's addresses into this one. The result is
    /// sorted and free of duplicates, so merge order does not matter.
    /// Returns true if anything was added.
    pub fn merge_addrs(&mut self, other: &PeerRecord) -> bool {
        let before = self.multiaddrs.len();
        self.multiaddrs.extend(other.multiaddrs.iter().cloned());
        self.normalize_addrs();
        self.multiaddrs.len() != before
    }
}

/// An entry in the local connection table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwarmPeer {
    /// Connected peer id.
    pub peer_id: String,
    /// Address the connection uses.
    pub addr: String,
}

// =============================================================================
// CLUSTER C: TIME
// =============================================================================

/// Milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// Create a timestamp from milliseconds.
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Milliseconds since the epoch.
    #[must_use]
    pub const fn as_millis(&self) -> u64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_roundtrip_display() {
        let addr = DbAddress::new("zdpuAbc", "notes");
        assert_eq!(addr.to_string(), "/orbitdb/zdpuAbc/notes");
        assert_eq!(addr.compound_key(), "zdpuAbc/notes");
        assert_eq!("/orbitdb/zdpuAbc/notes".parse::<DbAddress>().unwrap(), addr);
    }

    #[test]
    fn test_address_rejects_plain_names() {
        assert!("notes".parse::<DbAddress>().is_err());
        assert!("/ipfs/abc/notes".parse::<DbAddress>().is_err());
    }

    #[test]
    fn test_kind_aliases() {
        assert_eq!("log".parse::<DbKind>().unwrap(), DbKind::Log);
        assert_eq!("eventlog".parse::<DbKind>().unwrap(), DbKind::Log);
        assert_eq!(
            "tabcat.set".parse::<DbKind>().unwrap(),
            DbKind::Custom("tabcat.set".into())
        );
        assert!("".parse::<DbKind>().is_err());
    }

    #[test]
    fn test_options_serialize_camel_case() {
        let opts = DbOptions {
            index_by: Some("_id".into()),
            local_only: Some(false),
            ..Default::default()
        };
        let json = serde_json::to_value(&opts).unwrap();
        assert_eq!(json["indexBy"], "_id");
        assert_eq!(json["localOnly"], false);
        assert!(json.get("create").is_none());
    }

    #[test]
    fn test_peer_merge_addrs_is_idempotent() {
        let mut a = PeerRecord::new("QmA", vec!["/ip4/1.2.3.4/tcp/4001".into()]);
        let b = PeerRecord::new(
            "QmA",
            vec!["/ip4/1.2.3.4/tcp/4001".into(), "/ip4/5.6.7.8/tcp/4001".into()],
        );
        assert!(a.merge_addrs(&b));
        assert!(!a.merge_addrs(&b));
        assert_eq!(a.multiaddrs.len(), 2);
    }

    #[test]
    fn test_peer_merge_addrs_sorts() {
        let mut a = PeerRecord::new("QmA", vec!["/z".into()]);
        assert!(a.merge_addrs(&PeerRecord::new("QmA", vec!["/m".into(), "/a".into()])));
        assert_eq!(a.multiaddrs, vec!["/a", "/m", "/z"]);
    }
}
