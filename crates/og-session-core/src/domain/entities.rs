//! # Domain Entities
//!
//! Request parameters and the plain-data projections returned to the
//! routing layer.

use super::access::AccessList;
use super::errors::GatewayError;
use super::value_objects::Capability;
use og_types::{DbKind, DbOptions, PeerRecord, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// OPEN / WRITE REQUESTS
// =============================================================================

/// Parameters for opening a database.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenParams {
    /// Store type; keyvalue when absent.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<DbKind>,
    /// Open options.
    #[serde(flatten)]
    pub options: DbOptions,
}

impl OpenParams {
    /// Parameters for a given kind with default options.
    pub fn of_kind(kind: DbKind) -> Self {
        Self {
            kind: Some(kind),
            options: DbOptions::default(),
        }
    }

    /// Create the database if it is missing.
    pub fn create(mut self) -> Self {
        self.options.create = Some(true);
        self
    }
}

/// A normalized `put` payload.
#[derive(Debug, Clone, PartialEq)]
pub enum PutRequest {
    /// Key/value write.
    Keyed {
        /// Entry key
        key: String,
        /// Entry value
        value: Value,
    },
    /// Whole-document write.
    Document(Value),
}

impl PutRequest {
    /// Normalize a client payload for a store of the given kind.
    ///
    /// Keyvalue stores take `{key, value}` or, when there is no `key` field,
    /// the first `{k: v}` pair. Other kinds store the payload as a document.
    pub fn from_payload(kind: &DbKind, payload: Value) -> Result<Self, GatewayError> {
        if *kind != DbKind::Keyvalue {
            return Ok(Self::Document(payload));
        }
        let Value::Object(mut map) = payload else {
            return Err(GatewayError::InvalidRequest(
                "keyvalue put expects an object".to_string(),
            ));
        };
        if let Some(key) = map.remove("key") {
            let value = map.remove("value").unwrap_or(Value::Null);
            return Ok(Self::Keyed {
                key: key_string(key),
                value,
            });
        }
        map.into_iter()
            .next()
            .map(|(key, value)| Self::Keyed { key, value })
            .ok_or_else(|| GatewayError::InvalidRequest("empty put payload".to_string()))
    }
}

fn key_string(key: Value) -> String {
    match key {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

/// Options for reading a log through its iterator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IteratorOptions {
    /// Maximum entries; `None` or negative means all.
    #[serde(default)]
    pub limit: Option<i64>,
    /// Newest first.
    #[serde(default)]
    pub reverse: bool,
}

// =============================================================================
// PROJECTIONS
// =============================================================================

/// Info projection of an open database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbInfo {
    /// Full address string.
    pub address: String,
    /// Database name.
    pub dbname: String,
    /// Canonical id.
    pub id: String,
    /// Options the database was opened with.
    pub options: DbOptions,
    /// Local identity may write.
    pub can_append: bool,
    /// Resolved write access list.
    pub write: AccessList,
    /// Store type.
    #[serde(rename = "type")]
    pub kind: String,
    /// Storage-level identifier.
    pub uid: String,
    /// Entries in the index.
    pub index_length: usize,
    /// Access controller type.
    pub access_controller_type: String,
    /// Peers known to replicate this database.
    pub peers: Vec<PeerRecord>,
    /// Number of known peers.
    pub peer_count: usize,
    /// Supported data operations.
    pub capabilities: Vec<Capability>,
}

/// Options forwarded to a provider lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOptions {
    /// Lookup timeout in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Stop after this many providers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_providers: Option<usize>,
}

/// One in-flight search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchDetails {
    /// Subject key (database id or peer id).
    #[serde(rename = "searchID")]
    pub search_id: String,
    /// Start time.
    pub started: Timestamp,
    /// Options the search was started with.
    pub options: SearchOptions,
}

/// Result of asking for a search: either a fresh one or an existing one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchTicket {
    /// True if this request started the search.
    pub is_new: bool,
    /// The search this request is attached to.
    pub details: SearchDetails,
}
