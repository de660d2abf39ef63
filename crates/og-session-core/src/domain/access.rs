//! # Access Lists
//!
//! Access controllers expose their write list in different shapes. The
//! shape is captured once as an `AccessList` and membership is tested
//! through the test that shape supports.

use crate::ports::AccessController;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Marker returned when no write list can be resolved.
pub const UNAVAILABLE: &str = "unavailable";

/// A resolved write access list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessList {
    /// Identity → grant metadata. Membership by key lookup.
    Keyed(BTreeMap<String, Value>),
    /// Identity set. Membership by `has`.
    Set(BTreeSet<String>),
    /// Identity array. Membership by `includes`.
    Array(Vec<String>),
    /// The controller exposes no write list.
    Unavailable,
}

impl AccessList {
    /// Resolve the write list of a controller.
    ///
    /// Tried in order: the direct `write` field, the `get("write")`
    /// accessor, the `write` option the controller was created with.
    pub fn resolve(controller: &dyn AccessController) -> Self {
        controller
            .write_field()
            .or_else(|| controller.get("write"))
            .or_else(|| controller.options_write())
            .unwrap_or(Self::Unavailable)
    }

    fn key_lookup(&self, id: &str) -> Option<bool> {
        match self {
            Self::Keyed(map) => Some(map.contains_key(id)),
            _ => None,
        }
    }

    fn has(&self, id: &str) -> Option<bool> {
        match self {
            Self::Set(set) => Some(set.contains(id)),
            _ => None,
        }
    }

    fn includes(&self, id: &str) -> Option<bool> {
        match self {
            Self::Array(ids) => Some(ids.iter().any(|entry| entry == id)),
            _ => None,
        }
    }

    /// True if `id` may write. The first membership test applicable to
    /// this shape decides.
    pub fn permits(&self, id: &str) -> bool {
        self.key_lookup(id)
            .or_else(|| self.has(id))
            .or_else(|| self.includes(id))
            .unwrap_or(false)
    }

    /// Wildcard grants count as membership of `*`.
    pub fn is_open(&self) -> bool {
        self.permits("*")
    }
}

impl Serialize for AccessList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Keyed(map) => map.serialize(serializer),
            Self::Set(set) => set.serialize(serializer),
            Self::Array(ids) => ids.serialize(serializer),
            Self::Unavailable => serializer.serialize_str(UNAVAILABLE),
        }
    }
}

impl<'de> Deserialize<'de> for AccessList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Object(map) => Ok(Self::Keyed(map.into_iter().collect())),
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s),
                    other => Err(D::Error::custom(format!("non-string identity: {other}"))),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Self::Array),
            Value::String(s) if s == UNAVAILABLE => Ok(Self::Unavailable),
            other => Err(D::Error::custom(format!("not an access list: {other}"))),
        }
    }
}
