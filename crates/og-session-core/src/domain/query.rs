//! # Query Predicates
//!
//! Builds a document predicate from a comparator name, a field and a list
//! of argument values.
//!
//! | comparator | arguments | holds when |
//! |------------|-----------|------------|
//! | `ne` / `eq` | `b` | `a != b` / `a == b` |
//! | `gt` / `lt` / `gte` / `lte` | `b` | ordered comparison |
//! | `mod` | `b, c` | `a % b == c` |
//! | `range` | `b, c` | `min(b,c) <= a <= max(b,c)` |
//! | `all` | none | always |
//!
//! Numbers compare numerically and strings lexicographically; mixed types
//! never satisfy an ordered comparison.

use super::errors::GatewayError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::str::FromStr;

/// Field compared when none is given.
pub const DEFAULT_QUERY_FIELD: &str = "_id";

/// Comparator vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Comparator {
    Ne,
    Eq,
    Gt,
    Lt,
    Gte,
    Lte,
    Mod,
    Range,
    All,
}

impl Comparator {
    /// Number of arguments after the document field.
    pub fn arity(&self) -> usize {
        match self {
            Self::All => 0,
            Self::Mod | Self::Range => 2,
            _ => 1,
        }
    }
}

impl FromStr for Comparator {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "ne" => Self::Ne,
            "eq" => Self::Eq,
            "gt" => Self::Gt,
            "lt" => Self::Lt,
            "gte" => Self::Gte,
            "lte" => Self::Lte,
            "mod" => Self::Mod,
            "range" => Self::Range,
            "all" => Self::All,
            other => {
                return Err(GatewayError::InvalidQuery(format!(
                    "unknown comparator: {other}"
                )))
            }
        })
    }
}

/// Query as sent by a client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    /// Comparator name; `all` when absent.
    #[serde(default)]
    pub comp: Option<String>,
    /// Compared field; `_id` when absent.
    #[serde(default)]
    pub propname: Option<String>,
    /// Comparator arguments.
    #[serde(default)]
    pub values: Vec<Value>,
}

impl QuerySpec {
    /// Validate and build the predicate.
    pub fn predicate(&self) -> Result<Predicate, GatewayError> {
        let comparator = match &self.comp {
            Some(name) => name.parse()?,
            None => Comparator::All,
        };
        if self.values.len() < comparator.arity() {
            return Err(GatewayError::InvalidQuery(format!(
                "{comparator:?} expects {} argument(s), got {}",
                comparator.arity(),
                self.values.len()
            )));
        }
        Ok(Predicate {
            comparator,
            field: self
                .propname
                .clone()
                .unwrap_or_else(|| DEFAULT_QUERY_FIELD.to_string()),
            args: self.values.clone(),
        })
    }
}

/// A validated predicate over documents.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    comparator: Comparator,
    field: String,
    args: Vec<Value>,
}

impl Predicate {
    /// Compared field.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Comparator in use.
    pub fn comparator(&self) -> Comparator {
        self.comparator
    }

    /// Evaluate against one document. A missing field reads as `null`.
    pub fn matches(&self, doc: &Value) -> bool {
        let a = doc.get(&self.field).unwrap_or(&Value::Null);
        let arg = |i: usize| self.args.get(i).unwrap_or(&Value::Null);
        match self.comparator {
            Comparator::All => true,
            Comparator::Eq => loose_eq(a, arg(0)),
            Comparator::Ne => !loose_eq(a, arg(0)),
            Comparator::Gt => compare(a, arg(0)) == Some(Ordering::Greater),
            Comparator::Lt => compare(a, arg(0)) == Some(Ordering::Less),
            Comparator::Gte => matches!(
                compare(a, arg(0)),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Comparator::Lte => {
                matches!(compare(a, arg(0)), Some(Ordering::Less | Ordering::Equal))
            }
            Comparator::Mod => match (a.as_f64(), arg(0).as_f64(), arg(1).as_f64()) {
                (Some(a), Some(b), Some(c)) if b != 0.0 => a % b == c,
                _ => false,
            },
            Comparator::Range => {
                let (b, c) = (arg(0), arg(1));
                let (lo, hi) = match compare(b, c) {
                    Some(Ordering::Greater) => (c, b),
                    Some(_) => (b, c),
                    None => return false,
                };
                matches!(compare(a, lo), Some(Ordering::Greater | Ordering::Equal))
                    && matches!(compare(a, hi), Some(Ordering::Less | Ordering::Equal))
            }
        }
    }
}

fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}
