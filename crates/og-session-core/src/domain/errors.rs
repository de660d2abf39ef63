//! # Domain Errors
//!
//! Error taxonomy of the session core and its mapping to client errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Session core error types.
///
/// Cloneable so a single failed search can be handed to every waiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// No cached handle matches the key.
    #[error("Database not found: {0}")]
    NotFound(String),

    /// The handle lacks the requested operation.
    #[error("DB type {kind} does not support {operation}")]
    Unsupported {
        /// Operation name
        operation: String,
        /// Database type
        kind: String,
    },

    /// Event name not on the allow-list.
    #[error("Unrecognized event name: {0}")]
    InvalidEvent(String),

    /// The store failed to open or load a database.
    #[error("Failed to open {name}: {reason}")]
    OpenFailure {
        /// Requested key
        name: String,
        /// Store error
        reason: String,
    },

    /// A network lookup failed.
    #[error("Discovery failed for {subject}: {reason}")]
    DiscoveryFailure {
        /// Search subject key
        subject: String,
        /// Network error
        reason: String,
    },

    /// A data operation on an open handle failed.
    #[error("Store operation failed: {0}")]
    StoreFailure(String),

    /// Malformed query description.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// The access controller refused to grant.
    #[error("Access controller does not support setting write access")]
    AccessGrantUnsupported,

    /// Malformed request payload.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl GatewayError {
    /// HTTP-style status code for the routing layer.
    pub fn status(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::Unsupported { .. } => 405,
            Self::InvalidEvent(_) | Self::InvalidQuery(_) | Self::InvalidRequest(_) => 400,
            Self::AccessGrantUnsupported => 501,
            Self::DiscoveryFailure { .. } => 502,
            Self::OpenFailure { .. } | Self::StoreFailure(_) => 500,
        }
    }

    /// Message without request-specific detail.
    fn generic_message(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "Database not found",
            Self::Unsupported { .. } => "Operation not supported",
            Self::InvalidEvent(_) => "Unrecognized event name",
            Self::OpenFailure { .. } => "Failed to open database",
            Self::DiscoveryFailure { .. } => "Peer discovery failed",
            Self::StoreFailure(_) => "Store operation failed",
            Self::InvalidQuery(_) => "Invalid query",
            Self::AccessGrantUnsupported => {
                "Access controller does not support setting write access"
            }
            Self::InvalidRequest(_) => "Invalid request",
        }
    }

    /// Client-facing error; detail is included only when `api_debug` is set.
    pub fn to_client_error(&self, api_debug: bool) -> ClientError {
        ClientError {
            status: self.status(),
            message: if api_debug {
                self.to_string()
            } else {
                self.generic_message().to_string()
            },
        }
    }

    /// Short label for metrics.
    pub fn kind_label(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Unsupported { .. } => "unsupported",
            Self::InvalidEvent(_) => "invalid_event",
            Self::OpenFailure { .. } => "open_failure",
            Self::DiscoveryFailure { .. } => "discovery_failure",
            Self::StoreFailure(_) => "store_failure",
            Self::InvalidQuery(_) => "invalid_query",
            Self::AccessGrantUnsupported => "grant_unsupported",
            Self::InvalidRequest(_) => "invalid_request",
        }
    }
}

/// Serializable error body returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientError {
    /// Status code
    pub status: u16,
    /// Message, generic unless debugging
    pub message: String,
}
