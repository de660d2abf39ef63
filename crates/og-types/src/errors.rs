//! Parse errors for shared entities.

use thiserror::Error;

/// Errors raised while parsing textual entity representations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    /// Address string was not of the form `/orbitdb/<root>/<path>`.
    #[error("invalid database address: {0}")]
    InvalidAddress(String),

    /// Database kind string was empty.
    #[error("empty database kind")]
    EmptyKind,
}
