//! Shared error definitions for capcall primitives.

use thiserror::Error;
use uuid::Error as UuidError;

/// Result alias used for primitive construction.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while constructing primitive types.
#[derive(Debug, Error)]
pub enum Error {
    /// The provided operation identifier could not be parsed.
    #[error("invalid operation id: {source}")]
    InvalidOperationId {
        /// Source parsing error from the UUID library.
        #[from]
        source: UuidError,
    },

    /// Caller identifier was empty.
    #[error("caller id cannot be empty")]
    EmptyCallerId,

    /// Tag label failed validation.
    #[error("invalid tag `{tag}`: {reason}")]
    InvalidTag {
        /// The offending label.
        tag: String,
        /// Human-readable reason for rejection.
        reason: String,
    },
}
