//! Shared error definitions for Alira primitives.

use thiserror::Error;

/// Result alias used by primitive constructors.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while constructing primitive types.
#[derive(Debug, Error)]
pub enum Error {
    /// The provided user identifier is blank.
    #[error("invalid user id `{value}`: {reason}")]
    InvalidUserId {
        /// The offending identifier string.
        value: String,
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// Tool call identifiers must be non-empty.
    #[error("invalid tool call id: {reason}")]
    InvalidToolCallId {
        /// Human-readable reason for rejection.
        reason: String,
    },
}
