//! Error types for Routelog core.

use routelog_storage::StorageError;
use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in Routelog core operations.
///
/// A missing subject or snapshot is **not** an error for soft-delete and
/// restore; those operations report it as `false`.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Key-value or object store failure, passed through unchanged.
    #[error("store error: {0}")]
    Storage(#[from] StorageError),

    /// JSON encoding or decoding failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error while writing an export.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The store still had pages left after the configured ceiling.
    #[error("listing {prefix:?} exceeded {max_pages} pages")]
    PaginationLimit {
        /// Prefix being listed.
        prefix: String,
        /// The ceiling that was hit.
        max_pages: usize,
    },

    /// The store handed back the cursor it was just given.
    #[error("listing {prefix:?} stalled at cursor {cursor:?}")]
    CursorStalled {
        /// Prefix being listed.
        prefix: String,
        /// The repeated cursor.
        cursor: String,
    },

    /// A stored value does not have the expected shape.
    #[error("malformed value under {key}: {message}")]
    MalformedData {
        /// Key holding the value.
        key: String,
        /// What was wrong with it.
        message: String,
    },

    /// Signup for a username that already has a record.
    #[error("username already taken: {username}")]
    UsernameTaken {
        /// The requested username.
        username: String,
    },

    /// A record required by an account operation does not exist.
    #[error("not found: {what}")]
    NotFound {
        /// What was looked up.
        what: String,
    },

    /// Password or reset key did not match.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Session token did not match the account.
    #[error("unauthorized")]
    Unauthorized,

    /// Request input was rejected before touching the store.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// Description of the problem.
        message: String,
    },

    /// A configuration value is out of range.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },
}

impl CoreError {
    /// Creates a malformed data error.
    pub fn malformed(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedData {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Creates an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Returns true if the error came from a store round-trip.
    pub fn is_store_failure(&self) -> bool {
        matches!(self, CoreError::Storage(_) | CoreError::Io(_))
    }
}
