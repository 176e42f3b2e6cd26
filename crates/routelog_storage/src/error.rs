//! Error types for store operations.

use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while talking to a key-value or object store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Persisted store state could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The store rejected or failed the request.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A list cursor was not issued for the requested prefix.
    #[error("invalid cursor {cursor:?} for prefix {prefix:?}")]
    InvalidCursor {
        /// The cursor that was supplied.
        cursor: String,
        /// The prefix being listed.
        prefix: String,
    },

    /// A key or object name is not acceptable to the store.
    #[error("invalid key: {0}")]
    InvalidKey(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl StorageError {
    /// Creates an [`StorageError::Unavailable`] error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }
}
