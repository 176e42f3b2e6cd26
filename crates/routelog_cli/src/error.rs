//! CLI error type.

use routelog_core::CoreError;
use routelog_storage::StorageError;
use thiserror::Error;

/// Result type for CLI commands.
pub type CliResult<T> = Result<T, CliError>;

/// Errors reported by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// Core operation failed.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Store could not be opened or used.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Output could not be written.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A required path was not given.
    #[error("{0} required (pass the flag or set {1})")]
    MissingPath(&'static str, &'static str),

    /// The command ran but did not do what was asked.
    #[error("{0}")]
    Failed(String),
}
