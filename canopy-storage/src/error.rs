//! Error types for the storage layer.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while executing statements.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database error from DuckDB.
    #[error("database error: {0}")]
    Database(#[from] duckdb::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error (file system).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A write was attempted through a readonly call.
    #[error("readonly query refused: {0}")]
    ReadOnlyViolation(String),

    /// The permission gateway rejected the statement.
    #[error("permission denied for extension '{extension_id}': {reason}")]
    PermissionDenied { extension_id: String, reason: String },

    /// Invalid input (bad parameters, empty script, ...).
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// The blocking task running the statement did not complete.
    #[error("execution task failed: {0}")]
    Task(String),
}

impl StorageError {
    /// True when the gateway refused the statement.
    #[must_use]
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied { .. })
    }
}
