//! Error types for the migration runner.

use canopy_storage::StorageError;
use thiserror::Error;

/// Result type for migration operations.
pub type MigrationResult<T> = Result<T, MigrationError>;

#[derive(Debug, Error)]
pub enum MigrationError {
    /// Two migrations of one extension share a version. Nothing was executed.
    #[error("duplicate migration version {version} ('{first}' and '{second}')")]
    DuplicateVersion {
        version: u32,
        first: String,
        second: String,
    },

    #[error("migration version must be positive (migration '{0}')")]
    InvalidVersion(String),

    /// Creating the schema or the ledger, or reading the current version, failed.
    #[error("migration ledger error: {0}")]
    Ledger(#[source] StorageError),

    /// A specific migration failed; later migrations were not attempted.
    #[error("migration {version} '{name}' failed: {source}")]
    Failed {
        version: u32,
        name: String,
        #[source]
        source: StorageError,
    },

    /// The post-run checkpoint failed. Every migration had been recorded.
    #[error("checkpoint after migrations failed: {0}")]
    Checkpoint(#[source] StorageError),
}

impl MigrationError {
    /// Version and name of the migration that failed, if one did.
    #[must_use]
    pub fn failed_migration(&self) -> Option<(u32, &str)> {
        match self {
            Self::Failed { version, name, .. } => Some((*version, name.as_str())),
            _ => None,
        }
    }
}
