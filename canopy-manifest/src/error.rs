//! Error types for manifest handling.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for manifest operations.
pub type ManifestResult<T> = Result<T, ManifestError>;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed manifest {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("manifest validation error: {0}")]
    Invalid(String),

    #[error(transparent)]
    Types(#[from] canopy_types::Error),

    #[error("extension '{0}' is already registered")]
    Duplicate(String),

    #[error("schema '{schema}' of '{requested_by}' is already owned by '{owner}'")]
    SchemaCollision {
        schema: String,
        owner: String,
        requested_by: String,
    },

    #[error("extension not found: {0}")]
    NotFound(String),
}
