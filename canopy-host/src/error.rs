//! Error types for the extension host.

use crate::supervisor::{ExtensionState, FailureKind};
use canopy_manifest::ManifestError;
use canopy_migrations::MigrationError;
use canopy_storage::StorageError;
use thiserror::Error;

/// Result type for host operations.
pub type HostResult<T> = Result<T, HostError>;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("extension not found: {0}")]
    ExtensionNotFound(String),

    #[error("extension already active: {0}")]
    ExtensionAlreadyActive(String),

    #[error("cannot {action} extension '{extension_id}' while {from}")]
    InvalidTransition {
        extension_id: String,
        from: ExtensionState,
        action: &'static str,
    },

    #[error("policy denied: {0}")]
    PolicyDenied(String),

    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),

    #[error("migrations for '{extension_id}' failed: {source}")]
    Migration {
        extension_id: String,
        #[source]
        source: MigrationError,
    },

    #[error("activation of '{extension_id}' failed: {message}")]
    ActivationFailed {
        extension_id: String,
        message: String,
    },

    #[error("view not found: {0}")]
    ViewNotFound(String),

    #[error("view '{view_id}' is owned by '{owner}', cannot be registered by '{requested_by}'")]
    ViewIdConflict {
        view_id: String,
        owner: String,
        requested_by: String,
    },

    #[error("tab not found: {0}")]
    TabNotFound(String),

    #[error("command '{command_id}' failed: {message}")]
    CommandFailed { command_id: String, message: String },

    #[error("'{id}' is outside the namespace of extension '{extension_id}'")]
    ForeignNamespace { extension_id: String, id: String },

    #[error("status bar item not found: {0}")]
    StatusBarItemNotFound(String),

    #[error("failed to mount view '{view_id}': {message}")]
    Mount { view_id: String, message: String },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid file name '{0}'")]
    InvalidFileName(String),

    #[error("file watcher error: {0}")]
    Watcher(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl HostError {
    /// Which startup failure class this error belongs to, for errors that
    /// can stop an extension from activating.
    #[must_use]
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Manifest(_) => FailureKind::Discovery,
            Self::Migration { .. } => FailureKind::Migration,
            Self::PolicyDenied(_) => FailureKind::Policy,
            _ => FailureKind::Activation,
        }
    }

    /// True for a gateway denial, however deeply it is wrapped.
    #[must_use]
    pub fn is_permission_denied(&self) -> bool {
        match self {
            Self::Storage(e) => e.is_permission_denied(),
            Self::Migration {
                source: MigrationError::Failed { source, .. },
                ..
            } => source.is_permission_denied(),
            _ => false,
        }
    }
}
