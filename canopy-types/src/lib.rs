//! Core type definitions for the Canopy extension runtime.
//!
//! This crate defines the small, dependency-free vocabulary shared by every
//! other crate in the workspace:
//! - Extension and tab identifiers
//! - Private schema derivation
//! - The per-call permission context handed to the query gateway
//! - Wall-clock timestamps and an injectable clock

mod ids;
mod permission;
mod schema;
mod timestamp;

pub use ids::{ExtensionId, TabId};
pub use permission::{PermissionContext, WILDCARD_GRANT};
pub use schema::{DEFAULT_SCHEMA, PRIVATE_SCHEMA_PREFIX, PrivateSchema, is_plain_identifier};
pub use timestamp::{Clock, FixedClock, SystemClock, Timestamp};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when constructing core types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid extension id '{0}': {1}")]
    InvalidExtensionId(String, &'static str),

    #[error("invalid schema name '{0}': {1}")]
    InvalidSchemaName(String, &'static str),

    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}
