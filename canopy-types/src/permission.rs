//! The permission context bound to every scoped query handle.

use crate::{ExtensionId, PrivateSchema};
use serde::{Deserialize, Serialize};

/// Allow-list entry granting every table outside extension-private schemas.
pub const WILDCARD_GRANT: &str = "*";

/// What one extension may touch, captured at handle creation time.
///
/// Entries in `allowed_reads` / `allowed_writes` are `table`,
/// `schema.table` or [`WILDCARD_GRANT`]. The private schema is implicitly
/// readable and writable and never needs to be listed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionContext {
    pub extension_id: ExtensionId,
    pub private_schema: PrivateSchema,
    #[serde(default)]
    pub allowed_reads: Vec<String>,
    #[serde(default)]
    pub allowed_writes: Vec<String>,
}

impl PermissionContext {
    #[must_use]
    pub fn new(
        extension_id: ExtensionId,
        private_schema: PrivateSchema,
        allowed_reads: Vec<String>,
        allowed_writes: Vec<String>,
    ) -> Self {
        Self {
            extension_id,
            private_schema,
            allowed_reads,
            allowed_writes,
        }
    }

    /// A context with no grants beyond the derived private schema.
    #[must_use]
    pub fn private_only(extension_id: ExtensionId) -> Self {
        let private_schema = PrivateSchema::for_extension(&extension_id);
        Self::new(extension_id, private_schema, Vec::new(), Vec::new())
    }
}
