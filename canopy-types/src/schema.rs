//! Private schema naming.
//!
//! Every extension owns exactly one schema in the shared database. The name
//! is derived deterministically from the extension id unless the manifest
//! supplies an explicit one.

use crate::{Error, ExtensionId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix reserved for extension-private schemas.
pub const PRIVATE_SCHEMA_PREFIX: &str = "plugin_";

/// Schema that unqualified table references resolve to.
pub const DEFAULT_SCHEMA: &str = "main";

/// Returns true for a bare SQL identifier: ASCII letter or `_` first, then
/// letters, digits and `_`.
#[must_use]
pub fn is_plain_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Name of the schema an extension may write freely. Always lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrivateSchema(String);

impl PrivateSchema {
    /// Derives the schema from an extension id: lowercased, every
    /// non-alphanumeric character replaced by `_`, then prefixed.
    #[must_use]
    pub fn for_extension(id: &ExtensionId) -> Self {
        let body: String = id
            .as_str()
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_lowercase()
                } else {
                    '_'
                }
            })
            .collect();
        Self(format!("{PRIVATE_SCHEMA_PREFIX}{body}"))
    }

    /// Accepts an explicitly declared schema name.
    pub fn explicit(name: &str) -> crate::Result<Self> {
        if !is_plain_identifier(name) {
            return Err(Error::InvalidSchemaName(
                name.to_string(),
                "must be a plain identifier",
            ));
        }
        let lowered = name.to_ascii_lowercase();
        if !lowered.starts_with(PRIVATE_SCHEMA_PREFIX) || lowered.len() == PRIVATE_SCHEMA_PREFIX.len()
        {
            return Err(Error::InvalidSchemaName(
                name.to_string(),
                "must start with 'plugin_' followed by a name",
            ));
        }
        Ok(Self(lowered))
    }

    /// Resolves the schema for an extension, preferring an explicit name.
    pub fn resolve(id: &ExtensionId, explicit: Option<&str>) -> crate::Result<Self> {
        match explicit {
            Some(name) => Self::explicit(name),
            None => Ok(Self::for_extension(id)),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive comparison against a schema name taken from SQL.
    #[must_use]
    pub fn matches(&self, schema: &str) -> bool {
        self.0.eq_ignore_ascii_case(schema)
    }

    /// True for any name inside the reserved extension schema namespace.
    #[must_use]
    pub fn is_reserved(schema: &str) -> bool {
        schema
            .to_ascii_lowercase()
            .starts_with(PRIVATE_SCHEMA_PREFIX)
    }
}

impl fmt::Display for PrivateSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
