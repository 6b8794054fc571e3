//! The `manifest.json` model.

use crate::{ManifestError, ManifestResult};
use canopy_types::{
    ExtensionId, PermissionContext, PrivateSchema, WILDCARD_GRANT, is_plain_identifier,
};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path};

fn default_main() -> String {
    "index.js".to_string()
}

/// Declared identity, permissions and migrations of one extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionManifest {
    /// Unique extension identifier (e.g. "acme.goals").
    pub id: ExtensionId,
    /// Human-readable name.
    pub name: String,
    /// Version string shown to the user.
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: String,
    /// Entry file relative to the install directory.
    #[serde(default = "default_main")]
    pub main: String,
    #[serde(default)]
    pub permissions: ManifestPermissions,
    /// Migrations for the private schema. Order in the file does not matter.
    #[serde(default)]
    pub migrations: Vec<Migration>,
}

/// Table access declared by an extension.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestPermissions {
    /// Tables outside the private schema the extension may read.
    #[serde(default)]
    pub read: Vec<String>,
    /// Tables outside the private schema the extension may write.
    #[serde(default)]
    pub write: Vec<String>,
    /// Overrides the derived private schema name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_name: Option<String>,
}

/// One versioned schema change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Migration {
    pub version: u32,
    pub name: String,
    #[serde(alias = "up")]
    pub up_script: String,
}

impl Migration {
    #[must_use]
    pub fn new(version: u32, name: impl Into<String>, up_script: impl Into<String>) -> Self {
        Self {
            version,
            name: name.into(),
            up_script: up_script.into(),
        }
    }
}

impl ExtensionManifest {
    /// Minimal manifest with no permissions and no migrations.
    #[must_use]
    pub fn new(id: ExtensionId, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            version: version.into(),
            description: String::new(),
            author: String::new(),
            main: default_main(),
            permissions: ManifestPermissions::default(),
            migrations: Vec::new(),
        }
    }

    /// Parses and validates a manifest from JSON text.
    pub fn from_json_str(json: &str) -> ManifestResult<Self> {
        let manifest: Self = serde_json::from_str(json)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Validates the manifest for required fields and constraints.
    ///
    /// Duplicate migration versions are not rejected here; the migration
    /// runner refuses them at activation time.
    pub fn validate(&self) -> ManifestResult<()> {
        if self.name.trim().is_empty() {
            return Err(ManifestError::Invalid("name is required".into()));
        }
        if self.version.trim().is_empty() {
            return Err(ManifestError::Invalid("version is required".into()));
        }
        validate_entry_path(&self.main)?;

        for entry in self.permissions.read.iter().chain(&self.permissions.write) {
            validate_grant(entry)?;
        }
        self.private_schema()?;

        for migration in &self.migrations {
            if migration.version == 0 {
                return Err(ManifestError::Invalid(format!(
                    "migration '{}' has version 0; versions start at 1",
                    migration.name
                )));
            }
            if migration.name.trim().is_empty() {
                return Err(ManifestError::Invalid(format!(
                    "migration {} has no name",
                    migration.version
                )));
            }
        }
        Ok(())
    }

    /// The schema this extension writes freely.
    pub fn private_schema(&self) -> ManifestResult<PrivateSchema> {
        Ok(PrivateSchema::resolve(
            &self.id,
            self.permissions.schema_name.as_deref(),
        )?)
    }

    /// Builds a fresh permission context from the declared allow-lists.
    pub fn permission_context(&self) -> ManifestResult<PermissionContext> {
        Ok(PermissionContext::new(
            self.id.clone(),
            self.private_schema()?,
            self.permissions.read.clone(),
            self.permissions.write.clone(),
        ))
    }

    /// Highest declared migration version, 0 when there are none.
    #[must_use]
    pub fn latest_migration_version(&self) -> u32 {
        self.migrations.iter().map(|m| m.version).max().unwrap_or(0)
    }
}

/// Accepts `*`, `table` or `schema.table`.
fn validate_grant(entry: &str) -> ManifestResult<()> {
    if entry == WILDCARD_GRANT {
        return Ok(());
    }
    let parts: Vec<&str> = entry.split('.').collect();
    if parts.len() > 2 || !parts.iter().all(|p| is_plain_identifier(p)) {
        return Err(ManifestError::Invalid(format!(
            "permission entry '{entry}' must be 'table', 'schema.table' or '*'"
        )));
    }
    Ok(())
}

fn validate_entry_path(main: &str) -> ManifestResult<()> {
    let path = Path::new(main);
    if main.is_empty()
        || path.is_absolute()
        || path
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return Err(ManifestError::Invalid(format!(
            "main '{main}' must be a relative path inside the extension directory"
        )));
    }
    Ok(())
}
