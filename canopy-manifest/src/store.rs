//! In-memory store of every known manifest.

use crate::{ExtensionManifest, ManifestError, ManifestResult};
use canopy_types::{ExtensionId, PermissionContext, PrivateSchema};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Where an extension came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionSource {
    /// Compiled into the host and supplied in-process.
    Bundled,
    /// Installed under the extensions directory.
    External { install_path: PathBuf },
}

impl ExtensionSource {
    #[must_use]
    pub fn install_path(&self) -> Option<&Path> {
        match self {
            Self::Bundled => None,
            Self::External { install_path } => Some(install_path),
        }
    }
}

/// A validated manifest plus its resolved private schema.
#[derive(Debug, Clone)]
pub struct ManifestEntry {
    pub manifest: ExtensionManifest,
    pub source: ExtensionSource,
    pub schema: PrivateSchema,
}

/// Manifests keyed by extension id, iterated in id order.
#[derive(Debug, Default)]
pub struct ManifestStore {
    entries: BTreeMap<ExtensionId, ManifestEntry>,
}

impl ManifestStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a manifest. Fails on an invalid manifest, a duplicate id, or a
    /// private schema already owned by another extension.
    pub fn insert(
        &mut self,
        manifest: ExtensionManifest,
        source: ExtensionSource,
    ) -> ManifestResult<&ManifestEntry> {
        manifest.validate()?;
        if self.entries.contains_key(&manifest.id) {
            return Err(ManifestError::Duplicate(manifest.id.to_string()));
        }
        let schema = manifest.private_schema()?;
        self.check_schema_free(&manifest.id, &schema)?;

        let id = manifest.id.clone();
        let entry = self.entries.entry(id).or_insert(ManifestEntry {
            manifest,
            source,
            schema,
        });
        Ok(entry)
    }

    /// Swaps in a re-read manifest for an existing extension, keeping its source.
    pub fn replace(&mut self, manifest: ExtensionManifest) -> ManifestResult<&ManifestEntry> {
        manifest.validate()?;
        let schema = manifest.private_schema()?;
        self.check_schema_free(&manifest.id, &schema)?;

        let entry = self
            .entries
            .get_mut(&manifest.id)
            .ok_or_else(|| ManifestError::NotFound(manifest.id.to_string()))?;
        entry.manifest = manifest;
        entry.schema = schema;
        Ok(entry)
    }

    pub fn remove(&mut self, id: &ExtensionId) -> Option<ManifestEntry> {
        self.entries.remove(id)
    }

    #[must_use]
    pub fn get(&self, id: &ExtensionId) -> Option<&ManifestEntry> {
        self.entries.get(id)
    }

    #[must_use]
    pub fn contains(&self, id: &ExtensionId) -> bool {
        self.entries.contains_key(id)
    }

    /// Finds the external extension installed at `path`.
    #[must_use]
    pub fn find_by_install_path(&self, path: &Path) -> Option<&ManifestEntry> {
        self.entries
            .values()
            .find(|e| e.source.install_path() == Some(path))
    }

    pub fn ids(&self) -> impl Iterator<Item = &ExtensionId> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ManifestEntry> {
        self.entries.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Builds a fresh permission context from the currently stored manifest.
    pub fn permission_context(&self, id: &ExtensionId) -> ManifestResult<PermissionContext> {
        let entry = self
            .get(id)
            .ok_or_else(|| ManifestError::NotFound(id.to_string()))?;
        Ok(PermissionContext::new(
            entry.manifest.id.clone(),
            entry.schema.clone(),
            entry.manifest.permissions.read.clone(),
            entry.manifest.permissions.write.clone(),
        ))
    }

    fn check_schema_free(&self, id: &ExtensionId, schema: &PrivateSchema) -> ManifestResult<()> {
        if let Some(owner) = self
            .entries
            .values()
            .find(|e| &e.manifest.id != id && e.schema == *schema)
        {
            return Err(ManifestError::SchemaCollision {
                schema: schema.to_string(),
                owner: owner.manifest.id.to_string(),
                requested_by: id.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn manifest(id: &str) -> ExtensionManifest {
        ExtensionManifest::new(ExtensionId::parse(id).unwrap(), id, "1.0.0")
    }

    #[test]
    fn insert_and_lookup() {
        let mut store = ManifestStore::new();
        store.insert(manifest("goals"), ExtensionSource::Bundled).unwrap();
        let id = ExtensionId::parse("goals").unwrap();
        assert!(store.contains(&id));
        assert_eq!(store.get(&id).unwrap().schema.as_str(), "plugin_goals");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn duplicate_id_rejected() {
        let mut store = ManifestStore::new();
        store.insert(manifest("goals"), ExtensionSource::Bundled).unwrap();
        let err = store
            .insert(
                manifest("goals"),
                ExtensionSource::External {
                    install_path: "/tmp/goals".into(),
                },
            )
            .unwrap_err();
        assert!(matches!(err, ManifestError::Duplicate(_)));
    }

    #[test]
    fn schema_collision_rejected() {
        let mut store = ManifestStore::new();
        store.insert(manifest("acme.notes"), ExtensionSource::Bundled).unwrap();
        // "acme-notes" derives the same plugin_acme_notes schema.
        let err = store
            .insert(manifest("acme-notes"), ExtensionSource::Bundled)
            .unwrap_err();
        assert!(matches!(err, ManifestError::SchemaCollision { .. }));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn replace_updates_permissions_and_keeps_source() {
        let mut store = ManifestStore::new();
        let path = PathBuf::from("/ext/goals");
        store
            .insert(
                manifest("goals"),
                ExtensionSource::External {
                    install_path: path.clone(),
                },
            )
            .unwrap();

        let mut updated = manifest("goals");
        updated.permissions.read = vec!["accounts".into()];
        store.replace(updated).unwrap();

        let id = ExtensionId::parse("goals").unwrap();
        let ctx = store.permission_context(&id).unwrap();
        assert_eq!(ctx.allowed_reads, vec!["accounts".to_string()]);
        assert_eq!(store.find_by_install_path(&path).unwrap().manifest.id, id);
    }

    #[test]
    fn replace_unknown_fails() {
        let mut store = ManifestStore::new();
        assert!(matches!(
            store.replace(manifest("ghost")),
            Err(ManifestError::NotFound(_))
        ));
    }

    #[test]
    fn permission_context_for_unknown_fails() {
        let store = ManifestStore::new();
        let id = ExtensionId::parse("ghost").unwrap();
        assert!(store.permission_context(&id).is_err());
    }

    #[test]
    fn iteration_is_id_ordered() {
        let mut store = ManifestStore::new();
        for id in ["c", "a", "b"] {
            store.insert(manifest(id), ExtensionSource::Bundled).unwrap();
        }
        let ids: Vec<&str> = store.ids().map(ExtensionId::as_str).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        store.remove(&ExtensionId::parse("b").unwrap());
        assert_eq!(store.len(), 2);
    }
}
