//! Per-extension state and config files.
//!
//! Everything lives under one root directory per extension: the install
//! directory for installed extensions, a directory under the host data dir
//! for bundled ones. File names may contain subdirectories
//! (`months/2025-12.json`) but never leave the root, not even through a
//! symlink. The manifest and the entry file are never writable.

use crate::{HostError, HostResult};
use canopy_manifest::MANIFEST_FILE;
use serde_json::Value;
use std::path::{Component, Path, PathBuf};

/// Runtime state file, distinct from user-facing config.
pub const STATE_FILE: &str = "state.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionFiles {
    root: PathBuf,
    protected: Vec<PathBuf>,
}

impl ExtensionFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            protected: vec![PathBuf::from(MANIFEST_FILE)],
        }
    }

    /// Also refuses writes to `name`, relative to the root.
    #[must_use]
    pub fn with_protected(mut self, name: impl Into<PathBuf>) -> Self {
        self.protected.push(name.into());
        self
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reads `state.json`, or `null` when none has been written.
    pub fn read_state(&self) -> HostResult<Value> {
        match self.read(STATE_FILE)? {
            Some(contents) => Ok(serde_json::from_str(&contents)?),
            None => Ok(Value::Null),
        }
    }

    pub fn write_state(&self, state: &Value) -> HostResult<()> {
        let contents = serde_json::to_string_pretty(state)?;
        self.write(STATE_FILE, &contents)
    }

    /// Reads a named config file, `None` when it does not exist.
    pub fn read_config(&self, name: &str) -> HostResult<Option<String>> {
        self.read(name)
    }

    pub fn write_config(&self, name: &str, contents: &str) -> HostResult<()> {
        if self.protected.iter().any(|p| p.as_path() == Path::new(name)) {
            return Err(HostError::InvalidFileName(name.to_string()));
        }
        self.write(name, contents)
    }

    fn read(&self, name: &str) -> HostResult<Option<String>> {
        let path = self.resolve(name)?;
        match std::fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, name: &str, contents: &str) -> HostResult<()> {
        let path = self.resolve(name)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, contents)?;
        Ok(())
    }

    fn resolve(&self, name: &str) -> HostResult<PathBuf> {
        let relative = Path::new(name);
        let plain = !name.is_empty()
            && !name.contains('\\')
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !plain {
            return Err(HostError::InvalidFileName(name.to_string()));
        }
        let path = self.root.join(relative);
        if !self.contains(&path) {
            return Err(HostError::InvalidFileName(name.to_string()));
        }
        Ok(path)
    }

    /// Resolves symlinks in the deepest existing part of `path` and checks
    /// the result is still under the root.
    fn contains(&self, path: &Path) -> bool {
        let Ok(root) = self.root.canonicalize() else {
            // No root yet, so nothing below it can be a link.
            return true;
        };
        let mut existing = path;
        while std::fs::symlink_metadata(existing).is_err() {
            match existing.parent() {
                Some(parent) => existing = parent,
                None => return true,
            }
        }
        existing
            .canonicalize()
            .is_ok_and(|real| real.starts_with(&root))
    }
}
