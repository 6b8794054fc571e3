//! Discovery of installed extensions.
//!
//! Layout: `<extensions_dir>/<name>/manifest.json`. Each directory is
//! parsed on its own so one broken manifest never hides the others.

use crate::{ExtensionManifest, ManifestError, ManifestResult};
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name of the manifest inside an extension directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// A parsed manifest and the directory it was found in.
#[derive(Debug, Clone)]
pub struct DiscoveredExtension {
    pub manifest: ExtensionManifest,
    pub install_path: PathBuf,
}

impl DiscoveredExtension {
    /// Absolute path of the entry file named by `main`.
    #[must_use]
    pub fn entry_path(&self) -> PathBuf {
        self.install_path.join(&self.manifest.main)
    }
}

/// Scans `dir` for extension directories.
///
/// Returns one result per directory that contains a manifest, sorted by
/// directory name. A missing `dir` yields nothing.
pub fn discover(dir: &Path) -> Vec<ManifestResult<DiscoveredExtension>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(dir = %dir.display(), "Extensions directory does not exist");
            return Vec::new();
        }
        Err(source) => {
            return vec![Err(ManifestError::Io {
                path: dir.to_path_buf(),
                source,
            })];
        }
    };

    let mut dirs: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();

    dirs.into_iter()
        .filter(|d| {
            let has_manifest = d.join(MANIFEST_FILE).is_file();
            if !has_manifest {
                debug!(dir = %d.display(), "Skipping directory without manifest");
            }
            has_manifest
        })
        .map(|d| load_extension_dir(&d))
        .collect()
}

/// Reads and validates `<dir>/manifest.json`.
pub fn load_extension_dir(dir: &Path) -> ManifestResult<DiscoveredExtension> {
    let path = dir.join(MANIFEST_FILE);
    let contents = std::fs::read_to_string(&path).map_err(|source| ManifestError::Io {
        path: path.clone(),
        source,
    })?;
    let manifest: ExtensionManifest =
        serde_json::from_str(&contents).map_err(|source| ManifestError::Malformed {
            path: path.clone(),
            source,
        })?;
    manifest.validate()?;
    Ok(DiscoveredExtension {
        manifest,
        install_path: dir.to_path_buf(),
    })
}
