//! Debounced filesystem watcher over the extensions directory.
//!
//! The watcher only reports which extension directory changed and which
//! file; the supervisor decides whether that file matters.

use crate::{HostError, HostResult};
use notify_debouncer_mini::notify::{RecommendedWatcher, RecursiveMode, Watcher};
use notify_debouncer_mini::{DebouncedEventKind, Debouncer, new_debouncer};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// One debounced change inside an extension directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    /// `<extensions_dir>/<name>`.
    pub extension_dir: PathBuf,
    /// The changed file.
    pub path: PathBuf,
}

/// Keeps the watcher alive; dropping it stops watching.
pub struct ExtensionWatcher {
    root: PathBuf,
    _debouncer: Debouncer<RecommendedWatcher>,
}

impl ExtensionWatcher {
    /// Watches `extensions_dir` recursively, creating it if needed.
    pub fn start(
        extensions_dir: &Path,
        debounce: Duration,
    ) -> HostResult<(Self, mpsc::UnboundedReceiver<FileChange>)> {
        std::fs::create_dir_all(extensions_dir)?;
        let root = extensions_dir
            .canonicalize()
            .unwrap_or_else(|_| extensions_dir.to_path_buf());

        let (tx, rx) = mpsc::unbounded_channel();
        let handler_root = root.clone();
        let mut debouncer = new_debouncer(debounce, move |res: notify_debouncer_mini::DebounceEventResult| {
            match res {
                Ok(events) => {
                    for event in events {
                        if event.kind != DebouncedEventKind::Any {
                            continue;
                        }
                        if let Some(change) = classify(&handler_root, &event.path) {
                            debug!(path = %change.path.display(), "Extension file changed");
                            if tx.send(change).is_err() {
                                return;
                            }
                        }
                    }
                }
                Err(e) => warn!(error = %e, "Extension watcher error"),
            }
        })
        .map_err(|e| HostError::Watcher(e.to_string()))?;

        debouncer
            .watcher()
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|e| HostError::Watcher(e.to_string()))?;

        info!(dir = %root.display(), "Watching extensions directory");
        Ok((
            Self {
                root,
                _debouncer: debouncer,
            },
            rx,
        ))
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl fmt::Debug for ExtensionWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionWatcher")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

/// Maps a changed path to its extension directory. Changes directly in
/// the root, or outside it, are ignored.
pub fn classify(root: &Path, path: &Path) -> Option<FileChange> {
    let relative = path.strip_prefix(root).ok()?;
    let mut components = relative.components();
    let dir = components.next()?;
    components.next()?;
    Some(FileChange {
        extension_dir: root.join(dir),
        path: path.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn classify_maps_to_extension_directory() {
        let root = Path::new("/ext");
        assert_eq!(
            classify(root, Path::new("/ext/goals/manifest.json")),
            Some(FileChange {
                extension_dir: PathBuf::from("/ext/goals"),
                path: PathBuf::from("/ext/goals/manifest.json"),
            })
        );
        assert_eq!(
            classify(root, Path::new("/ext/goals/dist/index.js"))
                .map(|c| c.extension_dir),
            Some(PathBuf::from("/ext/goals"))
        );
    }

    #[test]
    fn classify_ignores_root_and_outside_paths() {
        let root = Path::new("/ext");
        assert_eq!(classify(root, Path::new("/ext/goals")), None);
        assert_eq!(classify(root, Path::new("/ext")), None);
        assert_eq!(classify(root, Path::new("/other/goals/manifest.json")), None);
    }

    #[tokio::test]
    async fn start_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("extensions");
        let (watcher, _rx) = ExtensionWatcher::start(&target, Duration::from_millis(50)).unwrap();
        assert!(target.is_dir());
        assert!(watcher.root().ends_with("extensions"));
    }
}
