//! Lifecycle supervisor.
//!
//! Drives each extension through
//! `Discovered -> ManifestParsed -> MigrationsApplied -> Active`, and back
//! to `Unregistered` on disable, uninstall or hot reload. Every failure is
//! isolated to the extension that caused it: it is logged, recorded,
//! announced on [`EXTENSION_FAILED`], and startup carries on.
//!
//! The supervisor owns the registry and the manifest store outright and
//! is driven through `&mut self`, so no two lifecycle operations ever
//! interleave and an extension's migrations never run concurrently.

use crate::config::HostConfig;
use crate::context::ActivationContext;
use crate::events::{EXTENSION_FAILED, EXTENSIONS_CHANGED, EventBus};
use crate::extension::{Extension, ExtensionFactory, ExtensionLoader, FactoryLoader};
use crate::files::ExtensionFiles;
use crate::policy::PolicyEngine;
use crate::registry::{ExtensionRegistry, UnregisterOptions};
use crate::ui::UiShell;
use crate::watcher::{ExtensionWatcher, FileChange};
use crate::{HostError, HostResult};
use canopy_gateway::ScopedQueryHandle;
use canopy_manifest::{
    DiscoveredExtension, ExtensionManifest, ExtensionSource, MANIFEST_FILE, ManifestError,
    ManifestStore, discover, load_extension_dir,
};
use canopy_migrations::MigrationRunner;
use canopy_storage::QueryExecutor;
use canopy_types::{Clock, ExtensionId, PrivateSchema, SystemClock};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

// ================================================================
// States and reports
// ================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtensionState {
    Discovered,
    ManifestParsed,
    MigrationsApplied,
    Active,
    Unregistered,
    Failed,
}

impl fmt::Display for ExtensionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Discovered => "discovered",
            Self::ManifestParsed => "manifest parsed",
            Self::MigrationsApplied => "migrations applied",
            Self::Active => "active",
            Self::Unregistered => "unregistered",
            Self::Failed => "failed",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Manifest unreadable, malformed, or colliding with another extension.
    Discovery,
    Migration,
    /// The extension's code could not be loaded or its `activate` failed.
    Activation,
    /// Blocked by administrator policy.
    Policy,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Discovery => "discovery",
            Self::Migration => "migration",
            Self::Activation => "activation",
            Self::Policy => "policy",
        })
    }
}

/// One isolated failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionFailure {
    /// Unknown when the manifest could not be read at all.
    pub extension_id: Option<ExtensionId>,
    pub kind: FailureKind,
    pub message: String,
    /// Version and name of the migration that failed.
    pub migration: Option<(u32, String)>,
}

/// Outcome of [`LifecycleSupervisor::start`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartupReport {
    /// Activated extensions, in activation order.
    pub activated: Vec<ExtensionId>,
    pub failures: Vec<ExtensionFailure>,
}

impl StartupReport {
    #[must_use]
    pub fn failure_for(&self, id: &ExtensionId) -> Option<&ExtensionFailure> {
        self.failures
            .iter()
            .find(|f| f.extension_id.as_ref() == Some(id))
    }
}

struct ExtensionRecord {
    state: ExtensionState,
    instance: Option<Box<dyn Extension>>,
    /// Schema and ledger version reached by the last successful migration
    /// run. A different schema means nothing has been applied yet.
    migrated: Option<(PrivateSchema, u32)>,
    last_failure: Option<ExtensionFailure>,
}

impl ExtensionRecord {
    fn new() -> Self {
        Self {
            state: ExtensionState::Discovered,
            instance: None,
            migrated: None,
            last_failure: None,
        }
    }
}

// ================================================================
// Supervisor
// ================================================================

/// Owns the registry and drives every extension's lifecycle.
///
/// ```
/// use canopy_host::{ActivationContext, DirectShell, Extension, LifecycleSupervisor, factory};
/// use canopy_manifest::ExtensionManifest;
/// use canopy_storage::DuckDbExecutor;
/// use canopy_types::ExtensionId;
/// use std::sync::Arc;
///
/// struct Hello;
///
/// #[async_trait::async_trait]
/// impl Extension for Hello {
///     async fn activate(&mut self, _ctx: &mut ActivationContext<'_>) -> anyhow::Result<()> {
///         Ok(())
///     }
/// }
///
/// # tokio_test::block_on(async {
/// let db = Arc::new(DuckDbExecutor::open_in_memory()?);
/// let mut supervisor = LifecycleSupervisor::new(db, Arc::new(DirectShell));
/// let id = ExtensionId::parse("acme.hello")?;
/// let manifest = ExtensionManifest::new(id.clone(), "Hello", "1.0.0");
/// supervisor.register_bundled(manifest, factory(|| Hello))?;
///
/// let report = supervisor.start().await;
/// assert_eq!(report.activated, vec![id]);
/// # Ok::<(), anyhow::Error>(())
/// # }).unwrap();
/// ```
pub struct LifecycleSupervisor {
    executor: Arc<dyn QueryExecutor>,
    clock: Arc<dyn Clock>,
    policy: PolicyEngine,
    loader: Box<dyn ExtensionLoader>,
    extensions_dir: Option<PathBuf>,
    files_dir: Option<PathBuf>,
    watch_debounce: Duration,
    disabled: HashSet<ExtensionId>,
    factories: HashMap<ExtensionId, ExtensionFactory>,
    manifests: ManifestStore,
    records: BTreeMap<ExtensionId, ExtensionRecord>,
    load_order: Vec<ExtensionId>,
    activation_order: Vec<ExtensionId>,
    registry: ExtensionRegistry,
    events: EventBus,
}

impl LifecycleSupervisor {
    /// A supervisor with no extensions directory, an unrestricted policy and
    /// the system clock.
    pub fn new(executor: Arc<dyn QueryExecutor>, shell: Arc<dyn UiShell>) -> Self {
        Self {
            executor,
            clock: Arc::new(SystemClock),
            policy: PolicyEngine::unrestricted(),
            loader: Box::new(FactoryLoader::new()),
            extensions_dir: None,
            files_dir: None,
            watch_debounce: Duration::from_millis(500),
            disabled: HashSet::new(),
            factories: HashMap::new(),
            manifests: ManifestStore::new(),
            records: BTreeMap::new(),
            load_order: Vec::new(),
            activation_order: Vec::new(),
            registry: ExtensionRegistry::new(shell),
            events: EventBus::new(),
        }
    }

    /// A supervisor set up from host config, with policy loaded from disk.
    pub fn from_config(
        config: &HostConfig,
        executor: Arc<dyn QueryExecutor>,
        shell: Arc<dyn UiShell>,
    ) -> Self {
        Self::new(executor, shell)
            .with_policy(PolicyEngine::load())
            .with_extensions_dir(config.extensions_dir.clone())
            .with_files_dir(config.extension_data_dir())
            .with_watch_debounce(config.watch_debounce())
            .with_disabled(config.disabled_ids())
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: PolicyEngine) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_loader(mut self, loader: impl ExtensionLoader + 'static) -> Self {
        self.loader = Box::new(loader);
        self
    }

    #[must_use]
    pub fn with_extensions_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.extensions_dir = Some(dir.into());
        self
    }

    /// Root for bundled extensions' state and config files.
    #[must_use]
    pub fn with_files_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.files_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn with_watch_debounce(mut self, debounce: Duration) -> Self {
        self.watch_debounce = debounce;
        self
    }

    #[must_use]
    pub fn with_disabled(mut self, ids: impl IntoIterator<Item = ExtensionId>) -> Self {
        self.disabled.extend(ids);
        self
    }

    // ----------------------------------------------------------------
    // Accessors
    // ----------------------------------------------------------------

    #[must_use]
    pub fn registry(&self) -> &ExtensionRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ExtensionRegistry {
        &mut self.registry
    }

    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    #[must_use]
    pub fn manifests(&self) -> &ManifestStore {
        &self.manifests
    }

    #[must_use]
    pub fn policy(&self) -> &PolicyEngine {
        &self.policy
    }

    #[must_use]
    pub fn state(&self, id: &ExtensionId) -> Option<ExtensionState> {
        self.records.get(id).map(|r| r.state)
    }

    #[must_use]
    pub fn last_failure(&self, id: &ExtensionId) -> Option<&ExtensionFailure> {
        self.records.get(id).and_then(|r| r.last_failure.as_ref())
    }

    /// Active extensions in activation order.
    #[must_use]
    pub fn active_extensions(&self) -> &[ExtensionId] {
        &self.activation_order
    }

    #[must_use]
    pub fn is_disabled(&self, id: &ExtensionId) -> bool {
        self.disabled.contains(id)
    }

    // ----------------------------------------------------------------
    // Registration and startup
    // ----------------------------------------------------------------

    /// Supplies a bundled extension in-process. Bundled extensions are
    /// known before discovery runs, so an installed extension reusing a
    /// bundled id is the one rejected.
    pub fn register_bundled(
        &mut self,
        manifest: ExtensionManifest,
        factory: ExtensionFactory,
    ) -> HostResult<()> {
        let id = manifest.id.clone();
        self.admit(manifest, ExtensionSource::Bundled)?;
        self.factories.insert(id, factory);
        Ok(())
    }

    fn admit(&mut self, manifest: ExtensionManifest, source: ExtensionSource) -> HostResult<ExtensionId> {
        let id = manifest.id.clone();
        debug!(extension_id = %id, state = %ExtensionState::Discovered, "Extension discovered");
        self.manifests.insert(manifest, source)?;
        let mut record = ExtensionRecord::new();
        record.state = ExtensionState::ManifestParsed;
        self.records.insert(id.clone(), record);
        self.load_order.push(id.clone());
        Ok(id)
    }

    /// Discovers installed extensions and activates every known extension
    /// that is not disabled. Never fails as a whole.
    pub async fn start(&mut self) -> StartupReport {
        let mut report = StartupReport::default();

        if let Some(dir) = self.extensions_dir.clone() {
            for result in discover(&dir) {
                let failure = match result {
                    Ok(found) => {
                        let id = found.manifest.id.clone();
                        self.admit_discovered(found)
                            .err()
                            .map(|e| self.discovery_failure(Some(id), &e))
                    }
                    Err(e) => Some(self.discovery_failure(None, &HostError::from(e))),
                };
                report.failures.extend(failure);
            }
        }

        for id in self.load_order.clone() {
            if self.state(&id) != Some(ExtensionState::ManifestParsed) {
                continue;
            }
            if self.disabled.contains(&id) {
                info!(extension_id = %id, "Extension disabled, not activating");
                continue;
            }
            match self.activate(&id).await {
                Ok(()) => report.activated.push(id),
                Err(e) => report.failures.push(self.fail(&id, &e)),
            }
        }

        info!(
            activated = report.activated.len(),
            failed = report.failures.len(),
            "Extension startup complete"
        );
        if !report.activated.is_empty() {
            self.events.emit(EXTENSIONS_CHANGED);
        }
        report
    }

    fn admit_discovered(&mut self, found: DiscoveredExtension) -> HostResult<ExtensionId> {
        self.admit(
            found.manifest,
            ExtensionSource::External {
                install_path: found.install_path,
            },
        )
    }

    // ----------------------------------------------------------------
    // The activation pipeline
    // ----------------------------------------------------------------

    /// Policy, migrations, then the extension's own `activate`. Anything the
    /// extension registered before failing is swept.
    async fn activate(&mut self, id: &ExtensionId) -> HostResult<()> {
        let entry = self
            .manifests
            .get(id)
            .ok_or_else(|| HostError::ExtensionNotFound(id.to_string()))?
            .clone();

        if !self.policy.is_extension_allowed(id) {
            return Err(HostError::PolicyDenied(format!(
                "extension '{id}' blocked by policy"
            )));
        }

        let context = self.policy.restrict(self.manifests.permission_context(id)?);
        let handle = ScopedQueryHandle::new(context, Arc::clone(&self.executor));

        let migrated = self.records.get(id).and_then(|r| r.migrated.as_ref());
        let latest = entry.manifest.latest_migration_version();
        if migrated.is_none_or(|(schema, v)| *schema != entry.schema || latest > *v) {
            let report = MigrationRunner::new(&handle, self.clock.as_ref())
                .run(id, &entry.schema, &entry.manifest.migrations)
                .await
                .map_err(|source| HostError::Migration {
                    extension_id: id.to_string(),
                    source,
                })?;
            if let Some(record) = self.records.get_mut(id) {
                record.migrated = Some((entry.schema.clone(), report.current_version));
            }
        }
        self.set_state(id, ExtensionState::MigrationsApplied);

        let mut instance = self.instantiate(&entry)?;
        let files = match &entry.source {
            ExtensionSource::External { install_path } => {
                Some(ExtensionFiles::new(install_path).with_protected(&entry.manifest.main))
            }
            ExtensionSource::Bundled => self
                .files_dir
                .as_ref()
                .map(|dir| ExtensionFiles::new(dir.join(id.as_str()))),
        };

        let result = {
            let mut ctx = ActivationContext::new(
                id.clone(),
                &mut self.registry,
                handle,
                self.events.scoped(id.clone()),
                files,
            );
            instance.activate(&mut ctx).await
        };
        if let Err(e) = result {
            self.registry
                .unregister_extension(id, UnregisterOptions::default());
            self.events.remove_owner(id);
            return Err(HostError::ActivationFailed {
                extension_id: id.to_string(),
                message: format!("{e:#}"),
            });
        }

        if let Some(record) = self.records.get_mut(id) {
            record.instance = Some(instance);
            record.last_failure = None;
        }
        self.activation_order.retain(|a| a != id);
        self.activation_order.push(id.clone());
        self.set_state(id, ExtensionState::Active);
        info!(extension_id = %id, version = %entry.manifest.version, "Extension activated");
        Ok(())
    }

    fn instantiate(&self, entry: &canopy_manifest::ManifestEntry) -> HostResult<Box<dyn Extension>> {
        let id = &entry.manifest.id;
        if let Some(factory) = self.factories.get(id) {
            return Ok(factory());
        }
        self.loader
            .load(entry)
            .map_err(|e| HostError::ActivationFailed {
                extension_id: id.to_string(),
                message: format!("{e:#}"),
            })
    }

    /// Deactivates and unregisters an active extension.
    async fn deactivate(&mut self, id: &ExtensionId, options: UnregisterOptions) {
        let instance = self.records.get_mut(id).and_then(|r| r.instance.take());
        if let Some(mut instance) = instance
            && let Err(e) = instance.deactivate().await
        {
            warn!(extension_id = %id, error = %format!("{e:#}"), "Extension deactivate failed");
        }
        self.registry.unregister_extension(id, options);
        self.events.remove_owner(id);
        self.activation_order.retain(|a| a != id);
        self.set_state(id, ExtensionState::Unregistered);
    }

    fn set_state(&mut self, id: &ExtensionId, state: ExtensionState) {
        if let Some(record) = self.records.get_mut(id) {
            debug!(extension_id = %id, from = %record.state, to = %state, "Extension state change");
            record.state = state;
        }
    }

    /// Records a failure for a known extension.
    fn fail(&mut self, id: &ExtensionId, err: &HostError) -> ExtensionFailure {
        let failure = ExtensionFailure {
            extension_id: Some(id.clone()),
            kind: err.failure_kind(),
            message: err.to_string(),
            migration: match err {
                HostError::Migration { source, .. } => source
                    .failed_migration()
                    .map(|(version, name)| (version, name.to_string())),
                _ => None,
            },
        };
        error!(extension_id = %id, kind = %failure.kind, error = %err, "Extension failed");
        self.set_state(id, ExtensionState::Failed);
        if let Some(record) = self.records.get_mut(id) {
            record.last_failure = Some(failure.clone());
        }
        self.events.emit(EXTENSION_FAILED);
        failure
    }

    /// Reports a manifest that never made it into the store.
    fn discovery_failure(&self, id: Option<ExtensionId>, err: &HostError) -> ExtensionFailure {
        match &id {
            Some(id) => warn!(extension_id = %id, error = %err, "Skipping extension"),
            None => warn!(error = %err, "Skipping extension"),
        }
        self.events.emit(EXTENSION_FAILED);
        ExtensionFailure {
            extension_id: id,
            kind: FailureKind::Discovery,
            message: err.to_string(),
            migration: None,
        }
    }

    // ----------------------------------------------------------------
    // Lifecycle operations
    // ----------------------------------------------------------------

    /// Activates an extension that is not active, clearing any disable.
    pub async fn enable(&mut self, id: &ExtensionId) -> HostResult<()> {
        match self.state(id) {
            None => return Err(HostError::ExtensionNotFound(id.to_string())),
            Some(ExtensionState::Active) => {
                return Err(HostError::ExtensionAlreadyActive(id.to_string()));
            }
            Some(_) => {}
        }
        self.disabled.remove(id);
        if let Err(e) = self.activate(id).await {
            self.fail(id, &e);
            return Err(e);
        }
        self.events.emit(EXTENSIONS_CHANGED);
        Ok(())
    }

    /// Deactivates an extension, closes its tabs and keeps it disabled.
    pub async fn disable(&mut self, id: &ExtensionId) -> HostResult<()> {
        match self.state(id) {
            None => return Err(HostError::ExtensionNotFound(id.to_string())),
            Some(ExtensionState::Active) => {}
            Some(from) => {
                return Err(HostError::InvalidTransition {
                    extension_id: id.to_string(),
                    from,
                    action: "disable",
                });
            }
        }
        self.disabled.insert(id.clone());
        self.deactivate(id, UnregisterOptions::default()).await;
        info!(extension_id = %id, "Extension disabled");
        self.events.emit(EXTENSIONS_CHANGED);
        Ok(())
    }

    /// Deactivates and forgets an extension. An installed extension's
    /// directory is deleted; its private schema data is left in place.
    pub async fn uninstall(&mut self, id: &ExtensionId) -> HostResult<()> {
        let state = self
            .state(id)
            .ok_or_else(|| HostError::ExtensionNotFound(id.to_string()))?;
        if state == ExtensionState::Active {
            self.deactivate(id, UnregisterOptions::default()).await;
        }

        let entry = self.manifests.remove(id);
        self.records.remove(id);
        self.factories.remove(id);
        self.disabled.remove(id);
        self.load_order.retain(|l| l != id);

        if let Some(path) = entry.as_ref().and_then(|e| e.source.install_path())
            && path.exists()
        {
            std::fs::remove_dir_all(path)?;
        }
        info!(extension_id = %id, "Extension uninstalled");
        self.events.emit(EXTENSIONS_CHANGED);
        Ok(())
    }

    /// Hot reload: re-reads an installed extension's manifest, unregisters
    /// with tabs kept, applies new migrations and activates again.
    ///
    /// A manifest that no longer parses leaves the running version alone.
    pub async fn reload(&mut self, id: &ExtensionId) -> HostResult<()> {
        let entry = self
            .manifests
            .get(id)
            .ok_or_else(|| HostError::ExtensionNotFound(id.to_string()))?;

        if let Some(install_path) = entry.source.install_path().map(Path::to_path_buf) {
            let found = load_extension_dir(&install_path).map_err(|e| {
                let err = HostError::from(e);
                self.discovery_failure(Some(id.clone()), &err);
                err
            })?;
            if found.manifest.id != *id {
                let err = HostError::Manifest(ManifestError::Invalid(format!(
                    "manifest in {} changed id from '{id}' to '{}'",
                    install_path.display(),
                    found.manifest.id
                )));
                self.discovery_failure(Some(id.clone()), &err);
                return Err(err);
            }
            if let Err(e) = self.manifests.replace(found.manifest) {
                let err = HostError::from(e);
                self.discovery_failure(Some(id.clone()), &err);
                return Err(err);
            }
        }

        if self.state(id) == Some(ExtensionState::Active) {
            self.deactivate(id, UnregisterOptions::keep_tabs()).await;
        }
        if self.disabled.contains(id) {
            return Ok(());
        }

        if let Err(e) = self.activate(id).await {
            // Kept tabs have no view to come back to.
            self.registry
                .unregister_extension(id, UnregisterOptions::default());
            self.fail(id, &e);
            return Err(e);
        }
        info!(extension_id = %id, "Hot reloaded extension");
        self.events.emit(EXTENSIONS_CHANGED);
        Ok(())
    }

    /// Reacts to a watcher change. Returns the extension that was reloaded
    /// or newly activated, if the change mattered.
    pub async fn handle_file_change(&mut self, change: &FileChange) -> HostResult<Option<ExtensionId>> {
        let is_manifest = change.path.file_name().is_some_and(|n| n == MANIFEST_FILE);

        let known = self.manifests.iter().find_map(|e| {
            let install_path = e.source.install_path()?;
            same_path(install_path, &change.extension_dir).then(|| {
                let entry_file = install_path.join(&e.manifest.main);
                (e.manifest.id.clone(), same_path(&entry_file, &change.path))
            })
        });

        match known {
            Some((id, is_entry)) => {
                if !is_manifest && !is_entry {
                    debug!(extension_id = %id, path = %change.path.display(), "Ignoring change");
                    return Ok(None);
                }
                self.reload(&id).await?;
                Ok(Some(id))
            }
            None if is_manifest => {
                let found = load_extension_dir(&change.extension_dir).map_err(|e| {
                    let err = HostError::from(e);
                    self.discovery_failure(None, &err);
                    err
                })?;
                let candidate = found.manifest.id.clone();
                let id = self.admit_discovered(found).map_err(|e| {
                    self.discovery_failure(Some(candidate), &e);
                    e
                })?;
                info!(extension_id = %id, "New extension discovered");
                if !self.disabled.contains(&id) {
                    if let Err(e) = self.activate(&id).await {
                        self.fail(&id, &e);
                        return Err(e);
                    }
                    self.events.emit(EXTENSIONS_CHANGED);
                }
                Ok(Some(id))
            }
            None => Ok(None),
        }
    }

    /// Starts a watcher over the extensions directory.
    pub fn watch(&self) -> HostResult<(ExtensionWatcher, mpsc::UnboundedReceiver<FileChange>)> {
        let dir = self
            .extensions_dir
            .as_ref()
            .ok_or_else(|| HostError::Watcher("no extensions directory configured".to_string()))?;
        ExtensionWatcher::start(dir, self.watch_debounce)
    }

    /// Applies watcher changes until the channel closes. Failures are
    /// already recorded per extension, so they are only logged here.
    pub async fn process_changes(&mut self, changes: &mut mpsc::UnboundedReceiver<FileChange>) {
        while let Some(change) = changes.recv().await {
            if let Err(e) = self.handle_file_change(&change).await {
                warn!(path = %change.path.display(), error = %e, "Hot reload failed");
            }
        }
    }

    /// Deactivates everything in reverse activation order and flushes
    /// storage.
    pub async fn shutdown(&mut self) -> HostResult<()> {
        let order: Vec<ExtensionId> = self.activation_order.iter().rev().cloned().collect();
        for id in &order {
            self.deactivate(id, UnregisterOptions::default()).await;
        }
        self.registry.unmount_all();
        self.executor.checkpoint().await?;
        info!(deactivated = order.len(), "Extension host shut down");
        Ok(())
    }
}

impl fmt::Debug for LifecycleSupervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleSupervisor")
            .field("extensions_dir", &self.extensions_dir)
            .field("extensions", &self.load_order)
            .field("active", &self.activation_order)
            .finish_non_exhaustive()
    }
}

fn same_path(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
