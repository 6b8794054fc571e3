//! The contract every extension implements, and how the host obtains one.

use crate::context::ActivationContext;
use async_trait::async_trait;
use canopy_manifest::ManifestEntry;
use canopy_types::ExtensionId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Code contributed by an extension.
///
/// `activate` receives the only capabilities the extension gets: the
/// registration functions, a permission-scoped query handle and the event
/// bus. Anything it registers is swept if activation fails.
#[async_trait]
pub trait Extension: Send {
    async fn activate(&mut self, ctx: &mut ActivationContext<'_>) -> anyhow::Result<()>;

    async fn deactivate(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Creates a fresh extension instance.
pub type ExtensionFactory = Arc<dyn Fn() -> Box<dyn Extension> + Send + Sync>;

/// Turns an installed extension's manifest into runnable code.
pub trait ExtensionLoader: Send + Sync {
    fn load(&self, entry: &ManifestEntry) -> anyhow::Result<Box<dyn Extension>>;
}

/// Loader backed by factories linked into the host, keyed by extension id.
#[derive(Default, Clone)]
pub struct FactoryLoader {
    factories: HashMap<ExtensionId, ExtensionFactory>,
}

impl FactoryLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: ExtensionId, factory: ExtensionFactory) {
        self.factories.insert(id, factory);
    }

    #[must_use]
    pub fn with(mut self, id: ExtensionId, factory: ExtensionFactory) -> Self {
        self.register(id, factory);
        self
    }
}

impl ExtensionLoader for FactoryLoader {
    fn load(&self, entry: &ManifestEntry) -> anyhow::Result<Box<dyn Extension>> {
        let id = &entry.manifest.id;
        let factory = self
            .factories
            .get(id)
            .ok_or_else(|| anyhow::anyhow!("no loader available for extension '{id}' ({})", entry.manifest.main))?;
        Ok(factory())
    }
}

impl fmt::Debug for FactoryLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryLoader")
            .field("extensions", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Wraps a constructor as an [`ExtensionFactory`].
pub fn factory<E, F>(make: F) -> ExtensionFactory
where
    E: Extension + 'static,
    F: Fn() -> E + Send + Sync + 'static,
{
    Arc::new(move || Box::new(make()) as Box<dyn Extension>)
}
