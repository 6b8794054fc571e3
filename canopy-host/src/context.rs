//! What an extension receives at activation.

use crate::events::ScopedEventBus;
use crate::files::ExtensionFiles;
use crate::HostResult;
use crate::registry::{
    Command, ExtensionRegistry, SidebarItem, SidebarSection, StatusBarItem, ViewDefinition,
    qualify,
};
use canopy_gateway::ScopedQueryHandle;
use canopy_types::{ExtensionId, TabId};
use serde_json::Value;

/// Registration functions tagged with the extension's id, plus its scoped
/// query handle. There is no way to reach unrestricted storage from here.
pub struct ActivationContext<'a> {
    extension_id: ExtensionId,
    registry: &'a mut ExtensionRegistry,
    query: ScopedQueryHandle,
    events: ScopedEventBus,
    files: Option<ExtensionFiles>,
}

impl<'a> ActivationContext<'a> {
    pub(crate) fn new(
        extension_id: ExtensionId,
        registry: &'a mut ExtensionRegistry,
        query: ScopedQueryHandle,
        events: ScopedEventBus,
        files: Option<ExtensionFiles>,
    ) -> Self {
        Self {
            extension_id,
            registry,
            query,
            events,
            files,
        }
    }

    #[must_use]
    pub fn extension_id(&self) -> &ExtensionId {
        &self.extension_id
    }

    /// The permission-scoped query handle. Clone it to keep it past
    /// activation.
    #[must_use]
    pub fn query(&self) -> &ScopedQueryHandle {
        &self.query
    }

    #[must_use]
    pub fn events(&self) -> &ScopedEventBus {
        &self.events
    }

    /// State and config files, when the host has a place for them.
    #[must_use]
    pub fn files(&self) -> Option<&ExtensionFiles> {
        self.files.as_ref()
    }

    pub fn register_view(&mut self, view: ViewDefinition) -> HostResult<()> {
        self.registry.register_view(&self.extension_id, view)
    }

    pub fn register_sidebar_section(&mut self, section: SidebarSection) {
        self.registry
            .register_sidebar_section(&self.extension_id, section);
    }

    pub fn register_sidebar_item(&mut self, item: SidebarItem) {
        self.registry.register_sidebar_item(&self.extension_id, item);
    }

    /// Registers a command and returns its `extensionId:`-qualified id.
    pub fn register_command(&mut self, command: Command) -> HostResult<String> {
        self.registry.register_command(&self.extension_id, command)
    }

    pub fn register_status_bar_item(&mut self, item: StatusBarItem) -> HostResult<String> {
        self.registry
            .register_status_bar_item(&self.extension_id, item)
    }

    /// Updates one of this extension's own status-bar items. Bare ids are
    /// qualified the same way registration qualifies them.
    pub fn update_status_bar_item(
        &mut self,
        id: &str,
        text: impl Into<String>,
        tooltip: Option<String>,
    ) -> HostResult<()> {
        let qualified = qualify(&self.extension_id, id)?;
        self.registry
            .update_status_bar_item(&qualified, text, tooltip)
    }

    pub fn open_view(&mut self, view_id: &str, props: Value) -> HostResult<TabId> {
        self.registry.open_view(view_id, props)
    }
}
