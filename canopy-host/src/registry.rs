//! UI contributions and open tabs.
//!
//! The registry is owned by the supervisor and mutated from one task at a
//! time; every mutation notifies listeners synchronously before returning.
//! Views are owned through an explicit owner map. Commands and status-bar
//! items are owned by their `extensionId:` prefix.

use crate::ui::{Disposer, MountTarget, UiShell, ViewMount};
use crate::{HostError, HostResult};
use canopy_types::{ExtensionId, TabId};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, warn};

// ================================================================
// Contribution types
// ================================================================

/// A kind of view an extension can show in a tab.
#[derive(Clone)]
pub struct ViewDefinition {
    pub id: String,
    pub name: String,
    pub icon: Option<String>,
    pub allow_multiple: bool,
    pub default_props: Value,
    pub mount: Arc<dyn ViewMount>,
}

impl ViewDefinition {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        mount: impl ViewMount + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            icon: None,
            allow_multiple: false,
            default_props: Value::Object(Map::new()),
            mount: Arc::new(mount),
        }
    }

    #[must_use]
    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    #[must_use]
    pub fn allow_multiple(mut self, allow: bool) -> Self {
        self.allow_multiple = allow;
        self
    }

    #[must_use]
    pub fn with_default_props(mut self, props: Value) -> Self {
        self.default_props = props;
        self
    }
}

impl fmt::Debug for ViewDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewDefinition")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("icon", &self.icon)
            .field("allow_multiple", &self.allow_multiple)
            .field("default_props", &self.default_props)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidebarSection {
    pub id: String,
    pub title: String,
    pub order: i32,
}

/// A sidebar entry that opens a view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidebarItem {
    pub id: String,
    pub section_id: String,
    pub label: String,
    pub icon: Option<String>,
    pub view_id: String,
    pub order: i32,
}

pub type CommandHandler = Arc<dyn Fn() -> anyhow::Result<()> + Send + Sync>;

#[derive(Clone)]
pub struct Command {
    pub id: String,
    pub title: String,
    pub handler: CommandHandler,
}

impl Command {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        handler: impl Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            handler: Arc::new(handler),
        }
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("id", &self.id)
            .field("title", &self.title)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusBarAlignment {
    #[default]
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusBarItem {
    pub id: String,
    pub text: String,
    pub tooltip: Option<String>,
    /// Command run when the item is clicked.
    pub command: Option<String>,
    pub alignment: StatusBarAlignment,
    pub priority: i32,
}

impl StatusBarItem {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            tooltip: None,
            command: None,
            alignment: StatusBarAlignment::default(),
            priority: 0,
        }
    }
}

/// An open instance of a view.
#[derive(Debug, Clone, PartialEq)]
pub struct Tab {
    pub id: TabId,
    pub view_id: String,
    pub title: String,
    pub props: Value,
}

impl Tab {
    #[must_use]
    pub fn mount_target(&self) -> MountTarget {
        MountTarget {
            tab_id: self.id,
            view_id: self.view_id.clone(),
        }
    }
}

// ================================================================
// Notifications
// ================================================================

/// Which collection a mutation touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistryEvent {
    ViewsChanged,
    SidebarChanged,
    CommandsChanged,
    StatusBarChanged,
    TabsChanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(RegistryEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Executed,
    /// No command with that id; reported and ignored.
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnregisterOptions {
    /// Leave tabs of the extension's views open (hot reload).
    pub keep_tabs: bool,
}

impl UnregisterOptions {
    #[must_use]
    pub fn keep_tabs() -> Self {
        Self { keep_tabs: true }
    }
}

// ================================================================
// Registry
// ================================================================

struct Owned<T> {
    owner: ExtensionId,
    value: T,
}

pub struct ExtensionRegistry {
    shell: Arc<dyn UiShell>,
    views: BTreeMap<String, Owned<ViewDefinition>>,
    sections: Vec<Owned<SidebarSection>>,
    sidebar_items: Vec<Owned<SidebarItem>>,
    commands: BTreeMap<String, Command>,
    status_items: BTreeMap<String, StatusBarItem>,
    tabs: Vec<Tab>,
    active_tab: Option<TabId>,
    mounts: HashMap<TabId, Disposer>,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: u64,
}

impl ExtensionRegistry {
    pub fn new(shell: Arc<dyn UiShell>) -> Self {
        Self {
            shell,
            views: BTreeMap::new(),
            sections: Vec::new(),
            sidebar_items: Vec::new(),
            commands: BTreeMap::new(),
            status_items: BTreeMap::new(),
            tabs: Vec::new(),
            active_tab: None,
            mounts: HashMap::new(),
            listeners: Vec::new(),
            next_listener: 0,
        }
    }

    // ----------------------------------------------------------------
    // Listeners
    // ----------------------------------------------------------------

    pub fn subscribe(&mut self, listener: impl Fn(RegistryEvent) + Send + Sync + 'static) -> ListenerId {
        self.next_listener += 1;
        let id = ListenerId(self.next_listener);
        self.listeners.push((id, Arc::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(l, _)| *l != id);
        self.listeners.len() != before
    }

    fn notify(&self, event: RegistryEvent) {
        for (_, listener) in &self.listeners {
            listener(event);
        }
    }

    // ----------------------------------------------------------------
    // Views
    // ----------------------------------------------------------------

    /// Registers a view for `owner`.
    ///
    /// Re-registration by the same owner replaces the definition and
    /// remounts any open tab of that view. An id held by another
    /// extension is rejected.
    pub fn register_view(&mut self, owner: &ExtensionId, view: ViewDefinition) -> HostResult<()> {
        if let Some(existing) = self.views.get(&view.id)
            && existing.owner != *owner
        {
            warn!(
                view_id = %view.id,
                owner = %existing.owner,
                requested_by = %owner,
                "View id already registered by another extension"
            );
            return Err(HostError::ViewIdConflict {
                view_id: view.id,
                owner: existing.owner.to_string(),
                requested_by: owner.to_string(),
            });
        }

        let view_id = view.id.clone();
        self.views.insert(
            view_id.clone(),
            Owned {
                owner: owner.clone(),
                value: view,
            },
        );
        self.remount_tabs(&view_id);
        debug!(extension_id = %owner, view_id = %view_id, "Registered view");
        self.notify(RegistryEvent::ViewsChanged);
        Ok(())
    }

    fn remount_tabs(&mut self, view_id: &str) {
        let Some(view) = self.views.get(view_id).map(|v| &v.value) else {
            return;
        };
        for tab in self.tabs.iter().filter(|t| t.view_id == view_id) {
            if let Some(old) = self.mounts.remove(&tab.id) {
                old.dispose();
            }
            match self.shell.mount(view, tab) {
                Ok(disposer) => {
                    self.mounts.insert(tab.id, disposer);
                }
                Err(e) => {
                    error!(view_id = %view_id, tab_id = %tab.id, error = %e, "Remount failed");
                }
            }
        }
    }

    #[must_use]
    pub fn view(&self, id: &str) -> Option<&ViewDefinition> {
        self.views.get(id).map(|v| &v.value)
    }

    #[must_use]
    pub fn view_owner(&self, id: &str) -> Option<&ExtensionId> {
        self.views.get(id).map(|v| &v.owner)
    }

    pub fn views(&self) -> impl Iterator<Item = &ViewDefinition> {
        self.views.values().map(|v| &v.value)
    }

    // ----------------------------------------------------------------
    // Sidebar
    // ----------------------------------------------------------------

    pub fn register_sidebar_section(&mut self, owner: &ExtensionId, section: SidebarSection) {
        self.sections
            .retain(|s| !(s.owner == *owner && s.value.id == section.id));
        self.sections.push(Owned {
            owner: owner.clone(),
            value: section,
        });
        self.notify(RegistryEvent::SidebarChanged);
    }

    pub fn register_sidebar_item(&mut self, owner: &ExtensionId, item: SidebarItem) {
        self.sidebar_items
            .retain(|s| !(s.owner == *owner && s.value.id == item.id));
        self.sidebar_items.push(Owned {
            owner: owner.clone(),
            value: item,
        });
        self.notify(RegistryEvent::SidebarChanged);
    }

    /// Sections sorted by `order`, ties in registration order.
    #[must_use]
    pub fn sidebar_sections(&self) -> Vec<&SidebarSection> {
        let mut sections: Vec<_> = self.sections.iter().map(|s| &s.value).collect();
        sections.sort_by_key(|s| s.order);
        sections
    }

    /// Items of one section sorted by `order`.
    #[must_use]
    pub fn sidebar_items(&self, section_id: &str) -> Vec<&SidebarItem> {
        let mut items: Vec<_> = self
            .sidebar_items
            .iter()
            .map(|s| &s.value)
            .filter(|i| i.section_id == section_id)
            .collect();
        items.sort_by_key(|i| i.order);
        items
    }

    // ----------------------------------------------------------------
    // Commands and status bar
    // ----------------------------------------------------------------

    /// Registers a command under `owner`'s namespace and returns its
    /// qualified id.
    pub fn register_command(&mut self, owner: &ExtensionId, mut command: Command) -> HostResult<String> {
        command.id = qualify(owner, &command.id)?;
        let id = command.id.clone();
        self.commands.insert(id.clone(), command);
        self.notify(RegistryEvent::CommandsChanged);
        Ok(id)
    }

    /// Runs a command. An unknown id is logged and reported, not an error.
    pub fn execute_command(&self, id: &str) -> HostResult<CommandOutcome> {
        let Some(command) = self.commands.get(id) else {
            warn!(command_id = %id, "Unknown command");
            return Ok(CommandOutcome::Unknown);
        };
        let handler = Arc::clone(&command.handler);
        handler().map_err(|e| {
            error!(command_id = %id, error = %e, "Command failed");
            HostError::CommandFailed {
                command_id: id.to_string(),
                message: format!("{e:#}"),
            }
        })?;
        Ok(CommandOutcome::Executed)
    }

    #[must_use]
    pub fn command(&self, id: &str) -> Option<&Command> {
        self.commands.get(id)
    }

    pub fn commands(&self) -> impl Iterator<Item = &Command> {
        self.commands.values()
    }

    pub fn register_status_bar_item(&mut self, owner: &ExtensionId, mut item: StatusBarItem) -> HostResult<String> {
        item.id = qualify(owner, &item.id)?;
        let id = item.id.clone();
        self.status_items.insert(id.clone(), item);
        self.notify(RegistryEvent::StatusBarChanged);
        Ok(id)
    }

    /// Changes the text and tooltip of an existing status-bar item.
    pub fn update_status_bar_item(
        &mut self,
        id: &str,
        text: impl Into<String>,
        tooltip: Option<String>,
    ) -> HostResult<()> {
        let item = self
            .status_items
            .get_mut(id)
            .ok_or_else(|| HostError::StatusBarItemNotFound(id.to_string()))?;
        item.text = text.into();
        item.tooltip = tooltip;
        self.notify(RegistryEvent::StatusBarChanged);
        Ok(())
    }

    #[must_use]
    pub fn status_bar_item(&self, id: &str) -> Option<&StatusBarItem> {
        self.status_items.get(id)
    }

    /// Items sorted by alignment, then descending priority.
    #[must_use]
    pub fn status_bar_items(&self) -> Vec<&StatusBarItem> {
        let mut items: Vec<_> = self.status_items.values().collect();
        items.sort_by_key(|i| {
            (
                i.alignment == StatusBarAlignment::Right,
                std::cmp::Reverse(i.priority),
            )
        });
        items
    }

    // ----------------------------------------------------------------
    // Tabs
    // ----------------------------------------------------------------

    /// Opens `view_id` and focuses the resulting tab.
    ///
    /// A single-instance view that already has a tab is refocused and
    /// `props` are shallow-merged into it. Otherwise a new tab is mounted
    /// with the view's default props overlaid by `props`.
    pub fn open_view(&mut self, view_id: &str, props: Value) -> HostResult<TabId> {
        let view = self
            .views
            .get(view_id)
            .map(|v| &v.value)
            .ok_or_else(|| HostError::ViewNotFound(view_id.to_string()))?;

        if !view.allow_multiple
            && let Some(tab) = self.tabs.iter_mut().find(|t| t.view_id == view_id)
        {
            merge_props(&mut tab.props, &props);
            self.shell.update_props(view, tab);
            let id = tab.id;
            self.active_tab = Some(id);
            self.notify(RegistryEvent::TabsChanged);
            return Ok(id);
        }

        let mut tab_props = view.default_props.clone();
        merge_props(&mut tab_props, &props);
        let tab = Tab {
            id: TabId::new(),
            view_id: view_id.to_string(),
            title: view.name.clone(),
            props: tab_props,
        };
        let disposer = self.shell.mount(view, &tab)?;

        let id = tab.id;
        self.mounts.insert(id, disposer);
        self.tabs.push(tab);
        self.active_tab = Some(id);
        self.notify(RegistryEvent::TabsChanged);
        Ok(id)
    }

    /// Closes a tab. Focus moves to its left neighbour, or to the new first
    /// tab when the leftmost one closes.
    pub fn close_tab(&mut self, tab_id: TabId) -> HostResult<()> {
        let index = self
            .tabs
            .iter()
            .position(|t| t.id == tab_id)
            .ok_or_else(|| HostError::TabNotFound(tab_id.to_string()))?;
        self.remove_tab_at(index);
        self.notify(RegistryEvent::TabsChanged);
        Ok(())
    }

    fn remove_tab_at(&mut self, index: usize) {
        let tab = self.tabs.remove(index);
        if let Some(disposer) = self.mounts.remove(&tab.id) {
            disposer.dispose();
        }
        if self.active_tab == Some(tab.id) {
            self.active_tab = self.tabs.get(index.saturating_sub(1)).map(|t| t.id);
        }
    }

    pub fn focus_tab(&mut self, tab_id: TabId) -> HostResult<()> {
        if !self.tabs.iter().any(|t| t.id == tab_id) {
            return Err(HostError::TabNotFound(tab_id.to_string()));
        }
        self.active_tab = Some(tab_id);
        self.notify(RegistryEvent::TabsChanged);
        Ok(())
    }

    #[must_use]
    pub fn tabs(&self) -> &[Tab] {
        &self.tabs
    }

    #[must_use]
    pub fn tab(&self, id: TabId) -> Option<&Tab> {
        self.tabs.iter().find(|t| t.id == id)
    }

    #[must_use]
    pub fn active_tab(&self) -> Option<TabId> {
        self.active_tab
    }

    #[must_use]
    pub fn is_mounted(&self, tab_id: TabId) -> bool {
        self.mounts.contains_key(&tab_id)
    }

    // ----------------------------------------------------------------
    // Unregistration
    // ----------------------------------------------------------------

    /// Removes everything `owner` contributed.
    ///
    /// Tabs of the removed views are closed, unless `keep_tabs` is set; kept
    /// tabs are unmounted and wait for the view to be registered again.
    pub fn unregister_extension(&mut self, owner: &ExtensionId, options: UnregisterOptions) {
        let view_ids: Vec<String> = self
            .views
            .iter()
            .filter(|(_, v)| v.owner == *owner)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &view_ids {
            self.views.remove(id);
        }

        let mut tabs_changed = false;
        if options.keep_tabs {
            for tab in self.tabs.iter().filter(|t| view_ids.contains(&t.view_id)) {
                if let Some(disposer) = self.mounts.remove(&tab.id) {
                    disposer.dispose();
                }
            }
        } else {
            while let Some(index) = self.tabs.iter().position(|t| view_ids.contains(&t.view_id)) {
                self.remove_tab_at(index);
                tabs_changed = true;
            }
        }

        let sections_before = self.sections.len() + self.sidebar_items.len();
        self.sections.retain(|s| s.owner != *owner);
        self.sidebar_items.retain(|s| s.owner != *owner);
        let sidebar_changed = sections_before != self.sections.len() + self.sidebar_items.len();

        let commands_before = self.commands.len();
        self.commands.retain(|id, _| !owner.owns_namespaced(id));
        let status_before = self.status_items.len();
        self.status_items.retain(|id, _| !owner.owns_namespaced(id));

        debug!(
            extension_id = %owner,
            views = view_ids.len(),
            keep_tabs = options.keep_tabs,
            "Unregistered extension contributions"
        );

        if !view_ids.is_empty() {
            self.notify(RegistryEvent::ViewsChanged);
        }
        if sidebar_changed {
            self.notify(RegistryEvent::SidebarChanged);
        }
        if commands_before != self.commands.len() {
            self.notify(RegistryEvent::CommandsChanged);
        }
        if status_before != self.status_items.len() {
            self.notify(RegistryEvent::StatusBarChanged);
        }
        if tabs_changed {
            self.notify(RegistryEvent::TabsChanged);
        }
    }

    /// Unmounts every tab. Tabs themselves are left in place.
    pub fn unmount_all(&mut self) {
        for (_, disposer) in self.mounts.drain() {
            disposer.dispose();
        }
    }
}

impl fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionRegistry")
            .field("views", &self.views.keys().collect::<Vec<_>>())
            .field("commands", &self.commands.keys().collect::<Vec<_>>())
            .field("tabs", &self.tabs.len())
            .field("active_tab", &self.active_tab)
            .finish_non_exhaustive()
    }
}

/// Puts `id` in `owner`'s namespace. Ids already qualified for `owner`
/// pass through; ids qualified for anyone else are rejected.
pub(crate) fn qualify(owner: &ExtensionId, id: &str) -> HostResult<String> {
    if owner.owns_namespaced(id) {
        Ok(id.to_string())
    } else if id.contains(':') || id.is_empty() {
        Err(HostError::ForeignNamespace {
            extension_id: owner.to_string(),
            id: id.to_string(),
        })
    } else {
        Ok(format!("{}{id}", owner.namespace_prefix()))
    }
}

/// Shallow merge of object `extra` into `base`. Non-object values of
/// `extra` are ignored.
fn merge_props(base: &mut Value, extra: &Value) {
    let Value::Object(extra) = extra else {
        return;
    };
    if !base.is_object() {
        *base = Value::Object(Map::new());
    }
    if let Value::Object(base) = base {
        for (k, v) in extra {
            base.insert(k.clone(), v.clone());
        }
    }
}
