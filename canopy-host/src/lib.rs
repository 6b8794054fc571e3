//! Extension host for Canopy.
//!
//! Loads first-party and installed extensions into one process, hands each
//! a permission-scoped view of the shared database, applies its private
//! schema migrations, and tracks the UI it contributes.
//!
//! - [`LifecycleSupervisor`] owns everything and drives discovery,
//!   migration, activation, hot reload and shutdown.
//! - [`ExtensionRegistry`] holds views, sidebar entries, commands,
//!   status-bar items and open tabs.
//! - [`EventBus`] carries payload-free notifications between extensions.
//! - [`ActivationContext`] is all an [`Extension`] ever sees of the host.

mod config;
mod context;
mod error;
mod events;
mod extension;
mod files;
pub mod logging;
mod policy;
mod registry;
mod supervisor;
mod ui;
mod watcher;

pub use config::{CONFIG_FILE, HostConfig};
pub use context::ActivationContext;
pub use error::{HostError, HostResult};
pub use events::{
    DATA_CHANGED, EXTENSION_FAILED, EXTENSIONS_CHANGED, EventBus, ScopedEventBus, Subscription,
};
pub use extension::{Extension, ExtensionFactory, ExtensionLoader, FactoryLoader, factory};
pub use files::{ExtensionFiles, STATE_FILE};
pub use policy::{PolicyConfig, PolicyEngine, PolicyMode};
pub use registry::{
    Command, CommandHandler, CommandOutcome, ExtensionRegistry, ListenerId, RegistryEvent,
    SidebarItem, SidebarSection, StatusBarAlignment, StatusBarItem, Tab, UnregisterOptions,
    ViewDefinition,
};
pub use supervisor::{
    ExtensionFailure, ExtensionState, FailureKind, LifecycleSupervisor, StartupReport,
};
pub use ui::{DirectShell, Disposer, MountTarget, UiShell, ViewMount};
pub use watcher::{ExtensionWatcher, FileChange};
