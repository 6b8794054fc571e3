//! Seam to the UI shell that renders views.
//!
//! The host never draws anything itself. A view contributes a
//! [`ViewMount`]; the [`UiShell`] decides where a tab's surface lives and
//! asks the view to mount into it, keeping the returned [`Disposer`] until
//! the tab is closed or the view is swapped out.

use crate::registry::{Tab, ViewDefinition};
use crate::{HostError, HostResult};
use canopy_types::TabId;
use serde_json::Value;
use std::fmt;

/// Tears down one mounted view. Runs at most once.
pub struct Disposer(Option<Box<dyn FnOnce() + Send>>);

impl Disposer {
    pub fn new(f: impl FnOnce() + Send + 'static) -> Self {
        Self(Some(Box::new(f)))
    }

    /// A disposer with nothing to tear down.
    #[must_use]
    pub fn noop() -> Self {
        Self(None)
    }

    pub fn dispose(mut self) {
        if let Some(f) = self.0.take() {
            f();
        }
    }
}

impl fmt::Debug for Disposer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Disposer")
            .field(&self.0.as_ref().map(|_| "pending"))
            .finish()
    }
}

/// Where a view is being mounted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountTarget {
    pub tab_id: TabId,
    pub view_id: String,
}

/// Mount behaviour supplied by the extension that owns a view.
pub trait ViewMount: Send + Sync {
    fn mount(&self, target: &MountTarget, props: &Value) -> anyhow::Result<Disposer>;

    /// Called when a singleton tab is refocused with new props.
    fn update(&self, _target: &MountTarget, _props: &Value) {}
}

impl<F> ViewMount for F
where
    F: Fn(&MountTarget, &Value) -> anyhow::Result<Disposer> + Send + Sync,
{
    fn mount(&self, target: &MountTarget, props: &Value) -> anyhow::Result<Disposer> {
        self(target, props)
    }
}

/// The host application's UI surface.
pub trait UiShell: Send + Sync {
    fn mount(&self, view: &ViewDefinition, tab: &Tab) -> HostResult<Disposer>;

    fn update_props(&self, _view: &ViewDefinition, _tab: &Tab) {}
}

/// Shell that mounts views straight into a surface named after the tab,
/// with no presentation of its own. Used headless and in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectShell;

impl UiShell for DirectShell {
    fn mount(&self, view: &ViewDefinition, tab: &Tab) -> HostResult<Disposer> {
        view.mount
            .mount(&tab.mount_target(), &tab.props)
            .map_err(|e| HostError::Mount {
                view_id: view.id.clone(),
                message: format!("{e:#}"),
            })
    }

    fn update_props(&self, view: &ViewDefinition, tab: &Tab) {
        view.mount.update(&tab.mount_target(), &tab.props);
    }
}
