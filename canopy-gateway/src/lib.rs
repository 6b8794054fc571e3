//! Permission gateway.
//!
//! Extensions run in the host process with no sandbox around them, and the
//! shared database has no per-caller access control. The only isolation
//! boundary is here: every statement an extension issues is parsed, the
//! tables it touches are extracted structurally, and each one is checked
//! against the extension's [`PermissionContext`](canopy_types::PermissionContext)
//! before anything reaches the executor.
//!
//! The check is conservative. Statements that do not parse, statement kinds
//! the extractor does not model, table functions that can reach outside the
//! database, and names it cannot resolve are all denied.

mod decision;
mod extract;
mod handle;
mod reference;
mod validate;

pub use decision::{AccessMode, Decision, DenialReason};
pub use handle::ScopedQueryHandle;
pub use reference::TableRef;
pub use validate::validate;
