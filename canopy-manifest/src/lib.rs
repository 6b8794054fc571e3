//! Extension manifests.
//!
//! A manifest declares who an extension is, which tables outside its private
//! schema it may read or write, and the ordered migrations that build its
//! private schema. Bundled extensions hand their manifests to the
//! [`ManifestStore`] in-process; installed ones are found by [`discover`].

mod discovery;
mod error;
mod manifest;
mod store;

pub use discovery::{DiscoveredExtension, MANIFEST_FILE, discover, load_extension_dir};
pub use error::{ManifestError, ManifestResult};
pub use manifest::{ExtensionManifest, ManifestPermissions, Migration};
pub use store::{ExtensionSource, ManifestEntry, ManifestStore};
