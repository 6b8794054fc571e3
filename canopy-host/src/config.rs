//! Host configuration, read from `canopy.toml`.

use canopy_types::ExtensionId;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Name of the host config file inside the config directory.
pub const CONFIG_FILE: &str = "canopy.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    /// Root for host-owned data, including bundled extensions' files.
    pub data_dir: PathBuf,
    /// Directory scanned for installed extensions.
    pub extensions_dir: PathBuf,
    pub database_path: PathBuf,
    /// Extensions that are discovered but not activated at startup.
    pub disabled_extensions: Vec<String>,
    pub hot_reload: bool,
    pub watch_debounce_ms: u64,
    pub log_filter: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self::with_data_dir(default_data_dir())
    }
}

impl HostConfig {
    /// Defaults rooted at `data_dir`.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            extensions_dir: data_dir.join("extensions"),
            database_path: data_dir.join("canopy.duckdb"),
            data_dir,
            disabled_extensions: Vec::new(),
            hot_reload: true,
            watch_debounce_ms: 500,
            log_filter: "info".to_string(),
        }
    }

    /// Loads `<config dir>/canopy/canopy.toml`, or defaults.
    pub fn load() -> Self {
        Self::load_from(&config_dir().join(CONFIG_FILE))
    }

    /// Loads config from an explicit path. A missing or malformed file
    /// yields defaults.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            info!(path = %path.display(), "No host config found, using defaults");
            return Self::default();
        }
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::parse(&contents).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "Failed to parse host config, using defaults");
                Self::default()
            }),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read host config, using defaults");
                Self::default()
            }
        }
    }

    /// Parses TOML. Paths left out follow `data_dir` when it is given.
    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        let raw: RawConfig = toml::from_str(contents)?;
        let mut config = Self::with_data_dir(raw.data_dir.unwrap_or_else(default_data_dir));
        if let Some(dir) = raw.extensions_dir {
            config.extensions_dir = dir;
        }
        if let Some(path) = raw.database_path {
            config.database_path = path;
        }
        if let Some(disabled) = raw.disabled_extensions {
            config.disabled_extensions = disabled;
        }
        if let Some(hot_reload) = raw.hot_reload {
            config.hot_reload = hot_reload;
        }
        if let Some(ms) = raw.watch_debounce_ms {
            config.watch_debounce_ms = ms;
        }
        if let Some(filter) = raw.log_filter {
            config.log_filter = filter;
        }
        Ok(config)
    }

    #[must_use]
    pub fn watch_debounce(&self) -> Duration {
        Duration::from_millis(self.watch_debounce_ms)
    }

    /// Disabled ids that parse. Invalid entries are logged and ignored.
    #[must_use]
    pub fn disabled_ids(&self) -> Vec<ExtensionId> {
        self.disabled_extensions
            .iter()
            .filter_map(|raw| match ExtensionId::parse(raw) {
                Ok(id) => Some(id),
                Err(e) => {
                    warn!(entry = %raw, error = %e, "Ignoring invalid disabled extension id");
                    None
                }
            })
            .collect()
    }

    /// Parent of the per-extension file directories of bundled extensions.
    #[must_use]
    pub fn extension_data_dir(&self) -> PathBuf {
        self.data_dir.join("extension-data")
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawConfig {
    data_dir: Option<PathBuf>,
    extensions_dir: Option<PathBuf>,
    database_path: Option<PathBuf>,
    disabled_extensions: Option<Vec<String>>,
    hot_reload: Option<bool>,
    watch_debounce_ms: Option<u64>,
    log_filter: Option<String>,
}

/// `<config dir>/canopy`, falling back to the working directory.
pub(crate) fn config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("canopy"))
        .unwrap_or_else(|| PathBuf::from(".canopy"))
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("canopy"))
        .unwrap_or_else(|| PathBuf::from(".canopy"))
}
