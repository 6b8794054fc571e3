//! Administrator policy: reads `policy.toml` from the config directory and
//! enforces extension allowlists and table restrictions.

use canopy_types::{DEFAULT_SCHEMA, ExtensionId, PermissionContext, WILDCARD_GRANT};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{info, warn};

/// Policy mode over extension ids.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyMode {
    /// Only listed extensions may activate.
    Allowlist,
    /// Every extension except the listed ones may activate.
    Denylist,
    #[default]
    Unrestricted,
}

/// Policy configuration parsed from `policy.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default)]
    pub mode: PolicyMode,
    /// The allowlist or denylist, depending on `mode`.
    #[serde(default)]
    pub extension_ids: Vec<String>,
    /// Tables no extension may be granted, whatever its manifest says.
    #[serde(default)]
    pub denied_tables: HashSet<String>,
    /// Strip `"*"` grants from every manifest.
    #[serde(default)]
    pub forbid_wildcards: bool,
}

/// Enforces policy decisions.
#[derive(Debug)]
pub struct PolicyEngine {
    config: PolicyConfig,
    policy_path: Option<PathBuf>,
}

impl PolicyEngine {
    /// Loads policy from `<config dir>/canopy/policy.toml` if it exists.
    /// Falls back to unrestricted mode with a warning on parse errors.
    pub fn load() -> Self {
        Self::load_from(crate::config::config_dir().join("policy.toml"))
    }

    /// Loads policy from an explicit path.
    pub fn load_from(policy_path: PathBuf) -> Self {
        if !policy_path.exists() {
            info!(path = %policy_path.display(), "No policy file found, running unrestricted");
            return Self {
                config: PolicyConfig::default(),
                policy_path: None,
            };
        }

        let config = match std::fs::read_to_string(&policy_path) {
            Ok(contents) => match toml::from_str::<PolicyFile>(&contents) {
                Ok(file) => {
                    info!(path = %policy_path.display(), "Loaded extension policy");
                    file.into_config()
                }
                Err(e) => {
                    warn!(
                        path = %policy_path.display(),
                        error = %e,
                        "Failed to parse policy file, falling back to unrestricted mode"
                    );
                    PolicyConfig::default()
                }
            },
            Err(e) => {
                warn!(path = %policy_path.display(), error = %e, "Failed to read policy file");
                PolicyConfig::default()
            }
        };
        Self {
            config,
            policy_path: Some(policy_path),
        }
    }

    /// Creates a policy engine with explicit config.
    pub fn with_config(config: PolicyConfig) -> Self {
        Self {
            config,
            policy_path: None,
        }
    }

    pub fn unrestricted() -> Self {
        Self::with_config(PolicyConfig::default())
    }

    /// Check if an extension may activate.
    #[must_use]
    pub fn is_extension_allowed(&self, id: &ExtensionId) -> bool {
        let listed = self
            .config
            .extension_ids
            .iter()
            .any(|listed| listed == id.as_str());
        match self.config.mode {
            PolicyMode::Unrestricted => true,
            PolicyMode::Allowlist => listed,
            PolicyMode::Denylist => !listed,
        }
    }

    /// Removes grants the policy forbids. The private schema is untouched.
    ///
    /// While any table is denied, a wildcard grant would still reach it, so
    /// wildcards are stripped too.
    #[must_use]
    pub fn restrict(&self, mut context: PermissionContext) -> PermissionContext {
        let strip_wildcards = self.config.forbid_wildcards || !self.config.denied_tables.is_empty();
        let denied: HashSet<String> = self
            .config
            .denied_tables
            .iter()
            .map(|t| normalize_grant(t))
            .collect();

        for grants in [&mut context.allowed_reads, &mut context.allowed_writes] {
            let before = grants.len();
            grants.retain(|grant| {
                if grant == WILDCARD_GRANT {
                    !strip_wildcards
                } else {
                    !denied.contains(&normalize_grant(grant))
                }
            });
            if grants.len() != before {
                info!(
                    extension_id = %context.extension_id,
                    removed = before - grants.len(),
                    "Policy removed grants"
                );
            }
        }
        context
    }

    /// Returns whether a policy file was found.
    #[must_use]
    pub fn has_policy_file(&self) -> bool {
        self.policy_path.is_some()
    }

    #[must_use]
    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self::unrestricted()
    }
}

/// `Accounts` and `main.accounts` name the same table.
fn normalize_grant(grant: &str) -> String {
    let lower = grant.to_ascii_lowercase();
    match lower.split_once('.') {
        Some((schema, table)) if schema == DEFAULT_SCHEMA => table.to_string(),
        _ => lower,
    }
}

/// Raw TOML structure matching the policy.toml format.
#[derive(Deserialize)]
struct PolicyFile {
    #[serde(default)]
    policy: PolicySection,
}

#[derive(Deserialize, Default)]
struct PolicySection {
    #[serde(default)]
    mode: PolicyMode,
    #[serde(default)]
    extensions: ExtensionList,
    #[serde(default)]
    tables: TableRules,
}

#[derive(Deserialize, Default)]
struct ExtensionList {
    #[serde(default)]
    ids: Vec<String>,
}

#[derive(Deserialize, Default)]
struct TableRules {
    #[serde(default)]
    denied: Vec<String>,
    #[serde(default, rename = "forbid-wildcards")]
    forbid_wildcards: bool,
}

impl PolicyFile {
    fn into_config(self) -> PolicyConfig {
        PolicyConfig {
            mode: self.policy.mode,
            extension_ids: self.policy.extensions.ids,
            denied_tables: self.policy.tables.denied.into_iter().collect(),
            forbid_wildcards: self.policy.tables.forbid_wildcards,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_types::PrivateSchema;
    use pretty_assertions::assert_eq;

    fn id(s: &str) -> ExtensionId {
        ExtensionId::parse(s).unwrap()
    }

    fn context(reads: &[&str], writes: &[&str]) -> PermissionContext {
        PermissionContext::new(
            id("goals"),
            PrivateSchema::explicit("plugin_goals").unwrap(),
            reads.iter().map(|s| s.to_string()).collect(),
            writes.iter().map(|s| s.to_string()).collect(),
        )
    }

    /// Helper: write TOML content to a temp file and load via `load_from`.
    fn load_policy_from_str(toml_content: &str) -> PolicyEngine {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.toml");
        std::fs::write(&path, toml_content).unwrap();
        PolicyEngine::load_from(path)
    }

    #[test]
    fn unrestricted_allows_all() {
        let engine = PolicyEngine::unrestricted();
        assert!(engine.is_extension_allowed(&id("anything")));
        let ctx = context(&["*"], &["accounts"]);
        assert_eq!(engine.restrict(ctx.clone()), ctx);
    }

    #[test]
    fn allowlist_mode() {
        let engine = PolicyEngine::with_config(PolicyConfig {
            mode: PolicyMode::Allowlist,
            extension_ids: vec!["goals".to_string()],
            ..Default::default()
        });
        assert!(engine.is_extension_allowed(&id("goals")));
        assert!(!engine.is_extension_allowed(&id("evil")));
    }

    #[test]
    fn denylist_mode_blocks_listed_allows_others() {
        let engine = PolicyEngine::with_config(PolicyConfig {
            mode: PolicyMode::Denylist,
            extension_ids: vec!["evil".to_string()],
            ..Default::default()
        });
        assert!(!engine.is_extension_allowed(&id("evil")));
        assert!(engine.is_extension_allowed(&id("goals")));
    }

    #[test]
    fn denied_tables_match_main_qualified_grants() {
        let engine = PolicyEngine::with_config(PolicyConfig {
            denied_tables: ["Accounts".to_string()].into_iter().collect(),
            ..Default::default()
        });
        let ctx = engine.restrict(context(&["main.accounts", "transactions", "*"], &["accounts"]));
        assert_eq!(ctx.allowed_reads, vec!["transactions".to_string()]);
        assert!(ctx.allowed_writes.is_empty());
        assert_eq!(ctx.private_schema.as_str(), "plugin_goals");
    }

    #[test]
    fn forbid_wildcards_strips_only_wildcards() {
        let engine = PolicyEngine::with_config(PolicyConfig {
            forbid_wildcards: true,
            ..Default::default()
        });
        let ctx = engine.restrict(context(&["*", "accounts"], &["*"]));
        assert_eq!(ctx.allowed_reads, vec!["accounts".to_string()]);
        assert!(ctx.allowed_writes.is_empty());
    }

    #[test]
    fn parse_policy_toml() {
        let toml_str = r#"
[policy]
mode = "allowlist"

[policy.extensions]
ids = ["goals", "budget"]

[policy.tables]
denied = ["accounts"]
forbid-wildcards = true
"#;
        let file: PolicyFile = toml::from_str(toml_str).unwrap();
        let config = file.into_config();

        assert_eq!(config.mode, PolicyMode::Allowlist);
        assert_eq!(config.extension_ids.len(), 2);
        assert!(config.denied_tables.contains("accounts"));
        assert!(config.forbid_wildcards);
    }

    // ================================================================
    // load() fallback
    // ================================================================

    #[test]
    fn load_from_missing_file_is_unrestricted() {
        let dir = tempfile::tempdir().unwrap();
        let engine = PolicyEngine::load_from(dir.path().join("nonexistent.toml"));
        assert!(!engine.has_policy_file());
        assert!(engine.is_extension_allowed(&id("anything")));
    }

    #[test]
    fn load_from_denylist_file() {
        let engine = load_policy_from_str(
            r#"
[policy]
mode = "denylist"

[policy.extensions]
ids = ["blocked"]
"#,
        );
        assert!(engine.has_policy_file());
        assert_eq!(engine.config().mode, PolicyMode::Denylist);
        assert!(!engine.is_extension_allowed(&id("blocked")));
        assert!(engine.is_extension_allowed(&id("anything.else")));
    }

    #[test]
    fn empty_files_default_to_unrestricted() {
        for contents in ["", "[policy]\n"] {
            let engine = load_policy_from_str(contents);
            assert!(engine.has_policy_file());
            assert_eq!(engine.config().mode, PolicyMode::Unrestricted);
            assert!(engine.config().extension_ids.is_empty());
        }
    }

    #[test]
    fn load_from_malformed_file_falls_back_unrestricted() {
        let engine = load_policy_from_str("this is not valid toml {{{{");
        assert!(engine.has_policy_file());
        assert!(engine.is_extension_allowed(&id("anything")));
    }

    #[test]
    fn load_from_unreadable_path_falls_back_unrestricted() {
        // A directory exists but cannot be read as a file.
        let dir = tempfile::tempdir().unwrap();
        let engine = PolicyEngine::load_from(dir.path().to_path_buf());
        assert!(engine.is_extension_allowed(&id("anything")));
    }
}
