use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{AliasOptions, LabelRoles, Precondition, RoleOptions};

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// One plugin entry of a repository configuration.
pub struct PluginConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Legacy switch; `disable: true` wins over `enabled`.
    #[serde(default)]
    pub disable: bool,
    #[serde(default)]
    pub preconditions: Vec<Precondition>,
    #[serde(default)]
    pub extra: serde_json::Value,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            disable: false,
            preconditions: Vec::new(),
            extra: serde_json::Value::Null,
        }
    }
}

impl PluginConfig {
    pub fn is_enabled(&self) -> bool {
        self.enabled && !self.disable
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
/// Configuration of one `owner/repo`.
pub struct RepoConfig {
    #[serde(default)]
    pub alias: AliasOptions,
    #[serde(default)]
    pub roles: RoleOptions,
    #[serde(default)]
    pub label_roles: LabelRoles,
    /// Plugins run in name order.
    #[serde(default)]
    pub plugins: BTreeMap<String, PluginConfig>,
}
