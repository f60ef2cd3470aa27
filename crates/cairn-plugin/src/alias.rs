use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

const MENTION_MARKER: char = '@';

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Per-repository substitution tables. Lookups are a single hop.
pub struct AliasOptions {
    #[serde(default)]
    pub cmds: BTreeMap<String, String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub users: BTreeMap<String, String>,
}

fn resolve(table: &BTreeMap<String, String>, key: &str) -> String {
    table
        .get(key)
        .cloned()
        .unwrap_or_else(|| key.to_string())
}

impl AliasOptions {
    pub fn resolve_command(&self, name: &str) -> String {
        resolve(&self.cmds, name)
    }

    pub fn resolve_label(&self, label: &str) -> String {
        resolve(&self.labels, label)
    }

    /// Strips every leading `@` before looking the handle up.
    pub fn resolve_user(&self, user: &str) -> String {
        let handle = user.trim_start_matches(MENTION_MARKER);
        resolve(&self.users, handle)
    }
}
