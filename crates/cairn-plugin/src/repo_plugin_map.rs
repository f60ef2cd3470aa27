use std::{collections::BTreeMap, sync::Arc};

use cairn_events::RepoSlug;

use crate::{Plugin, PluginBuildError, PluginDeps, PluginOptions, PluginRegistry, RepoConfig};

#[derive(Clone, Default)]
/// `owner/repo` to the ordered plugin instances active for it.
pub struct RepoPluginMap {
    repos: BTreeMap<RepoSlug, Vec<Arc<dyn Plugin>>>,
}

impl RepoPluginMap {
    /// Instantiates every enabled plugin of every repository.
    ///
    /// Fails on the first plugin that cannot be built; nothing is started.
    /// Repositories left without an enabled plugin get no entry.
    pub fn build(
        registry: &PluginRegistry,
        deps: &PluginDeps,
        configs: &BTreeMap<RepoSlug, RepoConfig>,
    ) -> Result<Self, PluginBuildError> {
        let mut repos = BTreeMap::new();
        for (slug, config) in configs {
            let mut plugins = Vec::new();
            for (name, plugin_config) in &config.plugins {
                if !plugin_config.is_enabled() {
                    tracing::debug!(repo = %slug, plugin = name.as_str(), "plugin disabled");
                    continue;
                }
                let options = PluginOptions {
                    plugin: name.clone(),
                    repo: slug.clone(),
                    alias: config.alias.clone(),
                    roles: config.roles.clone(),
                    label_roles: config.label_roles.clone(),
                    preconditions: plugin_config.preconditions.clone(),
                    extra: plugin_config.extra.clone(),
                };
                let plugin = registry.create(deps, options)?;
                tracing::debug!(repo = %slug, plugin = name.as_str(), "plugin built");
                plugins.push(plugin);
            }
            if plugins.is_empty() {
                tracing::debug!(repo = %slug, "no enabled plugins, repository skipped");
                continue;
            }
            repos.insert(slug.clone(), plugins);
        }
        Ok(Self { repos })
    }

    pub fn from_plugins(repos: BTreeMap<RepoSlug, Vec<Arc<dyn Plugin>>>) -> Self {
        Self { repos }
    }

    pub fn get(&self, repo: &RepoSlug) -> Option<&[Arc<dyn Plugin>]> {
        self.repos.get(repo).map(Vec::as_slice)
    }

    pub fn repos(&self) -> impl Iterator<Item = &RepoSlug> {
        self.repos.keys()
    }

    pub fn len(&self) -> usize {
        self.repos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repos.is_empty()
    }

    pub fn plugin_count(&self) -> usize {
        self.repos.values().map(Vec::len).sum()
    }

    pub fn start_all(&self) {
        for plugin in self.repos.values().flatten() {
            plugin.start();
        }
    }

    pub fn stop_all(&self) {
        for plugin in self.repos.values().flatten() {
            plugin.stop();
        }
    }
}
