use std::{collections::BTreeMap, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use cairn_events::RepoSlug;
use cairn_plugin::{EventRouter, PluginDeps, PluginRegistry, RepoConfig, RepoPluginMap};
use tokio::task::JoinHandle;

use crate::ServiceConfig;

/// Rebuilds the plugin map whenever the resolved repository configs change.
pub struct RepoConfigWatcher {
    config: ServiceConfig,
    registry: PluginRegistry,
    deps: PluginDeps,
    router: Arc<EventRouter>,
    applied: BTreeMap<RepoSlug, RepoConfig>,
}

impl RepoConfigWatcher {
    pub fn new(
        config: ServiceConfig,
        registry: PluginRegistry,
        deps: PluginDeps,
        router: Arc<EventRouter>,
        applied: BTreeMap<RepoSlug, RepoConfig>,
    ) -> Self {
        Self {
            config,
            registry,
            deps,
            router,
            applied,
        }
    }

    /// Returns `Ok(true)` when a new map was swapped in. On error the live
    /// map is left untouched.
    pub async fn poll_once(&mut self) -> Result<bool> {
        let next = self.config.resolve_repo_configs()?;
        if next == self.applied {
            return Ok(false);
        }
        let plugins = RepoPluginMap::build(&self.registry, &self.deps, &next)
            .context("failed to build repository plugins")?;
        self.router.replace_plugins(plugins).await;
        self.applied = next;
        Ok(true)
    }
}

pub fn spawn_reload_worker(mut watcher: RepoConfigWatcher, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            match watcher.poll_once().await {
                Ok(true) => {
                    tracing::info!(repos = watcher.applied.len(), "repository configs reloaded")
                }
                Ok(false) => {}
                Err(error) => {
                    tracing::error!(error = %format!("{error:#}"), "repository config reload failed")
                }
            }
        }
    })
}
