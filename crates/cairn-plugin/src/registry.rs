use std::{collections::BTreeMap, sync::Arc};

use crate::{Plugin, PluginBuildError, PluginDeps, PluginOptions};

/// Builds one plugin instance from shared collaborators and resolved options.
pub type PluginConstructor =
    Arc<dyn Fn(&PluginDeps, PluginOptions) -> Result<Arc<dyn Plugin>, PluginBuildError> + Send + Sync>;

#[derive(Clone, Default)]
/// Plugin name to constructor. Populated before serving, read-only afterwards.
pub struct PluginRegistry {
    constructors: BTreeMap<String, PluginConstructor>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `constructor` under `name`, replacing any earlier entry.
    pub fn register<F>(&mut self, name: &str, constructor: F)
    where
        F: Fn(&PluginDeps, PluginOptions) -> Result<Arc<dyn Plugin>, PluginBuildError>
            + Send
            + Sync
            + 'static,
    {
        self.constructors
            .insert(name.to_string(), Arc::new(constructor));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    pub fn create(
        &self,
        deps: &PluginDeps,
        options: PluginOptions,
    ) -> Result<Arc<dyn Plugin>, PluginBuildError> {
        let Some(constructor) = self.constructors.get(&options.plugin) else {
            return Err(PluginBuildError::NotRegistered(options.plugin));
        };
        constructor(deps, options)
    }
}
