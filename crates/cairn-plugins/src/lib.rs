//! Built-in Cairn plugins.
//!
//! Each plugin is a [`RulePlugin`](cairn_plugin::RulePlugin) over its own
//! handler set; [`register_builtin_plugins`] makes all of them available to
//! repository configurations by name.

mod assign;
mod label;
mod lgtm;
mod lifecycle;
mod merge;
mod module;
mod notify;
mod status;
mod trigger;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use cairn_events::{EventKind, ACTION_CREATED};
use cairn_plugin::{
    HandlerRule, Plugin, PluginBase, PluginBuildError, PluginDeps, PluginOptions, PluginRegistry,
    RuleHandlers, RulePlugin,
};

pub use assign::{AssignHandlers, ASSIGN_PLUGIN_NAME};
pub use label::{LabelHandlers, LabelKindOptions, LABEL_PLUGIN_NAME};
pub use lgtm::{LgtmExtra, LgtmHandlers, TargetLabel, LGTM_PLUGIN_NAME};
pub use lifecycle::{LifecycleHandlers, LIFECYCLE_PLUGIN_NAME};
pub use merge::{MergeHandlers, MERGE_PLUGIN_NAME};
pub use module::{ModuleExtra, ModuleHandlers, MODULE_PLUGIN_NAME};
pub use notify::{
    CrontabOption, EventNotifyConf, NotifyExtra, NotifyHandlers, PingOption,
    NOTIFY_PLUGIN_NAME, WAIT_REVIEW_PULL_REQUEST,
};
pub use status::{StatusExtra, StatusHandlers, STATUS_PLUGIN_NAME};
pub use trigger::{EventInfo, Executor, TriggerExtra, TriggerHandlers, TRIGGER_PLUGIN_NAME};

/// Event kinds whose body may carry slash commands.
pub(crate) const COMMENT_EVENTS: [EventKind; 3] = [
    EventKind::IssueComment,
    EventKind::PullRequest,
    EventKind::PullRequestReviewComment,
];

/// Only newly created comments act; pull request descriptions never do.
pub(crate) const COMMENT_ACTIONS: [&str; 1] = [ACTION_CREATED];

pub(crate) fn comment_rule<H>(handler: H) -> HandlerRule<H> {
    HandlerRule::new(handler)
        .events(COMMENT_EVENTS)
        .actions(COMMENT_ACTIONS)
}

pub(crate) fn rule_plugin<R: RuleHandlers>(
    deps: &PluginDeps,
    options: PluginOptions,
    rules: Vec<HandlerRule<R::Handler>>,
    handlers: R,
) -> Arc<dyn Plugin> {
    Arc::new(RulePlugin::new(
        PluginBase::new(deps, options),
        rules,
        handlers,
    ))
}

/// Registers every built-in plugin constructor under its plugin name.
pub fn register_builtin_plugins(registry: &mut PluginRegistry) {
    registry.register(ASSIGN_PLUGIN_NAME, assign::build);
    registry.register(LABEL_PLUGIN_NAME, label::build);
    registry.register(LGTM_PLUGIN_NAME, lgtm::build);
    registry.register(LIFECYCLE_PLUGIN_NAME, lifecycle::build);
    registry.register(MERGE_PLUGIN_NAME, merge::build);
    registry.register(MODULE_PLUGIN_NAME, module::build);
    registry.register(NOTIFY_PLUGIN_NAME, notify::build);
    registry.register(STATUS_PLUGIN_NAME, status::build);
    registry.register(TRIGGER_PLUGIN_NAME, trigger::build);
}

/// Registry pre-populated with [`register_builtin_plugins`].
pub fn builtin_registry() -> PluginRegistry {
    let mut registry = PluginRegistry::new();
    register_builtin_plugins(&mut registry);
    registry
}

pub(crate) type BuildResult = Result<Arc<dyn Plugin>, PluginBuildError>;
