use anyhow::Result;
use async_trait::async_trait;
use cairn_client::Operation;
use cairn_events::Capability;
use cairn_plugin::{Invocation, PluginBase, PluginDeps, PluginOptions, RuleHandlers};

use crate::{comment_rule, rule_plugin, BuildResult};

pub const LIFECYCLE_PLUGIN_NAME: &str = "lifecycle";
const CMD_CLOSE: &str = "close";
const CMD_REOPEN: &str = "reopen";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleHandler {
    Comment,
}

pub struct LifecycleHandlers;

pub(crate) fn build(deps: &PluginDeps, options: PluginOptions) -> BuildResult {
    let rules = vec![comment_rule(LifecycleHandler::Comment)
        .requires([Capability::Body, Capability::Number])];
    Ok(rule_plugin(deps, options, rules, LifecycleHandlers))
}

impl LifecycleHandlers {
    /// The first `/close` or `/reopen` wins.
    async fn handle_comment(&self, base: &PluginBase, invocation: &Invocation<'_>) -> Result<()> {
        let ctx = invocation.ctx;
        for command in &invocation.commands {
            let operation = match command.name.as_str() {
                CMD_CLOSE => Operation::Close {
                    target: base.issue_ref(ctx)?,
                },
                CMD_REOPEN => Operation::Reopen {
                    target: base.issue_ref(ctx)?,
                },
                _ => continue,
            };
            return base.apply(ctx, operation).await;
        }
        Ok(())
    }
}

#[async_trait]
impl RuleHandlers for LifecycleHandlers {
    type Handler = LifecycleHandler;

    async fn handle(
        &self,
        base: &PluginBase,
        handler: LifecycleHandler,
        invocation: &Invocation<'_>,
    ) -> Result<()> {
        match handler {
            LifecycleHandler::Comment => self.handle_comment(base, invocation).await,
        }
    }
}
