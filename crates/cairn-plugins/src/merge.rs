use anyhow::{bail, Result};
use async_trait::async_trait;
use cairn_client::Operation;
use cairn_events::Capability;
use cairn_plugin::{Invocation, PluginBase, PluginDeps, PluginOptions, RuleHandlers};

use crate::{comment_rule, rule_plugin, BuildResult};

pub const MERGE_PLUGIN_NAME: &str = "merge";
const CMD_MERGE: &str = "merge";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeHandler {
    Comment,
}

pub struct MergeHandlers;

pub(crate) fn build(deps: &PluginDeps, options: PluginOptions) -> BuildResult {
    let rules = vec![comment_rule(MergeHandler::Comment).requires([
        Capability::Body,
        Capability::Number,
        Capability::Labels,
    ])];
    Ok(rule_plugin(deps, options, rules, MergeHandlers))
}

impl MergeHandlers {
    async fn handle_comment(&self, base: &PluginBase, invocation: &Invocation<'_>) -> Result<()> {
        if invocation.commands_named(CMD_MERGE).next().is_none() {
            return Ok(());
        }
        let ctx = invocation.ctx;
        let target = base.issue_ref(ctx)?;
        let mergeable = ctx
            .cancellation
            .run(base.client().check_mergeable(&target))
            .await??;
        if !mergeable {
            bail!("[{}] pull request {target} not mergeable", base.name());
        }
        base.apply(ctx, Operation::Merge { target }).await
    }
}

#[async_trait]
impl RuleHandlers for MergeHandlers {
    type Handler = MergeHandler;

    async fn handle(
        &self,
        base: &PluginBase,
        handler: MergeHandler,
        invocation: &Invocation<'_>,
    ) -> Result<()> {
        match handler {
            MergeHandler::Comment => self.handle_comment(base, invocation).await,
        }
    }
}
