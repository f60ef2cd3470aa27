use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use cairn_client::Operation;
use cairn_events::Capability;
use cairn_plugin::{
    ArgumentMode, Invocation, PluginBase, PluginDeps, PluginOptions, Precondition, RuleHandlers,
};
use serde::{Deserialize, Serialize};

use crate::{comment_rule, rule_plugin, BuildResult};

pub const STATUS_PLUGIN_NAME: &str = "status";
const CMD_STATUS: &str = "status";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
/// `extra` block of the status plugin.
///
/// When `label_preconditions` is non-empty only its keys are accepted as
/// status values, each guarded by its own precondition alternatives.
pub struct StatusExtra {
    #[serde(default)]
    pub label_preconditions: BTreeMap<String, Vec<Precondition>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusHandler {
    Comment,
}

pub struct StatusHandlers {
    extra: StatusExtra,
}

pub(crate) fn build(deps: &PluginDeps, options: PluginOptions) -> BuildResult {
    let extra = options.decode_extra::<StatusExtra>()?;
    let rules = vec![comment_rule(StatusHandler::Comment)
        .requires([Capability::Body, Capability::Number])
        .argument_mode(ArgumentMode::Remainder)];
    Ok(rule_plugin(deps, options, rules, StatusHandlers { extra }))
}

impl StatusHandlers {
    /// Only the first status command that names a usable value acts.
    async fn handle_comment(&self, base: &PluginBase, invocation: &Invocation<'_>) -> Result<()> {
        let ctx = invocation.ctx;
        for command in invocation.commands_named(CMD_STATUS) {
            let Some(value) = command.first_arg() else {
                continue;
            };
            let value = base.alias().resolve_label(value);
            if !self.extra.label_preconditions.is_empty() {
                let Some(preconditions) = self.extra.label_preconditions.get(&value) else {
                    tracing::debug!(plugin = base.name(), value = value.as_str(), "status value not configured");
                    continue;
                };
                base.check_preconditions(ctx, preconditions)?;
            }

            let target = base.issue_ref(ctx)?;
            base.apply(
                ctx,
                Operation::ReplaceLabels {
                    target,
                    prefix: format!("{CMD_STATUS}/"),
                    labels: vec![format!("{CMD_STATUS}/{value}")],
                },
            )
            .await?;
            return Ok(());
        }
        Ok(())
    }
}

#[async_trait]
impl RuleHandlers for StatusHandlers {
    type Handler = StatusHandler;

    async fn handle(
        &self,
        base: &PluginBase,
        handler: StatusHandler,
        invocation: &Invocation<'_>,
    ) -> Result<()> {
        match handler {
            StatusHandler::Comment => self.handle_comment(base, invocation).await,
        }
    }
}
