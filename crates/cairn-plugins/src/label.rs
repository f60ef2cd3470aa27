use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use cairn_client::Operation;
use cairn_events::Capability;
use cairn_plugin::{Invocation, PluginBase, PluginDeps, PluginOptions, Precondition, RuleHandlers};
use serde::{Deserialize, Serialize};

use crate::{comment_rule, rule_plugin, BuildResult};

pub const LABEL_PLUGIN_NAME: &str = "label";
const REMOVE_COMMAND_PREFIX: &str = "remove-";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Labels of one kind (`/<kind> <label>` adds `<kind>/<label>`).
pub struct LabelKindOptions {
    #[serde(default)]
    pub add_preconditions: Vec<Precondition>,
    #[serde(default)]
    pub remove_preconditions: Vec<Precondition>,
    #[serde(default)]
    pub labels: Vec<String>,
}

impl LabelKindOptions {
    fn allows(&self, label: &str) -> bool {
        self.labels.iter().any(|candidate| candidate == label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelHandler {
    Comment,
}

pub struct LabelHandlers {
    kinds: BTreeMap<String, LabelKindOptions>,
}

pub(crate) fn build(deps: &PluginDeps, options: PluginOptions) -> BuildResult {
    let kinds = options.decode_extra::<BTreeMap<String, LabelKindOptions>>()?;
    let rules = vec![comment_rule(LabelHandler::Comment).requires([
        Capability::Body,
        Capability::Number,
        Capability::Labels,
    ])];
    Ok(rule_plugin(deps, options, rules, LabelHandlers { kinds }))
}

impl LabelHandlers {
    async fn handle_comment(&self, base: &PluginBase, invocation: &Invocation<'_>) -> Result<()> {
        let ctx = invocation.ctx;
        for command in &invocation.commands {
            let Some(arg) = command.first_arg() else {
                continue;
            };
            let label = base.alias().resolve_label(arg);

            if let Some(kind) = self.kinds.get(&command.name) {
                if kind.allows(&label) {
                    base.check_preconditions(ctx, &kind.add_preconditions)?;
                    let target = base.issue_ref(ctx)?;
                    base.apply(
                        ctx,
                        Operation::AddLabels {
                            target,
                            labels: vec![format!("{}/{label}", command.name)],
                        },
                    )
                    .await?;
                }
            }

            if let Some(kind_name) = command.name.strip_prefix(REMOVE_COMMAND_PREFIX) {
                let Some(kind) = self.kinds.get(kind_name) else {
                    continue;
                };
                if kind.allows(&label) {
                    base.check_preconditions(ctx, &kind.remove_preconditions)?;
                    let target = base.issue_ref(ctx)?;
                    base.apply(
                        ctx,
                        Operation::RemoveLabel {
                            target,
                            label: format!("{kind_name}/{label}"),
                        },
                    )
                    .await?;
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl RuleHandlers for LabelHandlers {
    type Handler = LabelHandler;

    async fn handle(
        &self,
        base: &PluginBase,
        handler: LabelHandler,
        invocation: &Invocation<'_>,
    ) -> Result<()> {
        match handler {
            LabelHandler::Comment => self.handle_comment(base, invocation).await,
        }
    }
}
