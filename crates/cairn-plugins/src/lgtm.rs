use anyhow::Result;
use async_trait::async_trait;
use cairn_client::Operation;
use cairn_events::{
    Capability, EventKind, ACTION_SUBMITTED, ACTION_SYNCHRONIZE, REVIEW_STATE_APPROVED,
};
use cairn_plugin::{
    ArgumentMode, HandlerRule, Invocation, PluginBase, PluginDeps, PluginOptions, RuleHandlers,
};
use serde::{Deserialize, Serialize};

use crate::{comment_rule, rule_plugin, BuildResult};

pub const LGTM_PLUGIN_NAME: &str = "lgtm";
const CMD_LGTM: &str = "lgtm";
const DEFAULT_BASE_LABEL_PREFIX: &str = "module";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Members of `role` on a base label earn `<target_prefix>/<sub>`.
pub struct TargetLabel {
    pub role: String,
    pub target_prefix: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LgtmExtra {
    #[serde(default)]
    pub base_label_prefix: String,
    #[serde(default)]
    pub target_labels: Vec<TargetLabel>,
}

impl LgtmExtra {
    fn complete(mut self) -> Self {
        if self.base_label_prefix.trim().is_empty() {
            self.base_label_prefix = DEFAULT_BASE_LABEL_PREFIX.to_string();
        }
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LgtmHandler {
    ReviewSubmitted,
    Synchronize,
    Comment,
}

pub struct LgtmHandlers {
    extra: LgtmExtra,
}

pub(crate) fn build(deps: &PluginDeps, options: PluginOptions) -> BuildResult {
    let extra = options.decode_extra::<LgtmExtra>()?.complete();
    let rules = vec![
        HandlerRule::new(LgtmHandler::ReviewSubmitted)
            .events([EventKind::PullRequestReview])
            .actions([ACTION_SUBMITTED])
            .requires([
                Capability::Number,
                Capability::SenderUser,
                Capability::ReviewState,
                Capability::Labels,
            ]),
        HandlerRule::new(LgtmHandler::Synchronize)
            .events([EventKind::PullRequest])
            .actions([ACTION_SYNCHRONIZE])
            .requires([Capability::Number]),
        comment_rule(LgtmHandler::Comment)
            .requires([
                Capability::Body,
                Capability::Number,
                Capability::Labels,
                Capability::CommentAuthor,
            ])
            .argument_mode(ArgumentMode::Remainder),
    ];
    Ok(rule_plugin(deps, options, rules, LgtmHandlers { extra }))
}

impl LgtmHandlers {
    /// Target labels `user` earns from the base labels currently present.
    fn earned_labels(&self, base: &PluginBase, labels: &[String], user: &str) -> Vec<String> {
        let mut earned = Vec::new();
        for label in labels {
            // Only the first segment after the base prefix names the target.
            let mut segments = label.split('/');
            let (Some(prefix), Some(sub)) = (segments.next(), segments.next()) else {
                continue;
            };
            if prefix != self.extra.base_label_prefix {
                continue;
            }
            let Some(roles) = base.label_roles().get(label) else {
                continue;
            };
            for target in &self.extra.target_labels {
                let listed = roles
                    .get(&target.role)
                    .is_some_and(|members| members.iter().any(|member| member == user));
                if listed {
                    earned.push(format!("{}/{sub}", target.target_prefix));
                }
            }
        }
        earned
    }

    async fn approve(&self, base: &PluginBase, invocation: &Invocation<'_>, user: &str) -> Result<()> {
        if base.label_roles().is_empty() || self.extra.target_labels.is_empty() {
            return Ok(());
        }
        let ctx = invocation.ctx;
        let labels = ctx.object.labels().unwrap_or_default();
        let earned = self.earned_labels(base, labels, user);
        if earned.is_empty() {
            tracing::debug!(plugin = base.name(), user, "no target labels earned");
            return Ok(());
        }
        let target = base.issue_ref(ctx)?;
        base.apply(
            ctx,
            Operation::AddLabels {
                target,
                labels: earned,
            },
        )
        .await
    }

    async fn handle_review(&self, base: &PluginBase, invocation: &Invocation<'_>) -> Result<()> {
        let object = &invocation.ctx.object;
        if object.review_state() != Some(REVIEW_STATE_APPROVED) {
            return Ok(());
        }
        let reviewer = object.sender_user().unwrap_or_default();
        self.approve(base, invocation, reviewer).await
    }

    /// New commits invalidate every earned approval label.
    async fn handle_synchronize(&self, base: &PluginBase, invocation: &Invocation<'_>) -> Result<()> {
        let ctx = invocation.ctx;
        let target = base.issue_ref(ctx)?;
        for label in &self.extra.target_labels {
            base.apply(
                ctx,
                Operation::ReplaceLabels {
                    target: target.clone(),
                    prefix: format!("{}/", label.target_prefix),
                    labels: Vec::new(),
                },
            )
            .await?;
        }
        Ok(())
    }

    async fn handle_comment(&self, base: &PluginBase, invocation: &Invocation<'_>) -> Result<()> {
        if invocation.commands_named(CMD_LGTM).next().is_none() {
            return Ok(());
        }
        let author = invocation.ctx.object.comment_author().unwrap_or_default();
        self.approve(base, invocation, author).await
    }
}

#[async_trait]
impl RuleHandlers for LgtmHandlers {
    type Handler = LgtmHandler;

    async fn handle(
        &self,
        base: &PluginBase,
        handler: LgtmHandler,
        invocation: &Invocation<'_>,
    ) -> Result<()> {
        match handler {
            LgtmHandler::ReviewSubmitted => self.handle_review(base, invocation).await,
            LgtmHandler::Synchronize => self.handle_synchronize(base, invocation).await,
            LgtmHandler::Comment => self.handle_comment(base, invocation).await,
        }
    }
}
