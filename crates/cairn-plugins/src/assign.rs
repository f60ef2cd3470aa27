use anyhow::{bail, Result};
use async_trait::async_trait;
use cairn_client::{IssueRef, Operation};
use cairn_events::Capability;
use cairn_plugin::{Invocation, PluginBase, PluginDeps, PluginOptions, RuleHandlers};

use crate::{comment_rule, rule_plugin, BuildResult};

pub const ASSIGN_PLUGIN_NAME: &str = "assign";
const CMD_CC: &str = "cc";
const CMD_UNCC: &str = "uncc";
const CMD_ASSIGN: &str = "assign";
const CMD_UNASSIGN: &str = "unassign";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignHandler {
    Comment,
}

pub struct AssignHandlers;

pub(crate) fn build(deps: &PluginDeps, options: PluginOptions) -> BuildResult {
    let rules = vec![comment_rule(AssignHandler::Comment)
        .requires([Capability::Body, Capability::Number])];
    Ok(rule_plugin(deps, options, rules, AssignHandlers))
}

#[derive(Default)]
struct RequestedUsers {
    cc: Vec<String>,
    uncc: Vec<String>,
    assign: Vec<String>,
    unassign: Vec<String>,
}

impl RequestedUsers {
    fn into_operations(self, target: &IssueRef) -> Vec<Operation> {
        let mut operations = Vec::new();
        if !self.cc.is_empty() {
            operations.push(Operation::RequestReviews {
                target: target.clone(),
                reviewers: self.cc,
            });
        }
        if !self.uncc.is_empty() {
            operations.push(Operation::CancelReviewRequests {
                target: target.clone(),
                reviewers: self.uncc,
            });
        }
        if !self.assign.is_empty() {
            operations.push(Operation::AddAssignees {
                target: target.clone(),
                assignees: self.assign,
            });
        }
        if !self.unassign.is_empty() {
            operations.push(Operation::RemoveAssignees {
                target: target.clone(),
                assignees: self.unassign,
            });
        }
        operations
    }
}

impl AssignHandlers {
    /// Issues one operation per verb; every operation is attempted.
    async fn handle_comment(&self, base: &PluginBase, invocation: &Invocation<'_>) -> Result<()> {
        let ctx = invocation.ctx;
        let mut requested = RequestedUsers::default();
        for command in &invocation.commands {
            let bucket = match command.name.as_str() {
                CMD_CC => &mut requested.cc,
                CMD_UNCC => &mut requested.uncc,
                CMD_ASSIGN => &mut requested.assign,
                CMD_UNASSIGN => &mut requested.unassign,
                _ => continue,
            };
            bucket.extend(command.args.iter().map(|user| base.alias().resolve_user(user)));
        }

        let target = base.issue_ref(ctx)?;
        let mut failures = Vec::new();
        for operation in requested.into_operations(&target) {
            let name = operation.name();
            if let Err(error) = base.apply(ctx, operation).await {
                tracing::warn!(plugin = base.name(), operation = name, error = %error, "operation failed");
                failures.push(format!("{error:#}"));
            }
        }
        if !failures.is_empty() {
            bail!("{}", failures.join("; "));
        }
        Ok(())
    }
}

#[async_trait]
impl RuleHandlers for AssignHandlers {
    type Handler = AssignHandler;

    async fn handle(
        &self,
        base: &PluginBase,
        handler: AssignHandler,
        invocation: &Invocation<'_>,
    ) -> Result<()> {
        match handler {
            AssignHandler::Comment => self.handle_comment(base, invocation).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use cairn_client::{IssueRef, Operation, RecordingMutationClient};
    use serde_json::json;

    use super::{build, ASSIGN_PLUGIN_NAME};
    use crate::test_support::{comment_context, strings, Harness, NUMBER, OWNER, REPO};

    #[tokio::test]
    async fn functional_cc_resolves_user_aliases_and_mentions() {
        let harness = Harness::new();
        let mut options = harness.options(ASSIGN_PLUGIN_NAME, json!(null));
        options.alias.users.insert("al".to_string(), "alice".to_string());
        let plugin = harness.build(build, options);

        plugin
            .dispatch(&comment_context("/cc @al bob", "carol", &[]))
            .await
            .expect("dispatch");

        assert_eq!(
            harness.client.operations(),
            vec![Operation::RequestReviews {
                target: IssueRef::new(OWNER, REPO, NUMBER),
                reviewers: strings(&["alice", "bob"]),
            }]
        );
    }

    #[tokio::test]
    async fn functional_every_verb_aggregates_users_into_one_operation() {
        let harness = Harness::new();
        let plugin = harness.build(build, harness.options(ASSIGN_PLUGIN_NAME, json!(null)));

        plugin
            .dispatch(&comment_context(
                "/assign @alice\n/unassign dave\n/assign bob\n/uncc erin",
                "carol",
                &[],
            ))
            .await
            .expect("dispatch");

        let names = harness
            .client
            .operations()
            .iter()
            .map(Operation::name)
            .collect::<Vec<_>>();
        assert_eq!(
            names,
            vec!["cancel_review_requests", "add_assignees", "remove_assignees"]
        );
        assert!(matches!(
            &harness.client.operations()[1],
            Operation::AddAssignees { assignees, .. } if assignees == &strings(&["alice", "bob"])
        ));
    }

    #[tokio::test]
    async fn regression_failed_operation_does_not_stop_later_ones() {
        let harness = Harness::with_client(
            RecordingMutationClient::new().failing_operation("request_reviews", "boom"),
        );
        let plugin = harness.build(build, harness.options(ASSIGN_PLUGIN_NAME, json!(null)));

        let error = plugin
            .dispatch(&comment_context("/cc bob\n/assign bob", "carol", &[]))
            .await
            .expect_err("cc fails");

        assert!(error.to_string().contains("request_reviews on fatedier/frp#4 failed: boom"));
        assert_eq!(harness.client.operations().len(), 1);
        assert_eq!(harness.client.operations()[0].name(), "add_assignees");
    }
}
