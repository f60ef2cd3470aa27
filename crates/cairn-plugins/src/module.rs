use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Context, Result};
use async_trait::async_trait;
use cairn_client::{IssueRef, Operation};
use cairn_events::{Capability, EventKind, ACTION_OPENED, ACTION_REOPENED, ACTION_SYNCHRONIZE};
use cairn_plugin::{HandlerRule, Invocation, LabelRoles, PluginBase, PluginDeps, PluginOptions, RuleHandlers};
use serde::{Deserialize, Serialize};

use crate::{rule_plugin, BuildResult};

pub const MODULE_PLUGIN_NAME: &str = "module";
const DEFAULT_LABEL_PREFIX: &str = "module";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleExtra {
    #[serde(default)]
    pub label_prefix: String,
    /// Roles listed in the comment posted after labels change.
    #[serde(default)]
    pub enable_comment_roles: Vec<String>,
    /// Changed-file path prefix to module name.
    #[serde(default)]
    pub file_prefix_map: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleHandler {
    PullRequestChanged,
}

pub struct ModuleHandlers {
    label_prefix: String,
    comment_roles: Vec<String>,
    /// Longest prefix first.
    modules: Vec<(String, String)>,
}

pub(crate) fn build(deps: &PluginDeps, options: PluginOptions) -> BuildResult {
    let extra = options.decode_extra::<ModuleExtra>()?;
    let label_prefix = if extra.label_prefix.trim().is_empty() {
        DEFAULT_LABEL_PREFIX.to_string()
    } else {
        extra.label_prefix
    };
    let mut modules = extra.file_prefix_map.into_iter().collect::<Vec<_>>();
    modules.sort_by(|left, right| right.0.len().cmp(&left.0.len()));

    let rules = vec![HandlerRule::new(ModuleHandler::PullRequestChanged)
        .events([EventKind::PullRequest])
        .actions([ACTION_OPENED, ACTION_REOPENED, ACTION_SYNCHRONIZE])
        .requires([Capability::Number])];
    let handlers = ModuleHandlers {
        label_prefix,
        comment_roles: extra.enable_comment_roles,
        modules,
    };
    Ok(rule_plugin(deps, options, rules, handlers))
}

impl ModuleHandlers {
    fn module_labels<'a>(&self, files: impl IntoIterator<Item = &'a String>) -> BTreeSet<String> {
        files
            .into_iter()
            .filter_map(|file| {
                self.modules
                    .iter()
                    .find(|(prefix, _)| file.starts_with(prefix.as_str()))
                    .map(|(_, module)| format!("{}/{module}", self.label_prefix))
            })
            .collect()
    }

    fn roles_comment(&self, labels: &BTreeSet<String>, label_roles: &LabelRoles) -> String {
        let mut content = String::from("### Label Roles:\n");
        for role in &self.comment_roles {
            content.push_str(&format!("\n#### {role}"));
            for label in labels {
                content.push_str(&format!("\n* **{label}** "));
                if let Some(users) = label_roles.get(label).and_then(|roles| roles.get(role)) {
                    content.push_str(&format!("*[{}]*", users.join(", ")));
                }
            }
        }
        content
    }

    async fn handle_pull_request(&self, base: &PluginBase, invocation: &Invocation<'_>) -> Result<()> {
        if self.modules.is_empty() {
            return Ok(());
        }
        let ctx = invocation.ctx;
        let target = base.issue_ref(ctx)?;
        let files = ctx
            .cancellation
            .run(base.client().list_pull_request_files(&target))
            .await?
            .with_context(|| format!("list files of pull request {target}"))?;
        let wanted = self.module_labels(&files);

        let current = self.current_module_labels(base, invocation, &target).await?;
        if wanted == current {
            tracing::debug!(plugin = base.name(), target = %target, "module labels unchanged");
            return Ok(());
        }

        base.apply(
            ctx,
            Operation::ReplaceLabels {
                target: target.clone(),
                prefix: format!("{}/", self.label_prefix),
                labels: wanted.iter().cloned().collect(),
            },
        )
        .await?;

        if !self.comment_roles.is_empty() && !base.label_roles().is_empty() {
            base.apply(
                ctx,
                Operation::AddComment {
                    target,
                    body: self.roles_comment(&wanted, base.label_roles()),
                },
            )
            .await?;
        }
        Ok(())
    }

    async fn current_module_labels(
        &self,
        base: &PluginBase,
        invocation: &Invocation<'_>,
        target: &IssueRef,
    ) -> Result<BTreeSet<String>> {
        let prefix = format!("{}/", self.label_prefix);
        let labels = invocation
            .ctx
            .cancellation
            .run(base.client().list_issue_labels(target))
            .await?
            .with_context(|| format!("list labels of {target}"))?;
        Ok(labels
            .into_iter()
            .filter(|label| label.starts_with(&prefix))
            .collect())
    }
}

#[async_trait]
impl RuleHandlers for ModuleHandlers {
    type Handler = ModuleHandler;

    async fn handle(
        &self,
        base: &PluginBase,
        handler: ModuleHandler,
        invocation: &Invocation<'_>,
    ) -> Result<()> {
        match handler {
            ModuleHandler::PullRequestChanged => self.handle_pull_request(base, invocation).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use cairn_client::{IssueRef, Operation, RecordingMutationClient};
    use cairn_plugin::PluginOptions;
    use serde_json::json;

    use super::{build, MODULE_PLUGIN_NAME};
    use crate::test_support::{pull_request_context, strings, Harness, NUMBER, OWNER, REPO};

    fn options(harness: &Harness, comment_roles: &[&str]) -> PluginOptions {
        let mut options = harness.options(
            MODULE_PLUGIN_NAME,
            json!({
                "enable_comment_roles": comment_roles,
                "file_prefix_map": {
                    "pkg/": "core",
                    "pkg/net/": "net",
                    "docs/": "docs"
                }
            }),
        );
        options.label_roles.insert(
            "module/net".to_string(),
            [("approver".to_string(), strings(&["alice", "bob"]))]
                .into_iter()
                .collect(),
        );
        options
    }

    fn client_with_files(files: &[&str], labels: &[&str]) -> RecordingMutationClient {
        RecordingMutationClient::new()
            .with_pull_request_files(NUMBER, strings(files))
            .with_issue_labels(NUMBER, strings(labels))
    }

    #[tokio::test]
    async fn functional_longest_prefix_decides_module_label() {
        let harness = Harness::with_client(client_with_files(
            &["pkg/net/udp.go", "pkg/util.go", "README.md"],
            &["kind/feature", "module/docs"],
        ));
        let plugin = harness.build(build, options(&harness, &[]));

        plugin
            .dispatch(&pull_request_context("opened", &[]))
            .await
            .expect("dispatch");

        assert_eq!(
            harness.client.operations(),
            vec![Operation::ReplaceLabels {
                target: IssueRef::new(OWNER, REPO, NUMBER),
                prefix: "module/".to_string(),
                labels: strings(&["module/core", "module/net"]),
            }]
        );
    }

    #[tokio::test]
    async fn unit_unchanged_module_labels_issue_no_operation() {
        let harness = Harness::with_client(client_with_files(
            &["pkg/net/udp.go"],
            &["module/net", "status/wip"],
        ));
        let plugin = harness.build(build, options(&harness, &["approver"]));

        plugin
            .dispatch(&pull_request_context("synchronize", &[]))
            .await
            .expect("dispatch");

        assert!(harness.client.operations().is_empty());
    }

    #[tokio::test]
    async fn functional_label_roles_comment_follows_label_change() {
        let harness = Harness::with_client(client_with_files(&["pkg/net/tcp.go"], &[]));
        let plugin = harness.build(build, options(&harness, &["approver"]));

        plugin
            .dispatch(&pull_request_context("reopened", &[]))
            .await
            .expect("dispatch");

        let operations = harness.client.operations();
        assert_eq!(operations.len(), 2);
        assert_eq!(
            operations[1],
            Operation::AddComment {
                target: IssueRef::new(OWNER, REPO, NUMBER),
                body: "### Label Roles:\n\n#### approver\n* **module/net** *[alice, bob]*"
                    .to_string(),
            }
        );
    }
}
