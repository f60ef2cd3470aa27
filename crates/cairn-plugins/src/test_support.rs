//! Fixtures shared by the built-in plugin tests.

use std::sync::Arc;

use cairn_client::RecordingMutationClient;
use cairn_events::{CapabilityObject, RawEvent, RepoSlug};
use cairn_notify::RecordingNotifier;
use cairn_plugin::{
    CancellationToken, EventContext, Plugin, PluginBuildError, PluginDeps, PluginOptions,
};
use serde_json::{json, Value};

pub(crate) const OWNER: &str = "fatedier";
pub(crate) const REPO: &str = "frp";
pub(crate) const NUMBER: u64 = 4;

pub(crate) fn repo() -> RepoSlug {
    RepoSlug::new(OWNER, REPO)
}

pub(crate) fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

pub(crate) struct Harness {
    pub client: RecordingMutationClient,
    pub notifier: RecordingNotifier,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_client(RecordingMutationClient::new())
    }

    pub fn with_client(client: RecordingMutationClient) -> Self {
        Self {
            client,
            notifier: RecordingNotifier::new(),
        }
    }

    pub fn deps(&self) -> PluginDeps {
        PluginDeps::new(Arc::new(self.client.clone()), Arc::new(self.notifier.clone()))
    }

    pub fn options(&self, plugin: &str, extra: Value) -> PluginOptions {
        let mut options = PluginOptions::new(plugin, repo());
        options.extra = extra;
        options
    }

    pub fn build(
        &self,
        build: fn(&PluginDeps, PluginOptions) -> Result<Arc<dyn Plugin>, PluginBuildError>,
        options: PluginOptions,
    ) -> Arc<dyn Plugin> {
        build(&self.deps(), options).expect("build plugin")
    }
}

pub(crate) fn context(event_type: &str, payload: Value) -> EventContext {
    let bytes = serde_json::to_vec(&payload).expect("encode payload");
    let event = RawEvent::decode(event_type, &bytes).expect("decode payload");
    EventContext::new(
        CancellationToken::new(),
        event.kind(),
        event.repo_slug().expect("repo slug"),
        Arc::new(CapabilityObject::new(event)),
    )
}

fn label_rows(labels: &[&str]) -> Vec<Value> {
    labels.iter().map(|name| json!({ "name": name })).collect()
}

fn repository() -> Value {
    json!({"name": REPO, "full_name": "fatedier/frp", "owner": {"login": OWNER}})
}

/// `issue_comment` created by `sender` on issue 4 authored by carol.
pub(crate) fn comment_context(body: &str, sender: &str, labels: &[&str]) -> EventContext {
    context(
        "issue_comment",
        json!({
            "action": "created",
            "issue": {
                "number": NUMBER,
                "user": {"login": "carol"},
                "labels": label_rows(labels),
                "html_url": "https://github.com/fatedier/frp/issues/4"
            },
            "comment": {"id": 11, "body": body, "user": {"login": sender}},
            "repository": repository(),
            "sender": {"login": sender}
        }),
    )
}

pub(crate) fn pull_request_context(action: &str, labels: &[&str]) -> EventContext {
    context(
        "pull_request",
        json!({
            "action": action,
            "number": NUMBER,
            "pull_request": {
                "number": NUMBER,
                "title": "add udp support",
                "state": "open",
                "body": "",
                "user": {"login": "carol"},
                "labels": label_rows(labels),
                "html_url": "https://github.com/fatedier/frp/pull/4",
                "head": {"sha": "abc123", "ref": "feature"}
            },
            "repository": repository(),
            "sender": {"login": "carol"}
        }),
    )
}

pub(crate) fn review_context(state: &str, reviewer: &str, labels: &[&str]) -> EventContext {
    context(
        "pull_request_review",
        json!({
            "action": "submitted",
            "review": {"id": 3, "state": state, "user": {"login": reviewer}},
            "pull_request": {
                "number": NUMBER,
                "user": {"login": "carol"},
                "labels": label_rows(labels),
                "head": {"sha": "abc123", "ref": "feature"}
            },
            "repository": repository(),
            "sender": {"login": reviewer}
        }),
    )
}

pub(crate) fn check_suite_context(head_sha: &str) -> EventContext {
    context(
        "check_suite",
        json!({
            "action": "completed",
            "check_suite": {
                "id": 9,
                "head_sha": head_sha,
                "status": "completed",
                "conclusion": "success"
            },
            "repository": repository(),
            "sender": {"login": "github-actions"}
        }),
    )
}

pub(crate) fn check_run_context(head_sha: &str) -> EventContext {
    context(
        "check_run",
        json!({
            "action": "completed",
            "check_run": {
                "id": 10,
                "head_sha": head_sha,
                "status": "completed",
                "conclusion": "failure",
                "check_suite": {"id": 9, "head_sha": head_sha}
            },
            "repository": repository(),
            "sender": {"login": "github-actions"}
        }),
    )
}
