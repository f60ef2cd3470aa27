use std::{collections::BTreeMap, sync::Arc};

use cairn_client::{IssueRef, Operation, RecordingMutationClient};
use cairn_events::RepoSlug;
use cairn_notify::RecordingNotifier;
use cairn_plugin::{
    CancellationToken, DispatchError, EventRouter, PluginDeps, RepoConfig, RepoPluginMap,
    RouteError,
};
use cairn_plugins::builtin_registry;
use serde_json::{json, Value};

const FRP: (&str, &str) = ("fatedier", "frp");

struct Fixture {
    client: RecordingMutationClient,
    notifier: RecordingNotifier,
    router: EventRouter,
}

impl Fixture {
    fn new(client: RecordingMutationClient, repo_config: Value) -> Self {
        let notifier = RecordingNotifier::new();
        let deps = PluginDeps::new(Arc::new(client.clone()), Arc::new(notifier.clone()));
        let map = RepoPluginMap::build(&builtin_registry(), &deps, &configs(repo_config))
            .expect("build plugin map");
        Self {
            client,
            notifier,
            router: EventRouter::new(map),
        }
    }

    async fn route(&self, event_type: &str, payload: Value) -> Result<Vec<String>, RouteError> {
        let bytes = serde_json::to_vec(&payload).expect("encode payload");
        self.router
            .route_event(CancellationToken::new(), event_type, &bytes)
            .await
            .map(|report| report.handled)
    }
}

fn configs(repo_config: Value) -> BTreeMap<RepoSlug, RepoConfig> {
    let config: RepoConfig = serde_json::from_value(repo_config).expect("decode repo config");
    BTreeMap::from([(RepoSlug::new(FRP.0, FRP.1), config)])
}

fn repository() -> Value {
    json!({"name": FRP.1, "full_name": "fatedier/frp", "owner": {"login": FRP.0}})
}

fn comment(body: &str, sender: &str) -> Value {
    json!({
        "action": "created",
        "issue": {
            "number": 4,
            "user": {"login": "carol"},
            "labels": [],
            "html_url": "https://github.com/fatedier/frp/issues/4"
        },
        "comment": {"id": 11, "body": body, "user": {"login": sender}},
        "repository": repository(),
        "sender": {"login": sender}
    })
}

fn bot_config() -> Value {
    json!({
        "roles": {"owner": ["alice"]},
        "alias": {"users": {"al": "alice"}},
        "plugins": {
            "status": {
                "preconditions": [{"is_owner": true}],
                "extra": {"label_preconditions": {"approved": [], "wip": []}}
            },
            "lifecycle": {},
            "notify": {
                "extra": {
                    "user_notify_confs": {
                        "alice": {"slack": {"url": "https://hooks.slack.test/T000", "channel": "@alice"}}
                    },
                    "events": {"check_suite_complete": {"default_user": "alice"}}
                }
            }
        }
    })
}

#[tokio::test]
async fn integration_owner_status_comment_replaces_status_labels() {
    let fixture = Fixture::new(RecordingMutationClient::new(), bot_config());

    let handled = fixture
        .route("issue_comment", comment("/status approved", "alice"))
        .await
        .expect("route status comment");

    assert!(handled.contains(&"status".to_string()));
    assert_eq!(
        fixture.client.operations(),
        vec![Operation::ReplaceLabels {
            target: IssueRef::new(FRP.0, FRP.1, 4),
            prefix: "status/".to_string(),
            labels: vec!["status/approved".to_string()],
        }]
    );
}

#[tokio::test]
async fn integration_non_owner_status_comment_fails_without_mutations() {
    let fixture = Fixture::new(RecordingMutationClient::new(), bot_config());

    let error = fixture
        .route("issue_comment", comment("/status approved", "bob"))
        .await
        .expect_err("bob is not an owner");

    assert_eq!(error.status_code(), 500);
    let RouteError::Plugins(failures) = &error else {
        panic!("expected plugin failures, got {error}");
    };
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].plugin, "status");
    assert!(matches!(failures[0].error, DispatchError::Precondition(_)));
    assert!(error.to_string().contains("bob not in roles [owner]"));
    assert!(fixture.client.operations().is_empty());
}

#[tokio::test]
async fn integration_check_suite_without_pull_requests_sends_no_notification() {
    let fixture = Fixture::new(RecordingMutationClient::new(), bot_config());

    let handled = fixture
        .route(
            "check_suite",
            json!({
                "action": "completed",
                "check_suite": {
                    "id": 9,
                    "head_sha": "abc123",
                    "status": "completed",
                    "conclusion": "success"
                },
                "repository": repository(),
                "sender": {"login": "github-actions"}
            }),
        )
        .await
        .expect("route check suite");

    assert_eq!(handled, vec!["notify".to_string()]);
    assert!(fixture.notifier.sent().is_empty());
    assert!(fixture.client.operations().is_empty());
}

#[tokio::test]
async fn integration_every_plugin_gets_a_turn_when_one_fails() {
    let fixture = Fixture::new(RecordingMutationClient::new(), bot_config());

    let error = fixture
        .route("issue_comment", comment("/status approved\n/close", "bob"))
        .await
        .expect_err("status rejects bob");

    assert!(error.to_string().starts_with("[status]"));
    assert_eq!(
        fixture.client.operations(),
        vec![Operation::Close {
            target: IssueRef::new(FRP.0, FRP.1, 4),
        }]
    );
}

#[tokio::test]
async fn integration_unknown_repository_and_event_are_rejected() {
    let fixture = Fixture::new(RecordingMutationClient::new(), bot_config());

    let mut other_repo = comment("/close", "alice");
    other_repo["repository"] =
        json!({"name": "gost", "full_name": "go-gost/gost", "owner": {"login": "go-gost"}});
    let error = fixture
        .route("issue_comment", other_repo)
        .await
        .expect_err("no plugins for gost");
    assert!(matches!(error, RouteError::NoPlugins(_)));
    assert_eq!(error.status_code(), 400);

    let error = fixture
        .route("deployment", json!({}))
        .await
        .expect_err("unsupported event");
    assert_eq!(error.to_string(), "no support event: deployment");
    assert!(fixture.client.operations().is_empty());
}

#[tokio::test]
async fn integration_replaced_plugin_map_takes_effect_for_next_event() {
    let client = RecordingMutationClient::new();
    let fixture = Fixture::new(client.clone(), bot_config());

    let deps = PluginDeps::new(Arc::new(client.clone()), Arc::new(RecordingNotifier::new()));
    let next = RepoPluginMap::build(
        &builtin_registry(),
        &deps,
        &configs(json!({"plugins": {"assign": {}}})),
    )
    .expect("build replacement map");
    fixture.router.replace_plugins(next).await;

    let handled = fixture
        .route("issue_comment", comment("/close\n/cc @bob", "alice"))
        .await
        .expect("route after reload");

    assert_eq!(handled, vec!["assign".to_string()]);
    assert_eq!(
        client.operations(),
        vec![Operation::RequestReviews {
            target: IssueRef::new(FRP.0, FRP.1, 4),
            reviewers: vec!["bob".to_string()],
        }]
    );
}
