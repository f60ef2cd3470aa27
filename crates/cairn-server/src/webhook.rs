use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use cairn_plugin::{CancellationToken, EventRouter};
use serde_json::json;

use crate::verify_github_sha256_signature;

pub const WEBHOOK_ENDPOINT: &str = "/webhook";
pub const GITHUB_EVENT_HEADER: &str = "x-github-event";
pub const GITHUB_DELIVERY_HEADER: &str = "x-github-delivery";
pub const GITHUB_SIGNATURE_HEADER: &str = "x-hub-signature-256";

#[derive(Clone)]
/// Shared state behind the webhook listener.
pub struct WebhookState {
    router: Arc<EventRouter>,
    secret: Option<String>,
}

impl WebhookState {
    pub fn new(router: Arc<EventRouter>, secret: Option<String>) -> Self {
        let secret = secret.filter(|value| !value.trim().is_empty());
        Self { router, secret }
    }
}

/// Accepts deliveries on both `/` and [`WEBHOOK_ENDPOINT`].
pub fn build_webhook_router(state: WebhookState) -> Router {
    Router::new()
        .route("/", post(handle_webhook))
        .route(WEBHOOK_ENDPOINT, post(handle_webhook))
        .with_state(Arc::new(state))
}

/// Cancels in-flight plugin work when the request future is dropped.
struct CancelOnDrop(CancellationToken);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

async fn handle_webhook(
    State(state): State<Arc<WebhookState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(event_type) = header_value(&headers, GITHUB_EVENT_HEADER) else {
        return error_response(StatusCode::BAD_REQUEST, "missing X-GitHub-Event header");
    };
    let delivery = header_value(&headers, GITHUB_DELIVERY_HEADER).unwrap_or("-");

    if let Some(secret) = &state.secret {
        let Some(signature) = header_value(&headers, GITHUB_SIGNATURE_HEADER) else {
            tracing::warn!(delivery, event = event_type, "webhook rejected: missing signature");
            return error_response(StatusCode::UNAUTHORIZED, "missing X-Hub-Signature-256 header");
        };
        if let Err(error) = verify_github_sha256_signature(&body, signature, secret) {
            tracing::warn!(delivery, event = event_type, error = %error, "webhook rejected");
            return error_response(StatusCode::UNAUTHORIZED, error.to_string());
        }
    }

    let cancellation = CancellationToken::new();
    let _guard = CancelOnDrop(cancellation.clone());
    match state
        .router
        .route_event(cancellation, event_type, &body)
        .await
    {
        Ok(report) => {
            tracing::debug!(
                delivery,
                event = event_type,
                handled = report.handled.len(),
                "webhook delivery routed"
            );
            (
                StatusCode::OK,
                Json(json!({
                    "repo": report.repo.map(|repo| repo.to_string()),
                    "handled": report.handled,
                    "not_supported": report.not_supported,
                })),
            )
                .into_response()
        }
        Err(error) => {
            let status = StatusCode::from_u16(error.status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            tracing::warn!(
                delivery,
                event = event_type,
                status = status.as_u16(),
                error = %error,
                "webhook delivery failed"
            );
            error_response(status, error.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::BTreeMap, net::SocketAddr, sync::Arc, time::Duration};

    use anyhow::{Context, Result};
    use cairn_client::{IssueRef, Operation, RecordingMutationClient};
    use cairn_events::RepoSlug;
    use cairn_notify::RecordingNotifier;
    use cairn_plugin::{EventRouter, PluginDeps, RepoConfig, RepoPluginMap};
    use cairn_plugins::builtin_registry;
    use serde_json::{json, Value};
    use tokio::net::TcpListener;

    use super::{
        build_webhook_router, WebhookState, GITHUB_EVENT_HEADER, GITHUB_SIGNATURE_HEADER,
        WEBHOOK_ENDPOINT,
    };
    use crate::signature::sign_payload;

    async fn spawn_test_server(state: WebhookState) -> Result<(SocketAddr, tokio::task::JoinHandle<()>)> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("bind ephemeral listener")?;
        let addr = listener.local_addr().context("resolve listener addr")?;
        let app = build_webhook_router(state);
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok((addr, handle))
    }

    fn status_router(client: &RecordingMutationClient) -> Arc<EventRouter> {
        let repo_config: RepoConfig = serde_json::from_value(json!({
            "roles": {"owner": ["alice"]},
            "plugins": {
                "status": {
                    "extra": {"label_preconditions": {"approved": [{"is_owner": true}]}}
                }
            }
        }))
        .expect("repo config");
        let configs = BTreeMap::from([(RepoSlug::new("fatedier", "frp"), repo_config)]);
        let deps = PluginDeps::new(Arc::new(client.clone()), Arc::new(RecordingNotifier::new()));
        let map = RepoPluginMap::build(&builtin_registry(), &deps, &configs).expect("build map");
        Arc::new(EventRouter::new(map))
    }

    fn status_comment(sender: &str) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "action": "created",
            "issue": {
                "number": 4,
                "user": {"login": "carol"},
                "labels": [],
                "html_url": "https://github.com/fatedier/frp/issues/4"
            },
            "comment": {"id": 11, "body": "/status approved", "user": {"login": sender}},
            "repository": {"name": "frp", "full_name": "fatedier/frp", "owner": {"login": "fatedier"}},
            "sender": {"login": sender}
        }))
        .expect("encode payload")
    }

    async fn post(
        addr: SocketAddr,
        path: &str,
        event: Option<&str>,
        signature: Option<&str>,
        body: Vec<u8>,
    ) -> (u16, Value) {
        let mut request = reqwest::Client::new()
            .post(format!("http://{addr}{path}"))
            .body(body);
        if let Some(event) = event {
            request = request.header(GITHUB_EVENT_HEADER, event);
        }
        if let Some(signature) = signature {
            request = request.header(GITHUB_SIGNATURE_HEADER, signature);
        }
        let response = request.send().await.expect("send request");
        let status = response.status().as_u16();
        let payload = response.json::<Value>().await.expect("json body");
        (status, payload)
    }

    #[tokio::test]
    async fn functional_missing_event_header_is_bad_request() {
        let client = RecordingMutationClient::new();
        let (addr, handle) = spawn_test_server(WebhookState::new(status_router(&client), None))
            .await
            .expect("spawn server");

        let (status, payload) = post(addr, WEBHOOK_ENDPOINT, None, None, b"{}".to_vec()).await;
        assert_eq!(status, 400);
        assert_eq!(payload["error"], "missing X-GitHub-Event header");
        handle.abort();
    }

    #[tokio::test]
    async fn functional_ping_is_accepted_on_root_path() {
        let client = RecordingMutationClient::new();
        let (addr, handle) = spawn_test_server(WebhookState::new(status_router(&client), None))
            .await
            .expect("spawn server");

        let (status, payload) = post(addr, "/", Some("ping"), None, b"{\"zen\":\"hi\"}".to_vec()).await;
        assert_eq!(status, 200);
        assert!(payload["repo"].is_null());
        assert_eq!(payload["handled"], json!([]));
        handle.abort();
    }

    #[tokio::test]
    async fn integration_owner_status_comment_is_routed_to_status_plugin() {
        let client = RecordingMutationClient::new();
        let (addr, handle) = spawn_test_server(WebhookState::new(status_router(&client), None))
            .await
            .expect("spawn server");

        let (status, payload) = post(
            addr,
            WEBHOOK_ENDPOINT,
            Some("issue_comment"),
            None,
            status_comment("alice"),
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(payload["repo"], "fatedier/frp");
        assert_eq!(payload["handled"], json!(["status"]));
        assert_eq!(
            client.operations(),
            vec![Operation::ReplaceLabels {
                target: IssueRef::new("fatedier", "frp", 4),
                prefix: "status/".to_string(),
                labels: vec!["status/approved".to_string()],
            }]
        );
        handle.abort();
    }

    #[tokio::test]
    async fn functional_plugin_failure_maps_to_internal_error() {
        let client = RecordingMutationClient::new();
        let (addr, handle) = spawn_test_server(WebhookState::new(status_router(&client), None))
            .await
            .expect("spawn server");

        let (status, payload) = post(
            addr,
            WEBHOOK_ENDPOINT,
            Some("issue_comment"),
            None,
            status_comment("bob"),
        )
        .await;
        assert_eq!(status, 500);
        assert!(payload["error"]
            .as_str()
            .expect("error text")
            .contains("bob not in roles [owner]"));
        assert!(client.operations().is_empty());
        handle.abort();
    }

    #[tokio::test]
    async fn functional_unknown_repository_is_bad_request() {
        let client = RecordingMutationClient::new();
        let router = Arc::new(EventRouter::new(RepoPluginMap::default()));
        let (addr, handle) = spawn_test_server(WebhookState::new(router, None))
            .await
            .expect("spawn server");

        let (status, payload) = post(
            addr,
            WEBHOOK_ENDPOINT,
            Some("issue_comment"),
            None,
            status_comment("alice"),
        )
        .await;
        assert_eq!(status, 400);
        assert_eq!(payload["error"], "no correspond plugins for fatedier/frp");
        assert!(client.operations().is_empty());
        handle.abort();
    }

    #[tokio::test]
    async fn regression_signature_is_required_when_secret_is_set() {
        let client = RecordingMutationClient::new();
        let state = WebhookState::new(status_router(&client), Some("s3cret".to_string()));
        let (addr, handle) = spawn_test_server(state).await.expect("spawn server");
        let body = status_comment("alice");

        let (status, _) = post(addr, WEBHOOK_ENDPOINT, Some("issue_comment"), None, body.clone()).await;
        assert_eq!(status, 401);

        let forged = sign_payload(&body, "other");
        let (status, _) = post(
            addr,
            WEBHOOK_ENDPOINT,
            Some("issue_comment"),
            Some(&forged),
            body.clone(),
        )
        .await;
        assert_eq!(status, 401);
        assert!(client.operations().is_empty());

        let signed = sign_payload(&body, "s3cret");
        let (status, _) = post(
            addr,
            WEBHOOK_ENDPOINT,
            Some("issue_comment"),
            Some(&signed),
            body,
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(client.operations().len(), 1);
        handle.abort();
    }
}
