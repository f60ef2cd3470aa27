use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_SLACK_SENDER_USERNAME: &str = "cairn";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Slack incoming-webhook destination.
pub struct SlackNotifyOptions {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub sender_username: String,
    #[serde(default)]
    pub channel: String,
}

impl SlackNotifyOptions {
    pub fn is_empty(&self) -> bool {
        self.url.trim().is_empty()
            && self.sender_username.trim().is_empty()
            && self.channel.trim().is_empty()
    }
}

fn is_blank(value: &&str) -> bool {
    value.is_empty()
}

#[derive(Debug, Serialize)]
struct SlackRequestPayload<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "is_blank")]
    username: &'a str,
    #[serde(skip_serializing_if = "is_blank")]
    channel: &'a str,
}

#[derive(Clone)]
pub struct SlackNotify {
    http: reqwest::Client,
}

impl SlackNotify {
    pub fn new(request_timeout_ms: u64) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(request_timeout_ms.max(1)))
            .build()
            .context("failed to create slack notify client")?;
        Ok(Self { http })
    }

    /// Posts `content` to the webhook in `options`. Any non-200 reply fails.
    pub async fn send(&self, options: &SlackNotifyOptions, content: &str) -> Result<()> {
        if options.url.trim().is_empty() {
            bail!("slack notify url is empty");
        }
        let username = if options.sender_username.trim().is_empty() {
            DEFAULT_SLACK_SENDER_USERNAME
        } else {
            options.sender_username.trim()
        };
        let payload = SlackRequestPayload {
            text: content,
            username,
            channel: options.channel.trim(),
        };
        let response = self
            .http
            .post(options.url.trim())
            .json(&payload)
            .send()
            .await
            .context("slack notify request failed")?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            bail!("slack response error code: {}", status.as_u16());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use super::{SlackNotify, SlackNotifyOptions};

    #[tokio::test]
    async fn functional_slack_send_posts_text_with_default_username() {
        let server = MockServer::start();
        let hook = server.mock(|when, then| {
            when.method(POST)
                .path("/hook")
                .json_body(json!({"text": "ci failed", "username": "cairn", "channel": "#dev"}));
            then.status(200).body("ok");
        });
        let options = SlackNotifyOptions {
            url: format!("{}/hook", server.base_url()),
            sender_username: String::new(),
            channel: "#dev".to_string(),
        };

        SlackNotify::new(2_000)
            .expect("slack client")
            .send(&options, "ci failed")
            .await
            .expect("send");
        hook.assert();
    }

    #[tokio::test]
    async fn regression_slack_send_rejects_non_ok_status() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/hook");
            then.status(404).body("no_team");
        });
        let options = SlackNotifyOptions {
            url: format!("{}/hook", server.base_url()),
            ..SlackNotifyOptions::default()
        };
        let error = SlackNotify::new(2_000)
            .expect("slack client")
            .send(&options, "hello")
            .await
            .expect_err("404 fails");
        assert_eq!(error.to_string(), "slack response error code: 404");
    }

    #[test]
    fn unit_slack_options_emptiness_ignores_whitespace() {
        assert!(SlackNotifyOptions::default().is_empty());
        assert!(!SlackNotifyOptions {
            url: "https://hooks.slack.test/x".to_string(),
            ..SlackNotifyOptions::default()
        }
        .is_empty());
    }
}
