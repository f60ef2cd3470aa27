use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{SlackNotify, SlackNotifyOptions};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Per-user notification destinations.
pub struct NotifyOptions {
    #[serde(default)]
    pub slack: SlackNotifyOptions,
}

impl NotifyOptions {
    pub fn is_empty(&self) -> bool {
        self.slack.is_empty()
    }
}

#[async_trait]
/// Trait contract for delivering a text notification to a destination.
pub trait Notifier: Send + Sync {
    async fn send(&self, options: &NotifyOptions, content: &str) -> Result<()>;
}

#[derive(Clone)]
/// Sends to every non-empty sink in [`NotifyOptions`] and joins sink errors.
pub struct NotifyController {
    slack: SlackNotify,
}

impl NotifyController {
    pub fn new(request_timeout_ms: u64) -> Result<Self> {
        Ok(Self {
            slack: SlackNotify::new(request_timeout_ms)?,
        })
    }
}

#[async_trait]
impl Notifier for NotifyController {
    async fn send(&self, options: &NotifyOptions, content: &str) -> Result<()> {
        let mut failures = Vec::new();
        if !options.slack.is_empty() {
            if let Err(error) = self.slack.send(&options.slack, content).await {
                tracing::warn!(error = %error, "slack notification failed");
                failures.push(format!("slack: {error:#}"));
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(anyhow!(failures.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;

    use super::{Notifier, NotifyController, NotifyOptions};
    use crate::SlackNotifyOptions;

    #[tokio::test]
    async fn unit_empty_options_send_nothing() {
        let controller = NotifyController::new(1_000).expect("controller");
        controller
            .send(&NotifyOptions::default(), "hello")
            .await
            .expect("no sinks configured");
    }

    #[tokio::test]
    async fn functional_slack_failure_is_prefixed_with_sink_name() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/hook");
            then.status(500);
        });
        let controller = NotifyController::new(1_000).expect("controller");
        let options = NotifyOptions {
            slack: SlackNotifyOptions {
                url: format!("{}/hook", server.base_url()),
                ..SlackNotifyOptions::default()
            },
        };
        let error = controller
            .send(&options, "hello")
            .await
            .expect_err("500 fails");
        assert!(error.to_string().starts_with("slack: slack response error code: 500"));
    }
}
