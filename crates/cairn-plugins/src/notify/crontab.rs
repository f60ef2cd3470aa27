use std::{collections::BTreeMap, str::FromStr, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use cairn_plugin::{PluginBase, PluginBuildError, PluginOptions};
use chrono::Utc;
use chrono_tz::Tz;
use cron::Schedule;

use super::{CrontabOption, NotifyExtra};

pub const WAIT_REVIEW_PULL_REQUEST: &str = "wait_review_pull_request";
const KNOWN_JOBS: [&str; 1] = [WAIT_REVIEW_PULL_REQUEST];
const OPEN_STATE: &str = "open";

#[derive(Debug, Clone)]
/// Parsed `wait_review_pull_request` schedule.
pub(super) struct CronJob {
    schedule: Schedule,
    timezone: Tz,
    send_to_users: Vec<String>,
}

impl CronJob {
    pub(super) fn from_options(
        options: &PluginOptions,
        crontab: &BTreeMap<String, CrontabOption>,
    ) -> Result<Vec<Self>, PluginBuildError> {
        let mut jobs = Vec::new();
        for (name, option) in crontab {
            if !KNOWN_JOBS.contains(&name.as_str()) {
                return Err(options.invalid(format!("unknown crontab job '{name}'")));
            }
            if option.disable {
                continue;
            }
            let schedule = Schedule::from_str(&option.job).map_err(|error| {
                options.invalid(format!("invalid cron expression '{}': {error}", option.job))
            })?;
            let timezone: Tz = option.timezone.parse().map_err(|error| {
                options.invalid(format!("invalid timezone '{}': {error}", option.timezone))
            })?;
            jobs.push(Self {
                schedule,
                timezone,
                send_to_users: option.send_to_users.clone(),
            });
        }
        Ok(jobs)
    }

    fn next_delay(&self) -> Option<Duration> {
        let now = Utc::now().with_timezone(&self.timezone);
        let next = self.schedule.after(&now).next()?;
        Some((next - now).to_std().unwrap_or_default())
    }

    /// Fires the digest on every schedule tick until the task is aborted.
    pub(super) async fn run(self, base: PluginBase, extra: Arc<NotifyExtra>) {
        loop {
            let Some(delay) = self.next_delay() else {
                tracing::warn!(plugin = base.name(), repo = %base.repo(), "crontab has no future occurrence");
                return;
            };
            tokio::time::sleep(delay).await;
            match send_wait_review(&base, &extra, &self.send_to_users).await {
                Ok(sent) => tracing::debug!(plugin = base.name(), repo = %base.repo(), sent, "wait review digest sent"),
                Err(error) => tracing::warn!(plugin = base.name(), repo = %base.repo(), error = %format!("{error:#}"), "wait review job failed"),
            }
        }
    }
}

/// Sends each listed reviewer the open pull requests waiting on them.
/// Returns how many notifications went out.
pub(super) async fn send_wait_review(
    base: &PluginBase,
    extra: &NotifyExtra,
    send_to_users: &[String],
) -> Result<usize> {
    let pulls = base
        .client()
        .list_pull_requests_by_state(base.repo(), OPEN_STATE)
        .await
        .context("list open pull requests")?;

    let mut pending: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for pull in &pulls {
        for reviewer in &pull.requested_reviewers {
            if send_to_users.contains(reviewer) {
                pending.entry(reviewer.as_str()).or_default().push(format!(
                    "{} [{}] [{}]",
                    pull.html_url, pull.author, pull.title
                ));
            }
        }
    }

    let mut sent = 0;
    for (user, lines) in pending {
        let Some(destination) = extra.user_notify_confs.get(user) else {
            continue;
        };
        let content = format!(
            "[{}] Pull Requests Wait To Review\n{}",
            base.repo(),
            lines.join("\n")
        );
        match base.notifier().send(destination, &content).await {
            Ok(()) => {
                tracing::info!(plugin = base.name(), user, "wait review digest delivered");
                sent += 1;
            }
            Err(error) => {
                tracing::warn!(plugin = base.name(), user, error = %error, "wait review digest failed");
            }
        }
    }
    Ok(sent)
}
