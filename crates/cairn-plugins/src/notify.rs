//! Check completion notices, `/ping` and the pending-review digest.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use cairn_events::{Capability, EventKind, ACTION_COMPLETED};
use cairn_notify::NotifyOptions;
use cairn_plugin::{
    ArgumentMode, HandlerRule, Invocation, PluginBase, PluginBuildError, PluginDeps,
    PluginOptions, Precondition, RuleHandlers,
};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::{comment_rule, rule_plugin, BuildResult};

mod crontab;

pub use crontab::WAIT_REVIEW_PULL_REQUEST;
use crontab::CronJob;

pub const NOTIFY_PLUGIN_NAME: &str = "notify";
const CMD_PING: &str = "ping";
const CHECK_RUN_COMPLETE: &str = "check_run_complete";
const CHECK_SUITE_COMPLETE: &str = "check_suite_complete";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Who hears about one event type: `users` themselves, anyone else's
/// events go to `default_user`.
pub struct EventNotifyConf {
    #[serde(default)]
    pub default_user: String,
    #[serde(default)]
    pub users: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingOption {
    #[serde(default)]
    pub disable: bool,
    #[serde(default)]
    pub preconditions: Vec<Precondition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrontabOption {
    #[serde(default)]
    pub disable: bool,
    /// Cron expression with a seconds field, e.g. `0 0 10 * * Mon-Fri`.
    pub job: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub send_to_users: Vec<String>,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyExtra {
    #[serde(default)]
    pub user_notify_confs: BTreeMap<String, NotifyOptions>,
    #[serde(default)]
    pub ping: PingOption,
    #[serde(default)]
    pub events: BTreeMap<String, EventNotifyConf>,
    #[serde(default)]
    pub crontab: BTreeMap<String, CrontabOption>,
}

impl NotifyExtra {
    /// Destination for an event concerning `user`, if anyone should hear.
    fn destination(&self, conf: &EventNotifyConf, user: &str) -> Result<Option<&NotifyOptions>> {
        let recipient = if conf.users.iter().any(|listed| listed == user) {
            user
        } else {
            conf.default_user.as_str()
        };
        if recipient.is_empty() {
            return Ok(None);
        }
        self.user_notify_confs
            .get(recipient)
            .map(Some)
            .ok_or_else(|| anyhow!("notify user [{recipient}] conf not found"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyHandler {
    CheckRunCompleted,
    CheckSuiteCompleted,
    Ping,
}

pub struct NotifyHandlers {
    extra: Arc<NotifyExtra>,
    jobs: Vec<CronJob>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

pub(crate) fn build(deps: &PluginDeps, options: PluginOptions) -> BuildResult {
    let handlers = NotifyHandlers::new(&options)?;
    let rules = vec![
        HandlerRule::new(NotifyHandler::CheckSuiteCompleted)
            .events([EventKind::CheckSuite])
            .actions([ACTION_COMPLETED])
            .requires([Capability::CheckEvent]),
        HandlerRule::new(NotifyHandler::CheckRunCompleted)
            .events([EventKind::CheckRun])
            .actions([ACTION_COMPLETED])
            .requires([Capability::CheckEvent]),
        comment_rule(NotifyHandler::Ping)
            .requires([Capability::Body, Capability::CommentAuthor, Capability::HtmlUrl])
            .argument_mode(ArgumentMode::Remainder),
    ];
    Ok(rule_plugin(deps, options, rules, handlers))
}

impl NotifyHandlers {
    pub fn new(options: &PluginOptions) -> Result<Self, PluginBuildError> {
        let extra = options.decode_extra::<NotifyExtra>()?;
        let jobs = CronJob::from_options(options, &extra.crontab)?;
        Ok(Self {
            extra: Arc::new(extra),
            jobs,
            tasks: Mutex::new(Vec::new()),
        })
    }

    async fn handle_check(
        &self,
        base: &PluginBase,
        handler: NotifyHandler,
        invocation: &Invocation<'_>,
    ) -> Result<()> {
        let ctx = invocation.ctx;
        let (event_name, title) = match handler {
            NotifyHandler::CheckRunCompleted => (CHECK_RUN_COMPLETE, "check run"),
            _ => (CHECK_SUITE_COMPLETE, "check suite"),
        };
        let Some(conf) = self.extra.events.get(event_name) else {
            return Ok(());
        };
        let Some(check) = ctx.object.check_event() else {
            return Ok(());
        };
        let summary = match handler {
            NotifyHandler::CheckRunCompleted => check.run(),
            _ => check.suite(),
        };
        let Some(summary) = summary else {
            return Ok(());
        };

        let pulls = ctx
            .cancellation
            .run(
                base.client()
                    .list_pull_requests_by_sha(&ctx.repo, &summary.head_sha),
            )
            .await?
            .context("list pull request by sha")?;
        let Some(pull) = pulls.first() else {
            tracing::debug!(plugin = base.name(), sha = summary.head_sha.as_str(), "no pull request for check");
            return Ok(());
        };
        let Some(destination) = self.extra.destination(conf, &pull.author)? else {
            return Ok(());
        };

        let content = format!(
            "{title} complete, status [{}], conclusion [{}]\nTitle [{}] Author [{}]\n{}",
            summary.status.as_deref().unwrap_or_default(),
            summary.conclusion.as_deref().unwrap_or_default(),
            pull.title,
            pull.author,
            pull.html_url,
        );
        base.notify(ctx, destination, &content).await
    }

    /// `/ping @user message`; preconditions apply only when a ping is present.
    async fn handle_ping(&self, base: &PluginBase, invocation: &Invocation<'_>) -> Result<()> {
        if self.extra.ping.disable {
            return Ok(());
        }
        let pings = invocation
            .commands_named(CMD_PING)
            .filter_map(|command| command.first_arg())
            .collect::<Vec<_>>();
        if pings.is_empty() {
            return Ok(());
        }
        let ctx = invocation.ctx;
        base.check_preconditions(ctx, &self.extra.ping.preconditions)?;

        let sender = ctx.object.comment_author().unwrap_or_default();
        let url = ctx.object.html_url().unwrap_or_default();
        for ping in pings {
            let (user, message) = match ping.split_once(char::is_whitespace) {
                Some((user, message)) => (user, message.trim()),
                None => (ping, ""),
            };
            let user = base.alias().resolve_user(user);
            let destination = self
                .extra
                .user_notify_confs
                .get(&user)
                .ok_or_else(|| anyhow!("notify user [{user}] conf not found"))?;
            let mut content = format!("You are pinged by [{sender}]\n{url}");
            if !message.is_empty() {
                content.push('\n');
                content.push_str(message);
            }
            base.notify(ctx, destination, &content).await?;
        }
        Ok(())
    }

    fn tasks(&self) -> std::sync::MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.tasks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl RuleHandlers for NotifyHandlers {
    type Handler = NotifyHandler;

    async fn handle(
        &self,
        base: &PluginBase,
        handler: NotifyHandler,
        invocation: &Invocation<'_>,
    ) -> Result<()> {
        match handler {
            NotifyHandler::CheckRunCompleted | NotifyHandler::CheckSuiteCompleted => {
                self.handle_check(base, handler, invocation).await
            }
            NotifyHandler::Ping => self.handle_ping(base, invocation).await,
        }
    }

    fn start(&self, base: &PluginBase) {
        if self.jobs.is_empty() {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(plugin = base.name(), repo = %base.repo(), "no runtime, crontab jobs not started");
            return;
        };
        let mut tasks = self.tasks();
        for job in &self.jobs {
            tasks.push(runtime.spawn(job.clone().run(base.clone(), self.extra.clone())));
        }
        tracing::info!(plugin = base.name(), repo = %base.repo(), jobs = tasks.len(), "crontab jobs started");
    }

    fn stop(&self) {
        for task in self.tasks().drain(..) {
            task.abort();
        }
    }
}
