//! Runs configured external commands on `/<name>` comments.

use std::collections::BTreeMap;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use cairn_client::Operation;
use cairn_events::Capability;
use cairn_plugin::{ArgumentMode, Invocation, PluginBase, PluginDeps, PluginOptions, RuleHandlers};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::{comment_rule, rule_plugin, BuildResult};

pub const TRIGGER_PLUGIN_NAME: &str = "trigger";
const DEFAULT_TIMEOUT_S: u64 = 30;
const OUTPUT_SUMMARY_CHARS: usize = 400;

fn default_timeout_s() -> u64 {
    DEFAULT_TIMEOUT_S
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Executor {
    /// Program and leading arguments, split with shell quoting rules.
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_timeout_s")]
    pub timeout_s: u64,
}

impl Executor {
    fn timeout(&self) -> Duration {
        let seconds = if self.timeout_s == 0 {
            DEFAULT_TIMEOUT_S
        } else {
            self.timeout_s
        };
        Duration::from_secs(seconds)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerExtra {
    #[serde(default)]
    pub cmds: BTreeMap<String, Executor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// JSON line written to the command's stdin.
pub struct EventInfo {
    pub event_type: String,
    pub owner: String,
    pub repo: String,
    pub number: u64,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerHandler {
    Comment,
}

pub struct TriggerHandlers {
    extra: TriggerExtra,
}

pub(crate) fn build(deps: &PluginDeps, options: PluginOptions) -> BuildResult {
    let extra = options.decode_extra::<TriggerExtra>()?;
    for (name, executor) in &extra.cmds {
        let tokens = shell_words::split(&executor.command).map_err(|error| {
            options.invalid(format!("command of '{name}' is not valid shell words: {error}"))
        })?;
        if tokens.is_empty() {
            return Err(options.invalid(format!("command of '{name}' is empty")));
        }
    }
    let rules = vec![comment_rule(TriggerHandler::Comment)
        .requires([Capability::Body, Capability::Number])
        .argument_mode(ArgumentMode::Remainder)];
    Ok(rule_plugin(deps, options, rules, TriggerHandlers { extra }))
}

fn summarize_output(output: &str) -> String {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return "no output".to_string();
    }
    trimmed.chars().take(OUTPUT_SUMMARY_CHARS).collect()
}

async fn execute(executor: &Executor, extra_args: Vec<String>, info: &EventInfo) -> Result<String> {
    let mut tokens = shell_words::split(&executor.command)
        .with_context(|| format!("invalid command '{}'", executor.command))?;
    if tokens.is_empty() {
        bail!("empty command");
    }
    let program = tokens.remove(0);

    let mut command = Command::new(&program);
    command.kill_on_drop(true);
    command.args(tokens);
    command.args(&executor.args);
    command.args(extra_args);
    command.stdin(Stdio::piped());
    command.stdout(Stdio::piped());
    command.stderr(Stdio::piped());
    let mut child = command
        .spawn()
        .with_context(|| format!("failed to spawn '{program}'"))?;

    let mut payload = serde_json::to_vec(info).context("encode event info")?;
    payload.push(b'\n');
    // Written concurrently so a command that never reads stdin still times out.
    let writer = child.stdin.take().map(|mut stdin| {
        let program = program.clone();
        tokio::spawn(async move {
            if let Err(error) = stdin.write_all(&payload).await {
                tracing::debug!(program = program.as_str(), error = %error, "stdin not consumed");
            }
        })
    });

    let timeout = executor.timeout();
    let waited = tokio::time::timeout(timeout, child.wait_with_output()).await;
    if let Some(writer) = writer {
        writer.abort();
    }
    let output = waited
        .map_err(|_| anyhow!("'{program}' timed out after {}s", timeout.as_secs()))?
        .with_context(|| format!("'{program}' process failed"))?;

    let mut combined = String::from_utf8_lossy(&output.stdout).to_string();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    if !output.status.success() {
        let status = output
            .status
            .code()
            .map(|code| code.to_string())
            .unwrap_or_else(|| "signal".to_string());
        bail!(
            "'{program}' failed with status {status}: {}",
            summarize_output(&combined)
        );
    }
    Ok(combined)
}

impl TriggerHandlers {
    async fn handle_comment(&self, base: &PluginBase, invocation: &Invocation<'_>) -> Result<()> {
        let ctx = invocation.ctx;
        for command in &invocation.commands {
            let Some(executor) = self.extra.cmds.get(&command.name) else {
                continue;
            };
            let extra_args = match command.first_arg() {
                Some(remainder) => shell_words::split(remainder)
                    .with_context(|| format!("invalid arguments for '{}'", command.name))?,
                None => Vec::new(),
            };
            let target = base.issue_ref(ctx)?;
            let info = EventInfo {
                event_type: ctx.kind.to_string(),
                owner: ctx.owner().to_string(),
                repo: ctx.repo_name().to_string(),
                number: target.number,
                labels: ctx.object.labels().map(<[String]>::to_vec).unwrap_or_default(),
            };

            tracing::debug!(plugin = base.name(), command = command.name.as_str(), "running trigger command");
            let output = ctx
                .cancellation
                .run(execute(executor, extra_args, &info))
                .await??;
            if output.trim().is_empty() {
                continue;
            }
            base.apply(ctx, Operation::AddComment { target, body: output })
                .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl RuleHandlers for TriggerHandlers {
    type Handler = TriggerHandler;

    async fn handle(
        &self,
        base: &PluginBase,
        handler: TriggerHandler,
        invocation: &Invocation<'_>,
    ) -> Result<()> {
        match handler {
            TriggerHandler::Comment => self.handle_comment(base, invocation).await,
        }
    }
}
