use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use cairn_client::{IssueRef, MutationClient, Operation};
use cairn_events::{Capability, RepoSlug};
use cairn_notify::{Notifier, NotifyOptions};
use serde::de::DeserializeOwned;

use crate::{
    parse_commands, AliasOptions, ArgumentMode, Command, EventContext, LabelRoles, Precondition,
    PreconditionError, PreconditionEvaluator, RoleOptions,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// At least one rule applied and every handler succeeded.
    Handled,
    /// No rule of the plugin applies to the event.
    NotSupported,
}

#[derive(Debug, thiserror::Error)]
/// Failure of one plugin's dispatch of one event.
pub enum DispatchError {
    #[error("can't get {0} from payload")]
    MissingCapability(Capability),
    #[error(transparent)]
    Precondition(#[from] PreconditionError),
    #[error("{}", .0.join("; "))]
    Handlers(Vec<String>),
}

#[derive(Debug, thiserror::Error)]
pub enum PluginBuildError {
    #[error("plugin [{0}] is not registered")]
    NotRegistered(String),
    #[error("[{plugin}] extra conf parse failed: {source}")]
    InvalidExtra {
        plugin: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("[{plugin}] invalid configuration: {message}")]
    Invalid { plugin: String, message: String },
}

#[async_trait]
/// A named unit of automation bound to one repository.
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    async fn dispatch(&self, ctx: &EventContext) -> Result<DispatchOutcome, DispatchError>;

    /// Starts background work. Called once the plugin is live.
    fn start(&self) {}

    /// Stops background work. Called after the plugin was replaced.
    fn stop(&self) {}
}

#[derive(Debug, Clone)]
/// Fully-resolved configuration handed to a plugin constructor.
pub struct PluginOptions {
    pub plugin: String,
    pub repo: RepoSlug,
    pub alias: AliasOptions,
    pub roles: RoleOptions,
    pub label_roles: LabelRoles,
    pub preconditions: Vec<Precondition>,
    pub extra: serde_json::Value,
}

impl PluginOptions {
    pub fn new(plugin: impl Into<String>, repo: RepoSlug) -> Self {
        Self {
            plugin: plugin.into(),
            repo,
            alias: AliasOptions::default(),
            roles: RoleOptions::default(),
            label_roles: LabelRoles::default(),
            preconditions: Vec::new(),
            extra: serde_json::Value::Null,
        }
    }

    /// Decodes the plugin-specific `extra` blob; `null` yields `T::default()`.
    pub fn decode_extra<T>(&self) -> Result<T, PluginBuildError>
    where
        T: DeserializeOwned + Default,
    {
        if self.extra.is_null() {
            return Ok(T::default());
        }
        serde_json::from_value(self.extra.clone()).map_err(|source| {
            PluginBuildError::InvalidExtra {
                plugin: self.plugin.clone(),
                source,
            }
        })
    }

    pub fn invalid(&self, message: impl Into<String>) -> PluginBuildError {
        PluginBuildError::Invalid {
            plugin: self.plugin.clone(),
            message: message.into(),
        }
    }
}

#[derive(Clone)]
/// Collaborators shared by every plugin instance.
pub struct PluginDeps {
    pub client: Arc<dyn MutationClient>,
    pub notifier: Arc<dyn Notifier>,
}

impl PluginDeps {
    pub fn new(client: Arc<dyn MutationClient>, notifier: Arc<dyn Notifier>) -> Self {
        Self { client, notifier }
    }
}

#[derive(Clone)]
/// State and helpers common to all rule-driven plugins.
pub struct PluginBase {
    deps: PluginDeps,
    options: PluginOptions,
}

impl PluginBase {
    pub fn new(deps: &PluginDeps, options: PluginOptions) -> Self {
        Self {
            deps: deps.clone(),
            options,
        }
    }

    pub fn name(&self) -> &str {
        &self.options.plugin
    }

    pub fn repo(&self) -> &RepoSlug {
        &self.options.repo
    }

    pub fn options(&self) -> &PluginOptions {
        &self.options
    }

    pub fn alias(&self) -> &AliasOptions {
        &self.options.alias
    }

    pub fn roles(&self) -> &RoleOptions {
        &self.options.roles
    }

    pub fn label_roles(&self) -> &LabelRoles {
        &self.options.label_roles
    }

    pub fn client(&self) -> &Arc<dyn MutationClient> {
        &self.deps.client
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.deps.notifier
    }

    pub fn evaluator<'a>(&'a self, ctx: &'a EventContext) -> PreconditionEvaluator<'a> {
        PreconditionEvaluator::new(&ctx.object, &self.options.roles)
    }

    /// Checks `preconditions` against the repository role table.
    pub fn check_preconditions(
        &self,
        ctx: &EventContext,
        preconditions: &[Precondition],
    ) -> Result<(), PreconditionError> {
        self.evaluator(ctx).check_any(preconditions)
    }

    pub fn check_plugin_preconditions(&self, ctx: &EventContext) -> Result<(), PreconditionError> {
        self.check_preconditions(ctx, &self.options.preconditions)
    }

    /// Parses the event body with command names resolved through aliases.
    pub fn parse_commands(&self, ctx: &EventContext, mode: ArgumentMode) -> Vec<Command> {
        let Some(body) = ctx.object.body() else {
            return Vec::new();
        };
        parse_commands(body, mode)
            .into_iter()
            .map(|command| Command {
                name: self.options.alias.resolve_command(&command.name),
                args: command.args,
            })
            .collect()
    }

    pub fn issue_ref(&self, ctx: &EventContext) -> Result<IssueRef> {
        ctx.issue_ref()
            .ok_or_else(|| anyhow!("can't get number from payload"))
    }

    /// Applies `operation` unless the event's cancellation fires first.
    pub async fn apply(&self, ctx: &EventContext, operation: Operation) -> Result<()> {
        tracing::debug!(
            plugin = self.name(),
            operation = operation.name(),
            target = %operation.target(),
            "issuing operation"
        );
        ctx.cancellation
            .run(self.deps.client.apply(operation))
            .await??;
        Ok(())
    }

    pub async fn notify(
        &self,
        ctx: &EventContext,
        options: &NotifyOptions,
        content: &str,
    ) -> Result<()> {
        ctx.cancellation
            .run(self.deps.notifier.send(options, content))
            .await??;
        Ok(())
    }
}
