//! Ordered handler rules and the matcher that drives them.

use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use cairn_events::{Capability, EventKind};

use crate::{
    ArgumentMode, Command, DispatchError, DispatchOutcome, EventContext, Plugin, PluginBase,
};

#[derive(Debug, Clone)]
/// One (event kinds, actions, required capabilities, handler) tuple.
pub struct HandlerRule<H> {
    pub events: Vec<EventKind>,
    pub actions: Vec<String>,
    pub required: Vec<Capability>,
    pub argument_mode: ArgumentMode,
    pub handler: H,
}

impl<H> HandlerRule<H> {
    pub fn new(handler: H) -> Self {
        Self {
            events: Vec::new(),
            actions: Vec::new(),
            required: Vec::new(),
            argument_mode: ArgumentMode::Split,
            handler,
        }
    }

    pub fn events(mut self, events: impl IntoIterator<Item = EventKind>) -> Self {
        self.events = events.into_iter().collect();
        self
    }

    pub fn actions<'a>(mut self, actions: impl IntoIterator<Item = &'a str>) -> Self {
        self.actions = actions.into_iter().map(ToOwned::to_owned).collect();
        self
    }

    pub fn requires(mut self, required: impl IntoIterator<Item = Capability>) -> Self {
        self.required = required.into_iter().collect();
        self
    }

    pub fn argument_mode(mut self, mode: ArgumentMode) -> Self {
        self.argument_mode = mode;
        self
    }

    /// Empty event or action lists accept everything. A declared action list
    /// rejects events without an action.
    pub fn applies_to(&self, ctx: &EventContext) -> bool {
        if !self.events.is_empty() && !self.events.contains(&ctx.kind) {
            return false;
        }
        if !self.actions.is_empty() {
            let Some(action) = ctx.object.action() else {
                return false;
            };
            if !self.actions.iter().any(|candidate| candidate == action) {
                return false;
            }
        }
        true
    }

    pub fn missing_capability(&self, ctx: &EventContext) -> Option<Capability> {
        self.required
            .iter()
            .copied()
            .find(|capability| !ctx.object.has(*capability))
    }
}

/// Input to a handler body: the event plus commands parsed with the
/// rule's argument mode.
pub struct Invocation<'a> {
    pub ctx: &'a EventContext,
    pub commands: Vec<Command>,
}

impl Invocation<'_> {
    pub fn commands_named<'b>(&'b self, name: &'b str) -> impl Iterator<Item = &'b Command> + 'b {
        self.commands
            .iter()
            .filter(move |command| command.name == name)
    }
}

#[async_trait]
/// Handler bodies of a rule-driven plugin, selected by `Self::Handler`.
pub trait RuleHandlers: Send + Sync + 'static {
    type Handler: Copy + fmt::Debug + Send + Sync + 'static;

    async fn handle(
        &self,
        base: &PluginBase,
        handler: Self::Handler,
        invocation: &Invocation<'_>,
    ) -> Result<()>;

    fn start(&self, _base: &PluginBase) {}

    fn stop(&self) {}
}

/// [`Plugin`] built from a [`PluginBase`], ordered rules and handler bodies.
pub struct RulePlugin<R: RuleHandlers> {
    base: PluginBase,
    rules: Vec<HandlerRule<R::Handler>>,
    handlers: R,
}

impl<R: RuleHandlers> RulePlugin<R> {
    pub fn new(base: PluginBase, rules: Vec<HandlerRule<R::Handler>>, handlers: R) -> Self {
        Self {
            base,
            rules,
            handlers,
        }
    }

    pub fn base(&self) -> &PluginBase {
        &self.base
    }

    pub fn handlers(&self) -> &R {
        &self.handlers
    }
}

#[async_trait]
impl<R: RuleHandlers> Plugin for RulePlugin<R> {
    fn name(&self) -> &str {
        self.base.name()
    }

    async fn dispatch(&self, ctx: &EventContext) -> Result<DispatchOutcome, DispatchError> {
        let mut handled = false;
        let mut preconditions_met = false;
        let mut failures = Vec::new();
        for rule in &self.rules {
            if !rule.applies_to(ctx) {
                continue;
            }
            handled = true;

            if let Some(missing) = rule.missing_capability(ctx) {
                return Err(DispatchError::MissingCapability(missing));
            }

            if !preconditions_met {
                self.base.check_plugin_preconditions(ctx)?;
                preconditions_met = true;
            }

            let invocation = Invocation {
                ctx,
                commands: self.base.parse_commands(ctx, rule.argument_mode),
            };
            if let Err(error) = self
                .handlers
                .handle(&self.base, rule.handler, &invocation)
                .await
            {
                tracing::warn!(
                    plugin = self.base.name(),
                    repo = %ctx.repo,
                    handler = ?rule.handler,
                    error = %format!("{error:#}"),
                    "handler failed"
                );
                failures.push(format!("{error:#}"));
            }
        }

        if !handled {
            return Ok(DispatchOutcome::NotSupported);
        }
        if failures.is_empty() {
            Ok(DispatchOutcome::Handled)
        } else {
            Err(DispatchError::Handlers(failures))
        }
    }

    fn start(&self) {
        self.handlers.start(&self.base);
    }

    fn stop(&self) {
        self.handlers.stop();
    }
}
