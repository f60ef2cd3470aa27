use std::{fmt, sync::Arc};

use cairn_events::{CapabilityObject, EventDecodeError, EventKind, RawEvent, RepoSlug};
use tokio::sync::RwLock;

use crate::{CancellationToken, DispatchError, DispatchOutcome, EventContext, RepoPluginMap};

#[derive(Debug)]
/// One plugin's failure while routing an event.
pub struct PluginFailure {
    pub plugin: String,
    pub error: DispatchError,
}

impl fmt::Display for PluginFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.plugin, self.error)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("no support event: {0}")]
    UnsupportedEvent(String),
    #[error("error event payload: {0}")]
    Payload(#[source] EventDecodeError),
    #[error("event no owner and repo info")]
    MissingOwnerRepo,
    #[error("no correspond plugins for {0}")]
    NoPlugins(RepoSlug),
    #[error("{}", render_failures(.0))]
    Plugins(Vec<PluginFailure>),
}

fn render_failures(failures: &[PluginFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl RouteError {
    /// HTTP status a webhook listener should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            RouteError::Plugins(_) => 500,
            _ => 400,
        }
    }
}

impl From<EventDecodeError> for RouteError {
    fn from(error: EventDecodeError) -> Self {
        match error {
            EventDecodeError::UnsupportedEvent(kind) => RouteError::UnsupportedEvent(kind),
            other => RouteError::Payload(other),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Successful routing summary.
pub struct RouteReport {
    pub repo: Option<RepoSlug>,
    pub handled: Vec<String>,
    pub not_supported: Vec<String>,
}

/// Top-level entry point from webhook bytes to plugin dispatches.
pub struct EventRouter {
    plugins: RwLock<RepoPluginMap>,
}

impl EventRouter {
    /// Starts every plugin of `plugins` and serves from it.
    pub fn new(plugins: RepoPluginMap) -> Self {
        plugins.start_all();
        Self {
            plugins: RwLock::new(plugins),
        }
    }

    /// Swaps the whole plugin map, then stops the replaced plugins.
    ///
    /// Waits for in-flight routes holding the previous map to finish.
    pub async fn replace_plugins(&self, next: RepoPluginMap) {
        next.start_all();
        let repos = next.len();
        let plugins = next.plugin_count();
        let previous = {
            let mut guard = self.plugins.write().await;
            std::mem::replace(&mut *guard, next)
        };
        previous.stop_all();
        tracing::info!(repos, plugins, "plugin map replaced");
    }

    /// Stops every live plugin.
    pub async fn shutdown(&self) {
        self.plugins.read().await.stop_all();
    }

    pub async fn repo_count(&self) -> usize {
        self.plugins.read().await.len()
    }

    /// Decodes `payload`, resolves the repository and dispatches to each of
    /// its plugins in order. Every plugin gets a turn; failures are merged.
    pub async fn route_event(
        &self,
        cancellation: CancellationToken,
        event_type: &str,
        payload: &[u8],
    ) -> Result<RouteReport, RouteError> {
        let event = RawEvent::decode(event_type, payload)?;
        let kind = event.kind();
        if kind == EventKind::Ping {
            tracing::debug!("ping event accepted");
            return Ok(RouteReport::default());
        }
        let repo = event.repo_slug().ok_or(RouteError::MissingOwnerRepo)?;
        let ctx = EventContext::new(
            cancellation,
            kind,
            repo.clone(),
            Arc::new(CapabilityObject::new(event)),
        );

        // Held for the whole traversal so a reload cannot interleave.
        let plugins = self.plugins.read().await;
        let Some(list) = plugins.get(&repo).filter(|list| !list.is_empty()) else {
            return Err(RouteError::NoPlugins(repo));
        };

        let mut report = RouteReport {
            repo: Some(repo.clone()),
            ..RouteReport::default()
        };
        let mut failures = Vec::new();
        for plugin in list {
            match plugin.dispatch(&ctx).await {
                Ok(DispatchOutcome::NotSupported) => {
                    tracing::debug!(repo = %repo, plugin = plugin.name(), "plugin not supported");
                    report.not_supported.push(plugin.name().to_string());
                }
                Ok(DispatchOutcome::Handled) => {
                    tracing::info!(repo = %repo, plugin = plugin.name(), event = %kind, "plugin handled event");
                    report.handled.push(plugin.name().to_string());
                }
                Err(error) => {
                    tracing::warn!(
                        repo = %repo,
                        plugin = plugin.name(),
                        event = %kind,
                        error = %error,
                        "plugin failed"
                    );
                    failures.push(PluginFailure {
                        plugin: plugin.name().to_string(),
                        error,
                    });
                }
            }
        }
        drop(plugins);

        if failures.is_empty() {
            Ok(report)
        } else {
            Err(RouteError::Plugins(failures))
        }
    }
}
