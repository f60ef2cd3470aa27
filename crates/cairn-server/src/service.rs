use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use cairn_client::{GithubApiClient, MutationClient, RecordingMutationClient};
use cairn_notify::{Notifier, NotifyController, RecordingNotifier};
use cairn_plugin::{EventRouter, PluginDeps, RepoPluginMap};
use cairn_plugins::builtin_registry;
use tokio::net::TcpListener;

use crate::{build_webhook_router, spawn_reload_worker, RepoConfigWatcher, ServiceConfig, WebhookState};

/// GitHub client and notifier; dry runs record writes and notifications.
pub fn build_plugin_deps(config: &ServiceConfig, dry_run: bool) -> Result<PluginDeps> {
    let github = Arc::new(GithubApiClient::new(
        &config.github_api_base,
        &config.github_access_token,
        config.request_timeout_ms,
    )?);
    if dry_run {
        let client: Arc<dyn MutationClient> =
            Arc::new(RecordingMutationClient::delegating_reads(github));
        let notifier: Arc<dyn Notifier> = Arc::new(RecordingNotifier::new());
        return Ok(PluginDeps::new(client, notifier));
    }
    let notifier = NotifyController::new(config.request_timeout_ms)?;
    Ok(PluginDeps::new(github, Arc::new(notifier)))
}

/// Runs the webhook listener until Ctrl-C, then stops every plugin.
pub async fn run_service(config: ServiceConfig, dry_run: bool) -> Result<()> {
    let bind_addr = config
        .bind_addr
        .parse::<SocketAddr>()
        .with_context(|| format!("invalid bind_addr '{}'", config.bind_addr))?;

    let registry = builtin_registry();
    let deps = build_plugin_deps(&config, dry_run)?;
    let repo_configs = config.resolve_repo_configs()?;
    let plugins = RepoPluginMap::build(&registry, &deps, &repo_configs)
        .context("failed to build repository plugins")?;
    let router = Arc::new(EventRouter::new(plugins));

    let reload_handle = config.repo_conf_dir.as_ref().map(|_| {
        let interval = Duration::from_secs(config.repo_conf_dir_update_interval_s.max(1));
        let watcher = RepoConfigWatcher::new(
            config.clone(),
            registry.clone(),
            deps.clone(),
            router.clone(),
            repo_configs.clone(),
        );
        spawn_reload_worker(watcher, interval)
    });

    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind cairn webhook server on {bind_addr}"))?;
    let local_addr = listener
        .local_addr()
        .context("failed to resolve bound webhook server address")?;
    let repos = router.repo_count().await;
    tracing::info!(
        addr = %local_addr,
        repos,
        dry_run,
        signature_check = config.webhook_secret.is_some(),
        "cairn webhook server listening"
    );

    let app = build_webhook_router(WebhookState::new(
        router.clone(),
        config.webhook_secret.clone(),
    ));
    let serve_result = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await;

    if let Some(handle) = reload_handle {
        handle.abort();
    }
    router.shutdown().await;
    tracing::info!("cairn webhook server stopped");
    serve_result.context("cairn webhook server exited unexpectedly")
}
