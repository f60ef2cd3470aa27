use anyhow::Result;
use cairn_server::{init_tracing, load_service_config, run_service, Cli, DEFAULT_LOG_LEVEL};
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = load_service_config(&cli.config)?;
    if let Some(bind) = cli.bind {
        config.bind_addr = bind;
    }
    init_tracing(config.log_level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL));
    run_service(config, cli.dry_run).await
}
