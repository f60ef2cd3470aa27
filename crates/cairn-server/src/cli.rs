use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(
    name = "cairn",
    about = "GitHub webhook bot driven by per-repository plugins",
    version
)]
pub struct Cli {
    #[arg(
        short = 'c',
        long,
        env = "CAIRN_CONFIG",
        help = "Service configuration file (.json or .toml)."
    )]
    pub config: PathBuf,

    #[arg(long, help = "Listen address; overrides bind_addr from the configuration.")]
    pub bind: Option<String>,

    #[arg(
        long,
        help = "Record and log repository operations and notifications instead of sending them."
    )]
    pub dry_run: bool,
}
