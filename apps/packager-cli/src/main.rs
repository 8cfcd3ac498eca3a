//! apkforge entry point.

mod adapters;
mod commands;
mod config;
mod render;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "apkforge", version)]
#[command(about = "Package web games as Android apps with a remote build service", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, env = "APKFORGE_CONFIG")]
    config: Option<PathBuf>,

    /// More detailed logs
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "info,apkforge=debug"
    } else {
        "warn,apkforge=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "starting apkforge");

    let config_path = config::config_path(cli.config);
    handle_command(cli.command, &config_path).await
}
