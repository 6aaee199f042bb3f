//! recordsync - Polling Daemon and CLI
//!
//! Keeps local SQLite tables and remote CRM objects in step:
//! - `serve` runs every configured mapping on its interval until Ctrl-C
//! - `run` performs a single cycle and prints what it changed
//! - `mappings` and `watermark` inspect the configuration and sync state
//!
//! Configuration: `~/.recordsync/recordsync.json` or `--config`.

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod scheduler;

use cli::{Cli, Commands};
use recordsync_core::modules::config::default_config_path;
use recordsync_core::{load_config, Engine};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    let config_path = match cli.config {
        Some(path) => path,
        None => default_config_path()?,
    };
    let config = load_config(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            info!(
                version = env!("GIT_VERSION"),
                built = env!("BUILD_TIME"),
                config = %config_path.display(),
                "recordsync starting"
            );
            let engine = Engine::from_config(&config).await.context("failed to start engine")?;
            scheduler::serve(Arc::new(engine)).await
        },
        Commands::Run { mapping, json } => {
            commands::handle_run(&config, mapping.as_deref(), json).await
        },
        Commands::Mappings { json } => commands::handle_mappings(&config, json),
        Commands::Watermark(cmd) => commands::handle_watermark_command(&config, cmd).await,
    }
}
