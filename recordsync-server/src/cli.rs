use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "recordsync",
    about = "recordsync - keep SQLite tables and a remote CRM in step",
    version = env!("GIT_VERSION"),
    author,
    propagate_version = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[arg(short, long, env = "RECORDSYNC_CONFIG", help = "Path to recordsync.json")]
    pub config: Option<PathBuf>,

    #[arg(short, long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run every mapping on its interval until Ctrl-C (default)")]
    Serve,

    #[command(about = "Run one cycle and print the reports")]
    Run {
        #[arg(short, long, help = "Only this mapping")]
        mapping: Option<String>,

        #[arg(short, long, help = "Output as JSON")]
        json: bool,
    },

    #[command(about = "List configured mappings")]
    Mappings {
        #[arg(short, long, help = "Output as JSON")]
        json: bool,
    },

    #[command(subcommand, about = "Inspect or reset per-mapping watermarks")]
    Watermark(WatermarkCommands),
}

#[derive(Subcommand)]
pub enum WatermarkCommands {
    #[command(about = "Show the last completed cycle of each mapping")]
    Show {
        #[arg(short, long, help = "Output as JSON")]
        json: bool,
    },

    #[command(about = "Forget watermarks so the next cycle rescans everything")]
    Reset {
        #[arg(help = "Mapping name (every configured mapping when omitted)")]
        mapping: Option<String>,
    },
}
