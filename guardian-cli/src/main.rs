//! backup-guardian: periodic backup sync with a recorded run history.
//!
//! # Usage
//!
//! ```text
//! backup-guardian run --sync-source gdrive: --sync-dest s3:bucket [--sync-interval 6h]
//! backup-guardian history list [--job <name>] [--limit N] [--offset N] [--json]
//! backup-guardian history show <run-id> [--json]
//! ```
//!
//! Every flag can also come from a `BG_*` environment variable or a `.env`
//! file in the working directory.

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use commands::{history::HistoryCommand, run::RunArgs};
use guardian_runner::LogFormat;

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "backup-guardian",
    version,
    about = "Keep a backup destination in sync and record every attempt",
    long_about = None,
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Settings shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Directory holding the run history.
    #[arg(long, env = "BG_DATA_DIR", default_value = ".", global = true)]
    pub data_dir: PathBuf,

    /// Log level or filter directive (overridden by RUST_LOG).
    #[arg(long, env = "BG_LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: String,

    /// Log line encoding: json or text.
    #[arg(long, env = "BG_LOG_FORMAT", default_value = "json", global = true)]
    pub log_format: LogFormat,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sync now, then on every interval until SIGINT/SIGTERM.
    Run(RunArgs),

    /// Inspect recorded sync runs.
    History {
        #[command(subcommand)]
        command: HistoryCommand,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => args.run(&cli.global),
        Commands::History { command } => commands::history::run(command, &cli.global),
    }
}
