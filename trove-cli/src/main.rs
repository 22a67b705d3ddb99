//! Trove CLI - Command-line interface
//!
//! Serves a media library over HTTP, or runs one-off queries against it.

mod commands;

use std::path::PathBuf;

use clap::Parser;
use trove_core::tracing_setup::{CliLogLevel, init_tracing};

#[derive(Parser)]
#[command(name = "trove")]
#[command(version, about = "A media library query and streaming server")]
struct Cli {
    /// Console log level (the log file always records everything)
    #[arg(long, global = true, value_enum, default_value_t = CliLogLevel::Info)]
    log_level: CliLogLevel,

    /// Directory for the per-run log file
    #[arg(long, global = true)]
    logs_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: commands::Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_tracing_level(), cli.logs_dir.as_deref())?;

    commands::handle_command(cli.command).await
}
