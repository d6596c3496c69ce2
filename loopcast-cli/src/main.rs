//! Loopcast CLI - Command-line interface
//!
//! Serves files from a local or mounted share through the loopback
//! streaming proxy.

mod commands;

use std::path::PathBuf;

use clap::Parser;
use loopcast_core::tracing_setup::{CliLogLevel, init_tracing};

#[derive(Parser)]
#[command(name = "loopcast")]
#[command(about = "Loopback HTTP streaming proxy for network share files")]
struct Cli {
    /// Console log level
    #[arg(long, value_enum, default_value_t = CliLogLevel::Info, global = true)]
    log_level: CliLogLevel,
    /// Directory for the full trace log of this run
    #[arg(long, global = true)]
    logs_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: commands::Commands,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_tracing_level(), cli.logs_dir.as_deref())?;

    if let Err(e) = commands::handle_command(cli.command).await {
        eprintln!("Error: {}", e.user_message());
        return Err(e.into());
    }

    Ok(())
}
