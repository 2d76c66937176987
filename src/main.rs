//! portscout command-line entry point.
//!
//! Usage:
//!   portscout [TARGET]
//!   portscout scan <TARGET> [-p <PORTS>] [-c <N>] [-o plain|json|csv]
//!   portscout settings [--init]

use anyhow::Context;
use clap::Parser;
use portscout::cli::{self, Cli, Commands, ScanCommand};
use portscout::output;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG wins; otherwise --verbose turns on our own debug logs.
    let default_filter = if cli.verbose { "portscout=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = cli::load_settings(cli.config.as_deref()).context("failed to load settings")?;

    match cli.command {
        Some(Commands::Scan(cmd)) => cmd.execute(&settings, cli.quiet).await?,
        Some(Commands::Settings(cmd)) => cmd.execute(&settings, cli.config.as_deref())?,
        None => {
            ScanCommand::for_target(cli.target)
                .execute(&settings, cli.quiet)
                .await?
        }
    }

    Ok(())
}
