//! CLI subcommand definitions and handlers.
//!
//! - `portscout scan [TARGET] -p <PORTS>` - Scan a target
//! - `portscout settings [--init]` - Show or create the settings file
//! - `portscout [TARGET]` - Same as `scan`; prompts for anything missing

mod scan;
mod settings;

pub use scan::ScanCommand;
pub use settings::SettingsCommand;

use crate::config::AppSettings;
use crate::error::CliResult;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::warn;

/// portscout - a concurrent TCP port scanner.
///
/// Probes ports with full TCP connects, reads service banners and makes a
/// rough OS guess from the TTL of an ICMP echo reply.
#[derive(Parser, Debug)]
#[command(name = "portscout")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "A concurrent TCP port scanner", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to custom settings file
    #[arg(long, global = true, value_name = "PATH", env = "PORTSCOUT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Target to scan when no subcommand is given
    #[arg(value_name = "TARGET", hide = true)]
    pub target: Option<String>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan a target for open ports
    #[command(alias = "s")]
    Scan(ScanCommand),

    /// Show or initialize settings
    Settings(SettingsCommand),
}

/// Output format for results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable plain text
    #[default]
    Plain,
    /// JSON structured output
    Json,
    /// CSV format for data analysis
    Csv,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain => write!(f, "plain"),
            Self::Json => write!(f, "json"),
            Self::Csv => write!(f, "csv"),
        }
    }
}

/// Load settings from an explicit path, or the default location.
///
/// An explicit path that does not exist yet yields the defaults, so that
/// `settings --init --config <PATH>` can create it.
pub fn load_settings(path: Option<&Path>) -> CliResult<AppSettings> {
    let settings = match path {
        Some(path) if path.exists() => AppSettings::load_from(path)?,
        Some(path) => {
            warn!(path = %path.display(), "settings file not found, using defaults");
            AppSettings::default()
        }
        None => AppSettings::load()?,
    };
    Ok(settings)
}
