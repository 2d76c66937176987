//! Settings subcommand implementation.

use crate::config::{AppSettings, Paths};
use crate::error::{CliError, CliResult};
use crate::output;
use clap::Parser;
use std::path::{Path, PathBuf};

/// Show the effective settings, or write a default settings file.
#[derive(Parser, Debug, Default)]
pub struct SettingsCommand {
    /// Write default settings to the settings file
    #[arg(long)]
    pub init: bool,

    /// Overwrite an existing file when used with --init
    #[arg(long, requires = "init")]
    pub force: bool,
}

impl SettingsCommand {
    /// Execute the settings command.
    ///
    /// `config` is the `--config` path, if one was given.
    pub fn execute(&self, settings: &AppSettings, config: Option<&Path>) -> CliResult<()> {
        let path = match config {
            Some(path) => path.to_path_buf(),
            None => Paths::new()?.settings_file(),
        };

        if self.init {
            let written = self.init_file(&path)?;
            output::print_info(&format!("Wrote default settings to {}", written.display()));
            return Ok(());
        }

        output::print_info(&format!("Settings file: {}", path.display()));
        let json = serde_json::to_string_pretty(settings)
            .map_err(|e| CliError::Other(e.to_string()))?;
        println!("{}", json);
        Ok(())
    }

    fn init_file(&self, path: &Path) -> CliResult<PathBuf> {
        if path.exists() && !self.force {
            return Err(CliError::Other(format!(
                "{} already exists (use --force to overwrite)",
                path.display()
            )));
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        AppSettings::default().save_to(path)?;
        Ok(path.to_path_buf())
    }
}
