//! Application settings and paths.
//!
//! Settings live in `settings.json` under the XDG config directory and
//! supply defaults that command-line flags override.

use crate::error::{ConfigError, ConfigResult};
use crate::fingerprint::DEFAULT_ICMP_TIMEOUT;
use crate::scanner::{ProbeOptions, DEFAULT_MAX_CONCURRENCY};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application directory paths following the XDG Base Directory Specification.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Configuration directory (~/.config/portscout)
    pub config_dir: PathBuf,
}

impl Paths {
    /// Locate the configuration directory for the current user.
    pub fn new() -> ConfigResult<Self> {
        let project = ProjectDirs::from("com", "portscout", "portscout")
            .ok_or(ConfigError::DirectoryNotFound)?;

        Ok(Self {
            config_dir: project.config_dir().to_path_buf(),
        })
    }

    /// Get the path to the settings file.
    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join("settings.json")
    }
}

/// Application-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Maximum number of probes in flight.
    pub concurrency: usize,
    /// TCP connect timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// Banner read timeout in milliseconds.
    pub banner_timeout_ms: u64,
    /// ICMP echo reply timeout in milliseconds.
    pub icmp_timeout_ms: u64,
    /// Read a banner from open ports.
    pub grab_banners: bool,
    /// Run the ICMP TTL probe before scanning.
    pub os_detection: bool,
    /// Include closed ports in plain output.
    pub show_closed: bool,
    /// Maximum probes started per second, 0 for unlimited.
    pub rate_limit: u32,
}

impl Default for AppSettings {
    fn default() -> Self {
        let probe = ProbeOptions::default();
        Self {
            concurrency: DEFAULT_MAX_CONCURRENCY,
            connect_timeout_ms: probe.connect_timeout.as_millis() as u64,
            banner_timeout_ms: probe.banner_timeout.as_millis() as u64,
            icmp_timeout_ms: DEFAULT_ICMP_TIMEOUT.as_millis() as u64,
            grab_banners: probe.grab_banners,
            os_detection: true,
            show_closed: false,
            rate_limit: 0,
        }
    }
}

impl AppSettings {
    /// Load settings from the default location, or defaults if none exist.
    pub fn load() -> ConfigResult<Self> {
        let file = Paths::new()?.settings_file();
        if !file.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&file)
    }

    /// Load settings from a specific file.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        serde_json::from_str(&content).map_err(|e| ConfigError::InvalidFormat(e.to_string()))
    }

    /// Save settings to a specific file.
    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| ConfigError::WriteFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Probe options derived from these settings.
    pub fn probe_options(&self) -> ProbeOptions {
        ProbeOptions {
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            banner_timeout: Duration::from_millis(self.banner_timeout_ms),
            grab_banners: self.grab_banners,
        }
    }

    /// ICMP reply timeout.
    pub fn icmp_timeout(&self) -> Duration {
        Duration::from_millis(self.icmp_timeout_ms)
    }
}
