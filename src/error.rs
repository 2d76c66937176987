//! Error types for portscout.
//!
//! Uses `thiserror` for ergonomic error definitions. Network outcomes of a
//! probe (refused, timed out, undecodable banner) are not errors; they are
//! reported as data on [`crate::scanner::PortResult`].

use std::path::PathBuf;
use thiserror::Error;

use crate::types::PortError;

/// Failure to turn a target string into an address. Fatal for a scan.
#[derive(Error, Debug, Clone)]
pub enum ResolveError {
    #[error("target must not be empty")]
    Empty,

    #[error("invalid target format: {0}")]
    InvalidFormat(String),

    #[error("failed to resolve hostname '{name}': {reason}")]
    Lookup { name: String, reason: String },

    #[error("no IP addresses found for hostname '{0}'")]
    NoAddresses(String),
}

/// Main error type for scanning operations.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("port {0} is out of valid range (1-65535)")]
    InvalidPort(u16),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Transport or privilege failure while sending or receiving the ICMP probe.
///
/// Never fatal: the scan continues without an OS guess.
#[derive(Error, Debug)]
pub enum FingerprintError {
    #[error("permission denied opening raw ICMP socket: {0}")]
    PermissionDenied(String),

    #[error("OS detection not supported: {0}")]
    Unsupported(String),

    #[error("ICMP probe failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from loading or saving settings.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not determine a configuration directory")]
    DirectoryNotFound,

    #[error("failed to read {path}: {reason}")]
    ReadFailed { path: PathBuf, reason: String },

    #[error("failed to write {path}: {reason}")]
    WriteFailed { path: PathBuf, reason: String },

    #[error("invalid settings file: {0}")]
    InvalidFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors surfaced by the command-line layer.
#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Port(#[from] PortError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for scan operations.
pub type ScanResult<T> = Result<T, ScanError>;

/// Result type alias for settings operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type alias for CLI handlers.
pub type CliResult<T> = Result<T, CliError>;
