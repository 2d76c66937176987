//! # portscout - a concurrent TCP port scanner
//!
//! portscout probes a single host for open TCP ports, reads whatever each
//! service sends first, and makes a coarse OS guess from the TTL of an ICMP
//! echo reply.
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use portscout::scanner::{ProbeOptions, ScanCoordinator};
//! use portscout::types::{resolve, PortSpec};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let target = resolve("192.168.1.1").await?;
//!     let ports = PortSpec::from_numbers(1..=1024)?;
//!     let coordinator = ScanCoordinator::tcp(ProbeOptions::default(), 50)?;
//!
//!     let mut results = coordinator.scan_ports(target, ports);
//!     while let Some(result) = results.next().await {
//!         println!("Port {} is {}", result.port, result.status);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`types`] - `Port`, `PortSpec`, `Target` and the resolver
//! - [`scanner`] - TCP prober and the bounded-concurrency coordinator
//! - [`banner`] / [`services`] - banner capture and service naming
//! - [`fingerprint`] - ICMP TTL OS guess
//! - [`config`], [`cli`], [`output`] - the command-line front end
//! - [`error`] - error types

pub mod banner;
pub mod cli;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod output;
pub mod scanner;
pub mod services;
pub mod types;

// Re-export commonly used types
pub use error::{CliError, FingerprintError, ResolveError, ScanError};
pub use fingerprint::{fingerprint, OsGuess, OsLabel};
pub use scanner::{probe, PortResult, PortStatus, ProbeOptions, ScanCoordinator, ScanReport};
pub use types::{resolve, Port, PortSpec, Target};
