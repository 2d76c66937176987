//! Scan subcommand implementation.
//!
//! Handles `portscout scan <target>`: resolve, optional OS probe, then the
//! port scan itself, rendering results as they arrive.

use crate::cli::OutputFormat;
use crate::config::AppSettings;
use crate::error::{CliError, CliResult};
use crate::fingerprint::{fingerprint, OsGuess};
use crate::output;
use crate::scanner::{CancelFlag, PortResult, ScanCoordinator, ScanReport};
use crate::types::{resolve, PortSpec, Target};
use chrono::Utc;
use clap::Parser;
use console::Term;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Instant;
use tracing::{info, warn};

/// Scan a target for open ports.
#[derive(Parser, Debug, Default)]
pub struct ScanCommand {
    /// Target to scan (IP address or hostname); prompted for if omitted
    #[arg(value_name = "TARGET")]
    pub target: Option<String>,

    /// Ports to scan (e.g., "80", "80,443", "1-1000"); prompted for if omitted
    #[arg(short, long)]
    pub ports: Option<String>,

    /// Maximum number of concurrent probes
    #[arg(short = 'c', long)]
    pub concurrency: Option<usize>,

    /// Connection timeout in milliseconds
    #[arg(short = 't', long = "timeout")]
    pub connect_timeout: Option<u64>,

    /// Banner read timeout in milliseconds
    #[arg(long)]
    pub banner_timeout: Option<u64>,

    /// ICMP echo reply timeout in milliseconds
    #[arg(long)]
    pub icmp_timeout: Option<u64>,

    /// Skip reading banners from open ports
    #[arg(long)]
    pub no_banner: bool,

    /// Skip the ICMP OS detection probe
    #[arg(long)]
    pub no_os: bool,

    /// Rate limit in probes per second (0 = unlimited)
    #[arg(short = 'r', long = "rate")]
    pub rate_limit: Option<u32>,

    /// Output format for results
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Plain)]
    pub output: OutputFormat,

    /// Show closed ports in output
    #[arg(long)]
    pub show_closed: bool,
}

impl ScanCommand {
    /// Scan command for a target given without the `scan` subcommand.
    pub fn for_target(target: Option<String>) -> Self {
        Self {
            target,
            ..Default::default()
        }
    }

    /// Overlay command-line flags on loaded settings.
    pub fn apply(&self, settings: &AppSettings) -> AppSettings {
        let mut effective = settings.clone();
        if let Some(c) = self.concurrency {
            effective.concurrency = c;
        }
        if let Some(t) = self.connect_timeout {
            effective.connect_timeout_ms = t;
        }
        if let Some(t) = self.banner_timeout {
            effective.banner_timeout_ms = t;
        }
        if let Some(t) = self.icmp_timeout {
            effective.icmp_timeout_ms = t;
        }
        if let Some(r) = self.rate_limit {
            effective.rate_limit = r;
        }
        if self.no_banner {
            effective.grab_banners = false;
        }
        if self.no_os {
            effective.os_detection = false;
        }
        if self.show_closed {
            effective.show_closed = true;
        }
        effective
    }

    /// Execute the scan command.
    pub async fn execute(&self, settings: &AppSettings, quiet: bool) -> CliResult<()> {
        let settings = self.apply(settings);
        let chatty = !quiet && self.output == OutputFormat::Plain;

        let target_input = match &self.target {
            Some(t) => t.clone(),
            None => prompt("Target")?,
        };
        let ports_input = match &self.ports {
            Some(p) => p.clone(),
            None => prompt("Port")?,
        };

        let ports: PortSpec = ports_input.parse()?;
        let target = resolve(&target_input).await?;

        let coordinator = ScanCoordinator::tcp(settings.probe_options(), settings.concurrency)?
            .with_rate_limit(settings.rate_limit);

        if chatty {
            output::print_scan_header(
                &target.original,
                &target.ip.to_string(),
                ports.len(),
                coordinator.max_concurrency(),
            );
        }

        let os = if settings.os_detection {
            Some(detect_os(&target, &settings, chatty).await)
        } else {
            None
        };

        let cancel = coordinator.cancel_flag();
        let ctrl_c = tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

        let ports_requested = ports.len();
        let started_at = Utc::now();
        let start = Instant::now();
        let results = collect_results(&coordinator, target.clone(), ports, chatty).await;
        ctrl_c.abort();

        let mut report = ScanReport::new(&target, ports_requested, started_at, start.elapsed(), results);
        match os {
            Some(Ok(guess)) => report = report.with_os(guess),
            Some(Err(warning)) => report = report.with_os_warning(warning),
            None => {}
        }

        info!(
            target = %target,
            open = report.open_ports,
            closed = report.closed_ports,
            filtered = report.filtered_ports,
            cancelled = report.cancelled,
            "scan finished"
        );

        output::print_report(&report, self.output, settings.show_closed)
    }
}

/// Run the OS probe, turning failures into a warning string.
async fn detect_os(
    target: &Target,
    settings: &AppSettings,
    chatty: bool,
) -> Result<OsGuess, String> {
    if !is_root() && chatty {
        output::print_warning("OS detection needs root/sudo (or CAP_NET_RAW) for raw ICMP sockets.");
    }

    fingerprint(target, settings.icmp_timeout())
        .await
        .map_err(|e| {
            warn!(error = %e, "OS detection failed, continuing without it");
            if chatty {
                output::print_warning(&format!("OS detection skipped: {}", e));
            }
            e.to_string()
        })
}

/// Drain the scan stream, showing progress and open ports as they arrive.
async fn collect_results(
    coordinator: &ScanCoordinator,
    target: Target,
    ports: PortSpec,
    chatty: bool,
) -> Vec<PortResult> {
    let total = ports.len();
    let progress = chatty.then(|| {
        let pb = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::default_bar().template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
        ) {
            pb.set_style(style.progress_chars("=>-"));
        }
        pb
    });

    let mut results = Vec::with_capacity(total);
    let mut stream = coordinator.scan_ports(target, ports);
    while let Some(result) = stream.next().await {
        if let Some(pb) = &progress {
            pb.inc(1);
            if result.is_open() {
                pb.suspend(|| output::print_live_result(&result));
            }
        }
        results.push(result);
    }

    if let Some(pb) = progress {
        pb.finish_with_message("Scan complete");
    }
    results
}

async fn cancel_on_ctrl_c(cancel: CancelFlag) {
    if tokio::signal::ctrl_c().await.is_ok() {
        output::print_warning("Interrupted, waiting for in-flight probes...");
        cancel.cancel();
    }
}

/// Ask for a value on the terminal, like `Target: `.
fn prompt(label: &str) -> CliResult<String> {
    let term = Term::stdout();
    term.write_str(&format!("{}: ", label))?;
    let answer = term.read_line()?;
    let answer = answer.trim().to_string();
    if answer.is_empty() {
        return Err(CliError::Other(format!("{} is required", label.to_lowercase())));
    }
    Ok(answer)
}

/// Check if running with root/admin privileges.
fn is_root() -> bool {
    #[cfg(unix)]
    {
        unsafe { libc::geteuid() == 0 }
    }
    #[cfg(not(unix))]
    {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_settings() {
        let settings = AppSettings::default();
        let cmd = ScanCommand {
            concurrency: Some(8),
            connect_timeout: Some(3000),
            no_banner: true,
            no_os: true,
            rate_limit: Some(100),
            ..Default::default()
        };

        let effective = cmd.apply(&settings);
        assert_eq!(effective.concurrency, 8);
        assert_eq!(effective.connect_timeout_ms, 3000);
        assert_eq!(effective.banner_timeout_ms, settings.banner_timeout_ms);
        assert!(!effective.grab_banners);
        assert!(!effective.os_detection);
        assert_eq!(effective.rate_limit, 100);
    }

    #[test]
    fn test_no_flags_keeps_settings() {
        let settings = AppSettings {
            concurrency: 300,
            show_closed: true,
            ..Default::default()
        };
        let effective = ScanCommand::for_target(Some("127.0.0.1".into())).apply(&settings);
        assert_eq!(effective, settings);
    }

    #[tokio::test]
    async fn test_zero_concurrency_is_an_error() {
        let cmd = ScanCommand {
            target: Some("127.0.0.1".into()),
            ports: Some("1".into()),
            concurrency: Some(0),
            no_os: true,
            output: OutputFormat::Json,
            ..Default::default()
        };
        let result = cmd.execute(&AppSettings::default(), true).await;
        assert!(matches!(result, Err(CliError::Scan(_))));
    }

    #[tokio::test]
    async fn test_bad_ports_are_rejected_before_scanning() {
        let cmd = ScanCommand {
            target: Some("127.0.0.1".into()),
            ports: Some("0-10".into()),
            ..Default::default()
        };
        let result = cmd.execute(&AppSettings::default(), true).await;
        assert!(matches!(result, Err(CliError::Port(_))));
    }
}
