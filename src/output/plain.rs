//! Plain text output formatting.
//!
//! Produces human-readable output with colors and formatting.

use super::truncate_string;
use crate::scanner::{PortResult, PortStatus, ScanReport};
use console::{style, Style};
use std::io::{self, Write};

const RULE: &str = "═══════════════════════════════════════════════════════════════";
const THIN_RULE: &str = "───────────────────────────────────────────────────────────────";

fn status_style(status: PortStatus) -> Style {
    match status {
        PortStatus::Open => Style::new().green().bold(),
        PortStatus::Closed => Style::new().red(),
        PortStatus::Filtered => Style::new().yellow(),
    }
}

/// Write a report in human-readable plain text format.
pub fn write_plain<W: Write>(report: &ScanReport, show_closed: bool, out: &mut W) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", style(RULE).cyan())?;
    writeln!(
        out,
        "                    {} Scan Results",
        style("portscout").cyan().bold()
    )?;
    writeln!(out, "{}", style(RULE).cyan())?;
    writeln!(out)?;

    writeln!(out, "  {} {}", style("Target:").bold(), report.target)?;
    writeln!(out, "  {} {}", style("IP Address:").bold(), report.ip_address)?;
    match (&report.os, &report.os_warning) {
        (Some(os), _) => writeln!(out, "  {} {}", style("OS Guess:").bold(), os)?,
        (None, Some(warning)) => writeln!(
            out,
            "  {} {}",
            style("OS Guess:").bold(),
            style(format!("unavailable ({})", warning)).dim()
        )?,
        (None, None) => {}
    }
    writeln!(out)?;

    writeln!(
        out,
        "  {} {} ports scanned in {:.2}s",
        style("Statistics:").bold(),
        report.ports_scanned,
        report.duration_ms as f64 / 1000.0
    )?;
    writeln!(
        out,
        "               {} open, {} closed, {} filtered",
        style(report.open_ports).green().bold(),
        style(report.closed_ports).red(),
        style(report.filtered_ports).yellow()
    )?;
    if report.cancelled {
        writeln!(
            out,
            "               {}",
            style(format!(
                "scan cancelled: {} of {} ports probed",
                report.ports_scanned, report.ports_requested
            ))
            .yellow()
        )?;
    }
    writeln!(out)?;

    let mut rows = report.visible_results(show_closed).peekable();
    if rows.peek().is_none() {
        writeln!(out, "  {}", style("No ports to display.").dim())?;
    } else {
        writeln!(out, "  {}", style(THIN_RULE).dim())?;
        writeln!(
            out,
            "  {:>6}  {:^10}  {:<15}  {}",
            style("PORT").bold(),
            style("STATE").bold(),
            style("SERVICE").bold(),
            style("BANNER").bold()
        )?;
        writeln!(out, "  {}", style(THIN_RULE).dim())?;

        for result in rows {
            let banner_display = result
                .banner
                .as_ref()
                .map(|b| truncate_string(&b.display(), 35))
                .unwrap_or_default();

            writeln!(
                out,
                "  {:>6}  {:^10}  {:<15}  {}",
                result.port,
                status_style(result.status).apply_to(result.status.to_string()),
                result.service,
                style(banner_display).dim()
            )?;
        }

        writeln!(out, "  {}", style(THIN_RULE).dim())?;
    }

    writeln!(out)?;
    writeln!(out, "{}", style(RULE).cyan())?;
    writeln!(out)?;

    Ok(())
}

/// Print one result as soon as it arrives.
pub fn print_live_result(result: &PortResult) {
    let line = format!("Port {} is {}", result.port, result.status);
    match result.banner.as_ref() {
        Some(banner) => println!(
            "{}    {}",
            status_style(result.status).apply_to(line),
            truncate_string(&banner.display(), 60)
        ),
        None => println!("{}", status_style(result.status).apply_to(line)),
    }
}

/// Print a scan header before scanning begins.
pub fn print_scan_header(target: &str, ip: &str, ports: usize, concurrency: usize) {
    println!();
    println!(
        "{} {} v{}",
        style("Starting").cyan(),
        style("portscout").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!(
        "{} Target: {} ({})",
        style("•").dim(),
        style(target).white().bold(),
        ip
    );
    println!(
        "{} Scanning {} ports, {} at a time...",
        style("•").dim(),
        style(ports).white().bold(),
        concurrency
    );
    println!();
}

/// Print an informational message.
pub fn print_info(msg: &str) {
    eprintln!("{} {}", style("Info:").cyan().bold(), msg);
}

/// Print an error message.
pub fn print_error(msg: &str) {
    eprintln!("{} {}", style("Error:").red().bold(), msg);
}

/// Print a warning message.
pub fn print_warning(msg: &str) {
    eprintln!("{} {}", style("Warning:").yellow().bold(), msg);
}
