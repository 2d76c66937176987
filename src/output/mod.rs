//! Output formatting module.
//!
//! Provides formatters for plain text, JSON, and CSV output of scan reports.

mod csv_format;
mod json_format;
mod plain;

pub use csv_format::write_csv;
pub use json_format::write_json;
pub use plain::{
    print_error, print_info, print_live_result, print_scan_header, print_warning, write_plain,
};

use crate::cli::OutputFormat;
use crate::error::CliResult;
use crate::scanner::ScanReport;
use std::io;

/// Format and print a scan report according to the specified format.
pub fn print_report(report: &ScanReport, format: OutputFormat, show_closed: bool) -> CliResult<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match format {
        OutputFormat::Plain => write_plain(report, show_closed, &mut out)?,
        OutputFormat::Json => write_json(report, &mut out)?,
        OutputFormat::Csv => write_csv(report, &mut out)?,
    }
    Ok(())
}

/// Truncate a string to a maximum number of characters, adding ellipsis if truncated.
pub(crate) fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
