//! JSON output formatting.

use crate::scanner::ScanReport;
use std::io::{self, Write};

/// Write the full report as pretty-printed JSON.
pub fn write_json<W: Write>(report: &ScanReport, out: &mut W) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, report).map_err(io::Error::from)?;
    writeln!(out)
}
