//! CSV output formatting.

use crate::scanner::ScanReport;
use std::io::Write;

/// Write one row per probed port.
pub fn write_csv<W: Write>(report: &ScanReport, out: W) -> csv::Result<()> {
    let mut wtr = csv::Writer::from_writer(out);

    wtr.write_record(["port", "status", "service", "banner", "response_time_ms", "error"])?;

    for result in &report.results {
        wtr.write_record([
            result.port.to_string().as_str(),
            result.status.to_string().as_str(),
            result.service.as_str(),
            result.banner.as_ref().map(|b| b.display()).as_deref().unwrap_or(""),
            result
                .response_time_ms
                .map_or(String::new(), |t| t.to_string())
                .as_str(),
            result.error.as_deref().unwrap_or(""),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
