//! CSV export for tick history.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::sim::types::TickState;

/// Column header for CSV history export.
const HEADER: &str = "timestamp,minute_of_day,production_kw,microgrid_used_kw,\
                      grid_import_kw,grid_export_kw,unserved_kw";

/// Exports tick history to a CSV file at the given path.
///
/// Writes a header row followed by one data row per tick with the community
/// totals. Produces deterministic output for identical inputs.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_csv(history: &[TickState], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    let buf = io::BufWriter::new(file);
    write_csv(history, buf)
}

/// Writes tick history as CSV to any writer.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_csv(history: &[TickState], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);

    // Header
    wtr.write_record(HEADER.split(',').map(str::trim))?;

    // Data rows
    for state in history {
        wtr.write_record(&[
            state.timestamp.format("%Y-%m-%dT%H:%M:%S").to_string(),
            state.minute_of_day.to_string(),
            format!("{:.4}", state.community.production_kw),
            format!("{:.4}", state.community.microgrid_used_kw),
            format!("{:.4}", state.community.grid_import_kw),
            format!("{:.4}", state.community.grid_export_kw),
            format!("{:.4}", state.community.unserved_kw),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
