//! Output module for presenting and exporting harvest results
//!
//! This module handles:
//! - The observer seam the crawler reports progress through
//! - Exporting records as JSON and CSV
//! - Printing session status and result summaries

mod csv_export;
mod json_export;
pub mod stats;
mod traits;

pub use csv_export::{write_csv, write_csv_to, CSV_HEADERS};
pub use json_export::write_json;
pub use stats::{print_records_summary, print_snapshot, RecordStatistics};
pub use traits::{CrawlObserver, LogObserver, OutputError, OutputResult};

use crate::config::OutputConfig;
use crate::state::Record;
use std::path::Path;

/// Writes both exports to the paths named in `config`
///
/// # Returns
///
/// * `Ok(())` - Both files written
/// * `Err(OutputError)` - Either file could not be written
pub fn export_all(records: &[Record], config: &OutputConfig) -> OutputResult<()> {
    write_json(records, Path::new(&config.json_path))?;
    write_csv(records, Path::new(&config.csv_path))?;
    Ok(())
}
