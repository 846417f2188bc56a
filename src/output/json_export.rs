//! JSON export of harvested records

use crate::output::traits::OutputResult;
use crate::state::Record;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Writes `records` to `path` as a pretty-printed JSON array
pub fn write_json(records: &[Record], path: &Path) -> OutputResult<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, records)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    tracing::info!("Wrote {} records to {}", records.len(), path.display());
    Ok(())
}
