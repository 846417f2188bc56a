//! CSV export of harvested records

use crate::output::traits::OutputResult;
use crate::state::Record;
use std::io::Write;
use std::path::Path;

/// Column headers, in output order
pub const CSV_HEADERS: [&str; 10] = [
    "IDENT",
    "IATA",
    "NAME",
    "TYPE",
    "REGION",
    "MUNICIPALITY",
    "ELEVATION_FT",
    "LAT",
    "LON",
    "URL",
];

/// Writes `records` as CSV to any writer
pub fn write_csv_to<W: Write>(records: &[Record], sink: W) -> OutputResult<()> {
    let mut writer = csv::Writer::from_writer(sink);
    writer.write_record(CSV_HEADERS)?;

    for record in records {
        writer.write_record([
            record.identifier.as_str(),
            record.iata.as_str(),
            record.name.as_str(),
            record.category.as_str(),
            record.region.as_str(),
            record.municipality.as_str(),
            record.elevation_ft.as_str(),
            record.latitude.as_str(),
            record.longitude.as_str(),
            record.source_url.as_str(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

/// Writes `records` to `path` as CSV
pub fn write_csv(records: &[Record], path: &Path) -> OutputResult<()> {
    let file = std::fs::File::create(path)?;
    write_csv_to(records, file)?;
    tracing::info!("Wrote {} records to {}", records.len(), path.display());
    Ok(())
}
