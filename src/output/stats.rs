//! Statistics over harvested records
//!
//! This module summarizes a result set and prints session status for the
//! command-line display.

use crate::state::{Record, SessionSnapshot, UNKNOWN_TEXT};
use std::collections::HashMap;

/// Summary of a result set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordStatistics {
    /// Total number of records
    pub total: u64,

    /// Count of records by category
    pub by_category: HashMap<String, u64>,

    /// Records carrying both coordinates
    pub with_coordinates: u64,

    /// Records carrying an IATA code
    pub with_iata: u64,

    /// Records whose name could not be extracted
    pub unnamed: u64,
}

impl RecordStatistics {
    pub fn from_records(records: &[Record]) -> Self {
        let mut stats = Self {
            total: records.len() as u64,
            ..Self::default()
        };

        for record in records {
            *stats.by_category.entry(record.category.clone()).or_insert(0) += 1;
            if record.has_coordinates() {
                stats.with_coordinates += 1;
            }
            if !record.iata.is_empty() {
                stats.with_iata += 1;
            }
            if record.name == UNKNOWN_TEXT {
                stats.unnamed += 1;
            }
        }

        stats
    }
}

/// Prints a session snapshot to stdout
pub fn print_snapshot(snapshot: &SessionSnapshot) {
    println!("=== Session Status ===\n");
    println!("  State: {}", snapshot.state);
    println!("  Active: {}", if snapshot.active { "yes" } else { "no" });
    println!("  Listing pages scanned: {}", snapshot.pages_scanned);
    println!("  Detail pages scanned: {}", snapshot.details_scanned);
    println!("  Errors: {}", snapshot.errors);
    println!("  Gateway: {}", snapshot.current_gateway);
    println!("  Records: {}", snapshot.result_count);
    println!();
}

/// Prints a summary of `records` to stdout
pub fn print_records_summary(records: &[Record]) {
    let stats = RecordStatistics::from_records(records);

    println!("=== Harvest Summary ===\n");
    println!("  Total records: {}", stats.total);
    if stats.total == 0 {
        return;
    }

    let coverage = (stats.with_coordinates as f64 / stats.total as f64) * 100.0;
    println!(
        "  With coordinates: {} ({:.1}%)",
        stats.with_coordinates, coverage
    );
    println!("  With IATA code: {}", stats.with_iata);
    println!("  Unnamed: {}", stats.unnamed);
    println!();

    println!("Records by Type:");
    let mut categories: Vec<_> = stats.by_category.iter().collect();
    categories.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    for (category, count) in categories {
        println!("  {}: {}", category.replace('_', " "), count);
    }
    println!();
}
