//! Output traits and error types
//!
//! This module defines the observer seam the crawler reports through and
//! the errors export writers may raise.

use crate::state::{Record, SessionSnapshot};
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Receives crawl progress for display
///
/// Log lines travel through `tracing`; this seam carries the structured
/// events a presentation layer renders. Every method defaults to a no-op.
pub trait CrawlObserver {
    /// A record was merged into the results (or restored from cache)
    fn on_record(&self, _record: &Record) {}

    /// Counters changed
    fn on_progress(&self, _snapshot: &SessionSnapshot) {}

    /// A non-empty result set is available for export
    fn on_export_ready(&self, _count: usize) {}
}

/// Observer that reports through the tracing stream
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl CrawlObserver for LogObserver {
    fn on_record(&self, record: &Record) {
        tracing::debug!(
            "{} {} | {} | {}",
            record.identifier,
            if record.iata.is_empty() { "--" } else { &record.iata },
            record.name,
            record.category.replace('_', " ")
        );
    }

    fn on_progress(&self, snapshot: &SessionSnapshot) {
        tracing::debug!(
            "{} records | {} PG | {} DET | {} errors | {}",
            snapshot.result_count,
            snapshot.pages_scanned,
            snapshot.details_scanned,
            snapshot.errors,
            snapshot.current_gateway
        );
    }

    fn on_export_ready(&self, count: usize) {
        tracing::info!("{} records ready for export", count);
    }
}
