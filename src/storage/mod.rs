//! Storage module for persisting harvest results
//!
//! This module handles durable state for the crawler, including:
//! - The key-value seam (`KeyValueStore`) and its SQLite and in-memory backends
//! - The resumable store that caches the result set after every chunk

mod memory;
mod resumable;
mod schema;
mod sqlite;
mod traits;

pub use memory::MemoryStore;
pub use resumable::{ResumableStore, RESULTS_KEY};
pub use sqlite::SqliteStore;
pub use traits::{KeyValueStore, StorageError, StorageResult};

use crate::HarvestError;
use std::path::Path;

/// Opens the SQLite-backed resumable store at `path`
///
/// # Returns
///
/// * `Ok(ResumableStore<SqliteStore>)` - Store ready for reload and persist
/// * `Err(HarvestError)` - Failed to open the database
pub fn open_store(path: &Path) -> Result<ResumableStore<SqliteStore>, HarvestError> {
    Ok(ResumableStore::new(SqliteStore::new(path)?))
}
