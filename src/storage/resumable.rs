//! Best-effort persistence of the session's result set
//!
//! The whole result set is written as one JSON array under a single key
//! after every processed chunk. Nothing here can fail the caller: write
//! errors are logged and dropped, and an unreadable payload is purged and
//! treated as "no prior session".

use crate::state::Record;
use crate::storage::traits::{KeyValueStore, StorageResult};

/// Key the JSON-encoded result array is stored under
pub const RESULTS_KEY: &str = "harvest.results";

/// Persists and reloads the accumulated records through a key-value store
pub struct ResumableStore<S> {
    backend: S,
    key: String,
}

impl<S: KeyValueStore> ResumableStore<S> {
    pub fn new(backend: S) -> Self {
        Self::with_key(backend, RESULTS_KEY)
    }

    pub fn with_key(backend: S, key: &str) -> Self {
        Self {
            backend,
            key: key.to_string(),
        }
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    /// Writes `records` under the results key; an empty set is not written
    pub fn persist(&mut self, records: &[Record]) {
        if records.is_empty() {
            return;
        }

        match self.write_records(records) {
            Ok(()) => tracing::debug!("Cached {} records", records.len()),
            Err(e) => tracing::warn!("Result cache write failed: {}", e),
        }
    }

    fn write_records(&mut self, records: &[Record]) -> StorageResult<()> {
        let payload = serde_json::to_string(records)?;
        self.backend.set(&self.key, &payload)
    }

    /// Reads the previously persisted records
    ///
    /// Returns an empty vector when nothing is stored, when the backend
    /// cannot be read, or when the payload is corrupted. A corrupted payload
    /// is removed from the backend.
    pub fn reload(&mut self) -> Vec<Record> {
        let payload = match self.backend.get(&self.key) {
            Ok(Some(payload)) => payload,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::warn!("Result cache read failed: {}", e);
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<Record>>(&payload) {
            Ok(records) => {
                if !records.is_empty() {
                    tracing::info!("Cache detected: {} records restored", records.len());
                }
                records
            }
            Err(e) => {
                tracing::error!("Cached results are corrupted ({}), purging", e);
                self.clear();
                Vec::new()
            }
        }
    }

    /// Removes any persisted records
    pub fn clear(&mut self) {
        if let Err(e) = self.backend.remove(&self.key) {
            tracing::warn!("Could not clear result cache: {}", e);
        }
    }
}
