//! In-memory storage implementation
//!
//! Used for dry runs and tests. An optional byte capacity makes writes fail
//! the way a full browser-style quota would.

use crate::storage::traits::{KeyValueStore, StorageError, StorageResult};
use std::collections::HashMap;

/// HashMap-backed key-value store
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
    capacity: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that rejects writes pushing total value bytes past `capacity`
    pub fn with_capacity_limit(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: Some(capacity),
        }
    }

    fn used_bytes_excluding(&self, key: &str) -> usize {
        self.entries
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(_, v)| v.len())
            .sum()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> StorageResult<()> {
        if let Some(capacity) = self.capacity {
            let needed = self.used_bytes_excluding(key) + value.len();
            if needed > capacity {
                return Err(StorageError::CapacityExceeded { needed, capacity });
            }
        }
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> StorageResult<()> {
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let mut store = MemoryStore::new();
        store.set("a", "1").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));
        store.remove("a").unwrap();
        assert_eq!(store.get("a").unwrap(), None);
    }

    #[test]
    fn test_capacity_limit() {
        let mut store = MemoryStore::with_capacity_limit(8);
        store.set("a", "12345").unwrap();
        // Replacing a key only counts the new value
        store.set("a", "12345678").unwrap();

        let err = store.set("b", "x").unwrap_err();
        assert!(matches!(
            err,
            StorageError::CapacityExceeded {
                needed: 9,
                capacity: 8
            }
        ));
        assert_eq!(store.get("b").unwrap(), None);
    }
}
