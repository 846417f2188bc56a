use std::collections::HashSet;

/// Set of record identifiers already claimed during a session
///
/// Identifiers enter on listing discovery or on cache reload and are never
/// released while the session lives; only a new session start resets it.
#[derive(Debug, Clone, Default)]
pub struct DedupIndex {
    seen: HashSet<String>,
}

impl DedupIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims an identifier, returning false if it was already claimed
    pub fn claim(&mut self, identifier: &str) -> bool {
        if self.seen.contains(identifier) {
            return false;
        }
        self.seen.insert(identifier.to_string())
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.seen.contains(identifier)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Empties the index; only a session start may call this
    pub(crate) fn reset(&mut self) {
        self.seen.clear();
    }
}

impl<S: AsRef<str>> Extend<S> for DedupIndex {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        for identifier in iter {
            self.claim(identifier.as_ref());
        }
    }
}
