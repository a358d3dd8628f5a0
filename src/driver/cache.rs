//! Per-query values cache.
//!
//! Drivers memoize transformed values here while a query's results are
//! being fetched (a streaming query may deliver many results that share
//! ciphertexts). The owning `DriverHandle` clears it exactly once when the
//! query is drained.

use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct ValuesCache {
    entries: HashMap<Vec<u8>, Vec<u8>>,
    generation: u64,
}

impl ValuesCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, source: &[u8]) -> Option<&[u8]> {
        self.entries.get(source).map(Vec::as_slice)
    }

    pub fn insert(&mut self, source: Vec<u8>, mapped: Vec<u8>) -> Option<Vec<u8>> {
        self.entries.insert(source, mapped)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of times the cache has been cleared.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.generation += 1;
    }
}
