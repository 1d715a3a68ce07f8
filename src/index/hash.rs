//! Hash index
//!
//! Key → offset of the newest live record for that key.

use std::collections::HashMap;

use bytes::Bytes;

/// Point-lookup index over the current log file
#[derive(Debug, Default, Clone)]
pub struct HashIndex {
    offsets: HashMap<Bytes, u64>,
}

impl HashIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Point `key` at `offset`, returning the previous offset if any
    pub fn insert(&mut self, key: Bytes, offset: u64) -> Option<u64> {
        self.offsets.insert(key, offset)
    }

    pub fn get(&self, key: &[u8]) -> Option<u64> {
        self.offsets.get(key).copied()
    }

    pub fn remove(&mut self, key: &[u8]) -> Option<u64> {
        self.offsets.remove(key)
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.offsets.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}
