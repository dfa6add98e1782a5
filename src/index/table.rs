//! Key index implementation
//!
//! BTreeMap-based, so key listings come out sorted.

use std::collections::BTreeMap;

use super::IndexEntry;

/// Key → location map of one bucket
#[derive(Debug, Default, Clone)]
pub struct KeyIndex {
    entries: BTreeMap<Vec<u8>, IndexEntry>,
}

impl KeyIndex {
    /// Create a new empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Location of a key's current value
    pub fn get(&self, key: &[u8]) -> Option<&IndexEntry> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.entries.contains_key(key)
    }

    /// Point a key at a new location, returning the previous one
    pub fn insert(&mut self, key: Vec<u8>, entry: IndexEntry) -> Option<IndexEntry> {
        self.entries.insert(key, entry)
    }

    /// Forget a key, returning its last location
    pub fn remove(&mut self, key: &[u8]) -> Option<IndexEntry> {
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Live keys in ascending order
    pub fn keys(&self) -> impl Iterator<Item = &[u8]> {
        self.entries.keys().map(|k| k.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &IndexEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_slice(), v))
    }
}
