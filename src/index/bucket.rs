//! Buckets and the keyspace that owns them

use std::collections::BTreeMap;

use crate::record::Record;
use crate::router::BucketId;

use super::{IndexEntry, KeyIndex};

/// In-memory state of one bucket
#[derive(Debug, Default, Clone)]
pub struct Bucket {
    /// Chunk the bucket currently appends to. Only ever grows.
    pub active_chunk_id: u64,

    /// Live keys of this bucket
    pub index: KeyIndex,
}

impl Bucket {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a replayed record: a value overwrites, a tombstone removes
    pub fn apply(&mut self, chunk_id: u64, record: &Record) {
        if record.is_tombstone() {
            self.index.remove(&record.key);
        } else {
            self.index.insert(
                record.key.clone(),
                IndexEntry {
                    chunk_id,
                    value_size: record.header.value_size,
                    value_offset: record.value_offset(),
                    timestamp: record.header.timestamp,
                },
            );
        }
    }
}

/// All buckets referenced so far, keyed by id
#[derive(Debug, Default, Clone)]
pub struct Keyspace {
    buckets: BTreeMap<BucketId, Bucket>,
}

impl Keyspace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, bucket: BucketId) -> Option<&Bucket> {
        self.buckets.get(&bucket)
    }

    /// The bucket's state, created empty on first reference
    pub fn get_or_create(&mut self, bucket: BucketId) -> &mut Bucket {
        self.buckets.entry(bucket).or_default()
    }

    pub fn contains(&self, bucket: BucketId) -> bool {
        self.buckets.contains_key(&bucket)
    }

    /// Ids of every bucket referenced so far, ascending
    pub fn bucket_ids(&self) -> Vec<BucketId> {
        self.buckets.keys().copied().collect()
    }

    /// Live keys of a bucket, ascending; empty for an unknown bucket
    pub fn keys(&self, bucket: BucketId) -> Vec<Vec<u8>> {
        self.buckets
            .get(&bucket)
            .map(|b| b.index.keys().map(|k| k.to_vec()).collect())
            .unwrap_or_default()
    }

    /// Total number of live keys across all buckets
    pub fn key_count(&self) -> usize {
        self.buckets.values().map(|b| b.index.len()).sum()
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}
