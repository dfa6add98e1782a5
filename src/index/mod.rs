//! In-Memory Index Module
//!
//! Per-bucket mapping from key to the location of its latest live record.
//!
//! ## Responsibilities
//! - Point every live key at {chunk id, value size, value offset, timestamp}
//! - Drop keys whose latest record is a tombstone
//! - Track each bucket's active chunk id
//! - List buckets and keys
//!
//! The index is never persisted. The chunk files are the source of truth
//! and recovery rebuilds it from them on every open.

mod bucket;
mod table;

pub use bucket::{Bucket, Keyspace};
pub use table::KeyIndex;

/// Where the current value of a key lives on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    /// Chunk file holding the record
    pub chunk_id: u64,

    /// Length of the value in bytes (never 0 for an indexed key)
    pub value_size: u32,

    /// Absolute offset of the value's first byte within the chunk file
    pub value_offset: u64,

    /// Record timestamp (seconds since the Unix epoch)
    pub timestamp: u32,
}
