//! Chunk Module
//!
//! Per-bucket append-only log segments ("chunk files").
//!
//! ## Directory Layout
//! ```text
//! {data_dir}/
//!   ├── 0/
//!   │   ├── 0/                     bucket 0x00
//!   │   │   ├── 0000000000.dat
//!   │   │   └── 0000000001.dat
//!   │   └── ...
//!   └── 2/
//!       └── f/                     bucket 0x2f
//!           └── 0000000000.dat
//! ```
//!
//! The two directory levels are the two lowercase hex digits of the bucket
//! id. Chunk ids only grow; a chunk that has been succeeded by a newer one
//! never takes another append.

mod manager;

use crate::router::BucketId;

pub use manager::{ChunkManager, Discovery};

/// File extension of chunk files
pub const CHUNK_EXTENSION: &str = "dat";

/// Number of digits in a chunk file name
pub const CHUNK_ID_DIGITS: usize = 10;

/// Largest chunk id that still fits the 10-digit file name
pub const MAX_CHUNK_ID: u64 = 9_999_999_999;

/// Where the next record of a bucket goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteTarget {
    pub chunk_id: u64,
    /// Current size of the chunk file, i.e. where an append lands
    pub offset: u64,
}

/// "0000000042.dat"
pub fn chunk_file_name(chunk_id: u64) -> String {
    format!("{:0width$}.{}", chunk_id, CHUNK_EXTENSION, width = CHUNK_ID_DIGITS)
}

/// "0000000042.dat" → Some(42). Anything else → None.
pub fn parse_chunk_file_name(name: &str) -> Option<u64> {
    let stem = name.strip_suffix(CHUNK_EXTENSION)?.strip_suffix('.')?;
    if stem.len() != CHUNK_ID_DIGITS || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    stem.parse().ok()
}

/// The two directory names of a bucket: 0x2f → ("2", "f")
pub fn bucket_dir_names(bucket: BucketId) -> (String, String) {
    let hex = format!("{:02x}", bucket);
    (hex[0..1].to_string(), hex[1..2].to_string())
}

/// Parse one directory level: a single lowercase hex digit
pub fn parse_nibble_dir(name: &str) -> Option<u8> {
    let mut chars = name.chars();
    let c = chars.next()?;
    if chars.next().is_some() || c.is_ascii_uppercase() {
        return None;
    }
    c.to_digit(16).map(|d| d as u8)
}
