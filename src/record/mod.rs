//! Record Module
//!
//! The on-disk unit written by every put and delete.
//!
//! ## Record Format
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Header (16 bytes, little-endian)                             │
//! │ ┌──────────────┬───────────────┬─────────────┬─────────────┐ │
//! │ │ Checksum (4) │ Timestamp (4) │ KeySize (4) │ ValSize (4) │ │
//! │ └──────────────┴───────────────┴─────────────┴─────────────┘ │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Key   (KeySize bytes)                                        │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Value (ValSize bytes, absent when ValSize = 0 → tombstone)   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The checksum covers the whole record image with the checksum field
//! itself set to zero.

mod checksum;
mod codec;
mod reader;

use std::time::{SystemTime, UNIX_EPOCH};

pub use checksum::{Checksummer, Crc32Checksum};
pub use codec::RecordCodec;
pub use reader::{Decoded, RecordReader};

/// Header size: Checksum (4) + Timestamp (4) + KeySize (4) + ValSize (4)
pub const HEADER_SIZE: usize = 16;

/// Fixed-width record header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub checksum: u32,
    pub timestamp: u32,
    pub key_size: u32,
    pub value_size: u32,
}

impl RecordHeader {
    /// Pack into the on-disk byte image
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.checksum.to_le_bytes());
        buf[4..8].copy_from_slice(&self.timestamp.to_le_bytes());
        buf[8..12].copy_from_slice(&self.key_size.to_le_bytes());
        buf[12..16].copy_from_slice(&self.value_size.to_le_bytes());
        buf
    }

    /// Unpack from the on-disk byte image
    pub fn from_bytes(buf: &[u8; HEADER_SIZE]) -> Self {
        let field = |at: usize| u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]]);
        Self {
            checksum: field(0),
            timestamp: field(4),
            key_size: field(8),
            value_size: field(12),
        }
    }

    /// Bytes taken by the whole record on disk
    pub fn record_len(&self) -> u64 {
        HEADER_SIZE as u64 + self.key_size as u64 + self.value_size as u64
    }

    pub fn is_tombstone(&self) -> bool {
        self.value_size == 0
    }
}

/// A fully decoded record together with where it starts in its chunk file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub header: RecordHeader,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    /// Offset of the record's first header byte
    pub offset: u64,
}

impl Record {
    pub fn is_tombstone(&self) -> bool {
        self.header.is_tombstone()
    }

    /// Absolute offset of the value's first byte within the chunk file
    pub fn value_offset(&self) -> u64 {
        self.offset + HEADER_SIZE as u64 + self.header.key_size as u64
    }

    /// Offset just past this record
    pub fn end_offset(&self) -> u64 {
        self.offset + self.header.record_len()
    }
}

/// Seconds since the Unix epoch, saturating at `u32::MAX`
pub fn unix_timestamp() -> u32 {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    u32::try_from(secs).unwrap_or(u32::MAX)
}
