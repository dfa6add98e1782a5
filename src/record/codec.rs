//! Record Codec
//!
//! Serializes records and computes/verifies their checksums.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{CaskError, Result};

use super::{Checksummer, Crc32Checksum, Record, RecordHeader, HEADER_SIZE};

/// Encodes records and checks their integrity
pub struct RecordCodec {
    checksummer: Box<dyn Checksummer>,
}

impl RecordCodec {
    pub fn new(checksummer: Box<dyn Checksummer>) -> Self {
        Self { checksummer }
    }

    /// Encode a record. An empty `value` produces a tombstone.
    ///
    /// The header is written with a zero checksum, the checksum is computed
    /// over the full image, then patched into the first four bytes.
    pub fn encode(&self, key: &[u8], value: &[u8], timestamp: u32) -> Result<Bytes> {
        let key_size = u32::try_from(key.len())
            .map_err(|_| CaskError::InvalidKey(format!("key of {} bytes is too large", key.len())))?;
        let value_size = u32::try_from(value.len()).map_err(|_| {
            CaskError::InvalidValue(format!("value of {} bytes is too large", value.len()))
        })?;

        let mut buf = BytesMut::with_capacity(HEADER_SIZE + key.len() + value.len());
        buf.put_u32_le(0);
        buf.put_u32_le(timestamp);
        buf.put_u32_le(key_size);
        buf.put_u32_le(value_size);
        buf.put_slice(key);
        buf.put_slice(value);

        let checksum = self.checksummer.checksum(&[&buf[..]]);
        buf[0..4].copy_from_slice(&checksum.to_le_bytes());

        Ok(buf.freeze())
    }

    /// Encode a tombstone (value_size 0, no value bytes)
    pub fn encode_tombstone(&self, key: &[u8], timestamp: u32) -> Result<Bytes> {
        self.encode(key, &[], timestamp)
    }

    /// Checksum of a record image with its checksum field zeroed
    pub fn compute_checksum(&self, header: &RecordHeader, key: &[u8], value: &[u8]) -> u32 {
        let zeroed = RecordHeader {
            checksum: 0,
            ..*header
        }
        .to_bytes();
        self.checksummer.checksum(&[&zeroed[..], key, value])
    }

    /// True when the stored checksum matches the record's contents
    pub fn verify(&self, record: &Record) -> bool {
        self.compute_checksum(&record.header, &record.key, &record.value) == record.header.checksum
    }
}

impl Default for RecordCodec {
    fn default() -> Self {
        Self::new(Box::new(Crc32Checksum))
    }
}
