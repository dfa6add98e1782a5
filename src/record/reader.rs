//! Record Reader
//!
//! Decodes records sequentially from a chunk file.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};

use crate::error::{CaskError, Result};

use super::{Record, RecordCodec, RecordHeader, HEADER_SIZE};

/// Outcome of decoding at the current position
#[derive(Debug, PartialEq, Eq)]
pub enum Decoded {
    /// A complete record (checksum verified when verification is on)
    Record(Record),

    /// Clean end of the log: no bytes left
    EndOfLog,

    /// A record that runs past the end of the file. `valid_len` is where
    /// it starts, i.e. the length of the file's well-formed prefix.
    Truncated { valid_len: u64 },
}

/// Sequential decoder over one chunk file
pub struct RecordReader<'a, R> {
    inner: R,
    codec: &'a RecordCodec,
    verify: bool,
    path: PathBuf,
    /// Offset of the next record to decode
    position: u64,
    /// Total length of the underlying log
    len: u64,
}

impl<'a> RecordReader<'a, BufReader<File>> {
    /// Open a chunk file for replay from offset 0
    pub fn open(path: &Path, codec: &'a RecordCodec, verify: bool) -> Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(Self::new(BufReader::new(file), len, codec, verify, path))
    }
}

impl<'a, R: Read> RecordReader<'a, R> {
    /// Wrap any reader positioned at offset 0 of a log of `len` bytes
    pub fn new(inner: R, len: u64, codec: &'a RecordCodec, verify: bool, path: &Path) -> Self {
        Self {
            inner,
            codec,
            verify,
            path: path.to_path_buf(),
            position: 0,
            len,
        }
    }

    /// Offset of the next record to decode
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Decode the next record
    pub fn next_record(&mut self) -> Result<Decoded> {
        let remaining = self.len.saturating_sub(self.position);
        if remaining == 0 {
            return Ok(Decoded::EndOfLog);
        }
        if remaining < HEADER_SIZE as u64 {
            return Ok(self.truncated());
        }

        let mut header_buf = [0u8; HEADER_SIZE];
        if !self.fill(&mut header_buf)? {
            return Ok(self.truncated());
        }
        let header = RecordHeader::from_bytes(&header_buf);

        // A torn append or a damaged size field; never allocate for it
        if header.record_len() > remaining {
            return Ok(self.truncated());
        }
        if header.key_size == 0 {
            return Err(self.corruption("zero-length key in header"));
        }

        let key_size = header.key_size as usize;
        let mut body = vec![0u8; key_size + header.value_size as usize];
        if !self.fill(&mut body)? {
            return Ok(self.truncated());
        }
        let value = body.split_off(key_size);

        let record = Record {
            header,
            key: body,
            value,
            offset: self.position,
        };

        if self.verify && !self.codec.verify(&record) {
            let computed = self
                .codec
                .compute_checksum(&record.header, &record.key, &record.value);
            return Err(self.corruption(&format!(
                "checksum mismatch: stored {:#010x}, computed {:#010x}",
                record.header.checksum, computed
            )));
        }

        self.position = record.end_offset();
        Ok(Decoded::Record(record))
    }

    /// `read_exact` that reports a short read as `false`
    fn fill(&mut self, buf: &mut [u8]) -> Result<bool> {
        match self.inner.read_exact(buf) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn truncated(&self) -> Decoded {
        Decoded::Truncated {
            valid_len: self.position,
        }
    }

    fn corruption(&self, reason: &str) -> CaskError {
        CaskError::Corruption {
            path: self.path.clone(),
            offset: self.position,
            reason: reason.to_string(),
        }
    }
}
