//! Chunk File Manager
//!
//! Computes on-disk paths and decides which chunk file a bucket writes to.
//!
//! ## Responsibilities
//! - Map (bucket, chunk id) → path
//! - Rotate a bucket's active chunk once it reaches the size threshold
//! - Append encoded records, rolling back torn appends
//! - Read values back at an absolute offset
//! - Discover existing chunk files on startup

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{CaskError, Result};
use crate::index::IndexEntry;
use crate::router::BucketId;

use super::{
    bucket_dir_names, chunk_file_name, parse_chunk_file_name, parse_nibble_dir, WriteTarget,
    MAX_CHUNK_ID,
};

/// Chunk files found under the data directory
#[derive(Debug, Default)]
pub struct Discovery {
    /// Every bucket directory present, with its chunk ids in ascending order
    pub buckets: BTreeMap<BucketId, Vec<u64>>,

    /// Entries that do not fit the layout and were skipped
    pub ignored: Vec<PathBuf>,
}

/// Owns the directory layout and rotation policy for one store
#[derive(Debug, Clone)]
pub struct ChunkManager {
    /// Root directory of the store
    root: PathBuf,

    /// Chunk files at or above this size are not appended to
    rotation_threshold: u64,
}

impl ChunkManager {
    pub fn new(root: impl Into<PathBuf>, rotation_threshold: u64) -> Self {
        Self {
            root: root.into(),
            rotation_threshold,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn rotation_threshold(&self) -> u64 {
        self.rotation_threshold
    }

    /// `{root}/{hi}/{lo}`
    pub fn bucket_dir(&self, bucket: BucketId) -> PathBuf {
        let (hi, lo) = bucket_dir_names(bucket);
        self.root.join(hi).join(lo)
    }

    /// `{root}/{hi}/{lo}/{chunk_id:010}.dat`
    pub fn chunk_path(&self, bucket: BucketId, chunk_id: u64) -> PathBuf {
        self.bucket_dir(bucket).join(chunk_file_name(chunk_id))
    }

    /// Create the bucket's directories if they are missing
    pub fn ensure_bucket_dir(&self, bucket: BucketId) -> Result<()> {
        fs::create_dir_all(self.bucket_dir(bucket))?;
        Ok(())
    }

    /// Pick the chunk file (and append offset) for the bucket's next record.
    ///
    /// Starting at `*active_chunk_id`, skips every existing chunk whose size
    /// is at or above the rotation threshold. `*active_chunk_id` is left at
    /// the resolved id.
    pub fn resolve_write_target(
        &self,
        bucket: BucketId,
        active_chunk_id: &mut u64,
    ) -> Result<WriteTarget> {
        self.ensure_bucket_dir(bucket)?;

        loop {
            let path = self.chunk_path(bucket, *active_chunk_id);
            match fs::metadata(&path) {
                Ok(meta) if meta.len() >= self.rotation_threshold => {
                    let next = active_chunk_id
                        .checked_add(1)
                        .filter(|id| *id <= MAX_CHUNK_ID)
                        .ok_or(CaskError::ChunkIdExhausted { bucket })?;
                    debug!(
                        bucket = bucket,
                        from = *active_chunk_id,
                        to = next,
                        size = meta.len(),
                        "rotating chunk"
                    );
                    *active_chunk_id = next;
                }
                Ok(meta) => {
                    return Ok(WriteTarget {
                        chunk_id: *active_chunk_id,
                        offset: meta.len(),
                    });
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    return Ok(WriteTarget {
                        chunk_id: *active_chunk_id,
                        offset: 0,
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Append `bytes` to a chunk file, creating it if needed.
    ///
    /// Returns the offset at which the bytes start. If the write fails the
    /// file is cut back to its previous length before the error is returned.
    pub fn append(&self, bucket: BucketId, chunk_id: u64, bytes: &[u8]) -> Result<u64> {
        self.ensure_bucket_dir(bucket)?;
        let path = self.chunk_path(bucket, chunk_id);

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        let start = file.metadata()?.len();

        if let Err(e) = file.write_all(bytes).and_then(|_| file.flush()) {
            if let Err(rollback) = file.set_len(start) {
                warn!(
                    path = %path.display(),
                    error = %rollback,
                    "failed to roll back torn append"
                );
            }
            return Err(e.into());
        }

        Ok(start)
    }

    /// Read the value an index entry points at.
    ///
    /// A missing file or a short read yields `Ok(None)`.
    pub fn read_value(&self, bucket: BucketId, entry: &IndexEntry) -> Result<Option<Vec<u8>>> {
        let path = self.chunk_path(bucket, entry.chunk_id);

        let mut file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(path = %path.display(), "indexed chunk file is missing");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        file.seek(SeekFrom::Start(entry.value_offset))?;
        let mut value = vec![0u8; entry.value_size as usize];
        match file.read_exact(&mut value) {
            Ok(()) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                warn!(
                    path = %path.display(),
                    offset = entry.value_offset,
                    size = entry.value_size,
                    "short read of indexed value"
                );
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Walk `{root}/{hi}/{lo}/` and collect chunk ids per bucket, sorted
    /// ascending. Entries that do not match the layout are reported in
    /// `ignored`.
    pub fn discover(&self) -> Result<Discovery> {
        let mut discovery = Discovery::default();

        for hi_entry in fs::read_dir(&self.root)? {
            let hi_entry = hi_entry?;
            let hi_path = hi_entry.path();
            let hi = match Self::nibble_dir(&hi_entry)? {
                Some(n) => n,
                None => {
                    discovery.ignored.push(hi_path);
                    continue;
                }
            };

            for lo_entry in fs::read_dir(&hi_path)? {
                let lo_entry = lo_entry?;
                let lo_path = lo_entry.path();
                let lo = match Self::nibble_dir(&lo_entry)? {
                    Some(n) => n,
                    None => {
                        discovery.ignored.push(lo_path);
                        continue;
                    }
                };

                let bucket: BucketId = (hi << 4) | lo;
                let chunks = discovery.buckets.entry(bucket).or_default();

                for file_entry in fs::read_dir(&lo_path)? {
                    let file_entry = file_entry?;
                    let file_path = file_entry.path();
                    let id = if file_entry.file_type()?.is_file() {
                        file_entry.file_name().to_str().and_then(parse_chunk_file_name)
                    } else {
                        None
                    };
                    match id {
                        Some(id) => chunks.push(id),
                        None => discovery.ignored.push(file_path),
                    }
                }

                // Replay order must follow chunk ids, not read_dir order
                chunks.sort_unstable();
            }
        }

        Ok(discovery)
    }

    /// A directory entry named with a single lowercase hex digit
    fn nibble_dir(entry: &fs::DirEntry) -> Result<Option<u8>> {
        if !entry.file_type()?.is_dir() {
            return Ok(None);
        }
        Ok(entry.file_name().to_str().and_then(parse_nibble_dir))
    }
}
