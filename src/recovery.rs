//! Recovery / Bootstrap
//!
//! Rebuilds the in-memory index by replaying every chunk file on open.
//!
//! This will:
//! 1. Create the data directory if needed
//! 2. Discover every bucket directory and its chunk files
//! 3. Replay each bucket's chunks in ascending id order
//! 4. Stop at a torn tail (crash mid-append) and leave its bytes in place
//! 5. Abort on, or skip past, corrupt records depending on the policy
//!
//! Recovery never rewrites a chunk file. A header whose sizes run past the
//! end of the file looks the same whether the append was torn or a size
//! field was damaged, so the bytes are kept and the bucket moves on to a
//! fresh chunk instead.

use std::fs;

use tracing::{debug, info, warn};

use crate::chunk::{ChunkManager, MAX_CHUNK_ID};
use crate::config::CorruptionPolicy;
use crate::error::{CaskError, Result};
use crate::index::{Bucket, Keyspace};
use crate::record::{Decoded, RecordCodec, RecordReader};
use crate::router::BucketId;

/// Statistics from one recovery pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Bucket directories found on disk
    pub buckets_recovered: u64,

    /// Chunk files replayed
    pub chunks_replayed: u64,

    /// Value records applied to the index
    pub records_applied: u64,

    /// Tombstone records applied to the index
    pub tombstones_applied: u64,

    /// Chunk files that end in a partial record
    pub truncated_chunks: u64,

    /// Chunk files whose remainder was skipped after a corrupt record
    pub corrupted_chunks: u64,

    /// Files and directories that do not match the layout
    pub ignored_files: u64,
}

/// How replay of a single chunk ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkOutcome {
    Clean,
    Truncated,
    Corrupted,
}

/// Replays chunk files into a fresh keyspace
pub struct Recovery<'a> {
    chunks: &'a ChunkManager,
    codec: &'a RecordCodec,
    verify_checksums: bool,
    policy: CorruptionPolicy,
}

impl<'a> Recovery<'a> {
    pub fn new(
        chunks: &'a ChunkManager,
        codec: &'a RecordCodec,
        verify_checksums: bool,
        policy: CorruptionPolicy,
    ) -> Self {
        Self {
            chunks,
            codec,
            verify_checksums,
            policy,
        }
    }

    /// Run the full replay
    pub fn run(&self) -> Result<(Keyspace, RecoveryResult)> {
        fs::create_dir_all(self.chunks.root())?;

        let discovery = self.chunks.discover()?;
        let mut keyspace = Keyspace::new();
        let mut result = RecoveryResult {
            ignored_files: discovery.ignored.len() as u64,
            ..Default::default()
        };

        for path in &discovery.ignored {
            debug!(path = %path.display(), "ignoring entry outside chunk layout");
        }

        for (bucket_id, chunk_ids) in &discovery.buckets {
            let bucket = keyspace.get_or_create(*bucket_id);
            result.buckets_recovered += 1;

            let mut last_outcome = ChunkOutcome::Clean;
            for &chunk_id in chunk_ids {
                last_outcome = self.replay_chunk(*bucket_id, chunk_id, bucket, &mut result)?;
                result.chunks_replayed += 1;
            }

            // Recovery does not re-check the size of the newest chunk; the
            // next write does that.
            if let Some(&max_id) = chunk_ids.last() {
                bucket.active_chunk_id = max_id;
                if last_outcome != ChunkOutcome::Clean {
                    // Never append behind bytes replay cannot get past
                    bucket.active_chunk_id = max_id
                        .checked_add(1)
                        .filter(|id| *id <= MAX_CHUNK_ID)
                        .ok_or(CaskError::ChunkIdExhausted { bucket: *bucket_id })?;
                }
            }
        }

        info!(
            buckets = result.buckets_recovered,
            chunks = result.chunks_replayed,
            records = result.records_applied,
            tombstones = result.tombstones_applied,
            truncated = result.truncated_chunks,
            corrupted = result.corrupted_chunks,
            keys = keyspace.key_count(),
            "recovery complete"
        );

        Ok((keyspace, result))
    }

    /// Replay one chunk file into its bucket
    fn replay_chunk(
        &self,
        bucket_id: BucketId,
        chunk_id: u64,
        bucket: &mut Bucket,
        result: &mut RecoveryResult,
    ) -> Result<ChunkOutcome> {
        let path = self.chunks.chunk_path(bucket_id, chunk_id);
        let mut reader = RecordReader::open(&path, self.codec, self.verify_checksums)?;
        let mut applied = 0u64;

        let outcome = loop {
            match reader.next_record() {
                Ok(Decoded::Record(record)) => {
                    if record.is_tombstone() {
                        result.tombstones_applied += 1;
                    } else {
                        result.records_applied += 1;
                    }
                    bucket.apply(chunk_id, &record);
                    applied += 1;
                }
                Ok(Decoded::EndOfLog) => break ChunkOutcome::Clean,
                Ok(Decoded::Truncated { valid_len }) => {
                    warn!(
                        path = %path.display(),
                        valid_len = valid_len,
                        "chunk ends in a partial record, keeping bytes and stopping replay"
                    );
                    result.truncated_chunks += 1;
                    break ChunkOutcome::Truncated;
                }
                Err(e @ CaskError::Corruption { .. }) => match self.policy {
                    CorruptionPolicy::Abort => return Err(e),
                    CorruptionPolicy::SkipChunkRemainder => {
                        warn!(error = %e, "skipping remainder of corrupt chunk");
                        result.corrupted_chunks += 1;
                        break ChunkOutcome::Corrupted;
                    }
                },
                Err(e) => return Err(e),
            }
        };

        debug!(
            bucket = bucket_id,
            chunk = chunk_id,
            records = applied,
            outcome = ?outcome,
            "replayed chunk"
        );

        Ok(outcome)
    }
}
