//! Engine Module
//!
//! The storage engine that coordinates all components.
//!
//! ## Responsibilities
//! - Route keys to buckets
//! - Append records to the right chunk file
//! - Keep the in-memory index pointing at the latest record of every key
//! - Run recovery on open, before any request is served

use std::path::Path;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::chunk::ChunkManager;
use crate::config::Config;
use crate::error::{CaskError, Result};
use crate::index::{IndexEntry, Keyspace};
use crate::record::{unix_timestamp, Checksummer, Crc32Checksum, RecordCodec, HEADER_SIZE};
use crate::recovery::{Recovery, RecoveryResult};
use crate::router::{BucketId, KeyHasher, Router, Xxh32Hasher};

/// The main storage engine
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Writes** (put/delete): Serialized by `write_lock`
///   - Append to the chunk file first, then update the index
///   - A failed append leaves the index untouched
///
/// - **Reads** (get): Take a short read lock on the keyspace to copy the
///   index entry out, then read the value with no lock held
///
/// One engine owns its directory. Nothing coordinates two engines (or two
/// processes) over the same directory.
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// Key → bucket
    router: Router,

    /// Record encoding and checksums
    codec: RecordCodec,

    /// Directory layout, rotation and file I/O
    chunks: ChunkManager,

    /// Buckets with their active chunk ids and key indexes
    keyspace: RwLock<Keyspace>,

    /// Serializes write operations (put/delete)
    write_lock: Mutex<()>,

    /// Statistics of the recovery run at open
    recovery: RecoveryResult,
}

impl Engine {
    /// Open or create a store with the default xxHash32 router and CRC-32
    /// record checksums
    pub fn open(config: Config) -> Result<Self> {
        Self::open_with(
            config,
            Box::new(Xxh32Hasher::default()),
            Box::new(Crc32Checksum),
        )
    }

    /// Open or create a store with injected hash and checksum functions.
    ///
    /// Both must stay the same for the whole life of the store's data.
    ///
    /// On startup:
    /// 1. Validate the config
    /// 2. Create the data directory if it doesn't exist
    /// 3. Replay every chunk file to rebuild the index
    /// 4. Ready to serve requests
    pub fn open_with(
        config: Config,
        hasher: Box<dyn KeyHasher>,
        checksummer: Box<dyn Checksummer>,
    ) -> Result<Self> {
        config.validate()?;

        let chunks = ChunkManager::new(&config.data_dir, config.rotation_threshold_bytes);
        let codec = RecordCodec::new(checksummer);

        let (keyspace, recovery) = Recovery::new(
            &chunks,
            &codec,
            config.verify_checksums,
            config.corruption_policy,
        )
        .run()?;

        info!(
            data_dir = %config.data_dir.display(),
            buckets = keyspace.bucket_count(),
            keys = keyspace.key_count(),
            "engine opened"
        );

        Ok(Self {
            config,
            router: Router::new(hasher),
            codec,
            chunks,
            keyspace: RwLock::new(keyspace),
            write_lock: Mutex::new(()),
            recovery,
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().data_dir(path).build())
    }

    /// Get a value by key
    ///
    /// Returns:
    /// - `Ok(Some(value))` — key is live
    /// - `Ok(None)` — key unknown, deleted, or its bytes are no longer on disk
    /// - `Err(InvalidKey)` — empty key
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Self::validate_key(key)?;
        let bucket = self.router.bucket_of(key);

        let Some(entry) = self.lookup(bucket, key) else {
            return Ok(None);
        };

        self.chunks.read_value(bucket, &entry)
    }

    /// Check whether a key is live, without touching disk
    pub fn contains_key(&self, key: &[u8]) -> Result<bool> {
        Self::validate_key(key)?;
        let bucket = self.router.bucket_of(key);
        Ok(self.lookup(bucket, key).is_some())
    }

    /// Put a key-value pair
    ///
    /// Steps:
    /// 1. Acquire write lock
    /// 2. Encode the record with the current timestamp
    /// 3. Resolve the write target (may rotate the bucket's chunk)
    /// 4. Append to the chunk file
    /// 5. Point the index at the new record
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        Self::validate_key(key)?;
        if value.is_empty() {
            return Err(CaskError::InvalidValue(
                "value must not be empty (an empty value marks a tombstone)".to_string(),
            ));
        }

        let _write_guard = self.write_lock.lock();

        let bucket = self.router.bucket_of(key);
        let timestamp = unix_timestamp();
        let record = self.codec.encode(key, value, timestamp)?;

        let (chunk_id, start) = self.append_record(bucket, &record)?;

        let entry = IndexEntry {
            chunk_id,
            value_size: value.len() as u32,
            value_offset: start + HEADER_SIZE as u64 + key.len() as u64,
            timestamp,
        };
        self.keyspace
            .write()
            .get_or_create(bucket)
            .index
            .insert(key.to_vec(), entry);

        Ok(())
    }

    /// Delete a key
    ///
    /// Steps:
    /// 1. Acquire write lock
    /// 2. Fail with `KeyNotFound` unless the key is live
    /// 3. Append a tombstone
    /// 4. Remove the key from the index
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        Self::validate_key(key)?;

        let _write_guard = self.write_lock.lock();

        let bucket = self.router.bucket_of(key);
        if self.lookup(bucket, key).is_none() {
            return Err(CaskError::KeyNotFound);
        }

        let tombstone = self.codec.encode_tombstone(key, unix_timestamp())?;
        self.append_record(bucket, &tombstone)?;

        self.keyspace
            .write()
            .get_or_create(bucket)
            .index
            .remove(key);

        Ok(())
    }

    /// Every bucket referenced so far (all on-disk buckets after open, plus
    /// any touched since), ascending
    pub fn list_bucket_ids(&self) -> Vec<BucketId> {
        self.keyspace.read().bucket_ids()
    }

    /// Live keys of a bucket, ascending; empty for an unknown bucket
    pub fn list_keys(&self, bucket: BucketId) -> Vec<Vec<u8>> {
        self.keyspace.read().keys(bucket)
    }

    /// Close the engine
    ///
    /// No file handles are held between calls, so there is nothing to flush.
    pub fn close(self) -> Result<()> {
        info!(data_dir = %self.config.data_dir.display(), "engine closed");
        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Bucket a key routes to
    pub fn bucket_of(&self, key: &[u8]) -> BucketId {
        self.router.bucket_of(key)
    }

    /// Active chunk id of a bucket, if the bucket has been referenced
    pub fn active_chunk_id(&self, bucket: BucketId) -> Option<u64> {
        self.keyspace.read().get(bucket).map(|b| b.active_chunk_id)
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        self.keyspace.read().key_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Statistics of the recovery run at open
    pub fn recovery_result(&self) -> &RecoveryResult {
        &self.recovery
    }

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Get the chunk manager (paths and layout)
    pub fn chunks(&self) -> &ChunkManager {
        &self.chunks
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Copy a key's index entry out, creating empty bucket state on first
    /// reference to the bucket
    fn lookup(&self, bucket: BucketId, key: &[u8]) -> Option<IndexEntry> {
        let found = self
            .keyspace
            .read()
            .get(bucket)
            .map(|b| b.index.get(key).copied());

        match found {
            Some(entry) => entry,
            None => {
                self.keyspace.write().get_or_create(bucket);
                None
            }
        }
    }

    /// Resolve the bucket's write target and append. Called with the write
    /// lock held. Returns (chunk id, offset of the record's first byte).
    ///
    /// Steps:
    /// 1. Read the bucket's active chunk id
    /// 2. Resolve the write target (may rotate)
    /// 3. Store the resolved id, even if the append fails
    /// 4. Append the record
    fn append_record(&self, bucket: BucketId, record: &[u8]) -> Result<(u64, u64)> {
        let mut active = self
            .keyspace
            .read()
            .get(bucket)
            .map_or(0, |b| b.active_chunk_id);
        let resolved = self.chunks.resolve_write_target(bucket, &mut active);

        self.keyspace.write().get_or_create(bucket).active_chunk_id = active;

        let target = resolved?;
        let start = self.chunks.append(bucket, target.chunk_id, record)?;

        debug!(
            bucket = bucket,
            chunk = target.chunk_id,
            offset = start,
            len = record.len(),
            "appended record"
        );

        Ok((target.chunk_id, start))
    }

    fn validate_key(key: &[u8]) -> Result<()> {
        if key.is_empty() {
            return Err(CaskError::InvalidKey("key must not be empty".to_string()));
        }
        Ok(())
    }
}
