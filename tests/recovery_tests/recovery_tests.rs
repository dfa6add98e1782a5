//! Tests for Recovery
//!
//! These tests verify:
//! - Recovery from an empty or missing data directory
//! - Replay across chunks in ascending id order
//! - Tombstones removing keys written in earlier chunks
//! - Active chunk id tracking
//! - Torn tails and damaged size fields (kept on disk, bucket rotates)
//! - Corrupted records under both policies

use std::fs::{self, File, OpenOptions};
use std::io::Write;

use chunkcask::chunk::ChunkManager;
use chunkcask::config::CorruptionPolicy;
use chunkcask::record::{RecordCodec, HEADER_SIZE};
use chunkcask::recovery::Recovery;
use chunkcask::CaskError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_chunks() -> (TempDir, ChunkManager) {
    let temp_dir = TempDir::new().unwrap();
    let manager = ChunkManager::new(temp_dir.path(), 1024 * 1024);
    (temp_dir, manager)
}

fn put(manager: &ChunkManager, codec: &RecordCodec, bucket: u8, chunk: u64, key: &[u8], value: &[u8]) {
    let bytes = codec.encode(key, value, 1).unwrap();
    manager.append(bucket, chunk, &bytes).unwrap();
}

fn tombstone(manager: &ChunkManager, codec: &RecordCodec, bucket: u8, chunk: u64, key: &[u8]) {
    let bytes = codec.encode_tombstone(key, 1).unwrap();
    manager.append(bucket, chunk, &bytes).unwrap();
}

fn append_raw(manager: &ChunkManager, bucket: u8, chunk: u64, bytes: &[u8]) {
    let mut file = OpenOptions::new()
        .append(true)
        .open(manager.chunk_path(bucket, chunk))
        .unwrap();
    file.write_all(bytes).unwrap();
}

fn strict<'a>(manager: &'a ChunkManager, codec: &'a RecordCodec) -> Recovery<'a> {
    Recovery::new(manager, codec, true, CorruptionPolicy::Abort)
}

// =============================================================================
// Empty Store Tests
// =============================================================================

#[test]
fn test_recover_creates_missing_root() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("nested").join("store");
    let manager = ChunkManager::new(&root, 1024);
    let codec = RecordCodec::default();

    let (keyspace, result) = strict(&manager, &codec).run().unwrap();

    assert!(root.is_dir());
    assert_eq!(keyspace.bucket_count(), 0);
    assert_eq!(result.chunks_replayed, 0);
}

#[test]
fn test_recover_empty_bucket_dir_registers_bucket() {
    let (_temp, manager) = setup_temp_chunks();
    let codec = RecordCodec::default();
    manager.ensure_bucket_dir(0x5a).unwrap();

    let (keyspace, result) = strict(&manager, &codec).run().unwrap();

    assert_eq!(keyspace.bucket_ids(), vec![0x5a]);
    assert_eq!(keyspace.get(0x5a).unwrap().active_chunk_id, 0);
    assert_eq!(result.buckets_recovered, 1);
}

// =============================================================================
// Replay Order Tests
// =============================================================================

#[test]
fn test_recover_single_chunk() {
    let (_temp, manager) = setup_temp_chunks();
    let codec = RecordCodec::default();
    put(&manager, &codec, 1, 0, b"a", b"1");
    put(&manager, &codec, 1, 0, b"b", b"2");
    put(&manager, &codec, 1, 0, b"a", b"3");

    let (keyspace, result) = strict(&manager, &codec).run().unwrap();

    assert_eq!(keyspace.keys(1), vec![b"a".to_vec(), b"b".to_vec()]);
    assert_eq!(result.records_applied, 3);

    // "a" must point at its second write
    let a = keyspace.get(1).unwrap().index.get(b"a").copied().unwrap();
    let second_record_end = 2 * (HEADER_SIZE as u64 + 2);
    assert_eq!(a.value_offset, second_record_end + HEADER_SIZE as u64 + 1);
    assert_eq!(manager.read_value(1, &a).unwrap(), Some(b"3".to_vec()));
}

#[test]
fn test_recover_later_chunk_supersedes_earlier() {
    let (_temp, manager) = setup_temp_chunks();
    let codec = RecordCodec::default();
    // Written out of id order on purpose
    put(&manager, &codec, 2, 10, b"k", b"newest");
    put(&manager, &codec, 2, 2, b"k", b"older");
    put(&manager, &codec, 2, 0, b"k", b"oldest");

    let (keyspace, result) = strict(&manager, &codec).run().unwrap();

    let bucket = keyspace.get(2).unwrap();
    let e = bucket.index.get(b"k").copied().unwrap();
    assert_eq!(e.chunk_id, 10);
    assert_eq!(manager.read_value(2, &e).unwrap(), Some(b"newest".to_vec()));
    assert_eq!(bucket.active_chunk_id, 10);
    assert_eq!(result.chunks_replayed, 3);
}

#[test]
fn test_recover_tombstone_in_later_chunk() {
    let (_temp, manager) = setup_temp_chunks();
    let codec = RecordCodec::default();
    put(&manager, &codec, 3, 0, b"gone", b"v");
    put(&manager, &codec, 3, 0, b"kept", b"v");
    tombstone(&manager, &codec, 3, 1, b"gone");

    let (keyspace, result) = strict(&manager, &codec).run().unwrap();

    assert_eq!(keyspace.keys(3), vec![b"kept".to_vec()]);
    assert_eq!(result.tombstones_applied, 1);
}

#[test]
fn test_recover_put_after_tombstone_revives_key() {
    let (_temp, manager) = setup_temp_chunks();
    let codec = RecordCodec::default();
    put(&manager, &codec, 3, 0, b"k", b"first");
    tombstone(&manager, &codec, 3, 0, b"k");
    put(&manager, &codec, 3, 1, b"k", b"second");

    let (keyspace, _) = strict(&manager, &codec).run().unwrap();

    let e = keyspace.get(3).unwrap().index.get(b"k").copied().unwrap();
    assert_eq!(manager.read_value(3, &e).unwrap(), Some(b"second".to_vec()));
}

#[test]
fn test_recover_ignores_foreign_files() {
    let (temp, manager) = setup_temp_chunks();
    let codec = RecordCodec::default();
    put(&manager, &codec, 4, 0, b"k", b"v");
    File::create(manager.bucket_dir(4).join("README")).unwrap();
    File::create(temp.path().join("stray.dat")).unwrap();

    let (keyspace, result) = strict(&manager, &codec).run().unwrap();

    assert_eq!(keyspace.key_count(), 1);
    assert_eq!(result.ignored_files, 2);
}

// =============================================================================
// Torn Tail Tests
// =============================================================================

#[test]
fn test_recover_keeps_partial_header_bytes() {
    let (_temp, manager) = setup_temp_chunks();
    let codec = RecordCodec::default();
    put(&manager, &codec, 5, 0, b"k1", b"v1");
    put(&manager, &codec, 5, 0, b"k2", b"v2");
    let path = manager.chunk_path(5, 0);

    let torn = codec.encode(b"k3", b"v3", 1).unwrap();
    append_raw(&manager, 5, 0, &torn[..HEADER_SIZE]);
    let len_before = fs::metadata(&path).unwrap().len();

    let (keyspace, result) = strict(&manager, &codec).run().unwrap();

    assert_eq!(keyspace.keys(5), vec![b"k1".to_vec(), b"k2".to_vec()]);
    assert_eq!(result.truncated_chunks, 1);
    assert_eq!(fs::metadata(&path).unwrap().len(), len_before);
    assert_eq!(keyspace.get(5).unwrap().active_chunk_id, 1);
}

#[test]
fn test_recover_after_torn_tail_appends_to_next_chunk() {
    let (_temp, manager) = setup_temp_chunks();
    let codec = RecordCodec::default();
    put(&manager, &codec, 5, 0, b"k1", b"v1");
    append_raw(&manager, 5, 0, &[0xEE; 5]);

    let (keyspace, _) = strict(&manager, &codec).run().unwrap();
    let active = keyspace.get(5).unwrap().active_chunk_id;
    put(&manager, &codec, 5, active, b"k2", b"v2");
    let (keyspace, result) = strict(&manager, &codec).run().unwrap();

    assert_eq!(keyspace.keys(5), vec![b"k1".to_vec(), b"k2".to_vec()]);
    assert_eq!(result.truncated_chunks, 1);
    assert_eq!(keyspace.get(5).unwrap().active_chunk_id, 1);
}

#[test]
fn test_recover_damaged_size_field_keeps_later_records_on_disk() {
    let (_temp, manager) = setup_temp_chunks();
    let codec = RecordCodec::default();
    put(&manager, &codec, 9, 0, b"a", b"1");
    put(&manager, &codec, 9, 0, b"b", b"2");
    put(&manager, &codec, 9, 0, b"c", b"3");
    let path = manager.chunk_path(9, 0);
    let mut bytes = fs::read(&path).unwrap();
    let original = bytes.clone();

    // High byte of the second record's value_size
    let second = HEADER_SIZE + 2;
    bytes[second + 15] = 0x7f;
    fs::write(&path, &bytes).unwrap();

    let (keyspace, result) = strict(&manager, &codec).run().unwrap();

    assert_eq!(keyspace.keys(9), vec![b"a".to_vec()]);
    assert_eq!(result.truncated_chunks, 1);
    assert_eq!(keyspace.get(9).unwrap().active_chunk_id, 1);

    // Nothing was cut: repairing the byte brings every record back
    assert_eq!(fs::read(&path).unwrap().len(), original.len());
    fs::write(&path, &original).unwrap();
    let (keyspace, result) = strict(&manager, &codec).run().unwrap();
    assert_eq!(
        keyspace.keys(9),
        vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]
    );
    assert_eq!(result.truncated_chunks, 0);
}

// =============================================================================
// Corruption Tests
// =============================================================================

#[test]
fn test_recover_corruption_aborts_by_default() {
    let (_temp, manager) = setup_temp_chunks();
    let codec = RecordCodec::default();
    put(&manager, &codec, 6, 0, b"good", b"value");
    let mut bad = codec.encode(b"bad", b"value", 1).unwrap().to_vec();
    let last = bad.len() - 1;
    bad[last] ^= 0x55;
    append_raw(&manager, 6, 0, &bad);

    let result = strict(&manager, &codec).run();

    assert!(matches!(result, Err(CaskError::Corruption { .. })));
}

#[test]
fn test_recover_corruption_skip_keeps_prefix_and_rotates() {
    let (_temp, manager) = setup_temp_chunks();
    let codec = RecordCodec::default();
    put(&manager, &codec, 6, 0, b"good", b"value");
    let mut bad = codec.encode(b"bad", b"value", 1).unwrap().to_vec();
    bad[HEADER_SIZE] ^= 0x01;
    append_raw(&manager, 6, 0, &bad);
    put(&manager, &codec, 6, 0, b"after", b"value");

    let recovery = Recovery::new(&manager, &codec, true, CorruptionPolicy::SkipChunkRemainder);
    let (keyspace, result) = recovery.run().unwrap();

    let bucket = keyspace.get(6).unwrap();
    assert_eq!(keyspace.keys(6), vec![b"good".to_vec()]);
    assert_eq!(bucket.active_chunk_id, 1);
    assert_eq!(result.corrupted_chunks, 1);
}

#[test]
fn test_recover_corruption_skip_continues_with_next_chunk() {
    let (_temp, manager) = setup_temp_chunks();
    let codec = RecordCodec::default();
    let mut bad = codec.encode(b"bad", b"value", 1).unwrap().to_vec();
    bad[0] ^= 0x01;
    manager.append(7, 0, &bad).unwrap();
    put(&manager, &codec, 7, 1, b"next", b"value");

    let recovery = Recovery::new(&manager, &codec, true, CorruptionPolicy::SkipChunkRemainder);
    let (keyspace, _) = recovery.run().unwrap();

    assert_eq!(keyspace.keys(7), vec![b"next".to_vec()]);
    // Corrupt chunk was not the newest, so the newest stays active
    assert_eq!(keyspace.get(7).unwrap().active_chunk_id, 1);
}

#[test]
fn test_recover_without_verification_accepts_bad_checksum() {
    let (_temp, manager) = setup_temp_chunks();
    let codec = RecordCodec::default();
    let mut bad = codec.encode(b"key", b"value", 1).unwrap().to_vec();
    bad[0] ^= 0x01;
    manager.append(8, 0, &bad).unwrap();

    let recovery = Recovery::new(&manager, &codec, false, CorruptionPolicy::Abort);
    let (keyspace, _) = recovery.run().unwrap();

    assert_eq!(keyspace.keys(8), vec![b"key".to_vec()]);
}
