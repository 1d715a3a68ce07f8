//! Tests for the log file and recovery scan
//!
//! These tests verify:
//! - Positional reads and the end-of-file signal
//! - Fold semantics (last put wins, delete removes)
//! - Handling of an empty log and a log ending mid-record
//! - Recovery index and statistics

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use bytes::Bytes;
use lsmkv::log::{LogFile, LogRecovery};
use lsmkv::record::Record;
use lsmkv::{StoreError, SyncStrategy};
use proptest::prelude::*;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_log() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let log_path = temp_dir.path().join("lsm.data");
    (temp_dir, log_path)
}

fn open_log(path: &PathBuf) -> LogFile {
    LogFile::open(path, SyncStrategy::EveryWrite).unwrap()
}

/// Append raw bytes behind the log's back (for crafting corruption)
fn append_raw(path: &PathBuf, bytes: &[u8]) {
    let mut file = OpenOptions::new().append(true).open(path).unwrap();
    file.write_all(bytes).unwrap();
    file.sync_all().unwrap();
}

// =============================================================================
// Read Tests
// =============================================================================

#[test]
fn test_open_creates_empty_file() {
    let (_temp, path) = setup_temp_log();
    let log = open_log(&path);

    assert!(path.exists());
    assert_eq!(log.write_offset(), 0);
    assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
}

#[test]
fn test_read_at_each_offset() {
    let (_temp, path) = setup_temp_log();
    let mut log = open_log(&path);

    let a = Record::put(&b"a"[..], &b"first"[..]);
    let b = Record::delete(&b"b"[..]);
    let off_a = log.append(&a).unwrap();
    let off_b = log.append(&b).unwrap();

    assert_eq!(log.read_at(off_a).unwrap(), Some(a));
    assert_eq!(log.read_at(off_b).unwrap(), Some(b));
    assert_eq!(log.read_at(log.write_offset()).unwrap(), None);
}

#[test]
fn test_reopen_keeps_write_offset() {
    let (_temp, path) = setup_temp_log();
    let size = {
        let mut log = open_log(&path);
        log.append(&Record::put(&b"k"[..], &b"v"[..])).unwrap();
        log.write_offset()
    };

    let log = open_log(&path);
    assert_eq!(log.write_offset(), size);
}

#[test]
fn test_append_at_explicit_offset() {
    let (_temp, path) = setup_temp_log();
    let mut log = open_log(&path);

    let record = Record::put(&b"k"[..], &b"v"[..]);
    log.append_at(0, &record.encode()).unwrap();
    drop(log);

    // Cursor is derived from file length on open
    let mut log = open_log(&path);
    assert_eq!(log.write_offset(), record.size());
    assert_eq!(log.read_at(0).unwrap(), Some(record));
}

#[test]
fn test_read_truncated_header() {
    let (_temp, path) = setup_temp_log();
    {
        let mut log = open_log(&path);
        log.append(&Record::put(&b"k"[..], &b"v"[..])).unwrap();
    }
    append_raw(&path, &[0, 0, 0, 1, 0]);

    let mut log = open_log(&path);
    let err = log.read_at(Record::put(&b"k"[..], &b"v"[..]).size()).unwrap_err();
    assert!(matches!(err, StoreError::CorruptHeader(_)));
}

#[test]
fn test_read_truncated_body() {
    let (_temp, path) = setup_temp_log();
    let encoded = Record::put(&b"key"[..], &b"value"[..]).encode();
    std::fs::write(&path, &encoded[..encoded.len() - 2]).unwrap();

    let mut log = open_log(&path);
    let err = log.read_at(0).unwrap_err();
    assert!(matches!(err, StoreError::CorruptBody(_)));
}

// =============================================================================
// Fold Tests
// =============================================================================

#[test]
fn test_fold_empty_log() {
    let (_temp, path) = setup_temp_log();
    let mut log = open_log(&path);

    assert!(log.fold().unwrap().is_empty());
}

#[test]
fn test_fold_last_put_wins() {
    let (_temp, path) = setup_temp_log();
    let mut log = open_log(&path);

    log.append(&Record::put(&b"a"[..], &b"1"[..])).unwrap();
    log.append(&Record::put(&b"b"[..], &b"1"[..])).unwrap();
    log.append(&Record::put(&b"a"[..], &b"2"[..])).unwrap();

    let live = log.fold().unwrap();
    assert_eq!(live.len(), 2);
    assert_eq!(live[&Bytes::from_static(b"a")].value, Bytes::from_static(b"2"));
    assert_eq!(live[&Bytes::from_static(b"b")].value, Bytes::from_static(b"1"));
}

#[test]
fn test_fold_delete_removes_and_put_revives() {
    let (_temp, path) = setup_temp_log();
    let mut log = open_log(&path);

    log.append(&Record::put(&b"a"[..], &b"1"[..])).unwrap();
    log.append(&Record::delete(&b"a"[..])).unwrap();
    log.append(&Record::put(&b"b"[..], &b"1"[..])).unwrap();
    log.append(&Record::delete(&b"b"[..])).unwrap();
    log.append(&Record::put(&b"b"[..], &b"again"[..])).unwrap();

    let live = log.fold().unwrap();
    assert_eq!(live.len(), 1);
    assert_eq!(live[&Bytes::from_static(b"b")].value, Bytes::from_static(b"again"));
}

#[test]
fn test_fold_rejects_partial_tail() {
    let (_temp, path) = setup_temp_log();
    {
        let mut log = open_log(&path);
        log.append(&Record::put(&b"a"[..], &b"1"[..])).unwrap();
    }
    let next = Record::put(&b"b"[..], &b"2"[..]).encode();
    append_raw(&path, &next[..next.len() - 1]);

    let mut log = open_log(&path);
    let err = log.fold().unwrap_err();
    assert!(err.is_corruption());
}

// =============================================================================
// Recovery Tests
// =============================================================================

#[test]
fn test_recover_empty_log() {
    let (_temp, path) = setup_temp_log();
    let mut log = open_log(&path);

    let (index, stats) = LogRecovery::recover(&mut log).unwrap();

    assert!(index.is_empty());
    assert_eq!(stats.records_scanned, 0);
    assert_eq!(stats.tombstones, 0);
    assert_eq!(stats.live_keys, 0);
    assert_eq!(stats.bytes_scanned, 0);
}

#[test]
fn test_recover_offsets_point_at_newest_put() {
    let (_temp, path) = setup_temp_log();
    let mut log = open_log(&path);

    log.append(&Record::put(&b"a"[..], &b"1"[..])).unwrap();
    let newest = log.append(&Record::put(&b"a"[..], &b"2"[..])).unwrap();
    log.append(&Record::put(&b"b"[..], &b"1"[..])).unwrap();
    log.append(&Record::delete(&b"b"[..])).unwrap();

    let (index, stats) = LogRecovery::recover(&mut log).unwrap();

    assert_eq!(index.get(b"a"), Some(newest));
    assert!(!index.contains(b"b"));
    assert_eq!(stats.records_scanned, 4);
    assert_eq!(stats.tombstones, 1);
    assert_eq!(stats.live_keys, 1);
    assert_eq!(stats.bytes_scanned, log.write_offset());
}

#[test]
fn test_recover_refuses_corrupt_log() {
    let (_temp, path) = setup_temp_log();
    {
        let mut log = open_log(&path);
        log.append(&Record::put(&b"a"[..], &b"1"[..])).unwrap();
    }
    append_raw(&path, &[0xFF; 4]);

    let mut log = open_log(&path);
    assert!(LogRecovery::recover(&mut log).is_err());
}

// =============================================================================
// Write Failure Tests
// =============================================================================

#[test]
#[cfg(target_os = "linux")]
fn test_failed_append_leaves_write_offset_unchanged() {
    // Every write to /dev/full fails with ENOSPC
    let mut log = LogFile::open(std::path::Path::new("/dev/full"), SyncStrategy::EveryWrite).unwrap();
    let before = log.write_offset();

    let record = Record::put(&b"key"[..], &b"value"[..]);
    for _ in 0..2 {
        let err = log.append(&record).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Io {
                context: "write record",
                ..
            }
        ));
        assert_eq!(log.write_offset(), before);
    }
    assert_eq!(log.read_at(before).unwrap(), None);
}

// =============================================================================
// Property Tests
// =============================================================================

#[derive(Debug, Clone)]
enum Op {
    Put(u8, Vec<u8>),
    Delete(u8),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..8, prop::collection::vec(any::<u8>(), 0..16)).prop_map(|(k, v)| Op::Put(k, v)),
        (0u8..8).prop_map(Op::Delete),
    ]
}

proptest! {
    #[test]
    fn prop_fold_matches_last_write_per_key(ops in prop::collection::vec(op_strategy(), 0..64)) {
        let (_temp, path) = setup_temp_log();
        let mut log = open_log(&path);
        let mut expected: HashMap<Vec<u8>, Vec<u8>> = HashMap::new();

        for op in &ops {
            match op {
                Op::Put(k, v) => {
                    let key = vec![b'k', *k];
                    log.append(&Record::put(key.clone(), v.clone())).unwrap();
                    expected.insert(key, v.clone());
                }
                Op::Delete(k) => {
                    let key = vec![b'k', *k];
                    log.append(&Record::delete(key.clone())).unwrap();
                    expected.remove(&key);
                }
            }
        }

        let folded: HashMap<Vec<u8>, Vec<u8>> = log
            .fold()
            .unwrap()
            .into_iter()
            .map(|(k, r)| (k.to_vec(), r.value.to_vec()))
            .collect();
        prop_assert_eq!(folded, expected);
    }
}
