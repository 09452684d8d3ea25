//! No-mock integration tests for the pool file store.
//!
//! These tests validate, against real files:
//! - Append order is observed by iteration
//! - Generation cursors resume after consumed slots
//! - Iteration is restartable and sees later appends
//! - Torn trailing writes and garbled slots are tolerated

use kvp_pool::{KvpRecord, PoolError, PoolStore, KEY_SIZE, SLOT_SIZE, VALUE_SIZE};
use std::fs::{self, OpenOptions};
use std::io::Write;
use tempfile::tempdir;

fn collect(store: &PoolStore, generation: u64) -> Vec<KvpRecord> {
    store
        .iterate(generation)
        .unwrap()
        .collect::<Result<Vec<_>, PoolError>>()
        .unwrap()
}

#[test]
fn append_order_is_preserved() {
    let dir = tempdir().unwrap();
    let mut store = PoolStore::open(dir.path().join("kvp_pool_file")).unwrap();

    store.append("k1", "v1").unwrap();
    store.append("k2", "v2").unwrap();

    assert_eq!(
        collect(&store, 0),
        vec![KvpRecord::new("k1", "v1"), KvpRecord::new("k2", "v2")]
    );
}

#[test]
fn duplicate_keys_accumulate_on_append() {
    let dir = tempdir().unwrap();
    let mut store = PoolStore::open(dir.path().join("kvp_pool_file")).unwrap();

    for i in 0..3 {
        store
            .append("PROVISIONING_REPORT", &format!("attempt={}", i))
            .unwrap();
    }

    let records = collect(&store, 0);
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.key == "PROVISIONING_REPORT"));
    assert_eq!(records[2].value, "attempt=2");
}

#[test]
fn generation_skips_consumed_slots() {
    let dir = tempdir().unwrap();
    let mut store = PoolStore::open(dir.path().join("kvp_pool_file")).unwrap();
    for i in 0..5 {
        store.append(&format!("k{}", i), "v").unwrap();
    }

    let keys: Vec<String> = collect(&store, 3).into_iter().map(|r| r.key).collect();
    assert_eq!(keys, vec!["k3", "k4"]);
}

#[test]
fn iteration_is_restartable_and_sees_new_appends() {
    let dir = tempdir().unwrap();
    let mut store = PoolStore::open(dir.path().join("kvp_pool_file")).unwrap();
    store.append("first", "1").unwrap();

    let mut iter = store.iterate(0).unwrap();
    assert_eq!(iter.next().unwrap().unwrap(), KvpRecord::new("first", "1"));
    assert!(iter.next().is_none());
    let resume_at = iter.generation();

    store.append("second", "2").unwrap();

    // A stale iterator does not tail the file.
    assert!(iter.next().is_none());
    assert_eq!(collect(&store, resume_at), vec![KvpRecord::new("second", "2")]);
    assert_eq!(collect(&store, 0).len(), 2);
}

#[test]
fn empty_slots_are_skipped() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("kvp_pool_file");
    {
        let mut store = PoolStore::open(&path).unwrap();
        store.append("a", "1").unwrap();
    }
    {
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&[0u8; SLOT_SIZE]).unwrap();
    }
    let mut store = PoolStore::open(&path).unwrap();
    store.append("b", "2").unwrap();

    assert_eq!(store.slot_count().unwrap(), 3);
    assert_eq!(
        collect(&store, 0),
        vec![KvpRecord::new("a", "1"), KvpRecord::new("b", "2")]
    );
}

#[test]
fn torn_tail_is_ignored_then_overwritten() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("kvp_pool_file");
    {
        let mut store = PoolStore::open(&path).unwrap();
        store.append("a", "1").unwrap();
    }
    {
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"partial-key").unwrap();
    }

    let mut store = PoolStore::open(&path).unwrap();
    assert_eq!(collect(&store, 0), vec![KvpRecord::new("a", "1")]);

    store.append("b", "2").unwrap();
    assert_eq!(fs::metadata(&path).unwrap().len(), 2 * SLOT_SIZE as u64);
    assert_eq!(
        collect(&store, 0),
        vec![KvpRecord::new("a", "1"), KvpRecord::new("b", "2")]
    );
}

#[test]
fn garbled_slot_yields_error_and_iteration_continues() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("kvp_pool_file");
    {
        let mut file = fs::File::create(&path).unwrap();
        let mut garbled = [0u8; SLOT_SIZE];
        garbled[0] = b'k';
        garbled[KEY_SIZE] = 0xc3;
        file.write_all(&garbled).unwrap();
    }
    let mut store = PoolStore::open(&path).unwrap();
    store.append("good", "value").unwrap();

    let items: Vec<_> = store.iterate(0).unwrap().collect();
    assert_eq!(items.len(), 2);
    assert!(matches!(items[0], Err(PoolError::Encoding(_))));
    assert_eq!(
        items[1].as_ref().unwrap(),
        &KvpRecord::new("good", "value")
    );
}

#[test]
fn records_skip_foreign_slots_and_keep_reports() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("kvp_pool_file");
    {
        let mut file = fs::File::create(&path).unwrap();
        let mut foreign = [0u8; SLOT_SIZE];
        foreign[..4].copy_from_slice(b"note");
        foreign[KEY_SIZE..KEY_SIZE + 5].copy_from_slice(b"caf\xc3\xa9");
        file.write_all(&foreign).unwrap();
    }
    let mut store = PoolStore::open(&path).unwrap();
    store
        .append("PROVISIONING_REPORT", "result=success")
        .unwrap();

    assert_eq!(
        store.records(0).unwrap(),
        vec![KvpRecord::new("PROVISIONING_REPORT", "result=success")]
    );
}

#[test]
fn oversized_value_is_truncated_not_rejected() {
    let dir = tempdir().unwrap();
    let mut store = PoolStore::open(dir.path().join("kvp_pool_file")).unwrap();
    let value = "r".repeat(VALUE_SIZE * 2);

    store.append("PROVISIONING_REPORT", &value).unwrap();

    let records = collect(&store, 0);
    assert_eq!(records[0].value.len(), VALUE_SIZE);
}

#[test]
fn bad_key_fails_without_writing() {
    let dir = tempdir().unwrap();
    let mut store = PoolStore::open(dir.path().join("kvp_pool_file")).unwrap();

    let err = store.append(&"k".repeat(KEY_SIZE + 1), "v").unwrap_err();
    assert!(matches!(err, PoolError::Encoding(_)));
    assert_eq!(store.slot_count().unwrap(), 0);
}
