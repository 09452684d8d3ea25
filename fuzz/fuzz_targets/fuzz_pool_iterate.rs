//! Fuzz target for iterating a pool file with arbitrary contents.
//!
//! Covers garbled slots and torn tails. Iteration must terminate and appends
//! must still land on a slot boundary.

#![no_main]

use kvp_pool::{PoolStore, SLOT_SIZE};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("kvp_pool_file");
    std::fs::write(&path, data).expect("write pool");

    let Ok(mut store) = PoolStore::open(&path) else {
        return;
    };
    let before = store.iterate(0).map(|iter| iter.count()).unwrap_or(0);
    assert!(before <= data.len() / SLOT_SIZE);

    if store.append("fuzz", "value").is_ok() {
        let len = std::fs::metadata(&path).expect("metadata").len() as usize;
        assert_eq!(len % SLOT_SIZE, 0);
    }
});
