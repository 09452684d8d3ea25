//! Fuzz target for KVP slot decoding.
//!
//! Slots come from a file the host also writes, so decoding must never
//! panic on arbitrary bytes.

#![no_main]

use kvp_pool::{decode_bytes, encode, Slot, SLOT_SIZE};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = decode_bytes(data);

    let mut slot = [0u8; SLOT_SIZE];
    let len = data.len().min(SLOT_SIZE);
    slot[..len].copy_from_slice(&data[..len]);

    if let Ok(Slot::Record(record)) = decode_bytes(&slot) {
        // Anything that decodes re-encodes to the same record.
        let reencoded = encode(&record.key, &record.value).expect("decoded record must encode");
        assert_eq!(decode_bytes(&reencoded).ok(), Some(Slot::Record(record)));
    }
});
