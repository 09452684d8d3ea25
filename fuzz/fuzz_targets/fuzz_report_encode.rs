//! Fuzz target for report encoding.
//!
//! Any input lines must produce printable ASCII within the slot value size.

#![no_main]

use kvp_report::{encode_lines, MAX_REPORT_BYTES};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|lines: Vec<String>| {
    let report = encode_lines(&lines);
    assert!(report.len() <= MAX_REPORT_BYTES);
    assert!(report.bytes().all(|b| (0x20..0x7f).contains(&b)));
});
