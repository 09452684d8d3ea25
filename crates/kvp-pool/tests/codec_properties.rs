//! Property tests for the slot codec.

use kvp_pool::{decode, encode, KvpRecord, Slot, KEY_SIZE, SLOT_SIZE, VALUE_SIZE};
use proptest::prelude::*;

/// Printable ASCII plus tab/newline, no NUL.
fn ascii_text(min: usize, max: usize) -> impl Strategy<Value = String> {
    let printable = (0x20u8..0x7f).prop_map(char::from);
    proptest::collection::vec(prop_oneof![Just('\t'), Just('\n'), printable], min..=max)
        .prop_map(|chars| chars.into_iter().collect())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    #[test]
    fn roundtrip_within_limits(key in ascii_text(1, KEY_SIZE), value in ascii_text(0, VALUE_SIZE)) {
        let slot = encode(&key, &value).unwrap();
        prop_assert_eq!(slot.len(), SLOT_SIZE);
        prop_assert_eq!(decode(&slot).unwrap(), Slot::Record(KvpRecord::new(key, value)));
    }

    #[test]
    fn over_length_values_keep_prefix(key in ascii_text(1, 32), extra in 1usize..512) {
        let value: String = "abcdefghij".chars().cycle().take(VALUE_SIZE + extra).collect();
        let slot = encode(&key, &value).unwrap();
        let record = decode(&slot).unwrap().into_record().unwrap();
        prop_assert_eq!(record.value.as_str(), &value[..VALUE_SIZE]);
    }
}
