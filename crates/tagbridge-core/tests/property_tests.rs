//! Property-based tests for byte rendering and configuration validation.

use proptest::prelude::*;
use serde_json::json;
use tagbridge_core::{
    PollConfig, Uid,
    codec::{decode_hex, to_ascii, to_hex},
    constants::{MAX_TAG_READ_INTERVAL_MS, MAX_UID_BYTES},
};

proptest! {
    /// Property: hex rendering is reversible for any byte sequence.
    #[test]
    fn prop_hex_roundtrip(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        let hex = to_hex(&bytes);
        prop_assert_eq!(hex.len(), bytes.len() * 2);
        prop_assert!(hex.chars().all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
        prop_assert_eq!(decode_hex(&hex).unwrap(), bytes);
    }

    /// Property: ASCII rendering keeps one character per byte and masks
    /// exactly the control range.
    #[test]
    fn prop_ascii_masks_control_bytes(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        let text: Vec<char> = to_ascii(&bytes).chars().collect();
        prop_assert_eq!(text.len(), bytes.len());

        for (byte, ch) in bytes.iter().zip(text) {
            if *byte <= 0x1F {
                prop_assert_eq!(ch, '.');
            } else {
                prop_assert_eq!(ch as u32, u32::from(*byte));
            }
        }
    }

    /// Property: any valid UID renders and parses back to itself.
    #[test]
    fn prop_uid_hex_roundtrip(bytes in prop::collection::vec(any::<u8>(), 1..=MAX_UID_BYTES)) {
        let uid = Uid::new(&bytes).unwrap();
        let parsed: Uid = uid.to_hex().parse().unwrap();
        prop_assert_eq!(parsed, uid);
    }

    /// Property: an out-of-range push never changes the configuration.
    #[test]
    fn prop_out_of_range_push_keeps_value(
        current in 0u64..=MAX_TAG_READ_INTERVAL_MS,
        pushed in (MAX_TAG_READ_INTERVAL_MS + 1)..u64::MAX,
    ) {
        let mut config = PollConfig::with_interval_ms(current).unwrap();
        let push = json!({ "tagReadIntervalMs": pushed });
        prop_assert!(config.apply(&push).is_err());
        prop_assert_eq!(config.tag_read_interval_ms(), current);
    }

    /// Property: an in-range push is always committed.
    #[test]
    fn prop_in_range_push_commits(pushed in 0u64..=MAX_TAG_READ_INTERVAL_MS) {
        let mut config = PollConfig::default();
        config.apply(&json!({ "tagReadIntervalMs": pushed })).unwrap();
        prop_assert_eq!(config.tag_read_interval_ms(), pushed);
    }
}
