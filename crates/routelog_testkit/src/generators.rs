//! Property-based test generators using proptest.

use proptest::prelude::*;
use std::collections::BTreeSet;

/// Strategy for usernames, including ones containing `:`.
pub fn username_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_.:-]{0,15}").expect("Invalid regex")
}

/// Strategy for session tokens.
pub fn token_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[0-9a-f]{8}-[0-9a-f]{4}").expect("Invalid regex")
}

/// Strategy for a set of distinct store keys spread over a few prefixes.
pub fn key_set_strategy(max_keys: usize) -> impl Strategy<Value = BTreeSet<String>> {
    prop::collection::btree_set(
        prop::string::string_regex("(user|logs|deleted|misc):[a-z0-9]{1,8}").expect("Invalid regex"),
        0..=max_keys,
    )
}

/// Strategy for `list` page sizes.
pub fn page_size_strategy() -> impl Strategy<Value = usize> {
    1usize..=64
}

/// Strategy for log collection payloads: arrays, objects, and non-JSON text.
pub fn logs_payload_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        prop::collection::vec(any::<i32>(), 0..8)
            .prop_map(|v| serde_json::to_string(&v).unwrap_or_default()),
        prop::collection::btree_map("[a-z]{1,6}", any::<i32>(), 0..4)
            .prop_map(|m| serde_json::to_string(&m).unwrap_or_default()),
        "[ -~]{0,24}",
    ]
}
