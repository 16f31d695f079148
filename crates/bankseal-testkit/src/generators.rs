//! Proptest generators for envelope inputs.

use proptest::prelude::*;

/// Arbitrary payload bytes, sized to cross the codec's 8 KiB chunking.
pub fn payload() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..20_000)
}

/// A numeric target id of at most 12 digits, as configured by hosts.
pub fn target_id() -> impl Strategy<Value = String> {
    (0u64..=999_999_999_999).prop_map(|id| id.to_string())
}

/// A target id with leading zeros preserved, exercising zero-padding.
pub fn padded_target_id() -> impl Strategy<Value = String> {
    (0u64..=999_999_999_999).prop_map(|id| format!("{id:012}"))
}
