//! ExecutionSerial: the correlation token embedded in every envelope.
//!
//! Layout: a 17-digit local timestamp (`yyyyMMddHHmmssfff`), a random salt
//! in [1, 999] rendered without zero-padding, and the numeric target id
//! zero-padded to 12 digits. The legacy decode branch recovers the target
//! id from offset 20 of a 32-character serial — which only lines up when
//! the salt happened to render as exactly 3 digits. Shorter salts produce
//! 30- or 31-character serials that silently fall outside the legacy
//! scheme; that ambiguity is inherited protocol behavior and is preserved
//! here, not corrected.

use chrono::{DateTime, Local};
use rand::Rng;

use crate::error::EnvelopeError;

/// Length of a legacy-scheme serial.
pub const LEGACY_LEN: usize = 32;

/// Offset of the embedded target id within a legacy serial.
pub const LEGACY_ID_OFFSET: usize = 20;

/// Maximum digits a target id may occupy inside the serial.
pub const TARGET_ID_DIGITS: usize = 12;

/// Generate a serial for the given target id, using the current local time
/// and a fresh random salt.
///
/// When the configured target id is longer than 12 digits the caller must
/// supply `internal_target_id`, which takes its place inside the serial.
pub fn generate(target_id: &str, internal_target_id: Option<u64>) -> Result<String, EnvelopeError> {
    let salt = rand::thread_rng().gen_range(1..=999);
    generate_at(Local::now(), salt, target_id, internal_target_id)
}

/// Deterministic variant of [`generate`] for a fixed instant and salt.
pub fn generate_at(
    now: DateTime<Local>,
    salt: u32,
    target_id: &str,
    internal_target_id: Option<u64>,
) -> Result<String, EnvelopeError> {
    let id: u64 = if target_id.len() > TARGET_ID_DIGITS {
        internal_target_id.ok_or_else(|| {
            EnvelopeError::InvalidConfig(format!(
                "TargetId {target_id} exceeds {TARGET_ID_DIGITS} digits and no InternalTargetId is configured"
            ))
        })?
    } else {
        target_id.parse().map_err(|_| {
            EnvelopeError::InvalidConfig(format!("TargetId {target_id} is not numeric"))
        })?
    };
    let stamp = now.format("%Y%m%d%H%M%S%3f");
    Ok(format!("{stamp}{salt}{id:012}"))
}

/// Recover the embedded target id from a legacy 32-character serial.
///
/// Serials of any other length carry no embedded id and yield `None`; the
/// decoder falls back to `ParentFileReference` in that case.
pub fn legacy_target_id(serial: &str) -> Option<String> {
    if serial.len() != LEGACY_LEN {
        return None;
    }
    serial
        .get(LEGACY_ID_OFFSET..)?
        .parse::<u64>()
        .ok()
        .map(|id| id.to_string())
}
