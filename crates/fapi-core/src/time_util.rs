//! Wall-clock helpers used when stamping signed requests.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current time as **milliseconds** since Unix epoch.
#[inline]
pub fn now_ms() -> u64 {
    let d = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    d.as_millis() as u64
}

/// Current time in milliseconds shifted by a signed offset (server skew).
#[inline]
pub fn now_ms_with_offset(offset_ms: i64) -> u64 {
    now_ms().saturating_add_signed(offset_ms)
}
