//! Single place for "now" as epoch milliseconds, shared by progress
//! tracking, leads, and cache TTLs so they agree on a clock.

use std::time::{SystemTime, UNIX_EPOCH};

pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
