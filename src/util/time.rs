//! Millisecond timestamps for input and presentation events.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current time in milliseconds, as stamped on events toward the
/// compositor.
pub fn current_time_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as u64
}
