//! Wall-clock helpers
//!
//! Components take explicit timestamps so they can be driven deterministically
//! in tests; these helpers are the only place the system clock is read.

use chrono::Utc;

/// Current Unix time in whole seconds.
pub fn unix_seconds() -> i64 {
    Utc::now().timestamp()
}

/// Current Unix time in milliseconds.
pub fn unix_millis() -> i64 {
    Utc::now().timestamp_millis()
}
