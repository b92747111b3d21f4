//! Time conversion utilities for unix-epoch program timestamps.
//!
//! Program deadlines arrive as unix seconds; this module provides safe
//! conversions into [`Duration`] delays with explicit saturation behavior.

use std::time::Duration;

use chrono::{Local, TimeZone, Utc};

/// Current unix time in seconds.
#[must_use]
pub fn now_unix() -> i64 {
    Utc::now().timestamp()
}

/// Delay from `now` until `fire_at`, saturating at zero for deadlines
/// that have already passed.
#[must_use]
pub fn delay_until(fire_at: i64, now: i64) -> Duration {
    let delta = fire_at.saturating_sub(now);
    Duration::from_secs(u64::try_from(delta.max(0)).unwrap_or(0))
}

/// Format a unix timestamp as a local wall-clock time (`HH:MM:SS`).
///
/// Returns `--:--:--` for timestamps outside the representable range.
#[must_use]
pub fn format_clock(unix: i64) -> String {
    match Local.timestamp_opt(unix, 0).single() {
        Some(dt) => dt.format("%H:%M:%S").to_string(),
        None => "--:--:--".to_string(),
    }
}
