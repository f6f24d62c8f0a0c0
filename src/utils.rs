//! Utility functions for Seoul time handling and logging.
//!
//! This module provides helper functions used throughout the crawler:
//! - The fixed Seoul offset and "now" in that offset
//! - Parsing of source-specific date strings and backend timestamps
//! - String truncation for log output

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use tracing::debug;

const SEOUL_OFFSET_SECS: i32 = 9 * 3600;

/// The fixed Seoul offset (UTC+09:00). Korea observes no daylight saving.
pub fn seoul() -> FixedOffset {
    FixedOffset::east_opt(SEOUL_OFFSET_SECS).expect("+09:00 is a valid offset")
}

/// Current time in Seoul.
pub fn seoul_now() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&seoul())
}

/// Parse a naive date string in `format` and pin it to Seoul time.
///
/// Returns `None` when the string does not match; callers keep the article
/// and leave its publish time empty.
pub fn parse_seoul_datetime(raw: &str, format: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    match NaiveDateTime::parse_from_str(raw, format) {
        Ok(naive) => seoul().from_local_datetime(&naive).single(),
        Err(e) => {
            debug!(raw, format, error = %e, "Date did not match format");
            None
        }
    }
}

/// Parse a timestamp handed out by the backend.
///
/// Accepts RFC 3339 with an explicit offset, or a naive ISO-8601 date-time
/// (optionally with fractional seconds) which is interpreted as Seoul time.
pub fn parse_backend_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&seoul()));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .and_then(|naive| seoul().from_local_datetime(&naive).single())
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut at a character boundary at or below `max` bytes with
/// an ellipsis and byte count indicator appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}
