//! Search window resolution for incremental keyword crawls.
//!
//! Each keyword is searched only for articles newer than its cursor, but never
//! further back than a fixed lookback from the start of the run.

use chrono::{DateTime, Duration, FixedOffset};

/// Default lookback bound for every search.
pub const LOOKBACK_HOURS: i64 = 24;

/// Format used by the portal search for the `sd`/`ed` query parameters.
const QUERY_FORMAT: &str = "%Y%m%d%H%M%S";

/// Inclusive time range handed to a search query. `start <= end` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchWindow {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

impl SearchWindow {
    /// Resolve the window for one keyword.
    ///
    /// `end` is `now`. `start` is the cursor when it lies strictly after
    /// `now - lookback`, otherwise the floor itself. A cursor in the future is
    /// clamped to `now`.
    ///
    /// # Arguments
    ///
    /// * `last_crawled_at` - The keyword's cursor, if the backend has one
    /// * `now` - Run start in Seoul time
    /// * `lookback` - Furthest a search may reach back from `now`
    pub fn resolve(
        last_crawled_at: Option<DateTime<FixedOffset>>,
        now: DateTime<FixedOffset>,
        lookback: Duration,
    ) -> Self {
        let floor = now - lookback;
        let start = match last_crawled_at {
            Some(cursor) if cursor > floor => cursor.min(now),
            _ => floor,
        };
        Self { start, end: now }
    }

    /// The window starting at the lookback floor, ignoring any cursor.
    pub fn lookback_from(now: DateTime<FixedOffset>, lookback: Duration) -> Self {
        Self::resolve(None, now, lookback)
    }

    /// `start` as the search `sd` parameter, `YYYYMMDDhhmmss` in the window's
    /// own offset.
    pub fn start_param(&self) -> String {
        self.start.format(QUERY_FORMAT).to_string()
    }

    /// `end` as the search `ed` parameter.
    pub fn end_param(&self) -> String {
        self.end.format(QUERY_FORMAT).to_string()
    }
}
