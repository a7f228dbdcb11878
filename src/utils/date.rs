//! Date parsing and formatting for feed entries.
//!
//! Accepted inputs:
//! - RFC 3339: `2021-06-15T08:30:00+02:00`, `2021-06-15T08:30:00Z`
//! - `2021-06-15 08:30:00` and `2021-06-15T08:30:00` (UTC)
//! - `2021-06-15` (midnight UTC)
//!
//! Output is always `YYYY-MM-DDTHH:MM:SS+HH:MM`.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};

/// Fixed feed timestamp format, ISO-8601 with numeric offset.
pub const FEED_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%:z";

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Parse a document date. Returns `None` for anything unrecognized.
pub fn parse(s: &str) -> Option<DateTime<FixedOffset>> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt);
    }

    let utc = FixedOffset::east_opt(0)?;
    if let Some(naive) = NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
    {
        return Some(naive.and_utc().with_timezone(&utc));
    }

    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc().with_timezone(&utc))
}

pub fn format(dt: &DateTime<FixedOffset>) -> String {
    dt.format(FEED_FORMAT).to_string()
}
