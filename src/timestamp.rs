//! Local-time timestamp codec.
//!
//! Every timestamp the store persists (`start_time`, `expiry_time` and the
//! audit columns) uses the fixed-width `YYYY-MM-DD HH:MM:SS` form in the
//! local time zone. Fixed width keeps lexicographic order equal to
//! chronological order, which the SQL comparisons rely on.

use crate::error::{LedgerError, LedgerResult};
use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

/// Wire format for every persisted timestamp.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Accepted input formats for caller-supplied times, tried in order.
const INPUT_FORMATS: [&str; 3] = [
    TIMESTAMP_FORMAT,
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
];

/// Current local wall-clock time, truncated to whole seconds.
pub fn local_now() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

/// Format a timestamp in the persisted wire format.
pub fn format_timestamp(ts: NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a caller-supplied time, accepting the stored form, ISO with seconds
/// and ISO without seconds. The first format that parses wins.
pub fn parse_input_time(field: &str, raw: &str) -> LedgerResult<NaiveDateTime> {
    let raw = raw.trim();
    INPUT_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .ok_or_else(|| {
            LedgerError::invalid(
                field,
                format!(
                    "'{}' is not a timestamp (expected YYYY-MM-DD HH:MM:SS, YYYY-MM-DDTHH:MM:SS or YYYY-MM-DDTHH:MM)",
                    raw
                ),
            )
        })
}

/// The first and last second of a calendar day.
pub fn day_bounds(date: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    let start = date.and_time(NaiveTime::MIN);
    let end = date.and_hms_opt(23, 59, 59).unwrap_or(start);
    (start, end)
}
