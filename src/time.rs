//! Timestamp capture and ISO-8601 rendering.
//!
//! Model timestamps are naive UTC datetimes kept at microsecond precision,
//! so the rendered form parses back to exactly the same value.

use chrono::{DateTime, NaiveDateTime, SubsecRound, TimeDelta, Timelike, Utc};

/// Timestamp type stored on every model.
pub type Timestamp = NaiveDateTime;

const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const ISO_FORMAT_MICROS: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Current UTC time truncated to microseconds.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now().naive_utc().trunc_subsecs(6)
}

/// Returns a timestamp strictly after `previous`.
///
/// Uses the wall clock when it has moved past `previous`, otherwise
/// `previous` plus one microsecond.
#[must_use]
pub fn advance(previous: Timestamp) -> Timestamp {
    let current = now();
    if current > previous {
        current
    } else {
        previous + TimeDelta::microseconds(1)
    }
}

/// Renders a timestamp as ISO-8601 without an offset.
///
/// The fractional part is omitted when it is zero.
///
/// # Examples
///
/// ```
/// use modelstore::time::{format_iso, parse_iso};
///
/// let ts = parse_iso("2017-09-28T21:03:54.052298").unwrap();
/// assert_eq!(format_iso(&ts), "2017-09-28T21:03:54.052298");
/// ```
#[must_use]
pub fn format_iso(ts: &Timestamp) -> String {
    if ts.nanosecond() == 0 {
        ts.format(ISO_FORMAT).to_string()
    } else {
        ts.format(ISO_FORMAT_MICROS).to_string()
    }
}

/// Parses an ISO-8601 timestamp.
///
/// Accepts naive datetimes with or without a fractional part and
/// RFC 3339 strings with an offset, which are converted to UTC.
/// Returns `None` when the input matches neither form.
#[must_use]
pub fn parse_iso(input: &str) -> Option<Timestamp> {
    let trimmed = input.trim();
    if let Ok(ts) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(ts.trunc_subsecs(6));
    }
    DateTime::parse_from_rfc3339(trimmed)
        .ok()
        .map(|dt| dt.naive_utc().trunc_subsecs(6))
}
