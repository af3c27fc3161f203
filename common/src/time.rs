//! Millisecond timestamps, the unit every paste timestamp is stored in.

use chrono::{DateTime, SecondsFormat, Utc};

/// Milliseconds since the Unix epoch according to the wall clock.
#[must_use]
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[must_use]
pub fn to_datetime(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
}

/// Formats a timestamp as ISO-8601 with millisecond precision and a `Z`
/// suffix, e.g. `1970-01-01T00:01:01.000Z`.
#[must_use]
pub fn to_iso8601(millis: i64) -> Option<String> {
    to_datetime(millis).map(|time| time.to_rfc3339_opts(SecondsFormat::Millis, true))
}
