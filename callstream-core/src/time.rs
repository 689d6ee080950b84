//! Types and traits specific to time-keeping in the event-time domain.

use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Trait implemented by all types usable as timestamps in callstream
pub trait Timestamp: PartialOrd + Ord + Clone + std::fmt::Debug + 'static {
    /// Maximum or final value of this type. This is the last possible timestamp.
    const MAX: Self;
    /// Minumum value of this type.
    const MIN: Self;

    /// Merges two timestamps, yielding the lowest common timestamp of the two values.
    fn merge(&self, other: &Self) -> Self;
}

/// Event time of a call, in milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventTime(i64);

impl EventTime {
    /// Create an event time from milliseconds since the Unix epoch
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Milliseconds since the Unix epoch
    pub const fn as_millis(&self) -> i64 {
        self.0
    }

    /// Subtract a duration, clamping at [EventTime::MIN]
    pub fn saturating_sub(self, duration: Duration) -> Self {
        let millis = i64::try_from(duration.as_millis()).unwrap_or(i64::MAX);
        Self(self.0.saturating_sub(millis))
    }

    /// Add a duration, clamping at [EventTime::MAX]
    pub fn saturating_add(self, duration: Duration) -> Self {
        let millis = i64::try_from(duration.as_millis()).unwrap_or(i64::MAX);
        Self(self.0.saturating_add(millis))
    }

    /// Parse the `call_date_time` field of a call record.
    ///
    /// Accepts RFC 3339 as well as the naive `YYYY-MM-DDTHH:MM:SS[.fff]` and
    /// `YYYY-MM-DD HH:MM:SS[.fff]` forms. Naive values are read as UTC.
    /// Returns `None` for empty or unparseable input.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(Self(dt.timestamp_millis()));
        }
        ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .map(|naive| Self(naive.and_utc().timestamp_millis()))
    }
}

impl Timestamp for EventTime {
    const MAX: Self = Self(i64::MAX);
    const MIN: Self = Self(i64::MIN);

    fn merge(&self, other: &Self) -> Self {
        *self.min(other)
    }
}

impl std::ops::Sub<Duration> for EventTime {
    type Output = EventTime;

    fn sub(self, rhs: Duration) -> Self::Output {
        self.saturating_sub(rhs)
    }
}

impl std::fmt::Display for EventTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if *self == Self::MIN {
            return f.write_str("-inf");
        }
        if *self == Self::MAX {
            return f.write_str("+inf");
        }
        match DateTime::<Utc>::from_timestamp_millis(self.0) {
            Some(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S%.3fZ")),
            None => write!(f, "{}ms", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_naive_call_date_time() {
        let t = EventTime::parse("2018-12-31T23:57:00.000").unwrap();
        assert_eq!(t.as_millis(), 1_546_300_620_000);
        let spaced = EventTime::parse("2018-12-31 23:57:00").unwrap();
        assert_eq!(t, spaced);
    }

    #[test]
    fn parses_rfc3339_with_offset() {
        let t = EventTime::parse("2019-01-01T00:57:00+01:00").unwrap();
        assert_eq!(t.as_millis(), 1_546_300_620_000);
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(EventTime::parse(""), None);
        assert_eq!(EventTime::parse("   "), None);
        assert_eq!(EventTime::parse("yesterday"), None);
    }

    #[test]
    fn sub_saturates() {
        let t = EventTime::MIN - Duration::from_secs(3600);
        assert_eq!(t, EventTime::MIN);
        assert_eq!(EventTime::MAX.saturating_add(Duration::from_secs(1)), EventTime::MAX);
    }

    #[test]
    fn merge_is_min() {
        let a = EventTime::from_millis(5);
        let b = EventTime::from_millis(9);
        assert_eq!(a.merge(&b), a);
        assert_eq!(b.merge(&a), a);
    }

    #[test]
    fn display_is_iso() {
        let t = EventTime::from_millis(1_546_300_620_000);
        assert_eq!(t.to_string(), "2018-12-31T23:57:00.000Z");
        assert_eq!(EventTime::MIN.to_string(), "-inf");
    }
}
