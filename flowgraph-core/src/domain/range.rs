//! Time range domain type

use chrono::{DateTime, DurationRound, SecondsFormat, TimeDelta, Utc};
use thiserror::Error;

/// Errors raised while building a [`TimeRange`] or parsing its timestamps
#[derive(Debug, Error)]
pub enum RangeError {
    #[error("invalid {field} timestamp '{value}': {source}")]
    InvalidTimestamp {
        field: &'static str,
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("start should be before stop")]
    StartAfterStop,

    #[error("timestamp {0} cannot be truncated to the minute")]
    OutOfRange(DateTime<Utc>),
}

/// A requested graph window.
///
/// Both ends are truncated to the start of their minute on construction, so
/// two requests that differ only by seconds describe the same range. `start`
/// may equal `stop`; the stricter check happens when a job is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeRange {
    start: DateTime<Utc>,
    stop: DateTime<Utc>,
}

impl TimeRange {
    /// Build a range from two instants, truncating both to the minute
    pub fn new(start: DateTime<Utc>, stop: DateTime<Utc>) -> Result<Self, RangeError> {
        if start > stop {
            return Err(RangeError::StartAfterStop);
        }

        Ok(Self {
            start: truncate_to_minute(start)?,
            stop: truncate_to_minute(stop)?,
        })
    }

    /// Parse a range from the RFC 3339 strings found on the query string
    pub fn parse(start: &str, stop: &str) -> Result<Self, RangeError> {
        let start = parse_timestamp("start", start)?;
        let stop = parse_timestamp("stop", stop)?;
        Self::new(start, stop)
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn stop(&self) -> DateTime<Utc> {
        self.stop
    }
}

impl std::fmt::Display for TimeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to {}",
            self.start.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.stop.to_rfc3339_opts(SecondsFormat::Secs, true)
        )
    }
}

/// Drop everything below the minute. Truncates, never rounds.
pub fn truncate_to_minute(t: DateTime<Utc>) -> Result<DateTime<Utc>, RangeError> {
    t.duration_trunc(TimeDelta::minutes(1))
        .map_err(|_| RangeError::OutOfRange(t))
}

/// Parse an RFC 3339 timestamp (any offset, optional fractional seconds) into UTC
pub fn parse_timestamp(field: &'static str, value: &str) -> Result<DateTime<Utc>, RangeError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|source| RangeError::InvalidTimestamp {
            field,
            value: value.to_string(),
            source,
        })
}

/// Format a timestamp the way it travels between services: RFC 3339, UTC,
/// nanosecond precision
pub fn format_timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Nanos, true)
}
