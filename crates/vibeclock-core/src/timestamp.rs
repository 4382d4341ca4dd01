//! Timestamp normalization
//!
//! Agent logs disagree on how time is written: RFC 3339 strings with or
//! without an offset, epoch seconds, epoch milliseconds, and numbers encoded as
//! strings. Everything is normalized to `DateTime<Utc>` here.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;

use crate::error::{Result, VibeclockError};

/// Epoch values at or above this magnitude are interpreted as milliseconds
///
/// 10^11 seconds is in the year 5138, while 10^11 milliseconds is in 1973, so
/// any realistic log value falls cleanly on one side.
pub const EPOCH_MILLIS_THRESHOLD: f64 = 1e11;

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// A timestamp as it appears in a raw JSON record
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    Number(f64),
    Text(String),
}

impl RawTimestamp {
    /// Normalize to UTC
    pub fn to_utc(&self) -> Result<DateTime<Utc>> {
        match self {
            RawTimestamp::Number(value) => from_epoch(*value),
            RawTimestamp::Text(text) => parse_timestamp_str(text),
        }
    }
}

/// Parse a textual timestamp
///
/// Accepted forms, tried in order: RFC 3339 with offset or `Z`, naive ISO-8601
/// (taken as UTC), and a plain number handled like [`from_epoch`].
///
/// # Examples
/// ```
/// use vibeclock_core::timestamp::parse_timestamp_str;
///
/// let a = parse_timestamp_str("2024-01-01T10:00:00Z").unwrap();
/// let b = parse_timestamp_str("2024-01-01T12:00:00+02:00").unwrap();
/// let c = parse_timestamp_str("1704103200").unwrap();
/// assert_eq!(a, b);
/// assert_eq!(a, c);
/// ```
pub fn parse_timestamp_str(text: &str) -> Result<DateTime<Utc>> {
    let trimmed = text.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(naive.and_utc());
        }
    }

    if let Ok(value) = trimmed.parse::<f64>() {
        return from_epoch(value);
    }

    Err(VibeclockError::InvalidTimestamp(text.to_string()))
}

/// Convert an epoch number to UTC, keeping fractional precision
pub fn from_epoch(value: f64) -> Result<DateTime<Utc>> {
    if !value.is_finite() {
        return Err(VibeclockError::InvalidTimestamp(value.to_string()));
    }

    let seconds = if value.abs() >= EPOCH_MILLIS_THRESHOLD {
        value / 1000.0
    } else {
        value
    };

    let whole = seconds.floor();
    let nanos = (((seconds - whole) * 1e9).round() as u32).min(999_999_999);

    DateTime::from_timestamp(whole as i64, nanos)
        .ok_or_else(|| VibeclockError::InvalidTimestamp(value.to_string()))
}
