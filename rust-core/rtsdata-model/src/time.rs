// SPDX-License-Identifier: PMPL-1.0-or-later
//! Timestamp formats and microsecond conversion.
//!
//! Export files carry local wall-clock times without an offset; they are
//! interpreted as UTC. Storage keys use signed microseconds since the epoch.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::ModelError;

/// Timestamp column of instrument export files
pub const FILE_TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// `start_time` / `end_time` query parameters and bound responses
pub const QUERY_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Observation timestamps in query responses
pub const RECORD_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S,%6f";

/// Parse a `YYYY-MM-DD HH:MM:SS` request time as UTC
pub fn parse_query_time(value: &str) -> Result<DateTime<Utc>, ModelError> {
    NaiveDateTime::parse_from_str(value.trim(), QUERY_TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| ModelError::InvalidTimestamp {
            value: value.to_string(),
            format: QUERY_TIMESTAMP_FORMAT,
        })
}

/// Render a date bound (second precision)
pub fn format_bound(time: &DateTime<Utc>) -> String {
    time.format(QUERY_TIMESTAMP_FORMAT).to_string()
}

/// Render an observation timestamp (microsecond precision)
pub fn format_record_time(time: &DateTime<Utc>) -> String {
    time.format(RECORD_TIMESTAMP_FORMAT).to_string()
}

/// Microseconds since the Unix epoch
pub fn to_micros(time: &DateTime<Utc>) -> i64 {
    time.timestamp_micros()
}

pub fn from_micros(micros: i64) -> Result<DateTime<Utc>, ModelError> {
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| ModelError::TimestampOutOfRange(micros.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_parse_query_time() {
        let t = parse_query_time("2024-01-01 10:00:00").unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_query_time_rejects_other_layouts() {
        let err = parse_query_time("01/01/2024 10:00:00").unwrap_err();
        assert!(matches!(err, ModelError::InvalidTimestamp { .. }));
    }

    #[test]
    fn test_record_time_keeps_microseconds() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap() + Duration::microseconds(2);
        assert_eq!(format_record_time(&t), "2024-01-01 10:00:00,000002");
        assert_eq!(format_bound(&t), "2024-01-01 10:00:00");
    }

    #[test]
    fn test_micros_conversion() {
        let t = Utc.with_ymd_and_hms(1969, 12, 31, 23, 59, 59).unwrap();
        let micros = to_micros(&t);
        assert_eq!(micros, -1_000_000);
        assert_eq!(from_micros(micros).unwrap(), t);
    }
}
