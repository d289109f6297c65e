//! Timestamp parsing and artifact stamp formatting.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

use crate::error::{ConfigError, ConfigResult};
use crate::source::ResolutionClass;

/// Parse an ISO-8601 UTC timestamp as emitted by griddap time axes.
///
/// Accepts `2024-06-01T12:00:00Z`, offsets (`+00:00`), a missing zone
/// designator and bare dates (midnight UTC).
pub fn parse_iso(s: &str) -> ConfigResult<DateTime<Utc>> {
    let trimmed = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S") {
        return Ok(naive.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc());
        }
    }

    Err(ConfigError::InvalidTimestamp(s.to_string()))
}

/// Format a timestamp the way grid queries expect it (`2024-06-01T12:00:00Z`).
pub fn format_iso(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Artifact stamp for a timestamp.
///
/// Daily products are keyed by date so a re-issued daily file maps onto
/// the same artifact; sub-daily products keep the full time of day.
pub fn stamp_for(ts: &DateTime<Utc>, class: ResolutionClass) -> String {
    if class.is_daily() {
        ts.format("%Y%m%d").to_string()
    } else {
        ts.format("%Y%m%dT%H%M%S").to_string()
    }
}
