//! Tolerant parsing of the date strings SharePoint returns

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Parse an ISO timestamp. Offsetless values are taken as UTC, and a bare
/// `YYYY-MM-DD` means midnight UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }

    parse_day(value).and_then(|d| d.and_hms_opt(0, 0, 0)).map(|n| n.and_utc())
}

/// Parse a day key (`YYYY-MM-DD`), also accepting a full timestamp whose
/// date portion is used as-is
pub fn parse_day(value: &str) -> Option<NaiveDate> {
    let day = value.trim().split('T').next()?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}
