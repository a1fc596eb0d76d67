//! Lookup labels for SRS workbook rows
//!
//! Column A of the entry sheet holds one row per day written as
//! `"1st of Jan"`, `"22nd of Feb"` and so on. These labels are the lookup
//! key, so the format must match the workbook text exactly.

use chrono::{Datelike, NaiveDate};

use super::timestamps::parse_day;

/// Returned instead of a label when the input is not a date
pub const INVALID_DATE: &str = "Invalid Date";

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// English ordinal suffix, with the 11th-13th exception
pub fn ordinal_suffix(day: u32) -> &'static str {
    match (day % 10, day % 100) {
        (1, n) if n != 11 => "st",
        (2, n) if n != 12 => "nd",
        (3, n) if n != 13 => "rd",
        _ => "th",
    }
}

/// `2024-01-21` → `"21st of Jan"`
pub fn encode(date: NaiveDate) -> String {
    let day = date.day();
    let month = MONTHS[date.month0() as usize];
    format!("{}{} of {}", day, ordinal_suffix(day), month)
        .trim()
        .to_string()
}

/// Label for a day key or timestamp string, or [`INVALID_DATE`]
pub fn encode_key(key: &str) -> String {
    match parse_day(key) {
        Some(date) => encode(date),
        None => INVALID_DATE.to_string(),
    }
}

/// False for the [`INVALID_DATE`] sentinel and blank strings
pub fn is_valid_label(label: &str) -> bool {
    let label = label.trim();
    !label.is_empty() && label != INVALID_DATE
}
