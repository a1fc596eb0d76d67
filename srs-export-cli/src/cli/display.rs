//! Terminal formatting helpers shared by the command handlers

use colored::*;

use crate::api::models::StaffRecord;
use crate::services::shift::is_empty_shift;
use crate::services::timestamps::parse_timestamp;

/// `2024-01-02T09:30:00Z` → `09:30`; unparseable or missing values → `-`
pub fn short_time(value: Option<&str>) -> String {
    value
        .and_then(parse_timestamp)
        .map(|t| t.format("%H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Day portion of a timestamp, or `-`
pub fn short_day(value: Option<&str>) -> String {
    match value.map(|v| v.split('T').next().unwrap_or(v)) {
        Some(day) if !day.trim().is_empty() => day.to_string(),
        _ => "-".to_string(),
    }
}

/// One line per staff record under a group header
pub fn staff_line(record: &StaffRecord) -> String {
    let mut parts = vec![
        format!("#{}", record.id),
        format!(
            "{}-{}",
            short_time(record.shift_date1.as_deref()),
            short_time(record.shift_date2.as_deref())
        ),
    ];
    if let Some(name) = record.staff_member_name() {
        parts.push(name.to_string());
    }
    if let Some(leave) = record.leave_type_name() {
        parts.push(format!("leave: {}", leave));
    }
    for note in [&record.leave_note, &record.lunch_note, &record.total_hours_note]
        .into_iter()
        .flatten()
        .filter(|n| !n.trim().is_empty())
    {
        parts.push(format!("\"{}\"", note.trim()));
    }
    if is_empty_shift(record) {
        parts.push("empty shift".to_string());
    }
    parts.join("  ")
}

/// Colour an outcome line by its category
pub fn outcome(line: &str) -> ColoredString {
    if line.contains("value updated") {
        line.green()
    } else if line.contains("export error") || line.contains("error:") || line.contains("error loading") {
        line.red()
    } else {
        line.yellow()
    }
}
