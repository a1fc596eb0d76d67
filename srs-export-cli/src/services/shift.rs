//! Empty-shift detection
//!
//! Unscheduled days are stored with both shift boundaries at midnight.

use crate::api::models::StaffRecord;

fn is_midnight(boundary: Option<&str>) -> bool {
    let value = boundary.unwrap_or("");
    value.ends_with("T00:00:00Z") || value.ends_with("T00:00:00")
}

/// Both boundaries must independently end at midnight; a missing boundary
/// never counts as midnight.
pub fn is_empty_shift(record: &StaffRecord) -> bool {
    is_midnight(record.shift_date1.as_deref()) && is_midnight(record.shift_date2.as_deref())
}
