//! Typed rows of the `ExportToSRS` and `StaffRecords` SharePoint lists

use serde::{Deserialize, Deserializer, Serialize};

/// Expanded lookup column (e.g. `StaffMember/Id,StaffMember/Title`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LookupValue {
    pub id: Option<i64>,
    pub title: Option<String>,
}

/// One scheduled export job from the `ExportToSRS` list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExportRecord {
    pub id: i64,
    /// Boolean flag stored in the list's Title column
    #[serde(default)]
    pub title: Option<bool>,
    #[serde(default)]
    pub staff_member_id: Option<i64>,
    #[serde(default)]
    pub manager_id: Option<i64>,
    #[serde(default)]
    pub staff_group_id: Option<i64>,
    #[serde(default)]
    pub group_member_id: Option<i64>,
    #[serde(default)]
    pub condition: Option<f64>,
    /// Start of the export range
    #[serde(default)]
    pub date1: Option<String>,
    /// End of the export range (inclusive)
    #[serde(default)]
    pub date2: Option<String>,
    /// Workbook path relative to the document library root
    #[serde(default, rename = "PathForSRSFile")]
    pub path_for_srs_file: Option<String>,
    /// Notification address; the loader maps the configured column onto `Email`
    #[serde(default, rename = "Email", alias = "email")]
    pub email: Option<String>,
}

impl ExportRecord {
    /// Non-blank workbook path, trimmed
    pub fn workbook_path(&self) -> Option<&str> {
        self.path_for_srs_file
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }

    /// Records without a workbook path never take part in a run
    pub fn is_eligible(&self) -> bool {
        self.workbook_path().is_some()
    }

    pub fn notification_address(&self) -> Option<&str> {
        self.email.as_deref().map(str::trim).filter(|e| !e.is_empty())
    }
}

/// One staff member's schedule entry for a day from the `StaffRecords` list
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct StaffRecord {
    pub id: i64,
    pub title: Option<String>,
    /// Day of the entry, ISO timestamp as returned by SharePoint
    #[serde(deserialize_with = "null_as_empty")]
    pub date: String,
    /// Shift start
    pub shift_date1: Option<String>,
    /// Shift end
    pub shift_date2: Option<String>,
    pub staff_member_id: Option<i64>,
    pub staff_member: Option<LookupValue>,
    pub manager_id: Option<i64>,
    pub staff_group_id: Option<i64>,
    pub type_of_leave_id: Option<i64>,
    pub type_of_leave: Option<LookupValue>,
    pub contract: Option<f64>,
    pub time_for_lunch: Option<f64>,
    pub leave_time: Option<f64>,
    pub relief_hours: Option<f64>,
    pub checked: Option<f64>,
    pub export_result: Option<f64>,
    pub leave_note: Option<String>,
    pub lunch_note: Option<String>,
    pub total_hours_note: Option<String>,
}

impl StaffRecord {
    /// Calendar day portion of `Date`, the key records are grouped by
    pub fn day_key(&self) -> &str {
        self.date.split('T').next().unwrap_or_default()
    }

    pub fn staff_member_name(&self) -> Option<&str> {
        self.staff_member.as_ref().and_then(|m| m.title.as_deref())
    }

    pub fn leave_type_name(&self) -> Option<&str> {
        self.type_of_leave.as_ref().and_then(|l| l.title.as_deref())
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Columns requested from `ExportToSRS`, plus the configured e-mail column
pub const EXPORT_SELECT: &[&str] = &[
    "Id",
    "Title",
    "StaffMemberId",
    "Date1",
    "Date2",
    "ManagerId",
    "StaffGroupId",
    "Condition",
    "GroupMemberId",
    "PathForSRSFile",
];

/// Columns requested from `StaffRecords`
pub const STAFF_SELECT: &[&str] = &[
    "Id",
    "Title",
    "Date",
    "StaffMemberId",
    "StaffMember/Id",
    "StaffMember/Title",
    "ManagerId",
    "StaffGroupId",
    "Checked",
    "ExportResult",
    "ShiftDate1",
    "ShiftDate2",
    "TimeForLunch",
    "Contract",
    "TypeOfLeaveId",
    "TypeOfLeave/Id",
    "TypeOfLeave/Title",
    "LeaveTime",
    "LeaveNote",
    "LunchNote",
    "TotalHoursNote",
    "ReliefHours",
];

/// Lookup columns expanded on `StaffRecords`
pub const STAFF_EXPAND: &[&str] = &["StaffMember", "TypeOfLeave"];

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_export_record_from_list_json() {
        let value = json!({
            "Id": 12,
            "Title": true,
            "StaffMemberId": 3,
            "Date1": "2024-01-01T00:00:00Z",
            "Date2": "2024-01-07T00:00:00Z",
            "ManagerId": 5,
            "StaffGroupId": 9,
            "Condition": 1,
            "GroupMemberId": 44,
            "PathForSRSFile": "/Team A/Smith.xlsx",
            "Email": "  lead@example.com "
        });

        let record: ExportRecord = serde_json::from_value(value).unwrap();

        assert_eq!(record.id, 12);
        assert_eq!(record.manager_id, Some(5));
        assert_eq!(record.workbook_path(), Some("/Team A/Smith.xlsx"));
        assert_eq!(record.notification_address(), Some("lead@example.com"));
        assert!(record.is_eligible());
    }

    #[test]
    fn test_blank_path_is_not_eligible() {
        let value = json!({ "Id": 1, "PathForSRSFile": "   " });
        let record: ExportRecord = serde_json::from_value(value).unwrap();
        assert!(!record.is_eligible());

        let value = json!({ "Id": 2, "PathForSRSFile": null });
        let record: ExportRecord = serde_json::from_value(value).unwrap();
        assert!(!record.is_eligible());
    }

    #[test]
    fn test_staff_record_with_expanded_lookups() {
        let value = json!({
            "Id": 100,
            "Title": "Shift",
            "Date": "2024-01-02T00:00:00Z",
            "ShiftDate1": "2024-01-02T09:00:00Z",
            "ShiftDate2": "2024-01-02T17:00:00Z",
            "StaffMemberId": 3,
            "StaffMember": { "Id": 3, "Title": "Anna" },
            "ManagerId": 5,
            "StaffGroupId": 9,
            "TypeOfLeaveId": null,
            "TypeOfLeave": null,
            "TimeForLunch": 30,
            "LeaveNote": null
        });

        let record: StaffRecord = serde_json::from_value(value).unwrap();

        assert_eq!(record.day_key(), "2024-01-02");
        assert_eq!(record.staff_member_name(), Some("Anna"));
        assert_eq!(record.leave_type_name(), None);
        assert_eq!(record.time_for_lunch, Some(30.0));
    }

    #[test]
    fn test_staff_record_null_date_is_empty() {
        let record: StaffRecord = serde_json::from_value(json!({ "Id": 1, "Date": null })).unwrap();
        assert_eq!(record.date, "");
        assert_eq!(record.day_key(), "");
    }
}
