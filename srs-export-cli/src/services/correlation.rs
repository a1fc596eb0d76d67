//! Matching staff records to an export record
//!
//! A staff record belongs to an export when its date falls inside the
//! export's range and its manager, staff group and staff member all match.
//! Besides the matches, a trace of per-condition counts is produced so an
//! operator can see which condition is excluding records.

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::collections::BTreeSet;
use std::fmt;

use super::timestamps::parse_timestamp;
use crate::api::lists::format_key;
use crate::api::models::{ExportRecord, StaffRecord};

/// Inclusive timestamp range of an export record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at <= self.end
    }

    /// Range of an export record, or a description of what is wrong with it
    pub fn of_export(export: &ExportRecord) -> Result<Self, String> {
        let parse = |label: &str, value: &Option<String>| {
            let raw = value.as_deref().unwrap_or("");
            parse_timestamp(raw).ok_or_else(|| format!("{} is not a date: '{}'", label, raw))
        };
        let start = parse("Date1", &export.date1)?;
        let end = parse("Date2", &export.date2)?;

        if start > end {
            warn!(
                "Export {} has Date1 after Date2 ({} > {}), nothing can match",
                export.id, start, end
            );
        }
        Ok(Self { start, end })
    }
}

/// Diagnostic counts collected while filtering
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationTrace {
    pub export_id: i64,
    pub range: Result<DateRange, String>,
    pub manager_id: Option<i64>,
    pub staff_group_id: Option<i64>,
    pub staff_member_id: Option<i64>,
    pub workbook_path: Option<String>,
    /// Records examined
    pub total: usize,
    pub matching_date: usize,
    pub matching_manager: usize,
    pub matching_group: usize,
    pub matching_staff_member: usize,
    /// Records whose own date could not be parsed
    pub unparseable_dates: usize,
    /// Distinct staff group values seen across all records
    pub staff_groups: Vec<String>,
    pub matched: usize,
    /// First matching record, as a sample
    pub sample: Option<StaffRecord>,
}

/// Matching records in input order, plus the trace
#[derive(Debug, Clone)]
pub struct Correlation {
    pub matched: Vec<StaffRecord>,
    pub trace: CorrelationTrace,
}

fn matches_manager(record: &StaffRecord, export: &ExportRecord) -> bool {
    record.manager_id == export.manager_id
}

fn matches_group(record: &StaffRecord, export: &ExportRecord) -> bool {
    record.staff_group_id == export.staff_group_id
}

fn matches_staff_member(record: &StaffRecord, export: &ExportRecord) -> bool {
    record.staff_member_id == export.staff_member_id
}

fn record_time(record: &StaffRecord) -> Option<DateTime<Utc>> {
    let parsed = parse_timestamp(&record.date);
    if parsed.is_none() {
        debug!("Staff record {} has an unparseable date '{}'", record.id, record.date);
    }
    parsed
}

/// Select the staff records belonging to `export`
pub fn filter(records: &[StaffRecord], export: &ExportRecord) -> Correlation {
    let range = DateRange::of_export(export);
    if let Err(reason) = &range {
        warn!("Export {}: {}", export.id, reason);
    }

    let in_range = |record: &StaffRecord| match (&range, record_time(record)) {
        (Ok(range), Some(at)) => range.contains(at),
        _ => false,
    };

    let matched: Vec<StaffRecord> = records
        .iter()
        .filter(|r| {
            in_range(r)
                && matches_manager(r, export)
                && matches_group(r, export)
                && matches_staff_member(r, export)
        })
        .cloned()
        .collect();

    let staff_groups: BTreeSet<Option<i64>> = records.iter().map(|r| r.staff_group_id).collect();

    let trace = CorrelationTrace {
        export_id: export.id,
        range: range.clone(),
        manager_id: export.manager_id,
        staff_group_id: export.staff_group_id,
        staff_member_id: export.staff_member_id,
        workbook_path: export.workbook_path().map(str::to_string),
        total: records.len(),
        matching_date: records.iter().filter(|r| in_range(r)).count(),
        matching_manager: records.iter().filter(|r| matches_manager(r, export)).count(),
        matching_group: records.iter().filter(|r| matches_group(r, export)).count(),
        matching_staff_member: records
            .iter()
            .filter(|r| matches_staff_member(r, export))
            .count(),
        unparseable_dates: records
            .iter()
            .filter(|r| parse_timestamp(&r.date).is_none())
            .count(),
        staff_groups: staff_groups.into_iter().map(format_key).collect(),
        matched: matched.len(),
        sample: matched.first().cloned(),
    };

    if trace.unparseable_dates > 0 {
        warn!(
            "{} staff records have an unparseable date and were excluded",
            trace.unparseable_dates
        );
    }
    info!(
        "Export {}: {} of {} staff records match",
        export.id, trace.matched, trace.total
    );

    Correlation { matched, trace }
}

fn opt<T: fmt::Display>(value: &Option<T>) -> String {
    value
        .as_ref()
        .map(|v| v.to_string())
        .unwrap_or_else(|| "-".to_string())
}

impl fmt::Display for CorrelationTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.range {
            Ok(range) => writeln!(
                f,
                "Date range: {} .. {}",
                range.start.to_rfc3339(),
                range.end.to_rfc3339()
            )?,
            Err(reason) => writeln!(f, "Date range error: {}", reason)?,
        }
        writeln!(f, "Staff groups in StaffRecords: {}", self.staff_groups.join(", "))?;
        writeln!(f, "Total StaffRecords: {}", self.total)?;
        writeln!(f, "Matching date range: {}", self.matching_date)?;
        writeln!(
            f,
            "Matching ManagerId ({}): {}",
            format_key(self.manager_id),
            self.matching_manager
        )?;
        writeln!(
            f,
            "Matching StaffGroupId ({}): {}",
            format_key(self.staff_group_id),
            self.matching_group
        )?;
        writeln!(
            f,
            "Matching StaffMemberId ({}): {}",
            format_key(self.staff_member_id),
            self.matching_staff_member
        )?;
        if self.unparseable_dates > 0 {
            writeln!(f, "Unparseable dates: {}", self.unparseable_dates)?;
        }
        writeln!(
            f,
            "Path for SRS file: {}",
            self.workbook_path.as_deref().unwrap_or("Not specified")
        )?;
        write!(f, "Matching all conditions: {}", self.matched)?;

        if let Some(sample) = &self.sample {
            let leave_note: String = sample.leave_note.as_deref().unwrap_or("").chars().take(30).collect();
            writeln!(f)?;
            writeln!(f, "Sample matching record:")?;
            writeln!(f, "- Id: {}", sample.id)?;
            writeln!(f, "- Date: {}", sample.date)?;
            writeln!(f, "- ShiftDate1: {}", opt(&sample.shift_date1))?;
            writeln!(f, "- ShiftDate2: {}", opt(&sample.shift_date2))?;
            writeln!(f, "- TypeOfLeaveId: {}", opt(&sample.type_of_leave_id))?;
            writeln!(f, "- Contract: {}", opt(&sample.contract))?;
            writeln!(f, "- TimeForLunch: {}", opt(&sample.time_for_lunch))?;
            writeln!(f, "- LeaveTime: {}", opt(&sample.leave_time))?;
            writeln!(f, "- ReliefHours: {}", opt(&sample.relief_hours))?;
            writeln!(f, "- LeaveNote: {}", leave_note)?;
            writeln!(f, "- Checked: {}", opt(&sample.checked))?;
            write!(f, "- ExportResult: {}", opt(&sample.export_result))?;
        }
        Ok(())
    }
}
