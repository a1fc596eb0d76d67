//! Outcome lines collected into the run summary

use crate::api::resilience::RetryReport;
use crate::services::FileCheckOutcome;

const MAX_ERROR_CHARS: usize = 100;

fn shorten(message: &str) -> String {
    let flat = message.replace('\n', " ");
    if flat.chars().count() <= MAX_ERROR_CHARS {
        flat
    } else {
        let cut: String = flat.chars().take(MAX_ERROR_CHARS).collect();
        format!("{}...", cut)
    }
}

pub fn no_matches(export_id: i64) -> String {
    format!("ID {} - no matching StaffRecords", export_id)
}

pub fn staff_load_failed(export_id: i64, err: &anyhow::Error) -> String {
    format!(
        "ID {} - error loading StaffRecords: {}",
        export_id,
        shorten(&format!("{:#}", err))
    )
}

/// Line for a finished workbook check, or the lock notice when every
/// attempt hit a lock
pub fn check_line(
    export_id: i64,
    key: &str,
    label: &str,
    report: &RetryReport<FileCheckOutcome>,
) -> String {
    if report.exhausted {
        return format!(
            "ID {} - export error: workbook is locked by another user, manual intervention needed ({} attempts)",
            export_id, report.attempts
        );
    }

    let outcome = &report.value;
    let result = match (outcome.success, outcome.row_number) {
        (true, Some(row)) if outcome.is_row_found() => {
            if outcome.is_cell_updated() {
                format!("row {} found, value updated", row)
            } else {
                format!("row {} found, value not updated", row)
            }
        }
        (true, _) => "row not found".to_string(),
        (false, _) => format!("error: {}", shorten(&outcome.message)),
    };

    let mut line = format!("ID {}, date {} ({}) - {}", export_id, key, label, result);
    if report.attempts > 1 {
        line.push_str(&format!(" ({} retries)", report.retries()));
    }
    line
}
