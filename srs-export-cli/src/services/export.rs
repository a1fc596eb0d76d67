//! One workbook round trip for an export record
//!
//! path check → existence → lookup label → read → locate → stamp → save.
//! Every step reports through [`FileCheckOutcome`] instead of failing, so a
//! batch run can record the result and move on.

use chrono::NaiveDate;
use log::{debug, info, warn};

use super::date_label;
use super::timestamps::parse_day;
use crate::api::models::ExportRecord;
use crate::api::storage::DocumentStore;
use crate::config::WorkbookConfig;
use crate::workbook::{locate, update};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileCheckOutcome {
    /// False when we could not look, true when we looked (even without a hit)
    pub success: bool,
    pub message: String,
    pub file_path: Option<String>,
    pub row_found: Option<bool>,
    pub row_number: Option<u32>,
    pub cell_updated: Option<bool>,
    /// The save was refused because the workbook is open elsewhere
    pub lock_conflict: bool,
}

impl FileCheckOutcome {
    fn failure(message: impl Into<String>, file_path: Option<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            file_path,
            ..Self::default()
        }
    }

    pub fn is_row_found(&self) -> bool {
        self.row_found == Some(true)
    }

    pub fn is_cell_updated(&self) -> bool {
        self.cell_updated == Some(true)
    }

    pub fn title(&self) -> &'static str {
        match (self.success, self.is_row_found()) {
            (true, true) => "Success",
            (true, false) => "Row not found",
            (false, _) => "Error",
        }
    }
}

/// Day used for the row lookup: the explicit date, else the export's `Date1`
fn lookup_day(export: &ExportRecord, date: Option<NaiveDate>) -> Option<NaiveDate> {
    date.or_else(|| export.date1.as_deref().and_then(parse_day))
}

fn report(file_path: &str, label: &str, status: &str) -> String {
    format!(
        "1. File found: {}\n\n2. Search text: \"{}\"\n\n3. Row search: {}",
        file_path, label, status
    )
}

/// Check the export's workbook and stamp the row for `date`
pub async fn check_workbook(
    store: &dyn DocumentStore,
    config: &WorkbookConfig,
    export: &ExportRecord,
    date: Option<NaiveDate>,
) -> FileCheckOutcome {
    let Some(path) = export.workbook_path() else {
        return FileCheckOutcome::failure(
            "No file path on the selected record. Check the PathForSRSFile field.",
            None,
        );
    };
    let relative = path.trim_start_matches('/');
    let full_path = store.full_path(relative);
    debug!("Checking workbook {}", full_path);

    match store.file_exists(relative).await {
        Ok(true) => {}
        Ok(false) => {
            return FileCheckOutcome::failure(
                format!(
                    "File not found: {}\nCheck the path and make sure the file exists.",
                    full_path
                ),
                Some(full_path),
            );
        }
        Err(e) => {
            return FileCheckOutcome::failure(
                format!("Error checking file: {:#}", e),
                Some(full_path),
            );
        }
    }

    let Some(day) = lookup_day(export, date) else {
        return FileCheckOutcome::failure(
            format!(
                "No valid date to search for in {} (Date1: {})",
                full_path,
                export.date1.as_deref().unwrap_or("-")
            ),
            Some(full_path),
        );
    };
    let label = date_label::encode(day);

    let bytes = match store.file_read(relative).await {
        Ok(bytes) => bytes,
        Err(e) => {
            return FileCheckOutcome::failure(
                format!("Error reading file {}: {:#}", full_path, e),
                Some(full_path),
            );
        }
    };

    let located = match locate(&bytes, &label, config) {
        Ok(located) => located,
        Err(err) if !err.is_negative_result() => {
            return FileCheckOutcome::failure(
                format!("Error reading workbook {}: {}", full_path, err),
                Some(full_path),
            );
        }
        Err(negative) => {
            info!("Export {}: '{}' not found ({})", export.id, label, negative);
            return FileCheckOutcome {
                success: true,
                message: report(&full_path, &label, &negative.to_string()),
                file_path: Some(full_path),
                row_found: Some(false),
                ..FileCheckOutcome::default()
            };
        }
    };

    let found = format!(
        "Row {} found on sheet '{}' ({})",
        located.row_number, located.sheet_name, located.find_method
    );
    let written = update(
        store,
        relative,
        &bytes,
        &located.sheet_name,
        located.row_number,
        config,
    )
    .await;

    let (cell_updated, lock_conflict, status) = match written {
        Ok(()) => (
            true,
            false,
            format!(
                "{}. Value '{}' written to the next column.",
                found, config.status_value
            ),
        ),
        Err(err) => {
            let locked = err.is_locked();
            if locked {
                warn!("Export {}: workbook is locked", export.id);
            }
            (false, locked, format!("{}. {}", found, err))
        }
    };

    FileCheckOutcome {
        success: true,
        message: report(&full_path, &label, &status),
        file_path: Some(full_path),
        row_found: Some(true),
        row_number: Some(located.row_number),
        cell_updated: Some(cell_updated),
        lock_conflict,
    }
}
