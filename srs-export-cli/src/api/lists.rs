//! Typed loaders for the two lists the engine reconciles

use anyhow::Result;
use log::{info, warn};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeSet;

use super::models::{EXPORT_SELECT, ExportRecord, STAFF_EXPAND, STAFF_SELECT, StaffRecord};
use super::storage::ListSource;
use crate::config::SharePointConfig;

pub async fn load_export_records(
    source: &dyn ListSource,
    config: &SharePointConfig,
) -> Result<Vec<ExportRecord>> {
    let email_column = config.export_email_column.trim();
    let mut select: Vec<&str> = EXPORT_SELECT.to_vec();
    select.push(email_column);

    let rows = source
        .list_read(&config.export_list, &select, &[])
        .await?;
    let rows = rows
        .into_iter()
        .map(|row| with_email_column(row, email_column))
        .collect();
    let records: Vec<ExportRecord> = decode_rows(&config.export_list, rows);
    info!(
        "Loaded {} export records ({} with a workbook path)",
        records.len(),
        records.iter().filter(|r| r.is_eligible()).count()
    );
    Ok(records)
}

pub async fn load_staff_records(
    source: &dyn ListSource,
    config: &SharePointConfig,
) -> Result<Vec<StaffRecord>> {
    let rows = source
        .list_read(&config.staff_list, STAFF_SELECT, STAFF_EXPAND)
        .await?;
    let records: Vec<StaffRecord> = decode_rows(&config.staff_list, rows);

    let groups: BTreeSet<String> = records
        .iter()
        .map(|r| format_key(r.staff_group_id))
        .collect();
    info!(
        "Loaded {} staff records, staff groups: {}",
        records.len(),
        groups.into_iter().collect::<Vec<_>>().join(", ")
    );
    Ok(records)
}

/// Move a custom e-mail column onto the `Email` field the model reads
fn with_email_column(mut row: Value, column: &str) -> Value {
    if column != "Email" {
        if let Some(fields) = row.as_object_mut() {
            if let Some(address) = fields.remove(column) {
                fields.insert("Email".to_string(), address);
            }
        }
    }
    row
}

/// Decode list rows, skipping (and logging) rows of an unexpected shape
fn decode_rows<T: DeserializeOwned>(list_name: &str, rows: Vec<Value>) -> Vec<T> {
    let mut decoded = Vec::with_capacity(rows.len());
    for row in rows {
        let id = row.get("Id").cloned().unwrap_or(Value::Null);
        match serde_json::from_value(row) {
            Ok(record) => decoded.push(record),
            Err(e) => warn!("Skipping row {} of '{}': {}", id, list_name, e),
        }
    }
    decoded
}

/// Display form of an optional lookup id
pub fn format_key(id: Option<i64>) -> String {
    id.map(|v| v.to_string()).unwrap_or_else(|| "null".to_string())
}
