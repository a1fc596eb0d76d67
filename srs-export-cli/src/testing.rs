//! In-memory collaborators and fixtures shared by unit tests

use anyhow::Result;
use async_trait::async_trait;
use rust_xlsxwriter::Workbook;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::api::models::{ExportRecord, StaffRecord};
use crate::api::storage::{DocumentStore, ListSource, Mailer, WriteError};

type ListCall = (String, Vec<String>, Vec<String>);

/// Lists served from memory; unknown lists are an error
#[derive(Default)]
pub struct MemoryLists {
    lists: HashMap<String, Vec<Value>>,
    calls: Mutex<Vec<ListCall>>,
}

impl MemoryLists {
    pub fn with_list(mut self, name: &str, rows: Vec<Value>) -> Self {
        self.lists.insert(name.to_string(), rows);
        self
    }

    pub fn calls(&self) -> Vec<ListCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ListSource for MemoryLists {
    async fn list_read(
        &self,
        list_name: &str,
        select: &[&str],
        expand: &[&str],
    ) -> Result<Vec<Value>> {
        self.calls.lock().unwrap().push((
            list_name.to_string(),
            select.iter().map(|s| s.to_string()).collect(),
            expand.iter().map(|s| s.to_string()).collect(),
        ));
        self.lists
            .get(list_name)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("HTTP 404: list '{}' does not exist", list_name))
    }
}

/// Document library in memory. Writes consume scripted results first and
/// succeed (storing the bytes) once the script is empty.
#[derive(Default)]
pub struct MemoryStore {
    files: Mutex<HashMap<String, Vec<u8>>>,
    write_script: Mutex<VecDeque<Result<(), WriteError>>>,
    write_attempts: Mutex<Vec<String>>,
    fail_reads: bool,
}

impl MemoryStore {
    pub fn with_file(self, path: &str, content: Vec<u8>) -> Self {
        self.files
            .lock()
            .unwrap()
            .insert(normalize(path).to_string(), content);
        self
    }

    pub fn with_write_results(self, results: Vec<Result<(), WriteError>>) -> Self {
        *self.write_script.lock().unwrap() = results.into();
        self
    }

    pub fn failing_reads(mut self) -> Self {
        self.fail_reads = true;
        self
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(normalize(path)).cloned()
    }

    /// Paths of every write attempt, in order
    pub fn write_attempts(&self) -> Vec<String> {
        self.write_attempts.lock().unwrap().clone()
    }
}

fn normalize(path: &str) -> &str {
    path.trim().trim_start_matches('/')
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn full_path(&self, relative_path: &str) -> String {
        format!("memory://library/{}", normalize(relative_path))
    }

    async fn file_exists(&self, relative_path: &str) -> Result<bool> {
        Ok(self
            .files
            .lock()
            .unwrap()
            .contains_key(normalize(relative_path)))
    }

    async fn file_read(&self, relative_path: &str) -> Result<Vec<u8>> {
        if self.fail_reads {
            anyhow::bail!("HTTP 500: read failed");
        }
        self.file(relative_path)
            .ok_or_else(|| anyhow::anyhow!("HTTP 404: {}", relative_path))
    }

    async fn file_write(&self, relative_path: &str, content: Vec<u8>) -> Result<(), WriteError> {
        self.write_attempts
            .lock()
            .unwrap()
            .push(normalize(relative_path).to_string());

        if let Some(result) = self.write_script.lock().unwrap().pop_front() {
            result?;
        }
        self.files
            .lock()
            .unwrap()
            .insert(normalize(relative_path).to_string(), content);
        Ok(())
    }
}

/// Mailer that records every message
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<(Vec<String>, String, String)>>,
    reject: bool,
}

impl RecordingMailer {
    pub fn rejecting() -> Self {
        Self {
            reject: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<(Vec<String>, String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_email(
        &self,
        recipients: &[String],
        subject: &str,
        html_body: &str,
    ) -> Result<bool> {
        self.sent.lock().unwrap().push((
            recipients.to_vec(),
            subject.to_string(),
            html_body.to_string(),
        ));
        if self.reject {
            anyhow::bail!("SMTP relay unavailable");
        }
        Ok(true)
    }
}

pub fn lock_error() -> WriteError {
    WriteError::Locked {
        message: "HTTP 423: Locked".to_string(),
    }
}

/// Export record for staff member 3 / manager 5 / group 9, first week of 2024
pub fn export_record(id: i64, path: Option<&str>) -> ExportRecord {
    ExportRecord {
        id,
        title: Some(true),
        staff_member_id: Some(3),
        manager_id: Some(5),
        staff_group_id: Some(9),
        group_member_id: None,
        condition: Some(1.0),
        date1: Some("2024-01-01T00:00:00Z".to_string()),
        date2: Some("2024-01-07T00:00:00Z".to_string()),
        path_for_srs_file: path.map(str::to_string),
        email: None,
    }
}

/// Staff record with the keys of [`export_record`]
pub fn staff_record(id: i64, date: &str, shift: Option<(&str, &str)>) -> StaffRecord {
    StaffRecord {
        id,
        date: date.to_string(),
        shift_date1: shift.map(|(start, _)| start.to_string()),
        shift_date2: shift.map(|(_, end)| end.to_string()),
        staff_member_id: Some(3),
        manager_id: Some(5),
        staff_group_id: Some(9),
        ..StaffRecord::default()
    }
}

/// Staff record as the list returns it
pub fn staff_row(record: &StaffRecord) -> Value {
    serde_json::to_value(record).unwrap()
}

/// Workbook whose sheets hold the given column A texts from row 1
pub fn workbook(sheets: &[(&str, &[&str])]) -> Vec<u8> {
    let mut workbook = Workbook::new();
    for (name, column_a) in sheets {
        let sheet = workbook.add_worksheet();
        sheet.set_name(*name).unwrap();
        for (row, text) in column_a.iter().enumerate() {
            if !text.is_empty() {
                sheet.write_string(row as u32, 0, *text).unwrap();
            }
        }
    }
    workbook.save_to_buffer().unwrap()
}

/// Standard SRS workbook layout: a summary sheet, then the entry sheet
pub fn srs_workbook(labels: &[&str]) -> Vec<u8> {
    workbook(&[("1.Summary", &["Summary"]), ("2.Employee Data Entry", labels)])
}
