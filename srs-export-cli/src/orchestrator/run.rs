//! State of one auto-processing run

use std::fmt;
use uuid::Uuid;

use crate::api::models::ExportRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Zero-based position of the record being processed
    Running(usize),
    Finished,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Running(index) => write!(f, "running record {}", index + 1),
            RunState::Finished => write!(f, "finished"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunError {
    /// Nothing to process once records without a workbook path are removed
    NoEligibleRecords { total: usize },
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunError::NoEligibleRecords { total } => write!(
                f,
                "No export records with a workbook path ({} records loaded)",
                total
            ),
        }
    }
}

impl std::error::Error for RunError {}

/// Eligible records, the cursor into them, and the outcome lines so far
#[derive(Debug, Clone)]
pub struct ProcessingRun {
    run_id: Uuid,
    records: Vec<ExportRecord>,
    index: usize,
    outcomes: Vec<String>,
    running: bool,
}

impl ProcessingRun {
    /// Start a run over the records that have a workbook path
    pub fn start(records: Vec<ExportRecord>) -> Result<Self, RunError> {
        let total = records.len();
        let records: Vec<ExportRecord> = records.into_iter().filter(|r| r.is_eligible()).collect();
        if records.is_empty() {
            return Err(RunError::NoEligibleRecords { total });
        }

        Ok(Self {
            run_id: Uuid::new_v4(),
            records,
            index: 0,
            outcomes: Vec::new(),
            running: true,
        })
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn state(&self) -> RunState {
        if self.running {
            RunState::Running(self.index)
        } else {
            RunState::Finished
        }
    }

    /// Record being processed, `None` once the run has finished
    pub fn current(&self) -> Option<&ExportRecord> {
        if self.running {
            self.records.get(self.index)
        } else {
            None
        }
    }

    pub fn has_next(&self) -> bool {
        self.running && self.index + 1 < self.records.len()
    }

    pub fn record_outcome(&mut self, line: String) {
        self.outcomes.push(line);
    }

    /// Move to the next record; past the last one the run finishes
    pub fn advance(&mut self) {
        if !self.running {
            return;
        }
        self.index += 1;
        if self.index >= self.records.len() {
            self.running = false;
        }
    }

    pub fn outcomes(&self) -> &[String] {
        &self.outcomes
    }

    /// `"Processed items: N\n\nResults:\n<lines>"`
    pub fn summary(&self) -> String {
        format!(
            "Processed items: {}\n\nResults:\n{}",
            self.records.len(),
            self.outcomes.join("\n")
        )
    }

    /// Distinct non-blank addresses of the eligible records, first seen first
    pub fn notification_addresses(&self) -> Vec<String> {
        let mut addresses: Vec<String> = Vec::new();
        for address in self.records.iter().filter_map(|r| r.notification_address()) {
            if !addresses.iter().any(|a| a == address) {
                addresses.push(address.to_string());
            }
        }
        addresses
    }
}
