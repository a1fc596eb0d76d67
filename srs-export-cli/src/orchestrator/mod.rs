//! Sequential auto-processing of export records
//!
//! Records are processed one at a time: correlate against the cached staff
//! records, group by day, then stamp the first day's row in the workbook
//! under the lock retry policy. Each record leaves one outcome line; the
//! run ends with a summary and a notification to the distinct addresses.

pub mod notify;
pub mod outcome;
pub mod run;

use anyhow::{Result, bail};
use chrono::NaiveDate;
use log::{debug, error, info, warn};
use std::time::Duration;
use uuid::Uuid;

use crate::api::lists::load_staff_records;
use crate::api::models::{ExportRecord, StaffRecord};
use crate::api::resilience::{ProcessingConfig, RetryPolicy, RetryReport};
use crate::api::storage::{DocumentStore, ListSource, Mailer};
use crate::config::Config;
use crate::services::timestamps::parse_day;
use crate::services::{
    Correlation, FileCheckOutcome, Grouped, check_workbook, date_label, filter, group,
};

pub use run::{ProcessingRun, RunError, RunState};

/// What a finished run produced
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub processed: usize,
    pub outcomes: Vec<String>,
    pub summary: String,
    /// Addresses the mailer accepted
    pub notified: Vec<String>,
}

/// Correlation and grouping of one export record
#[derive(Debug, Clone)]
pub struct Selection {
    pub correlation: Correlation,
    pub grouped: Grouped,
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

pub struct ExportOrchestrator<'a> {
    lists: &'a dyn ListSource,
    store: &'a dyn DocumentStore,
    mailer: &'a dyn Mailer,
    config: &'a Config,
    processing: ProcessingConfig,
    staff_cache: Option<Vec<StaffRecord>>,
}

impl<'a> ExportOrchestrator<'a> {
    pub fn new(
        lists: &'a dyn ListSource,
        store: &'a dyn DocumentStore,
        mailer: &'a dyn Mailer,
        config: &'a Config,
    ) -> Self {
        Self {
            lists,
            store,
            mailer,
            config,
            processing: config.processing.to_processing_config(),
            staff_cache: None,
        }
    }

    /// Override retry and pacing (tests use [`ProcessingConfig::immediate`])
    pub fn with_processing(mut self, processing: ProcessingConfig) -> Self {
        self.processing = processing;
        self
    }

    /// Staff records, loaded on first use. An empty result is not cached so
    /// the next record tries again.
    pub async fn staff_records(&mut self) -> Result<&[StaffRecord]> {
        if self.staff_cache.is_none() {
            let records = load_staff_records(self.lists, &self.config.sharepoint).await?;
            if records.is_empty() {
                bail!("the {} list returned no records", self.config.sharepoint.staff_list);
            }
            self.staff_cache = Some(records);
        }
        Ok(self.staff_cache.as_deref().unwrap_or_default())
    }

    /// Matching staff records of `export`, grouped by day
    pub async fn select(&mut self, export: &ExportRecord) -> Result<Selection> {
        let staff = self.staff_records().await?;
        let correlation = filter(staff, export);
        debug!("Correlation for export {}:\n{}", export.id, correlation.trace);
        let grouped = group(&correlation.matched);
        Ok(Selection {
            correlation,
            grouped,
        })
    }

    /// Workbook check for one export record under the lock retry policy.
    ///
    /// The lookup day is `date` when given, otherwise the check falls back
    /// to the record's `Date1`.
    pub async fn check_with_retry(
        &self,
        export: &ExportRecord,
        date: Option<NaiveDate>,
    ) -> RetryReport<FileCheckOutcome> {
        let store = self.store;
        let workbook = &self.config.workbook;
        let policy = RetryPolicy::new(self.processing.retry.clone());
        let max_attempts = policy.max_attempts();

        policy
            .run(
                move |attempt| {
                    debug!(
                        "Export {}: workbook check attempt {} of {}",
                        export.id, attempt, max_attempts
                    );
                    check_workbook(store, workbook, export, date)
                },
                |outcome: &FileCheckOutcome| outcome.lock_conflict,
            )
            .await
    }

    /// Process one export record end to end and return its outcome line
    pub async fn process_record(&mut self, export: &ExportRecord) -> String {
        let selection = match self.select(export).await {
            Ok(selection) => selection,
            Err(e) => {
                error!("Export {}: cannot load staff records: {:#}", export.id, e);
                return outcome::staff_load_failed(export.id, &e);
            }
        };

        let Some(key) = selection.grouped.first_key() else {
            info!("Export {}: no matching staff records", export.id);
            return outcome::no_matches(export.id);
        };
        let label = date_label::encode_key(key);
        let day = parse_day(key);
        if day.is_none() {
            warn!("Export {}: group key '{}' is not a date", export.id, key);
        }

        let report = self.check_with_retry(export, day).await;
        outcome::check_line(export.id, key, &label, &report)
    }

    /// Process every eligible record in order, then notify.
    ///
    /// `on_outcome` sees each outcome line as soon as it is recorded, with the
    /// record's position and the run length.
    pub async fn run<F>(
        &mut self,
        records: Vec<ExportRecord>,
        mut on_outcome: F,
    ) -> Result<RunReport, RunError>
    where
        F: FnMut(usize, usize, &str),
    {
        let mut run = ProcessingRun::start(records)?;
        let pacing = self.processing.pacing.clone();
        info!(
            "Run {} started with {} export records",
            run.run_id(),
            run.len()
        );

        while let RunState::Running(index) = run.state() {
            let Some(export) = run.current().cloned() else {
                break;
            };
            pause(pacing.settle_delay).await;
            info!(
                "Run {}: record {} of {}, ID {}",
                run.run_id(),
                index + 1,
                run.len(),
                export.id
            );

            let line = self.process_record(&export).await;
            info!("{}", line);
            on_outcome(index, run.len(), &line);
            run.record_outcome(line);

            if run.has_next() {
                pause(pacing.between_records()).await;
            } else {
                pause(pacing.advance_delay).await;
            }
            run.advance();
        }

        let summary = run.summary();
        info!("Run {} {}", run.run_id(), run.state());

        let notified = if self.config.notifications.enabled {
            notify::notify_all(
                self.mailer,
                &run.notification_addresses(),
                &self.config.notifications.subject,
                &summary,
            )
            .await
        } else {
            debug!("Notifications disabled");
            Vec::new()
        };

        Ok(RunReport {
            run_id: run.run_id(),
            processed: run.len(),
            outcomes: run.outcomes().to_vec(),
            summary,
            notified,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        MemoryLists, MemoryStore, RecordingMailer, export_record, lock_error, srs_workbook,
        staff_record, staff_row,
    };
    use calamine::{Data, Reader, Xlsx};
    use std::io::Cursor;

    const SHIFT: Option<(&str, &str)> = Some(("2024-01-02T09:00:00Z", "2024-01-02T17:00:00Z"));

    fn staff_lists() -> MemoryLists {
        let records = [
            staff_record(10, "2024-01-02T00:00:00Z", SHIFT),
            staff_record(11, "2024-01-04T00:00:00Z", None),
        ];
        MemoryLists::default().with_list("StaffRecords", records.iter().map(staff_row).collect())
    }

    fn book() -> Vec<u8> {
        srs_workbook(&["Date", "1st of Jan", "2nd of Jan", "3rd of Jan"])
    }

    fn with_email(id: i64, path: &str, email: &str) -> ExportRecord {
        let mut record = export_record(id, Some(path));
        record.email = Some(email.to_string());
        record
    }

    fn status_cell(bytes: &[u8], row: u32) -> Option<Data> {
        let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes)).unwrap();
        let range = workbook.worksheet_range("2.Employee Data Entry").unwrap();
        range.get_value((row - 1, 1)).cloned()
    }

    async fn run_all(
        lists: &MemoryLists,
        store: &MemoryStore,
        mailer: &RecordingMailer,
        config: &Config,
        records: Vec<ExportRecord>,
    ) -> Result<RunReport, RunError> {
        ExportOrchestrator::new(lists, store, mailer, config)
            .with_processing(ProcessingConfig::immediate())
            .run(records, |_, _, _| {})
            .await
    }

    #[tokio::test]
    async fn test_lock_twice_then_success() {
        let lists = staff_lists();
        let store = MemoryStore::default()
            .with_file("a.xlsx", book())
            .with_write_results(vec![Err(lock_error()), Err(lock_error())]);
        let mailer = RecordingMailer::default();
        let config = Config::default();

        let report = run_all(&lists, &store, &mailer, &config, vec![export_record(1, Some("a.xlsx"))])
            .await
            .unwrap();

        assert_eq!(
            report.outcomes,
            vec!["ID 1, date 2024-01-02 (2nd of Jan) - row 3 found, value updated (2 retries)"]
        );
        assert_eq!(store.write_attempts().len(), 3);
        let saved = store.file("a.xlsx").unwrap();
        assert_eq!(status_cell(&saved, 3), Some(Data::String("20:20".into())));
    }

    #[tokio::test]
    async fn test_exhausted_lock_still_advances() {
        let lists = staff_lists();
        let store = MemoryStore::default()
            .with_file("a.xlsx", book())
            .with_file("b.xlsx", book())
            .with_write_results(vec![Err(lock_error()), Err(lock_error()), Err(lock_error())]);
        let mailer = RecordingMailer::default();
        let config = Config::default();

        let report = run_all(
            &lists,
            &store,
            &mailer,
            &config,
            vec![export_record(1, Some("a.xlsx")), export_record(2, Some("b.xlsx"))],
        )
        .await
        .unwrap();

        assert_eq!(report.processed, 2);
        assert!(report.outcomes[0].starts_with("ID 1 - export error: workbook is locked"));
        assert!(report.outcomes[0].ends_with("(3 attempts)"));
        assert_eq!(
            report.outcomes[1],
            "ID 2, date 2024-01-02 (2nd of Jan) - row 3 found, value updated"
        );
        assert_eq!(store.write_attempts().len(), 4);
        assert_eq!(status_cell(&store.file("a.xlsx").unwrap(), 3), None);
    }

    #[tokio::test]
    async fn test_no_matching_staff_records() {
        let lists = staff_lists();
        let store = MemoryStore::default().with_file("a.xlsx", book());
        let mailer = RecordingMailer::default();
        let config = Config::default();
        let mut export = export_record(1, Some("a.xlsx"));
        export.manager_id = Some(99);

        let report = run_all(&lists, &store, &mailer, &config, vec![export]).await.unwrap();

        assert_eq!(report.outcomes, vec!["ID 1 - no matching StaffRecords"]);
        assert!(store.write_attempts().is_empty());
    }

    #[tokio::test]
    async fn test_records_without_path_produce_no_outcome() {
        let lists = staff_lists();
        let store = MemoryStore::default().with_file("a.xlsx", book());
        let mailer = RecordingMailer::default();
        let config = Config::default();

        let report = run_all(
            &lists,
            &store,
            &mailer,
            &config,
            vec![export_record(1, None), export_record(2, Some("a.xlsx"))],
        )
        .await
        .unwrap();

        assert_eq!(report.processed, 1);
        assert_eq!(report.outcomes.len(), 1);
        assert!(report.outcomes[0].starts_with("ID 2,"));
        assert!(report.summary.starts_with("Processed items: 1\n\nResults:\nID 2,"));
    }

    #[tokio::test]
    async fn test_zero_eligible_records_is_an_error() {
        let lists = staff_lists();
        let store = MemoryStore::default();
        let mailer = RecordingMailer::default();
        let config = Config::default();

        let err = run_all(&lists, &store, &mailer, &config, vec![export_record(1, Some(" "))])
            .await
            .unwrap_err();

        assert_eq!(err, RunError::NoEligibleRecords { total: 1 });
        assert!(lists.calls().is_empty());
    }

    #[tokio::test]
    async fn test_staff_records_loaded_once() {
        let lists = staff_lists();
        let store = MemoryStore::default()
            .with_file("a.xlsx", book())
            .with_file("b.xlsx", book());
        let mailer = RecordingMailer::default();
        let config = Config::default();

        run_all(
            &lists,
            &store,
            &mailer,
            &config,
            vec![export_record(1, Some("a.xlsx")), export_record(2, Some("b.xlsx"))],
        )
        .await
        .unwrap();

        let calls = lists.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "StaffRecords");
        assert!(calls[0].2.contains(&"StaffMember".to_string()));
    }

    #[tokio::test]
    async fn test_staff_load_failure_is_recorded_and_retried_per_record() {
        let lists = MemoryLists::default();
        let store = MemoryStore::default().with_file("a.xlsx", book());
        let mailer = RecordingMailer::default();
        let config = Config::default();

        let report = run_all(
            &lists,
            &store,
            &mailer,
            &config,
            vec![export_record(1, Some("a.xlsx")), export_record(2, Some("a.xlsx"))],
        )
        .await
        .unwrap();

        assert!(report.outcomes[0].starts_with("ID 1 - error loading StaffRecords"));
        assert!(report.outcomes[1].starts_with("ID 2 - error loading StaffRecords"));
        assert_eq!(lists.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_one_notification_per_distinct_address() {
        let lists = staff_lists();
        let store = MemoryStore::default().with_file("a.xlsx", book());
        let mailer = RecordingMailer::default();
        let config = Config::default();

        let report = run_all(
            &lists,
            &store,
            &mailer,
            &config,
            vec![
                with_email(1, "a.xlsx", "lead@example.com"),
                with_email(2, "a.xlsx", " lead@example.com "),
                with_email(3, "a.xlsx", "ops@example.com"),
            ],
        )
        .await
        .unwrap();

        assert_eq!(report.notified, vec!["lead@example.com", "ops@example.com"]);
        let sent = mailer.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].1, "Automatic processing finished");
        assert!(sent[0].2.contains("Processed items: 3<br>"));
    }

    #[tokio::test]
    async fn test_mailer_failure_does_not_fail_the_run() {
        let lists = staff_lists();
        let store = MemoryStore::default().with_file("a.xlsx", book());
        let mailer = RecordingMailer::rejecting();
        let config = Config::default();

        let report = run_all(
            &lists,
            &store,
            &mailer,
            &config,
            vec![with_email(1, "a.xlsx", "lead@example.com")],
        )
        .await
        .unwrap();

        assert!(report.notified.is_empty());
        assert_eq!(report.outcomes.len(), 1);
    }

    #[tokio::test]
    async fn test_notifications_can_be_disabled() {
        let lists = staff_lists();
        let store = MemoryStore::default().with_file("a.xlsx", book());
        let mailer = RecordingMailer::default();
        let mut config = Config::default();
        config.notifications.enabled = false;

        run_all(
            &lists,
            &store,
            &mailer,
            &config,
            vec![with_email(1, "a.xlsx", "lead@example.com")],
        )
        .await
        .unwrap();

        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_progress_callback_sees_each_line() {
        let lists = staff_lists();
        let store = MemoryStore::default().with_file("a.xlsx", book());
        let mailer = RecordingMailer::default();
        let config = Config::default();
        let mut seen = Vec::new();

        ExportOrchestrator::new(&lists, &store, &mailer, &config)
            .with_processing(ProcessingConfig::immediate())
            .run(
                vec![export_record(1, Some("a.xlsx")), export_record(2, Some("missing.xlsx"))],
                |index, total, line| seen.push((index, total, line.to_string())),
            )
            .await
            .unwrap();

        assert_eq!(seen.len(), 2);
        assert_eq!((seen[1].0, seen[1].1), (1, 2));
        assert!(seen[1].2.contains("error: File not found"));
    }

    #[tokio::test]
    async fn test_select_groups_matches() {
        let lists = staff_lists();
        let store = MemoryStore::default();
        let mailer = RecordingMailer::default();
        let config = Config::default();
        let mut orchestrator = ExportOrchestrator::new(&lists, &store, &mailer, &config);

        let selection = orchestrator.select(&export_record(1, Some("a.xlsx"))).await.unwrap();

        assert_eq!(selection.correlation.trace.matched, 2);
        let keys: Vec<&str> = selection.grouped.groups.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, vec!["2024-01-02", "2024-01-04"]);
    }
}
