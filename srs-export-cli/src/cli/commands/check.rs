//! `check`: one workbook round trip for one export record

use anyhow::Result;
use chrono::NaiveDate;
use colored::*;
use log::warn;

use crate::cli::Session;
use crate::orchestrator::ExportOrchestrator;
use crate::services::timestamps::parse_day;

pub async fn handle_check_command(
    session: &Session,
    export_id: i64,
    date: Option<NaiveDate>,
) -> Result<()> {
    let export = session.export_record(export_id).await?;
    let client = &session.client;
    let mut orchestrator = ExportOrchestrator::new(client, client, client, &session.config);

    // explicit date, then the first matched day, then Date1 inside the check
    let day = match date {
        Some(day) => Some(day),
        None => match orchestrator.select(&export).await {
            Ok(selection) => selection.grouped.first_key().and_then(parse_day),
            Err(e) => {
                warn!("Cannot correlate staff records, using Date1: {:#}", e);
                None
            }
        },
    };

    let report = orchestrator.check_with_retry(&export, day).await;
    let outcome = &report.value;

    let title = match (outcome.success, outcome.is_row_found()) {
        (true, true) => outcome.title().bright_green().bold(),
        (true, false) => outcome.title().yellow().bold(),
        (false, _) => outcome.title().red().bold(),
    };
    println!("{}", title);
    println!("{}", outcome.message);

    if report.exhausted {
        println!(
            "{}",
            format!(
                "Workbook still locked after {} attempts, manual intervention needed",
                report.attempts
            )
            .red()
        );
    } else if report.retries() > 0 {
        println!("{}", format!("({} retries)", report.retries()).dimmed());
    }
    Ok(())
}
