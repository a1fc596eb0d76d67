//! `run`: process every export record with a workbook path

use anyhow::Result;
use colored::*;
use dialoguer::Confirm;

use crate::cli::Session;
use crate::cli::display::outcome;
use crate::orchestrator::ExportOrchestrator;

pub async fn handle_run_command(session: &Session, assume_yes: bool) -> Result<()> {
    let records = session.export_records().await?;
    let eligible = records.iter().filter(|r| r.is_eligible()).count();

    if eligible > 0 && !assume_yes {
        let proceed = Confirm::new()
            .with_prompt(format!(
                "Process {} export records and write '{}' into their workbooks?",
                eligible, session.config.workbook.status_value
            ))
            .default(false)
            .interact()?;
        if !proceed {
            println!("{}", "Cancelled".yellow());
            return Ok(());
        }
    }

    let client = &session.client;
    let mut orchestrator = ExportOrchestrator::new(client, client, client, &session.config);
    let report = orchestrator
        .run(records, |index, total, line| {
            println!("[{}/{}] {}", index + 1, total, outcome(line));
        })
        .await?;

    println!();
    println!("{}", session.config.notifications.subject.bold());
    println!("{}", report.summary);
    if !report.notified.is_empty() {
        println!();
        println!("Notified: {}", report.notified.join(", ").dimmed());
    }
    println!("{}", format!("Run id: {}", report.run_id).dimmed());
    Ok(())
}
