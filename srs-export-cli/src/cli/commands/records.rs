//! `records`: correlation trace and day groups for one export record

use anyhow::Result;
use colored::*;

use crate::cli::Session;
use crate::cli::display::staff_line;
use crate::orchestrator::ExportOrchestrator;
use crate::services::date_label;

pub async fn handle_records_command(session: &Session, export_id: i64) -> Result<()> {
    let export = session.export_record(export_id).await?;
    let client = &session.client;
    let mut orchestrator = ExportOrchestrator::new(client, client, client, &session.config);

    let selection = orchestrator.select(&export).await?;

    println!("{}", format!("Export {}", export.id).bold());
    println!("{}", selection.correlation.trace);
    println!();

    if selection.grouped.is_empty() {
        println!("{}", "No matching StaffRecords".yellow());
        return Ok(());
    }

    for group in &selection.grouped.groups {
        println!(
            "{} {} ({}), {} records",
            "▸".cyan(),
            group.label.bold(),
            date_label::encode_key(&group.key).bright_green(),
            group.count
        );
        for record in selection.grouped.records(group) {
            println!("    {}", staff_line(record));
        }
    }
    Ok(())
}
