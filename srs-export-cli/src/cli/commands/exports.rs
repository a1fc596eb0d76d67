//! `exports`: list the ExportToSRS records and whether a run would take them

use anyhow::Result;
use colored::*;

use crate::cli::Session;
use crate::cli::display::short_day;

pub async fn handle_exports_command(session: &Session) -> Result<()> {
    let records = session.export_records().await?;
    if records.is_empty() {
        println!("{}", "No export records found".yellow());
        return Ok(());
    }

    let eligible = records.iter().filter(|r| r.is_eligible()).count();
    println!(
        "{} export records, {} with a workbook path",
        records.len().to_string().bold(),
        eligible.to_string().bright_green()
    );
    println!();

    for record in &records {
        let range = format!(
            "{} .. {}",
            short_day(record.date1.as_deref()),
            short_day(record.date2.as_deref())
        );
        let path = match record.workbook_path() {
            Some(path) => path.cyan(),
            None => "no path, skipped".dimmed(),
        };
        println!(
            "{:>6}  staff {:<6} {}  {}",
            record.id.to_string().bold(),
            crate::api::lists::format_key(record.staff_member_id),
            range,
            path
        );
        if let Some(email) = record.notification_address() {
            println!("{:>6}  notify {}", "", email.dimmed());
        }
    }
    Ok(())
}
