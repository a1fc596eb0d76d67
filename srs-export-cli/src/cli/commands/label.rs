//! `label`: show the workbook lookup text for a date

use anyhow::{Result, bail};
use colored::*;

use crate::services::date_label::{encode_key, is_valid_label};
use crate::services::grouping::long_day_label;

pub fn handle_label_command(date: &str) -> Result<()> {
    let label = encode_key(date);
    if !is_valid_label(&label) {
        bail!("'{}' is not a date (expected YYYY-MM-DD)", date);
    }
    println!("{}", label.bright_green().bold());
    println!("{}", long_day_label(date).dimmed());
    Ok(())
}
