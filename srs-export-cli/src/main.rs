use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use is_terminal::IsTerminal;
use std::path::PathBuf;

mod api;
mod cli;
mod config;
mod orchestrator;
mod services;
mod workbook;

#[cfg(test)]
mod testing;

use cli::Session;
use cli::commands::{
    handle_check_command, handle_exports_command, handle_label_command, handle_records_command,
    handle_run_command,
};

/// Reconcile SharePoint staff schedules with SRS workbooks
#[derive(Parser, Debug)]
#[command(name = "srs-export", version, about, long_about = None)]
struct Cli {
    /// Config file (defaults to <config dir>/srs-export/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable coloured output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List ExportToSRS records and their workbook paths
    Exports,

    /// Show matching StaffRecords of an export record, grouped by day
    Records {
        /// ExportToSRS item id
        id: i64,
    },

    /// Stamp the workbook row of one export record
    Check {
        /// ExportToSRS item id
        id: i64,

        /// Day to look up (YYYY-MM-DD); defaults to the first matched day, then Date1
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },

    /// Process every export record with a workbook path
    Run {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Print the workbook lookup text for a date
    Label {
        /// YYYY-MM-DD
        date: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    if cli.no_color || !std::io::stdout().is_terminal() {
        colored::control::set_override(false);
    }

    if let Commands::Label { date } = &cli.command {
        return handle_label_command(date);
    }

    let session = Session::open(cli.config.as_deref())?;
    match cli.command {
        Commands::Exports => handle_exports_command(&session).await,
        Commands::Records { id } => handle_records_command(&session, id).await,
        Commands::Check { id, date } => handle_check_command(&session, id, date).await,
        Commands::Run { yes } => handle_run_command(&session, yes).await,
        Commands::Label { .. } => Ok(()),
    }
}
