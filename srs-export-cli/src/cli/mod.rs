//! Command-line surface
//!
//! Argument definitions live in `main.rs`; this module holds the shared
//! session and the command handlers.

pub mod commands;
pub mod display;

use anyhow::{Context, Result};
use std::path::Path;

use crate::api::lists::load_export_records;
use crate::api::models::ExportRecord;
use crate::api::SharePointClient;
use crate::config::Config;

/// Loaded configuration plus a client built from it
pub struct Session {
    pub config: Config,
    pub client: SharePointClient,
}

impl Session {
    pub fn open(config_path: Option<&Path>) -> Result<Self> {
        let config = Config::load(config_path).context("Failed to load configuration")?;
        let client = SharePointClient::new(config.sharepoint.clone())?;
        Ok(Self { config, client })
    }

    pub async fn export_records(&self) -> Result<Vec<ExportRecord>> {
        load_export_records(&self.client, &self.config.sharepoint)
            .await
            .with_context(|| format!("Failed to read the {} list", self.config.sharepoint.export_list))
    }

    pub async fn export_record(&self, id: i64) -> Result<ExportRecord> {
        self.export_records()
            .await?
            .into_iter()
            .find(|r| r.id == id)
            .ok_or_else(|| anyhow::anyhow!("Export record {} not found", id))
    }
}
