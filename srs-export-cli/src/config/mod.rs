//! Application configuration
//!
//! Loaded from `config.toml` (explicit path or the platform config dir),
//! then overridden by environment variables. `.env` files are honoured.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::resilience::ProcessingConfig;

const APP_DIR: &str = "srs-export";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sharepoint: SharePointConfig,
    pub workbook: WorkbookConfig,
    pub processing: ProcessingSection,
    pub notifications: NotificationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SharePointConfig {
    /// Site hosting the `ExportToSRS` and `StaffRecords` lists
    pub data_site_url: String,
    /// Site hosting the SRS workbooks
    pub files_site_url: String,
    /// Document library the workbook paths are relative to
    pub library: String,
    pub export_list: String,
    pub staff_list: String,
    /// `ExportToSRS` column holding the notification address
    pub export_email_column: String,
    /// `$top` for list reads
    pub page_size: u32,
    /// Continuation pages followed before a read is truncated
    pub max_pages: u32,
    pub request_timeout_secs: u64,
    /// Opaque bearer token; obtaining it is the caller's business
    pub access_token: Option<String>,
}

impl Default for SharePointConfig {
    fn default() -> Self {
        Self {
            data_site_url: "https://kpfaie.sharepoint.com/sites/KPFAData".to_string(),
            files_site_url: "https://kpfaie.sharepoint.com/sites/StaffRecordSheets".to_string(),
            library: "Shared Documents".to_string(),
            export_list: "ExportToSRS".to_string(),
            staff_list: "StaffRecords".to_string(),
            export_email_column: "Email".to_string(),
            page_size: 5000,
            max_pages: 20,
            request_timeout_secs: 60,
            access_token: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkbookConfig {
    /// Preferred worksheet name
    pub sheet_name: String,
    /// Fallback: first worksheet whose name starts with this
    pub sheet_prefix: String,
    /// Value stamped next to the located date row
    pub status_value: String,
    /// 1-based column receiving the status value
    pub status_column: u32,
}

impl Default for WorkbookConfig {
    fn default() -> Self {
        Self {
            sheet_name: "2.Employee Data Entry".to_string(),
            sheet_prefix: "2.Employee".to_string(),
            status_value: "20:20".to_string(),
            status_column: 2,
        }
    }
}

/// `[processing]` table, all delays in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingSection {
    pub max_attempts: u32,
    pub lock_backoff_ms: u64,
    pub settle_delay_ms: u64,
    pub advance_delay_ms: u64,
    pub reselect_delay_ms: u64,
}

impl Default for ProcessingSection {
    fn default() -> Self {
        let defaults = ProcessingConfig::default();
        Self {
            max_attempts: defaults.retry.max_attempts,
            lock_backoff_ms: defaults.retry.lock_backoff.as_millis() as u64,
            settle_delay_ms: defaults.pacing.settle_delay.as_millis() as u64,
            advance_delay_ms: defaults.pacing.advance_delay.as_millis() as u64,
            reselect_delay_ms: defaults.pacing.reselect_delay.as_millis() as u64,
        }
    }
}

impl ProcessingSection {
    pub fn to_processing_config(&self) -> ProcessingConfig {
        ProcessingConfig::builder()
            .max_attempts(self.max_attempts)
            .lock_backoff(Duration::from_millis(self.lock_backoff_ms))
            .settle_delay(Duration::from_millis(self.settle_delay_ms))
            .advance_delay(Duration::from_millis(self.advance_delay_ms))
            .reselect_delay(Duration::from_millis(self.reselect_delay_ms))
            .build()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub enabled: bool,
    pub subject: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            subject: "Automatic processing finished".to_string(),
        }
    }
}

impl Config {
    /// Default location: `<config dir>/srs-export/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Load from `path` (or the default location), falling back to defaults
    /// when no file exists, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let _ = dotenvy::dotenv();

        let resolved = path.map(Path::to_path_buf).or_else(Self::default_path);
        let mut config = match resolved {
            Some(ref p) if p.exists() => {
                log::debug!("Loading config from {}", p.display());
                Self::from_file(p)?
            }
            Some(ref p) if path.is_some() => {
                anyhow::bail!("Config file does not exist: {}", p.display());
            }
            _ => {
                log::debug!("No config file found, using defaults");
                Self::default()
            }
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Environment overrides, looked up through `lookup` so tests need not
    /// touch the process environment
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("SRS_DATA_SITE_URL").filter(|v| !v.trim().is_empty()) {
            self.sharepoint.data_site_url = url;
        }
        if let Some(url) = lookup("SRS_FILES_SITE_URL").filter(|v| !v.trim().is_empty()) {
            self.sharepoint.files_site_url = url;
        }
        if let Some(token) = lookup("SRS_ACCESS_TOKEN").filter(|v| !v.trim().is_empty()) {
            self.sharepoint.access_token = Some(token);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.workbook.status_column == 0 {
            anyhow::bail!("workbook.status_column is 1-based and must be at least 1");
        }
        if self.processing.max_attempts == 0 {
            anyhow::bail!("processing.max_attempts must be at least 1");
        }
        if self.sharepoint.export_email_column.trim().is_empty() {
            anyhow::bail!("sharepoint.export_email_column must not be blank");
        }
        if self.sharepoint.max_pages == 0 {
            anyhow::bail!("sharepoint.max_pages must be at least 1");
        }
        Ok(())
    }
}
