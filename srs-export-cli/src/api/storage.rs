//! Collaborator seams for list reads, workbook storage and e-mail
//!
//! The engine only talks to SharePoint through these traits so the
//! correlation and workbook logic can run against in-memory doubles.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Reads every row of a SharePoint list, following continuation links
#[async_trait]
pub trait ListSource: Send + Sync {
    async fn list_read(&self, list_name: &str, select: &[&str], expand: &[&str])
    -> Result<Vec<Value>>;
}

/// Workbook storage addressed by a path relative to the document library
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Absolute location of a relative path, used in messages
    fn full_path(&self, relative_path: &str) -> String;

    async fn file_exists(&self, relative_path: &str) -> Result<bool>;

    async fn file_read(&self, relative_path: &str) -> Result<Vec<u8>>;

    async fn file_write(&self, relative_path: &str, content: Vec<u8>) -> Result<(), WriteError>;
}

/// Sends HTML notifications
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_email(&self, recipients: &[String], subject: &str, html_body: &str)
    -> Result<bool>;
}

/// Failure submitting a workbook back to storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteError {
    /// Another editor holds the file open (HTTP 423)
    Locked { message: String },
    /// Any other rejection or transport failure
    Failed { status: Option<u16>, message: String },
}

impl WriteError {
    pub fn is_locked(&self) -> bool {
        matches!(self, WriteError::Locked { .. })
    }

    /// Classify a non-success write response.
    ///
    /// 423 is authoritative. Some gateways rewrite the status, so the body is
    /// also sniffed for the lock markers SharePoint uses in its messages.
    pub fn from_response(status: u16, body: &str) -> Self {
        let message = format!("HTTP {}: {}", status, truncate(body, 300));
        if status == 423 || looks_locked(body) {
            WriteError::Locked { message }
        } else {
            WriteError::Failed {
                status: Some(status),
                message,
            }
        }
    }

    /// Classify a failure that never produced a response
    pub fn from_transport(err: &anyhow::Error) -> Self {
        let message = format!("{:#}", err);
        if looks_locked(&message) {
            WriteError::Locked { message }
        } else {
            WriteError::Failed {
                status: None,
                message,
            }
        }
    }
}

impl std::fmt::Display for WriteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteError::Locked { message } => {
                write!(f, "Workbook is locked by another user ({})", message)
            }
            WriteError::Failed { message, .. } => write!(f, "Failed to save workbook: {}", message),
        }
    }
}

impl std::error::Error for WriteError {}

fn looks_locked(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.contains("423") || lower.contains("locked") || lower.contains("заблокирован")
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_423_is_locked() {
        let err = WriteError::from_response(423, "");
        assert!(err.is_locked());
    }

    #[test]
    fn test_lock_marker_in_body_is_locked() {
        let err = WriteError::from_response(
            409,
            r#"{"error":{"message":"The file is locked for shared use by user@kpfa.ie"}}"#,
        );
        assert!(err.is_locked());

        let err = WriteError::from_response(500, "Файл заблокирован");
        assert!(err.is_locked());
    }

    #[test]
    fn test_other_status_is_failure() {
        let err = WriteError::from_response(403, "Access denied");
        assert_eq!(
            err,
            WriteError::Failed {
                status: Some(403),
                message: "HTTP 403: Access denied".to_string()
            }
        );
        assert!(!err.is_locked());
    }

    #[test]
    fn test_transport_error_classification() {
        let err = anyhow::anyhow!("connection reset by peer");
        assert!(!WriteError::from_transport(&err).is_locked());

        let err = anyhow::anyhow!("resource locked");
        assert!(WriteError::from_transport(&err).is_locked());
    }
}
