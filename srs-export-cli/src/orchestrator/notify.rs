//! End-of-run e-mail notification

use log::{error, info, warn};
use quick_xml::escape::escape;

use crate::api::storage::Mailer;

const FOOTER: &str = "This is an automatic notification. Please do not reply to this message.";

/// HTML body for the run summary; newlines become `<br>`
pub fn email_body(title: &str, summary: &str) -> String {
    let results = escape(summary).replace('\n', "<br>");
    format!(
        r#"<html>
  <head>
    <style>
      body {{ font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif; margin: 0; padding: 20px; color: #333; }}
      .container {{ max-width: 600px; margin: 0 auto; border: 1px solid #ddd; border-radius: 4px; padding: 20px; }}
      h2 {{ color: #0078d4; border-bottom: 1px solid #eee; padding-bottom: 10px; }}
      .results {{ background-color: #f9f9f9; padding: 15px; border-radius: 4px; font-family: monospace; }}
      .footer {{ margin-top: 20px; font-size: 12px; color: #666; border-top: 1px solid #eee; padding-top: 10px; }}
    </style>
  </head>
  <body>
    <div class="container">
      <h2>{}</h2>
      <div class="results">{}</div>
      <div class="footer">{}</div>
    </div>
  </body>
</html>"#,
        escape(title),
        results,
        FOOTER
    )
}

/// Send one message per address. Failures are logged and never propagate.
/// Returns the addresses the mailer accepted.
pub async fn notify_all(
    mailer: &dyn Mailer,
    addresses: &[String],
    subject: &str,
    summary: &str,
) -> Vec<String> {
    if addresses.is_empty() {
        info!("No e-mail addresses to notify");
        return Vec::new();
    }

    let body = email_body(subject, summary);
    let mut delivered = Vec::new();
    for address in addresses {
        match mailer
            .send_email(std::slice::from_ref(address), subject, &body)
            .await
        {
            Ok(true) => {
                info!("Notification sent to {}", address);
                delivered.push(address.clone());
            }
            Ok(false) => warn!("Notification to {} was not accepted", address),
            Err(e) => error!("Failed to send notification to {}: {:#}", address, e),
        }
    }
    delivered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingMailer;

    #[test]
    fn test_body_converts_newlines_and_escapes() {
        let body = email_body("Done", "Processed items: 1\n\nResults:\nID 1 <ok>");

        assert!(body.contains("<h2>Done</h2>"));
        assert!(body.contains("Processed items: 1<br><br>Results:<br>ID 1 &lt;ok&gt;"));
        assert!(body.contains(FOOTER));
    }

    #[tokio::test]
    async fn test_one_message_per_address() {
        let mailer = RecordingMailer::default();
        let addresses = vec!["a@example.com".to_string(), "b@example.com".to_string()];

        let delivered = notify_all(&mailer, &addresses, "Subject", "summary").await;

        assert_eq!(delivered, addresses);
        let sent = mailer.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].0, vec!["a@example.com"]);
        assert_eq!(sent[1].1, "Subject");
    }

    #[tokio::test]
    async fn test_failures_are_swallowed() {
        let mailer = RecordingMailer::rejecting();
        let addresses = vec!["a@example.com".to_string()];

        let delivered = notify_all(&mailer, &addresses, "Subject", "summary").await;

        assert!(delivered.is_empty());
        assert_eq!(mailer.sent().len(), 1);
    }
}
