//! SharePoint REST client
//!
//! Implements the list, document and mail seams over the SharePoint REST API.
//! Authentication is out of scope: an already-issued bearer token can be
//! attached, otherwise requests go out anonymously.

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{RequestBuilder, StatusCode, Url};
use serde_json::{Value, json};
use std::future::Future;
use std::time::Duration;

use super::storage::{DocumentStore, ListSource, Mailer, WriteError};
use crate::config::SharePointConfig;

const JSON_NOMETADATA: &str = "application/json;odata=nometadata";
const JSON_VERBOSE: &str = "application/json;odata=verbose";

/// Client for the data site (lists, mail) and the files site (workbooks)
#[derive(Debug, Clone)]
pub struct SharePointClient {
    http: reqwest::Client,
    config: SharePointConfig,
    /// Server-relative library root, e.g. `/sites/StaffRecordSheets/Shared Documents`
    library_root: String,
}

impl SharePointClient {
    pub fn new(config: SharePointConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        let site = Url::parse(&config.files_site_url)
            .with_context(|| format!("Invalid files site URL: {}", config.files_site_url))?;
        let library_root = format!(
            "{}/{}",
            site.path().trim_end_matches('/'),
            config.library.trim_matches('/')
        );

        Ok(Self {
            http,
            config,
            library_root,
        })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// First page URL for a list read
    fn items_url(&self, list_name: &str, select: &[&str], expand: &[&str]) -> String {
        let mut params = Vec::new();
        if !select.is_empty() {
            params.push(format!("$select={}", select.join(",")));
        }
        if !expand.is_empty() {
            params.push(format!("$expand={}", expand.join(",")));
        }
        params.push(format!("$top={}", self.config.page_size));

        format!(
            "{}/_api/web/lists/getbytitle('{}')/items?{}",
            self.config.data_site_url.trim_end_matches('/'),
            odata_literal(list_name),
            params.join("&")
        )
    }

    /// Server-relative URL of a workbook path
    pub fn server_relative_path(&self, relative_path: &str) -> String {
        format!("{}/{}", self.library_root, clean_relative(relative_path))
    }

    fn file_api_url(&self, relative_path: &str, suffix: &str) -> String {
        format!(
            "{}/_api/web/GetFileByServerRelativeUrl('{}'){}",
            self.config.files_site_url.trim_end_matches('/'),
            encode_path(&odata_literal(&self.server_relative_path(relative_path))),
            suffix
        )
    }

    async fn get_json(&self, url: &str) -> Result<Value> {
        debug!("GET {}", url);
        let response = self
            .authorize(self.http.get(url).header(ACCEPT, JSON_NOMETADATA))
            .send()
            .await
            .with_context(|| format!("Request failed: {}", url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("HTTP {} from {}: {}", status.as_u16(), url, body);
        }

        response
            .json()
            .await
            .with_context(|| format!("Invalid JSON from {}", url))
    }
}

#[async_trait]
impl ListSource for SharePointClient {
    async fn list_read(
        &self,
        list_name: &str,
        select: &[&str],
        expand: &[&str],
    ) -> Result<Vec<Value>> {
        let first = self.items_url(list_name, select, expand);
        info!("Reading list '{}'", list_name);

        let rows = collect_pages(first, self.config.max_pages, |url| async move {
            self.get_json(&url).await
        })
        .await
        .with_context(|| format!("Failed to read list '{}'", list_name))?;

        info!("Read {} rows from '{}'", rows.len(), list_name);
        Ok(rows)
    }
}

#[async_trait]
impl DocumentStore for SharePointClient {
    fn full_path(&self, relative_path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.config.files_site_url.trim_end_matches('/'),
            self.config.library.trim_matches('/'),
            clean_relative(relative_path)
        )
    }

    async fn file_exists(&self, relative_path: &str) -> Result<bool> {
        let url = self.file_api_url(relative_path, "/Properties");
        debug!("Checking workbook {}", url);

        let response = self
            .authorize(self.http.get(&url).header(ACCEPT, JSON_NOMETADATA))
            .send()
            .await
            .with_context(|| format!("Failed to check file: {}", relative_path))?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => {
                let body = response.text().await.unwrap_or_default();
                anyhow::bail!(
                    "Error checking file: {} {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or(body.as_str())
                )
            }
        }
    }

    async fn file_read(&self, relative_path: &str) -> Result<Vec<u8>> {
        let url = self.file_api_url(relative_path, "/$value");
        let response = self
            .authorize(self.http.get(&url))
            .send()
            .await
            .with_context(|| format!("Failed to download workbook: {}", relative_path))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!(
                "Failed to download workbook {}: HTTP {}",
                relative_path,
                status.as_u16()
            );
        }

        let bytes = response
            .bytes()
            .await
            .with_context(|| format!("Failed to read workbook body: {}", relative_path))?;
        debug!("Downloaded {} bytes from {}", bytes.len(), relative_path);
        Ok(bytes.to_vec())
    }

    async fn file_write(&self, relative_path: &str, content: Vec<u8>) -> Result<(), WriteError> {
        let url = self.file_api_url(relative_path, "/$value");
        debug!("Uploading {} bytes to {}", content.len(), relative_path);

        let response = self
            .authorize(
                self.http
                    .post(&url)
                    .header("X-HTTP-Method", "PUT")
                    .header(ACCEPT, JSON_NOMETADATA)
                    .body(content),
            )
            .send()
            .await
            .map_err(|e| WriteError::from_transport(&anyhow::Error::new(e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let err = WriteError::from_response(status.as_u16(), &body);
        if err.is_locked() {
            warn!("{} is locked (HTTP {})", relative_path, status.as_u16());
        } else {
            warn!("Upload of {} rejected with HTTP {}", relative_path, status.as_u16());
        }
        Err(err)
    }
}

#[async_trait]
impl Mailer for SharePointClient {
    async fn send_email(
        &self,
        recipients: &[String],
        subject: &str,
        html_body: &str,
    ) -> Result<bool> {
        let url = format!(
            "{}/_api/SP.Utilities.Utility.SendEmail",
            self.config.data_site_url.trim_end_matches('/')
        );
        let payload = json!({
            "properties": {
                "__metadata": { "type": "SP.Utilities.EmailProperties" },
                "To": { "results": recipients },
                "Subject": subject,
                "Body": html_body,
            }
        });

        let response = self
            .authorize(
                self.http
                    .post(&url)
                    .header(ACCEPT, JSON_VERBOSE)
                    .header(CONTENT_TYPE, JSON_VERBOSE)
                    .body(payload.to_string()),
            )
            .send()
            .await
            .context("Failed to send e-mail request")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("SendEmail returned HTTP {}: {}", status.as_u16(), body);
            return Ok(false);
        }
        Ok(true)
    }
}

/// Follow OData continuation links from `first_url`, stopping after
/// `max_pages` pages. Running into the bound truncates silently (logged).
pub async fn collect_pages<F, Fut>(
    first_url: String,
    max_pages: u32,
    mut fetch: F,
) -> Result<Vec<Value>>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<Value>>,
{
    let mut rows = Vec::new();
    let mut next = Some(first_url);
    let mut page = 0;

    while let Some(url) = next.take() {
        if page >= max_pages {
            warn!("Stopped after {} pages, remaining rows were not read", max_pages);
            break;
        }
        page += 1;

        let body = fetch(url).await?;
        let items = page_items(&body);
        debug!("Page {}: {} rows", page, items.len());
        rows.extend(items);
        next = next_link(&body);
    }

    Ok(rows)
}

/// Rows of one page (`value`, or `d.results` for verbose responses)
fn page_items(body: &Value) -> Vec<Value> {
    body.get("value")
        .or_else(|| body.get("d").and_then(|d| d.get("results")))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

fn next_link(body: &Value) -> Option<String> {
    ["@odata.nextLink", "odata.nextLink"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .or_else(|| {
            body.get("d")
                .and_then(|d| d.get("__next"))
                .and_then(Value::as_str)
        })
        .map(str::to_string)
}

fn clean_relative(path: &str) -> &str {
    path.trim().trim_start_matches('/')
}

/// Quote escaping inside an OData string literal
fn odata_literal(value: &str) -> String {
    value.replace('\'', "''")
}

/// Percent-encode each path segment, keeping the separators
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
