use std::time::Duration;

use async_trait::async_trait;
use engine_logging::{engine_info, engine_warn};
use linkqueue_core::ExtractedRecord;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::channel::duration_ms;

/// Endpoint of the REST table that receives uploaded rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadSettings {
    /// Base URL of the REST service, e.g. `https://db.example.com`.
    pub base_url: String,
    pub table: String,
    pub api_key: String,
    #[serde(with = "duration_ms")]
    pub request_timeout: Duration,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            table: "connections".to_string(),
            api_key: String::new(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl UploadSettings {
    pub fn is_configured(&self) -> bool {
        !self.base_url.trim().is_empty() && !self.api_key.trim().is_empty()
    }

    fn table_url(&self) -> String {
        format!(
            "{}/rest/v1/{}",
            self.base_url.trim_end_matches('/'),
            self.table
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UploadError {
    #[error("database upload is not configured")]
    NotConfigured,
    #[error("invalid upload settings: {0}")]
    InvalidSettings(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("upload rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Sends stored records to a remote table.
#[async_trait]
pub trait RecordUploader: Send + Sync {
    /// Returns the number of rows sent.
    async fn upload(&self, records: &[ExtractedRecord]) -> Result<usize, UploadError>;
}

#[derive(Debug, Clone)]
pub struct RestUploader {
    client: reqwest::Client,
    settings: UploadSettings,
}

impl RestUploader {
    pub fn new(settings: UploadSettings) -> Result<Self, UploadError> {
        if !settings.is_configured() {
            return Err(UploadError::NotConfigured);
        }
        let mut headers = HeaderMap::new();
        let api_key = HeaderValue::from_str(&settings.api_key)
            .map_err(|e| UploadError::InvalidSettings(e.to_string()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", settings.api_key))
            .map_err(|e| UploadError::InvalidSettings(e.to_string()))?;
        headers.insert("apikey", api_key);
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("Prefer", HeaderValue::from_static("return=minimal"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| UploadError::InvalidSettings(e.to_string()))?;
        Ok(Self { client, settings })
    }
}

#[async_trait]
impl RecordUploader for RestUploader {
    async fn upload(&self, records: &[ExtractedRecord]) -> Result<usize, UploadError> {
        if records.is_empty() {
            return Ok(0);
        }
        let rows: Vec<Value> = records.iter().map(upload_row).collect();
        let url = self.settings.table_url();
        engine_info!("Uploading {} rows to {}", rows.len(), url);

        let response = self
            .client
            .post(&url)
            .json(&rows)
            .send()
            .await
            .map_err(|e| UploadError::Network(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            engine_warn!("Upload rejected: {} {}", status, body);
            return Err(UploadError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(rows.len())
    }
}

/// One table row: flat columns plus the full record as JSON text.
pub fn upload_row(record: &ExtractedRecord) -> Value {
    json!({
        "connection_type": record.kind,
        "source": record.source,
        "name": record.name,
        "profile_url": record.url,
        "mutual_connections": record.extra_info,
        "extracted_at": record.timestamp.to_rfc3339(),
        "raw_data": serde_json::to_string(record).unwrap_or_default(),
    })
}
