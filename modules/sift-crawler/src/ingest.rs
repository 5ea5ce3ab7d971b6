use std::time::Duration;

use reqwest::multipart::{Form, Part};
use serde_json::json;
use sift_extract::ExtractedRecord;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Extension used when the resource URL path carries none.
const DEFAULT_EXTENSION: &str = "jpg";

pub type Result<T> = std::result::Result<T, SinkError>;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Rejected (status {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl From<reqwest::Error> for SinkError {
    fn from(err: reqwest::Error) -> Self {
        SinkError::Network(err.to_string())
    }
}

/// Client for the ingestion backend: record submission and media rehosting.
pub struct IngestClient {
    client: reqwest::Client,
    base_url: String,
    secret: String,
}

impl IngestClient {
    /// Every request carries `timeout`.
    pub fn new(base_url: &str, secret: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            secret: secret.to_string(),
        })
    }

    /// Submit one record as `{ <schema_name>: <plain tree> }`, JSON-encoded
    /// into the `data` string of the request body. Rejections are not retried.
    pub async fn submit(&self, schema_name: &str, record: &ExtractedRecord) -> Result<()> {
        let data = serde_json::to_string(&json!({ schema_name: record.to_plain_value() }))?;
        let body = json!({ "secret": self.secret, "data": data });

        let resp = self
            .client
            .post(format!("{}/add", self.base_url))
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(SinkError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        debug!(record = schema_name, status = status.as_u16(), "Record accepted");
        Ok(())
    }

    /// Copy the resource at `source` to the backend's image store as
    /// `{id}.{ext}` and return its new location. One retry on failure.
    pub async fn rehost(&self, id: u64, source: &str) -> Result<String> {
        match self.try_rehost(id, source).await {
            Ok(location) => Ok(location),
            Err(first) => {
                debug!(id, source, error = %first, "Rehost attempt failed, retrying");
                self.try_rehost(id, source).await
            }
        }
    }

    async fn try_rehost(&self, id: u64, source: &str) -> Result<String> {
        let resp = self.client.get(source).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(SinkError::Rejected {
                status: status.as_u16(),
                message: format!("fetching {source}"),
            });
        }

        let filename = format!("{id}.{}", extension_of(resp.url()));
        let bytes = resp.bytes().await?;
        let form = Form::new().part("file", Part::bytes(bytes.to_vec()).file_name(filename.clone()));

        let resp = self
            .client
            .post(format!("{}/upload_image", self.base_url))
            .query(&[("secret", self.secret.as_str())])
            .multipart(form)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(SinkError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        Ok(format!("{}/images/{filename}", self.base_url))
    }
}

/// Lowercased extension of the last path segment, or [`DEFAULT_EXTENSION`].
pub fn extension_of(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .and_then(|last| last.rsplit_once('.'))
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}
