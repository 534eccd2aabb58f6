use bytes::Bytes;
use chrono::NaiveDate;
use common::config::Settings;
use common::{Error, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::storage::{ObjectStorage, StorageUri};
use crate::utils::paths::PartitionPath;

const JSON_CONTENT_TYPE: &str = "application/json";

/// Builds the HTTP client used for the catalog fetch. The timeout bounds the whole request.
pub fn build_http_client(timeout: Duration) -> Result<rquest::Client> {
    Ok(rquest::Client::builder().timeout(timeout).build()?)
}

/// Fetches the catalog and lands the raw payload in object storage.
pub struct Extractor {
    client: rquest::Client,
    storage: Arc<dyn ObjectStorage>,
    uri_scheme: String,
    source_name: String,
    headers: HashMap<String, String>,
}

impl Extractor {
    pub fn new(
        client: rquest::Client,
        storage: Arc<dyn ObjectStorage>,
        uri_scheme: &str,
        source_name: &str,
    ) -> Result<Self> {
        if source_name.is_empty() || source_name.contains('/') {
            return Err(Error::InvalidInput(format!(
                "Source name '{}' must be a single non-empty path segment",
                source_name
            )));
        }

        Ok(Self {
            client,
            storage,
            uri_scheme: uri_scheme.to_string(),
            source_name: source_name.to_string(),
            headers: HashMap::new(),
        })
    }

    pub fn from_settings(settings: &Settings, storage: Arc<dyn ObjectStorage>) -> Result<Self> {
        let client = build_http_client(settings.api_timeout())?;
        Ok(Self::new(
            client,
            storage,
            &settings.storage.uri_scheme,
            &settings.storage.source_name,
        )?
        .with_headers(settings.api.headers.clone()))
    }

    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    /// Fetches `api_url` and writes the payload under the partition for
    /// `logical_date`, replacing any earlier object for that date.
    pub async fn extract(&self, api_url: &str, logical_date: NaiveDate) -> Result<StorageUri> {
        info!(url = %api_url, %logical_date, "Starting API extraction");

        let payload = self.fetch(api_url).await?;
        info!(records = record_count(&payload), "Extracted records");

        let key = PartitionPath::new(&self.source_name, logical_date).build_file_path();
        let body = Bytes::from(serde_json::to_vec(&payload)?);

        if let Err(e) = self.storage.put_object(&key, body, JSON_CONTENT_TYPE).await {
            error!(bucket = %self.storage.bucket(), %key, error = %e, "Raw upload failed");
            return Err(match e {
                Error::StorageWrite { .. } => e,
                other => Error::storage_write(self.storage.bucket(), &key, other),
            });
        }

        let uri = StorageUri::new(&self.uri_scheme, self.storage.bucket(), &key);
        info!(%uri, "Raw data uploaded");
        Ok(uri)
    }

    async fn fetch(&self, api_url: &str) -> Result<Value> {
        let fetch_error = |reason: String| Error::Fetch {
            url: api_url.to_string(),
            reason,
        };

        let mut request = self.client.get(api_url);
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(|e| {
            error!(url = %api_url, error = %e, "API request failed");
            fetch_error(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            error!(url = %api_url, %status, "API returned an error status");
            return Err(fetch_error(format!("HTTP {}", status)));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| fetch_error(format!("failed to read response body: {}", e)))?;

        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(Error::EmptyPayload(api_url.to_string()));
        }

        let payload: Value =
            serde_json::from_slice(&body).map_err(|e| Error::parse(api_url, e))?;

        if is_falsy(&payload) {
            return Err(Error::EmptyPayload(api_url.to_string()));
        }

        Ok(payload)
    }
}

/// `null`, `false`, zero, and empty strings, arrays or objects carry no data.
fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
    }
}

fn record_count(payload: &Value) -> usize {
    payload.as_array().map_or(1, Vec::len)
}
