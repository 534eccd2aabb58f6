use async_trait::async_trait;
use bytes::Bytes;
use common::{Error, Result};
use url::Url;

use super::ObjectStorage;

/// Bucket on the Supabase Storage REST API.
///
/// Uploads are `POST /storage/v1/object/{bucket}/{key}` with `x-upsert: true`,
/// downloads are a `GET` on the same path. Both authenticate with the service key.
pub struct SupabaseStorage {
    client: rquest::Client,
    base_url: Url,
    service_key: String,
    bucket: String,
}

impl SupabaseStorage {
    pub fn new(client: rquest::Client, base_url: Url, service_key: &str, bucket: &str) -> Self {
        Self {
            client,
            base_url,
            service_key: service_key.to_string(),
            bucket: bucket.to_string(),
        }
    }

    fn object_url(&self, key: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            self.bucket,
            key
        )
    }
}

#[async_trait]
impl ObjectStorage for SupabaseStorage {
    async fn put_object(&self, key: &str, data: Bytes, content_type: &str) -> Result<()> {
        let response = self
            .client
            .post(self.object_url(key))
            .header("authorization", format!("Bearer {}", self.service_key))
            .header("apikey", self.service_key.as_str())
            .header("content-type", content_type)
            .header("x-upsert", "true")
            .body(data)
            .send()
            .await
            .map_err(|e| Error::storage_write(&self.bucket, key, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::storage_write(
                &self.bucket,
                key,
                format!("HTTP {}: {}", status, body),
            ));
        }

        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Bytes> {
        let response = self
            .client
            .get(self.object_url(key))
            .header("authorization", format!("Bearer {}", self.service_key))
            .header("apikey", self.service_key.as_str())
            .send()
            .await
            .map_err(|e| Error::storage_read(&self.bucket, key, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::storage_read(
                &self.bucket,
                key,
                format!("HTTP {}: {}", status, body),
            ));
        }

        response
            .bytes()
            .await
            .map_err(|e| Error::storage_read(&self.bucket, key, e))
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::spawn_server;
    use axum::Router;
    use axum::extract::{Path, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct FakeStorage {
        objects: Arc<Mutex<HashMap<String, (Bytes, HeaderMap)>>>,
    }

    async fn upload(
        State(state): State<FakeStorage>,
        Path((bucket, key)): Path<(String, String)>,
        headers: HeaderMap,
        body: Bytes,
    ) -> StatusCode {
        if headers.get("apikey").map(|v| v.as_bytes()) != Some(b"service-key".as_slice()) {
            return StatusCode::UNAUTHORIZED;
        }
        state
            .objects
            .lock()
            .unwrap()
            .insert(format!("{}/{}", bucket, key), (body, headers));
        StatusCode::OK
    }

    async fn download(
        State(state): State<FakeStorage>,
        Path((bucket, key)): Path<(String, String)>,
    ) -> std::result::Result<Bytes, StatusCode> {
        state
            .objects
            .lock()
            .unwrap()
            .get(&format!("{}/{}", bucket, key))
            .map(|(body, _)| body.clone())
            .ok_or(StatusCode::NOT_FOUND)
    }

    async fn storage(key: &str) -> (SupabaseStorage, FakeStorage) {
        let state = FakeStorage::default();
        let router = Router::new()
            .route("/storage/v1/object/{bucket}/{*key}", post(upload).get(download))
            .with_state(state.clone());
        let addr = spawn_server(router).await;
        let base_url = Url::parse(&format!("http://{}/", addr)).unwrap();
        (
            SupabaseStorage::new(rquest::Client::new(), base_url, key, "bucket1"),
            state,
        )
    }

    #[tokio::test]
    async fn test_upload_sends_upsert_headers() {
        let (storage, state) = storage("service-key").await;

        storage
            .put_object("raw/x/data.json", Bytes::from_static(b"[{}]"), "application/json")
            .await
            .unwrap();

        let objects = state.objects.lock().unwrap();
        let (body, headers) = &objects["bucket1/raw/x/data.json"];
        assert_eq!(body, &Bytes::from_static(b"[{}]"));
        assert_eq!(headers["x-upsert"], "true");
        assert_eq!(headers["content-type"], "application/json");
        assert_eq!(headers["authorization"], "Bearer service-key");
    }

    #[tokio::test]
    async fn test_download_round_trip() {
        let (storage, _state) = storage("service-key").await;
        storage
            .put_object("raw/x/data.json", Bytes::from_static(b"[1,2]"), "application/json")
            .await
            .unwrap();

        let data = storage.get_object("raw/x/data.json").await.unwrap();
        assert_eq!(data, Bytes::from_static(b"[1,2]"));
    }

    #[tokio::test]
    async fn test_rejected_upload_is_write_error() {
        let (storage, _state) = storage("wrong-key").await;

        let result = storage
            .put_object("raw/x/data.json", Bytes::from_static(b"[]"), "application/json")
            .await;

        match result {
            Err(Error::StorageWrite { reason, .. }) => assert!(reason.contains("401")),
            other => panic!("expected StorageWrite, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_object_is_read_error() {
        let (storage, _state) = storage("service-key").await;

        assert!(matches!(
            storage.get_object("raw/none.json").await,
            Err(Error::StorageRead { .. })
        ));
    }
}
