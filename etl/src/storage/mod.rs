pub mod s3;
pub mod store;
pub mod supabase;
mod uri;

pub use uri::StorageUri;

use async_trait::async_trait;
use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::config::timeout::TimeoutConfig;
use aws_sdk_s3::config::{
    BehaviorVersion, Credentials, Region, RequestChecksumCalculation, ResponseChecksumValidation,
};
use bytes::Bytes;
use common::config::{StorageBackend, StorageConfig};
use common::{Error, Result};
use object_store::ObjectStore;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use s3::S3Storage;
use store::ObjectStoreStorage;
use supabase::SupabaseStorage;

/// Bucket-scoped blob storage. Writes replace any existing object at the key.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn put_object(&self, key: &str, data: Bytes, content_type: &str) -> Result<()>;
    async fn get_object(&self, key: &str) -> Result<Bytes>;
    fn bucket(&self) -> &str;
}

#[derive(Clone)]
enum Backend {
    Supabase {
        client: rquest::Client,
        base_url: Url,
        service_key: String,
    },
    S3(Arc<S3Client>),
    Store(Arc<dyn ObjectStore>),
}

/// Hands out [`ObjectStorage`] handles for buckets on the configured backend.
#[derive(Clone)]
pub struct StorageManager {
    backend: Backend,
}

impl StorageManager {
    pub fn new(config: &StorageConfig) -> Result<Self> {
        let timeout = config.timeout_secs.map(Duration::from_secs);

        let backend = match config.backend {
            StorageBackend::Supabase => {
                let mut builder = rquest::Client::builder();
                if let Some(timeout) = timeout {
                    builder = builder.timeout(timeout);
                }
                Backend::Supabase {
                    client: builder.build()?,
                    base_url: Url::parse(&config.url)?,
                    service_key: config.key.clone(),
                }
            }
            StorageBackend::S3 => Backend::S3(Arc::new(build_s3_client(config, timeout))),
            StorageBackend::Local => {
                if config.url.is_empty() {
                    return Err(Error::InvalidInput(
                        "storage.url must name a root directory for the local backend".to_string(),
                    ));
                }
                std::fs::create_dir_all(&config.url)?;
                let store = LocalFileSystem::new_with_prefix(&config.url).map_err(|e| {
                    Error::InvalidInput(format!("Invalid local storage root '{}': {}", config.url, e))
                })?;
                Backend::Store(Arc::new(store))
            }
            StorageBackend::Memory => Backend::Store(Arc::new(InMemory::new())),
        };

        Ok(Self { backend })
    }

    /// Wraps an existing object store; buckets become top-level prefixes.
    pub fn from_object_store(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            backend: Backend::Store(store),
        }
    }

    pub fn storage_for(&self, bucket: &str) -> Result<Arc<dyn ObjectStorage>> {
        if bucket.is_empty() || bucket.contains('/') {
            return Err(Error::InvalidInput(format!("Invalid bucket name '{}'", bucket)));
        }

        let storage: Arc<dyn ObjectStorage> = match &self.backend {
            Backend::Supabase {
                client,
                base_url,
                service_key,
            } => Arc::new(SupabaseStorage::new(
                client.clone(),
                base_url.clone(),
                service_key,
                bucket,
            )),
            Backend::S3(client) => Arc::new(S3Storage::new(client.clone(), bucket)),
            Backend::Store(store) => Arc::new(ObjectStoreStorage::new(store.clone(), bucket)),
        };

        Ok(storage)
    }
}

fn build_s3_client(config: &StorageConfig, timeout: Option<Duration>) -> S3Client {
    let credentials = Credentials::new(&config.access_key, &config.key, None, None, "static");

    let mut builder = aws_sdk_s3::Config::builder()
        .behavior_version(BehaviorVersion::latest())
        .endpoint_url(&config.url)
        .region(Region::new(config.region.clone()))
        .credentials_provider(credentials)
        .force_path_style(true)
        // Plain bodies: many S3-compatible gateways reject aws-chunked uploads.
        .request_checksum_calculation(RequestChecksumCalculation::WhenRequired)
        .response_checksum_validation(ResponseChecksumValidation::WhenRequired);

    if let Some(timeout) = timeout {
        builder = builder.timeout_config(TimeoutConfig::builder().operation_timeout(timeout).build());
    }

    S3Client::from_conf(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(backend: StorageBackend, url: &str) -> StorageConfig {
        StorageConfig {
            backend,
            url: url.to_string(),
            key: "secret".to_string(),
            bucket: "raw".to_string(),
            region: "us-east-1".to_string(),
            access_key: "access".to_string(),
            uri_scheme: "supabase".to_string(),
            source_name: "products".to_string(),
            local_dir: "data/raw".to_string(),
            timeout_secs: Some(10),
        }
    }

    #[tokio::test]
    async fn test_buckets_share_one_store() {
        let manager = StorageManager::new(&config(StorageBackend::Memory, "")).unwrap();
        let raw = manager.storage_for("raw").unwrap();
        raw.put_object("a.json", Bytes::from_static(b"[1]"), "application/json")
            .await
            .unwrap();

        let again = manager.storage_for("raw").unwrap();
        assert_eq!(again.get_object("a.json").await.unwrap(), Bytes::from_static(b"[1]"));

        let other = manager.storage_for("other").unwrap();
        assert!(other.get_object("a.json").await.is_err());
    }

    #[tokio::test]
    async fn test_local_backend_writes_under_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("store");
        let manager =
            StorageManager::new(&config(StorageBackend::Local, root.to_str().unwrap())).unwrap();

        manager
            .storage_for("raw")
            .unwrap()
            .put_object("raw/products/data.json", Bytes::from_static(b"[]"), "application/json")
            .await
            .unwrap();

        assert!(root.join("raw/raw/products/data.json").exists());
    }

    #[test]
    fn test_supabase_requires_valid_url() {
        let result = StorageManager::new(&config(StorageBackend::Supabase, "not a url"));
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_rejects_bad_bucket_names() {
        let manager = StorageManager::from_object_store(Arc::new(InMemory::new()));
        assert!(manager.storage_for("").is_err());
        assert!(manager.storage_for("a/b").is_err());
    }
}
