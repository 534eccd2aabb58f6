use async_trait::async_trait;
use bytes::Bytes;
use common::{Error, Result};
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};
use std::sync::Arc;

use super::ObjectStorage;

/// Bucket view over an [`ObjectStore`]. The bucket is the first path segment,
/// so several buckets can share one in-memory or local store.
///
/// Content types are not recorded; `object_store` backends here have no use for them.
pub struct ObjectStoreStorage {
    bucket: String,
    store: Arc<dyn ObjectStore>,
}

impl ObjectStoreStorage {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            store,
        }
    }

    fn location(&self, key: &str) -> Path {
        Path::from(format!("{}/{}", self.bucket, key))
    }
}

#[async_trait]
impl ObjectStorage for ObjectStoreStorage {
    async fn put_object(&self, key: &str, data: Bytes, _content_type: &str) -> Result<()> {
        self.store
            .put(&self.location(key), PutPayload::from(data))
            .await
            .map_err(|e| Error::storage_write(&self.bucket, key, e))?;
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Bytes> {
        let result = self.store.get(&self.location(key)).await.map_err(|e| match e {
            object_store::Error::NotFound { .. } => {
                Error::storage_read(&self.bucket, key, "object not found")
            }
            other => Error::storage_read(&self.bucket, key, other),
        })?;

        result
            .bytes()
            .await
            .map_err(|e| Error::storage_read(&self.bucket, key, e))
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}
