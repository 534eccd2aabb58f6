use async_trait::async_trait;
use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use common::{Error, Result};
use std::sync::Arc;

use super::ObjectStorage;

/// S3-compatible bucket (MinIO, Supabase's S3 gateway, AWS).
pub struct S3Storage {
    bucket: String,
    client: Arc<S3Client>,
}

impl S3Storage {
    pub fn new(client: Arc<S3Client>, bucket: &str) -> Self {
        Self {
            client,
            bucket: bucket.to_string(),
        }
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn put_object(&self, key: &str, data: Bytes, content_type: &str) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| match e {
                SdkError::ServiceError(err) => {
                    Error::storage_write(&self.bucket, key, err.into_err())
                }
                _ => Error::storage_write(&self.bucket, key, e),
            })?;

        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Bytes> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| match e {
                SdkError::ServiceError(err) if err.err().is_no_such_key() => {
                    Error::storage_read(&self.bucket, key, "object not found")
                }
                SdkError::ServiceError(err) => Error::storage_read(&self.bucket, key, err.into_err()),
                _ => Error::storage_read(&self.bucket, key, e),
            })?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| Error::storage_read(&self.bucket, key, e))?
            .into_bytes();

        Ok(data)
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}
