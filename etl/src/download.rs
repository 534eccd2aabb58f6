use common::config::Settings;
use common::{Error, Result};
use std::path::PathBuf;
use tokio::fs;
use tracing::info;

use crate::storage::{StorageManager, StorageUri};

/// Materializes stored raw files on local disk, mirroring the object key
/// below `local_dir`.
#[derive(Clone)]
pub struct Downloader {
    storage: StorageManager,
    uri_scheme: String,
    local_dir: PathBuf,
}

impl Downloader {
    pub fn new(storage: StorageManager, uri_scheme: &str, local_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage,
            uri_scheme: uri_scheme.to_string(),
            local_dir: local_dir.into(),
        }
    }

    pub fn from_settings(settings: &Settings, storage: StorageManager) -> Self {
        Self::new(
            storage,
            &settings.storage.uri_scheme,
            &settings.storage.local_dir,
        )
    }

    /// Returns a local path for `reference`. Local paths are passed through;
    /// storage URIs are downloaded first. A partially written file may remain
    /// if this fails midway.
    pub async fn resolve(&self, reference: &str) -> Result<PathBuf> {
        if !StorageUri::is_uri(reference) {
            return Ok(PathBuf::from(reference));
        }

        let uri = StorageUri::parse(reference)?;
        if uri.scheme() != self.uri_scheme {
            return Err(Error::malformed_uri(
                reference,
                format!("expected scheme '{}'", self.uri_scheme),
            ));
        }

        self.download(&uri).await
    }

    pub async fn download(&self, uri: &StorageUri) -> Result<PathBuf> {
        info!(%uri, bucket = %uri.bucket(), key = %uri.key(), "Downloading raw file");

        let data = self
            .storage
            .storage_for(uri.bucket())?
            .get_object(uri.key())
            .await?;

        let local_path = self.local_dir.join(uri.key());
        if let Some(parent) = local_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&local_path, &data).await?;

        info!(path = %local_path.display(), bytes = data.len(), "File downloaded");
        Ok(local_path)
    }
}
