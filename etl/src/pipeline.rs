use chrono::NaiveDate;
use common::config::Settings;
use common::{Error, Result};
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use crate::download::Downloader;
use crate::extract::Extractor;
use crate::models::RawRecord;
use crate::stage::{PostgresStager, StagingSink};
use crate::storage::{StorageManager, StorageUri};
use crate::transform::transform;

/// Progress of one run. Runs move strictly forward; any error ends the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Pending,
    Extracted,
    Downloaded,
    Transformed,
    Staged,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Pending => "pending",
            RunState::Extracted => "extracted",
            RunState::Downloaded => "downloaded",
            RunState::Transformed => "transformed",
            RunState::Staged => "staged",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadReport {
    pub source: String,
    pub local_path: PathBuf,
    pub transformed: usize,
    pub staged: u64,
}

/// The transform-and-load half of the pipeline.
pub struct Pipeline {
    downloader: Downloader,
    sink: Arc<dyn StagingSink>,
}

impl Pipeline {
    pub fn new(downloader: Downloader, sink: Arc<dyn StagingSink>) -> Self {
        Self { downloader, sink }
    }

    /// Resolves `raw_file_ref` (local path or storage URI) to a local file,
    /// then transforms and stages its records.
    pub async fn run(&self, raw_file_ref: &str) -> Result<LoadReport> {
        let reference = raw_file_ref.trim();
        info!(reference = %reference, state = %RunState::Pending, "Starting load run");

        let result = self.run_stages(reference).await;
        if let Err(e) = &result {
            error!(reference = %reference, error = %e, "Load run failed");
        }
        result
    }

    async fn run_stages(&self, reference: &str) -> Result<LoadReport> {
        let local_path = self.downloader.resolve(reference).await?;
        if StorageUri::is_uri(reference) {
            info!(path = %local_path.display(), state = %RunState::Downloaded, "Raw file available locally");
        }

        info!(path = %local_path.display(), "Reading raw data");
        let contents = tokio::fs::read(&local_path).await?;
        let records = parse_records(&contents, &local_path.display().to_string())?;

        let rows = transform(&records)?;
        info!(records = rows.len(), state = %RunState::Transformed, "Batch transformed");

        let staged = self.sink.stage(&rows).await?;
        info!(table = %self.sink.table(), records = staged, state = %RunState::Staged, "Batch staged");

        Ok(LoadReport {
            source: reference.to_string(),
            local_path,
            transformed: rows.len(),
            staged,
        })
    }
}

/// Parses a raw file that must hold a JSON array of objects.
pub fn parse_records(contents: &[u8], source_ref: &str) -> Result<Vec<RawRecord>> {
    let value: Value = serde_json::from_slice(contents).map_err(|e| Error::parse(source_ref, e))?;

    let Value::Array(items) = value else {
        return Err(Error::parse(source_ref, "expected a JSON array of records"));
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Object(record) => Ok(record),
            _ => Err(Error::parse(
                source_ref,
                format!("element {} is not a JSON object", index),
            )),
        })
        .collect()
}

/// First orchestrated step: extract the catalog for `logical_date` and return
/// the URI of the stored raw file, to be handed to [`run_load_step`].
///
/// `storage` must be the same manager the load step reads from, so in-process
/// backends such as `memory` keep the object between steps.
pub async fn run_extract_step(
    settings: &Settings,
    storage: &StorageManager,
    logical_date: NaiveDate,
) -> Result<StorageUri> {
    let extractor = Extractor::from_settings(settings, storage.storage_for(&settings.storage.bucket)?)?;

    let uri = extractor.extract(&settings.api.url, logical_date).await?;
    info!(%uri, state = %RunState::Extracted, "Extract step finished");
    Ok(uri)
}

/// Second orchestrated step: load the raw file named by `reference` into staging.
pub async fn run_load_step(
    settings: &Settings,
    storage: &StorageManager,
    reference: &str,
) -> Result<LoadReport> {
    let stager = PostgresStager::new(&settings.database)?;
    load_into(settings, storage, Arc::new(stager), reference).await
}

/// Both steps back to back over one storage manager and one sink.
pub async fn run_pipeline(
    settings: &Settings,
    storage: &StorageManager,
    sink: Arc<dyn StagingSink>,
    logical_date: NaiveDate,
) -> Result<(StorageUri, LoadReport)> {
    let uri = run_extract_step(settings, storage, logical_date).await?;
    let report = load_into(settings, storage, sink, &uri.to_string()).await?;
    Ok((uri, report))
}

async fn load_into(
    settings: &Settings,
    storage: &StorageManager,
    sink: Arc<dyn StagingSink>,
    reference: &str,
) -> Result<LoadReport> {
    let downloader = Downloader::from_settings(settings, storage.clone());
    Pipeline::new(downloader, sink).run(reference).await
}
