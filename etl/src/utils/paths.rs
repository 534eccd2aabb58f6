use chrono::NaiveDate;

const DEFAULT_FILE_NAME: &str = "data.json";

/// Builds the object key for one extraction run:
/// `raw/<source>/ingestion_date=<YYYY-MM-DD>/<file>`.
///
/// The key depends only on the source name and the logical date, so a rerun
/// for the same date addresses the same object.
#[derive(Debug, Clone)]
pub struct PartitionPath {
    source_name: String,
    ingestion_date: NaiveDate,
    file_name: String,
}

impl PartitionPath {
    pub fn new(source_name: &str, ingestion_date: NaiveDate) -> Self {
        Self {
            source_name: source_name.to_string(),
            ingestion_date,
            file_name: DEFAULT_FILE_NAME.to_string(),
        }
    }

    pub fn with_file_name(mut self, file_name: &str) -> Self {
        self.file_name = file_name.to_string();
        self
    }

    pub fn build_storage_path(&self) -> String {
        format!(
            "raw/{}/ingestion_date={}",
            self.source_name,
            self.ingestion_date.format("%Y-%m-%d")
        )
    }

    pub fn build_file_path(&self) -> String {
        format!("{}/{}", self.build_storage_path(), self.file_name)
    }
}
