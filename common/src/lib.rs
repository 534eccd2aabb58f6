use thiserror::Error;
use url::ParseError;

pub mod config;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("API fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("API returned empty payload from {0}")]
    EmptyPayload(String),

    #[error("Storage write failed for {bucket}/{key}: {reason}")]
    StorageWrite {
        bucket: String,
        key: String,
        reason: String,
    },

    #[error("Storage read failed for {bucket}/{key}: {reason}")]
    StorageRead {
        bucket: String,
        key: String,
        reason: String,
    },

    #[error("Malformed storage URI '{uri}': {reason}")]
    MalformedUri { uri: String, reason: String },

    #[error("Record {index} is missing required field '{field}'")]
    MissingField { index: usize, field: &'static str },

    #[error("Record {index} has an invalid '{field}' value, expected {expected}")]
    InvalidField {
        index: usize,
        field: &'static str,
        expected: &'static str,
    },

    #[error("Failed to parse {source_ref}: {reason}")]
    Parse { source_ref: String, reason: String },

    #[error("Staging into {table} failed and was rolled back: {reason}")]
    StageTransaction { table: String, reason: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] rquest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("Missing configuration key: {0}")]
    MissingConfig(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    pub fn storage_write(bucket: &str, key: &str, reason: impl ToString) -> Self {
        Error::StorageWrite {
            bucket: bucket.to_string(),
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn storage_read(bucket: &str, key: &str, reason: impl ToString) -> Self {
        Error::StorageRead {
            bucket: bucket.to_string(),
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn malformed_uri(uri: &str, reason: impl ToString) -> Self {
        Error::MalformedUri {
            uri: uri.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn parse(source_ref: impl ToString, reason: impl ToString) -> Self {
        Error::Parse {
            source_ref: source_ref.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        Error::InvalidInput(format!("URL parse error: {}", err))
    }
}
