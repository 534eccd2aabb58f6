pub mod download;
pub mod extract;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod stage;
pub mod storage;
pub mod transform;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_support;

pub use download::Downloader;
pub use extract::Extractor;
pub use pipeline::{LoadReport, Pipeline, RunState, run_extract_step, run_load_step, run_pipeline};
pub use stage::{PostgresStager, StagingSink};
pub use storage::{StorageManager, StorageUri};
pub use transform::{transform, transform_at};
