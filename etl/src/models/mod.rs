mod product;

pub use product::{RawRecord, STAGING_COLUMNS, StagingRow};
