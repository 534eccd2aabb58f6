use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde_json::{Map, Value};

/// One catalog entry as returned by the source API. Only the fields read by
/// the transformer are relied upon.
pub type RawRecord = Map<String, Value>;

/// Column order of the staging table. `id` is the primary key and must stay first.
pub const STAGING_COLUMNS: [&str; 10] = [
    "id",
    "title",
    "price",
    "description",
    "category",
    "image",
    "rating_rate",
    "rating_count",
    "ingestion_date",
    "loaded_at",
];

/// Flattened product row written to the staging table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StagingRow {
    pub id: i64,
    pub title: String,
    pub price: f64,
    pub description: String,
    pub category: String,
    pub image: String,
    pub rating_rate: Option<f64>,
    pub rating_count: Option<i64>,
    pub ingestion_date: NaiveDate,
    pub loaded_at: NaiveDateTime,
}
