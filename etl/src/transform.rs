use chrono::{DateTime, Utc};
use common::{Error, Result};
use serde_json::Value;
use tracing::info;

use crate::models::{RawRecord, StagingRow};

/// Flattens raw catalog records into staging rows stamped with the current UTC time.
pub fn transform(records: &[RawRecord]) -> Result<Vec<StagingRow>> {
    transform_at(records, Utc::now())
}

/// Like [`transform`] with an explicit load instant. Every row of the batch
/// gets the same `ingestion_date` and `loaded_at`.
///
/// Fails on the first record lacking a required field; no rows are returned
/// in that case. A missing or malformed `rating` maps to `None`.
pub fn transform_at(records: &[RawRecord], now: DateTime<Utc>) -> Result<Vec<StagingRow>> {
    let ingestion_date = now.date_naive();
    let loaded_at = now.naive_utc();

    let rows = records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            let rating = record.get("rating").and_then(Value::as_object);

            Ok(StagingRow {
                id: required_i64(record, index, "id")?,
                title: required_str(record, index, "title")?,
                price: required_f64(record, index, "price")?,
                description: required_str(record, index, "description")?,
                category: required_str(record, index, "category")?,
                image: required_str(record, index, "image")?,
                rating_rate: rating.and_then(|r| r.get("rate")).and_then(Value::as_f64),
                rating_count: rating.and_then(|r| r.get("count")).and_then(Value::as_i64),
                ingestion_date,
                loaded_at,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    info!(records = rows.len(), %ingestion_date, "Transformed records");
    Ok(rows)
}

fn required<'a>(record: &'a RawRecord, index: usize, field: &'static str) -> Result<&'a Value> {
    record
        .get(field)
        .ok_or(Error::MissingField { index, field })
}

fn required_str(record: &RawRecord, index: usize, field: &'static str) -> Result<String> {
    required(record, index, field)?
        .as_str()
        .map(str::to_owned)
        .ok_or(Error::InvalidField {
            index,
            field,
            expected: "a string",
        })
}

fn required_i64(record: &RawRecord, index: usize, field: &'static str) -> Result<i64> {
    required(record, index, field)?
        .as_i64()
        .ok_or(Error::InvalidField {
            index,
            field,
            expected: "an integer",
        })
}

fn required_f64(record: &RawRecord, index: usize, field: &'static str) -> Result<f64> {
    required(record, index, field)?
        .as_f64()
        .ok_or(Error::InvalidField {
            index,
            field,
            expected: "a number",
        })
}
