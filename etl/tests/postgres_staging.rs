//! Staging against a live Postgres. Skipped unless `TEST_DATABASE_URL` is set.

use catalog_etl::models::StagingRow;
use catalog_etl::{PostgresStager, StagingSink};
use chrono::NaiveDate;
use common::config::DatabaseConfig;
use sqlx::{Connection, PgConnection, Row};

fn database_url() -> Option<String> {
    std::env::var("TEST_DATABASE_URL").ok()
}

fn row(id: i64, title: &str) -> StagingRow {
    let date = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
    StagingRow {
        id,
        title: title.to_string(),
        price: 9.99,
        description: "d".to_string(),
        category: "c".to_string(),
        image: "i".to_string(),
        rating_rate: Some(4.2),
        rating_count: Some(10),
        ingestion_date: date,
        loaded_at: date.and_hms_opt(8, 30, 0).unwrap(),
    }
}

async fn stager(url: &str, table: &str) -> PostgresStager {
    let mut conn = PgConnection::connect(url).await.unwrap();
    sqlx::query(&format!("DROP TABLE IF EXISTS {}", table))
        .execute(&mut conn)
        .await
        .unwrap();
    conn.close().await.unwrap();

    PostgresStager::new(&DatabaseConfig {
        url: url.to_string(),
        table: table.to_string(),
        connect_timeout_secs: 10,
        statement_timeout_secs: Some(30),
    })
    .unwrap()
}

async fn snapshot(url: &str, table: &str) -> Vec<(i64, String, Option<i64>)> {
    let mut conn = PgConnection::connect(url).await.unwrap();
    let rows = sqlx::query(&format!(
        "SELECT id::BIGINT AS id, title, rating_count::BIGINT AS rating_count FROM {} ORDER BY id",
        table
    ))
    .fetch_all(&mut conn)
    .await
    .unwrap();
    conn.close().await.unwrap();

    rows.iter()
        .map(|r| (r.get("id"), r.get("title"), r.get("rating_count")))
        .collect()
}

#[tokio::test]
async fn test_restaging_same_rows_is_idempotent() {
    let Some(url) = database_url() else {
        eprintln!("TEST_DATABASE_URL not set, skipping");
        return;
    };
    let table = "products_staging_it_idempotent";
    let stager = stager(&url, table).await;
    let rows = vec![row(1, "Shirt"), row(2, "Backpack")];

    assert_eq!(stager.stage(&rows).await.unwrap(), 2);
    let once = snapshot(&url, table).await;
    assert_eq!(stager.stage(&rows).await.unwrap(), 2);
    let twice = snapshot(&url, table).await;

    assert_eq!(once, twice);
    assert_eq!(once.len(), 2);
}

#[tokio::test]
async fn test_upsert_overwrites_non_key_columns() {
    let Some(url) = database_url() else {
        eprintln!("TEST_DATABASE_URL not set, skipping");
        return;
    };
    let table = "products_staging_it_overwrite";
    let stager = stager(&url, table).await;

    stager.stage(&[row(1, "A")]).await.unwrap();
    let mut updated = row(1, "B");
    updated.rating_count = None;
    stager.stage(&[updated]).await.unwrap();

    assert_eq!(snapshot(&url, table).await, vec![(1, "B".to_string(), None)]);
}

#[tokio::test]
async fn test_empty_batch_leaves_table_unchanged() {
    let Some(url) = database_url() else {
        eprintln!("TEST_DATABASE_URL not set, skipping");
        return;
    };
    let table = "products_staging_it_empty";
    let stager = stager(&url, table).await;
    stager.stage(&[row(5, "Hat")]).await.unwrap();

    assert_eq!(stager.stage(&[]).await.unwrap(), 0);
    assert_eq!(snapshot(&url, table).await, vec![(5, "Hat".to_string(), Some(10))]);
}

#[tokio::test]
async fn test_failed_write_rolls_back_table_creation() {
    let Some(url) = database_url() else {
        eprintln!("TEST_DATABASE_URL not set, skipping");
        return;
    };
    let table = "products_staging_it_rollback";
    let stager = stager(&url, table).await;

    // Exceeds the INTEGER primary key, so the insert fails after the DDL ran.
    let result = stager.stage(&[row(i64::MAX, "Overflow")]).await;
    assert!(matches!(result, Err(common::Error::StageTransaction { .. })));

    let mut conn = PgConnection::connect(&url).await.unwrap();
    let exists: bool = sqlx::query_scalar("SELECT to_regclass($1) IS NOT NULL")
        .bind(table)
        .fetch_one(&mut conn)
        .await
        .unwrap();
    conn.close().await.unwrap();
    assert!(!exists);
}
