use async_trait::async_trait;
use common::config::DatabaseConfig;
use common::{Error, Result};
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::{Connection, Postgres, QueryBuilder, Transaction};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::models::{STAGING_COLUMNS, StagingRow};

/// Rows per INSERT statement. Ten columns per row keeps each statement well
/// under the 65535 bind parameter limit of the Postgres protocol.
const MAX_ROWS_PER_STATEMENT: usize = 5_000;

/// Destination for transformed rows.
#[async_trait]
pub trait StagingSink: Send + Sync {
    /// Upserts `rows` by id and returns the number of rows written. An empty
    /// batch is a no-op returning zero.
    async fn stage(&self, rows: &[StagingRow]) -> Result<u64>;

    fn table(&self) -> &str;
}

pub fn create_table_sql(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (
    id INTEGER PRIMARY KEY,
    title TEXT,
    price NUMERIC,
    description TEXT,
    category TEXT,
    image TEXT,
    rating_rate NUMERIC,
    rating_count INTEGER,
    ingestion_date DATE,
    loaded_at TIMESTAMP
)"
    )
}

/// Builds `INSERT ... VALUES ... ON CONFLICT (id) DO UPDATE` overwriting every
/// non-key column with the incoming value.
pub fn build_upsert(table: &str, rows: &[&StagingRow]) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(format!(
        "INSERT INTO {} ({}) ",
        table,
        STAGING_COLUMNS.join(", ")
    ));

    builder.push_values(rows.iter(), |mut b, row| {
        b.push_bind(row.id)
            .push_bind(row.title.clone())
            .push_bind(row.price)
            .push_bind(row.description.clone())
            .push_bind(row.category.clone())
            .push_bind(row.image.clone())
            .push_bind(row.rating_rate)
            .push_bind(row.rating_count)
            .push_bind(row.ingestion_date)
            .push_bind(row.loaded_at);
    });

    let assignments = STAGING_COLUMNS
        .iter()
        .filter(|column| **column != "id")
        .map(|column| format!("{column} = EXCLUDED.{column}"))
        .collect::<Vec<_>>()
        .join(", ");
    builder.push(format!(" ON CONFLICT (id) DO UPDATE SET {}", assignments));

    builder
}

/// Collapses duplicate ids, keeping the last occurrence at the position of
/// the first. Postgres refuses to update the same row twice in one statement.
pub fn dedupe_by_id(rows: &[StagingRow]) -> Vec<&StagingRow> {
    let mut positions: HashMap<i64, usize> = HashMap::with_capacity(rows.len());
    let mut unique: Vec<&StagingRow> = Vec::with_capacity(rows.len());

    for row in rows {
        match positions.get(&row.id) {
            Some(&position) => unique[position] = row,
            None => {
                positions.insert(row.id, unique.len());
                unique.push(row);
            }
        }
    }

    unique
}

/// Accepts `table` or `schema.table` made of ASCII identifier characters.
fn validate_table_name(table: &str) -> Result<()> {
    let valid_part = |part: &str| {
        let mut chars = part.chars();
        matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    };

    let parts: Vec<&str> = table.split('.').collect();
    if parts.len() > 2 || !parts.iter().all(|part| valid_part(part)) {
        return Err(Error::InvalidInput(format!("Invalid staging table name '{}'", table)));
    }
    Ok(())
}

/// Stages rows into Postgres: one connection and one transaction per call,
/// covering both the table DDL and the upsert.
pub struct PostgresStager {
    options: PgConnectOptions,
    table: String,
    connect_timeout: Duration,
}

impl PostgresStager {
    pub fn new(config: &DatabaseConfig) -> Result<Self> {
        validate_table_name(&config.table)?;

        let mut options = PgConnectOptions::from_str(&config.url)?;
        if let Some(secs) = config.statement_timeout_secs {
            options = options.options([("statement_timeout", format!("{}s", secs))]);
        }

        Ok(Self {
            options,
            table: config.table.clone(),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
        })
    }

    async fn connect(&self) -> Result<PgConnection> {
        match tokio::time::timeout(self.connect_timeout, PgConnection::connect_with(&self.options))
            .await
        {
            Ok(connection) => Ok(connection?),
            Err(_) => Err(Error::Database(sqlx::Error::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("connecting to the staging database took over {:?}", self.connect_timeout),
            )))),
        }
    }

    async fn write_batch(&self, conn: &mut PgConnection, rows: &[&StagingRow]) -> Result<u64> {
        let mut tx = conn.begin().await.map_err(|e| self.transaction_error(e))?;

        match self.apply(&mut tx, rows).await {
            Ok(written) => {
                tx.commit().await.map_err(|e| self.transaction_error(e))?;
                Ok(written)
            }
            Err(e) => {
                if let Err(rollback_error) = tx.rollback().await {
                    warn!(table = %self.table, error = %rollback_error, "Rollback failed");
                }
                Err(self.transaction_error(e))
            }
        }
    }

    async fn apply(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        rows: &[&StagingRow],
    ) -> std::result::Result<u64, sqlx::Error> {
        sqlx::query(&create_table_sql(&self.table))
            .execute(&mut **tx)
            .await?;

        let mut written = 0;
        for chunk in rows.chunks(MAX_ROWS_PER_STATEMENT) {
            let result = build_upsert(&self.table, chunk)
                .build()
                .execute(&mut **tx)
                .await?;
            written += result.rows_affected();
        }

        Ok(written)
    }

    fn transaction_error(&self, err: sqlx::Error) -> Error {
        Error::StageTransaction {
            table: self.table.clone(),
            reason: err.to_string(),
        }
    }
}

#[async_trait]
impl StagingSink for PostgresStager {
    async fn stage(&self, rows: &[StagingRow]) -> Result<u64> {
        if rows.is_empty() {
            warn!(table = %self.table, "No transformed data to load");
            return Ok(0);
        }

        let unique = dedupe_by_id(rows);
        if unique.len() < rows.len() {
            warn!(
                table = %self.table,
                duplicates = rows.len() - unique.len(),
                "Batch contains duplicate ids, keeping the last occurrence"
            );
        }

        let mut conn = self.connect().await?;
        let outcome = self.write_batch(&mut conn, &unique).await;
        if let Err(e) = conn.close().await {
            warn!(table = %self.table, error = %e, "Failed to close staging connection");
        }

        match &outcome {
            Ok(written) => info!(table = %self.table, records = written, "Loaded records"),
            Err(e) => error!(table = %self.table, error = %e, "Staging load failed"),
        }
        outcome
    }

    fn table(&self) -> &str {
        &self.table
    }
}
