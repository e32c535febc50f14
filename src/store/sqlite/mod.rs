//! SQLite-backed record store
//!
//! All keys share one `records` table; each row holds one record, JSON
//! document or text chunk tagged with its key and kind.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::SqlitePool;

use super::{RecordStore, StoreChunk, StoreFormat, StoreLocation, TEXT_SEPARATOR};
use crate::error::{DatabaseError, Error, Result};

mod migrations;

/// Row kinds in the `records` table
mod kind {
    pub const RECORD: &str = "record";
    pub const JSON: &str = "json";
    pub const TEXT: &str = "text";
}

/// [`RecordStore`] writing rows into a SQLite database
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    path: PathBuf,
}

impl SqliteStore {
    /// Database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of rows stored under `key`
    pub async fn count(&self, key: &str) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM records WHERE store_key = ?")
            .bind(key)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to count records: {}",
                    e
                )))
            })?;
        Ok(count.max(0) as u64)
    }

    async fn payloads(&self, key: &str, kinds: &[&str]) -> Result<Vec<String>> {
        let mut query = sqlx::QueryBuilder::new("SELECT payload FROM records WHERE store_key = ");
        query.push_bind(key).push(" AND kind IN (");
        let mut separated = query.separated(", ");
        for kind in kinds {
            separated.push_bind(*kind);
        }
        separated.push_unseparated(") ORDER BY id");

        query
            .build_query_scalar::<String>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to read records: {}",
                    e
                )))
            })
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn truncate(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM records WHERE store_key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to truncate '{}': {}",
                    key, e
                )))
            })?;
        Ok(())
    }

    async fn append(&self, key: &str, chunk: StoreChunk<'_>) -> Result<u64> {
        // SQLite default SQLITE_MAX_VARIABLE_NUMBER is 999; 4 binds per row
        const MAX_ROWS_PER_INSERT: usize = 249;

        let rows: Vec<(&str, String)> = match chunk {
            StoreChunk::Records(records) => records
                .iter()
                .map(|record| serde_json::to_string(record).map(|json| (kind::RECORD, json)))
                .collect::<std::result::Result<_, _>>()?,
            StoreChunk::Json(value) => vec![(kind::JSON, serde_json::to_string(value)?)],
            StoreChunk::Text(text) => vec![(kind::TEXT, text.to_string())],
        };
        if rows.is_empty() {
            return Ok(0);
        }

        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to begin transaction: {}",
                e
            )))
        })?;

        for rows in rows.chunks(MAX_ROWS_PER_INSERT) {
            let mut query = sqlx::QueryBuilder::new(
                "INSERT INTO records (store_key, kind, payload, created_at) ",
            );
            query.push_values(rows, |mut b, (kind, payload)| {
                b.push_bind(key)
                    .push_bind(*kind)
                    .push_bind(payload.as_str())
                    .push_bind(now);
            });
            query.build().execute(&mut *tx).await.map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to insert records: {}",
                    e
                )))
            })?;
        }

        tx.commit().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to commit records: {}",
                e
            )))
        })?;

        let items = chunk.item_count();
        tracing::debug!(key, items, "appended to SQLite store");
        Ok(items)
    }

    async fn flush(&self) -> Result<()> {
        // Each append commits its own transaction
        Ok(())
    }

    async fn read_values(&self, key: &str) -> Result<Vec<Value>> {
        self.payloads(key, &[kind::RECORD, kind::JSON])
            .await?
            .iter()
            .map(|payload| serde_json::from_str(payload).map_err(Into::into))
            .collect()
    }

    async fn read_text(&self, key: &str) -> Result<Option<String>> {
        let chunks = self.payloads(key, &[kind::TEXT]).await?;
        if chunks.is_empty() {
            return Ok(None);
        }
        let mut text = String::new();
        for chunk in chunks {
            text.push_str(&chunk);
            text.push_str(TEXT_SEPARATOR);
        }
        Ok(Some(text))
    }

    fn location(&self, key: &str, _format: StoreFormat) -> StoreLocation {
        StoreLocation::Table {
            database: self.path.clone(),
            key: key.to_string(),
        }
    }
}
