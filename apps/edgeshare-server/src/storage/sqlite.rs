//! SQLite-backed key-value namespaces
//!
//! Metadata and token records survive restarts when this backend is used.
//! Each store owns one namespace inside the shared `kv_entries` table.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};

use crate::clock::SharedClock;
use crate::error::StorageResult;

use super::traits::KvStore;
use super::EXPIRED_SWEEP_INTERVAL_SECS;

/// Create a new database connection pool
pub async fn create_pool(database_url: &str) -> StorageResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal);

    // In-memory databases are per-connection
    let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    initialize_schema(&pool).await?;

    Ok(pool)
}

/// Create the key-value table
pub async fn initialize_schema(pool: &SqlitePool) -> StorageResult<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS kv_entries (
            namespace TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            expires_at INTEGER NOT NULL,
            PRIMARY KEY (namespace, key)
        );

        CREATE INDEX IF NOT EXISTS idx_kv_expires ON kv_entries(expires_at);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// One namespace in the `kv_entries` table
///
/// Writes periodically delete the namespace's expired rows so abandoned
/// sessions do not accumulate.
pub struct SqliteKvStore {
    pool: SqlitePool,
    namespace: &'static str,
    next_sweep: Mutex<DateTime<Utc>>,
    clock: SharedClock,
}

impl SqliteKvStore {
    pub fn new(pool: SqlitePool, namespace: &'static str, clock: SharedClock) -> Self {
        let next_sweep = clock.now() + Duration::seconds(EXPIRED_SWEEP_INTERVAL_SECS);
        Self {
            pool,
            namespace,
            next_sweep: Mutex::new(next_sweep),
            clock,
        }
    }

    fn sweep_due(&self, now: DateTime<Utc>) -> bool {
        let mut next_sweep = self.next_sweep.lock();
        if now < *next_sweep {
            return false;
        }
        *next_sweep = now + Duration::seconds(EXPIRED_SWEEP_INTERVAL_SECS);
        true
    }

    /// Delete every expired row in this namespace
    async fn sweep_expired(&self, now: DateTime<Utc>) -> StorageResult<u64> {
        let result = sqlx::query("DELETE FROM kv_entries WHERE namespace = ? AND expires_at <= ?")
            .bind(self.namespace)
            .bind(now.timestamp_millis())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl KvStore for SqliteKvStore {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let row: Option<(String, i64)> = sqlx::query_as(
            "SELECT value, expires_at FROM kv_entries WHERE namespace = ? AND key = ?",
        )
        .bind(self.namespace)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        let now = self.clock.now().timestamp_millis();
        match row {
            Some((value, expires_at)) if expires_at > now => Ok(Some(value)),
            Some(_) => {
                sqlx::query(
                    "DELETE FROM kv_entries WHERE namespace = ? AND key = ? AND expires_at <= ?",
                )
                .bind(self.namespace)
                .bind(key)
                .bind(now)
                .execute(&self.pool)
                .await?;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, value: String, expires_at: DateTime<Utc>) -> StorageResult<()> {
        let now = self.clock.now();
        if self.sweep_due(now) {
            match self.sweep_expired(now).await {
                Ok(0) => {}
                Ok(reclaimed) => {
                    tracing::debug!(namespace = self.namespace, reclaimed, "Swept expired records")
                }
                Err(e) => {
                    tracing::warn!(namespace = self.namespace, error = %e, "Failed to sweep expired records")
                }
            }
        }

        sqlx::query(
            r#"
            INSERT INTO kv_entries (namespace, key, value, expires_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(namespace, key) DO UPDATE SET
                value = excluded.value,
                expires_at = excluded.expires_at
            "#,
        )
        .bind(self.namespace)
        .bind(key)
        .bind(value)
        .bind(expires_at.timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        sqlx::query("DELETE FROM kv_entries WHERE namespace = ? AND key = ?")
            .bind(self.namespace)
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
