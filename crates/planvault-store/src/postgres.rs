//! [`KeyValueStore`] backed by the `kv_entries` PostgreSQL table.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::pattern::{is_match_all, to_sql_like};
use crate::KeyValueStore;

/// Postgres-backed store. Cloning shares the underlying connection pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wrap an existing pool. Migrations must already have been applied;
    /// [`crate::pool::open_store`] does both.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Number of stored entries.
    pub async fn entry_count(&self) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM kv_entries")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Close every pooled connection. Clones of this store stop working.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl KeyValueStore for PgStore {
    fn name(&self) -> &str {
        "postgres"
    }

    async fn get(&self, key: &str) -> StoreResult<String> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM kv_entries WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|(value,)| value)
            .ok_or_else(|| StoreError::NotFound(key.to_owned()))
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO kv_entries (key, value) VALUES ($1, $2) \
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = now()",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM kv_entries WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(key.to_owned()));
        }

        Ok(())
    }

    async fn keys(&self, pattern: &str) -> StoreResult<Vec<String>> {
        let rows: Vec<(String,)> = if is_match_all(pattern) {
            sqlx::query_as("SELECT key FROM kv_entries")
                .fetch_all(&self.pool)
                .await?
        } else {
            let like = to_sql_like(pattern);
            debug!(pattern, %like, "listing keys");
            sqlx::query_as("SELECT key FROM kv_entries WHERE key LIKE $1")
                .bind(like)
                .fetch_all(&self.pool)
                .await?
        };

        Ok(rows.into_iter().map(|(key,)| key).collect())
    }
}
