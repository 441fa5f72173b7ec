use super::store::{KvFuture, KvStore};
use crate::error::CacheError;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use std::path::Path;

/// SQLite-backed key-value namespace (`kv` table in `cache.db`).
pub struct SqliteKvStore {
    pool: SqlitePool,
}

impl SqliteKvStore {
    /// Open (or create) the database file at `db_path`.
    pub async fn open(db_path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CacheError::Storage(format!("create cache directory: {e}")))?;
        }

        let url = format!("sqlite:{}?mode=rwc", db_path.display());
        let pool = SqlitePool::connect(&url).await?;
        init_schema(&pool).await?;
        Ok(Self { pool })
    }

    /// Single-connection in-memory database; every connection of a pool
    /// would otherwise see its own empty database.
    pub async fn in_memory() -> Result<Self, CacheError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        init_schema(&pool).await?;
        Ok(Self { pool })
    }
}

async fn init_schema(pool: &SqlitePool) -> Result<(), CacheError> {
    sqlx::raw_sql(
        "CREATE TABLE IF NOT EXISTS kv (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );",
    )
    .execute(pool)
    .await?;
    Ok(())
}

impl KvStore for SqliteKvStore {
    fn get<'a>(&'a self, key: &'a str) -> KvFuture<'a, Option<String>> {
        Box::pin(async move {
            let row: Option<(String,)> = sqlx::query_as("SELECT value FROM kv WHERE key = ?1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row.map(|(value,)| value))
        })
    }

    fn set<'a>(&'a self, key: &'a str, value: String) -> KvFuture<'a, ()> {
        Box::pin(async move {
            sqlx::query(
                "INSERT INTO kv (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            )
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await?;
            Ok(())
        })
    }

    fn remove<'a>(&'a self, keys: &'a [String]) -> KvFuture<'a, ()> {
        Box::pin(async move {
            let mut tx = self.pool.begin().await?;
            for key in keys {
                sqlx::query("DELETE FROM kv WHERE key = ?1")
                    .bind(key)
                    .execute(&mut *tx)
                    .await?;
            }
            tx.commit().await?;
            Ok(())
        })
    }

    fn keys_with_prefix<'a>(&'a self, prefix: &'a str) -> KvFuture<'a, Vec<String>> {
        Box::pin(async move {
            // substr comparison avoids LIKE, whose `_` wildcard appears in the prefix.
            let rows: Vec<(String,)> =
                sqlx::query_as("SELECT key FROM kv WHERE substr(key, 1, length(?1)) = ?1")
                    .bind(prefix)
                    .fetch_all(&self.pool)
                    .await?;
            Ok(rows.into_iter().map(|(key,)| key).collect())
        })
    }
}
