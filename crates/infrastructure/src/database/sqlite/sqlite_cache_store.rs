use async_trait::async_trait;
use catalog_core::{models::CacheEntry, traits::CacheStore, SyncResult};
use sqlx::{Row, SqlitePool};

/// 以 `cache_entries` 表为后端的缓存存储
pub struct SqliteCacheStore {
    pool: SqlitePool,
}

impl SqliteCacheStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CacheStore for SqliteCacheStore {
    async fn get(&self, key: &str) -> SyncResult<Option<CacheEntry>> {
        let row = sqlx::query("SELECT key, value, updated_at FROM cache_entries WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(CacheEntry {
                key: row.try_get("key")?,
                value: row.try_get("value")?,
                updated_at: row.try_get("updated_at")?,
            })),
            None => Ok(None),
        }
    }

    async fn put(&self, entry: &CacheEntry) -> SyncResult<()> {
        sqlx::query(
            r#"
            INSERT INTO cache_entries (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT (key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(&entry.key)
        .bind(&entry.value)
        .bind(entry.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> SyncResult<bool> {
        let result = sqlx::query("DELETE FROM cache_entries WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
