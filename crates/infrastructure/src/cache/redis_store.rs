use async_trait::async_trait;
use catalog_core::{
    config::RedisConfig, models::CacheEntry, traits::CacheStore, SyncError, SyncResult,
};
use redis::aio::ConnectionManager;
use tracing::{debug, error, info, instrument};

/// Redis缓存存储，每个条目以JSON字符串保存，不设置TTL
pub struct RedisCacheStore {
    connection: ConnectionManager,
}

impl RedisCacheStore {
    pub async fn new(config: &RedisConfig) -> SyncResult<Self> {
        let client = redis::Client::open(config.build_url())
            .map_err(|e| SyncError::Cache(e.to_string()))?;

        let mut connection = client
            .get_connection_manager()
            .await
            .map_err(|e| SyncError::Cache(e.to_string()))?;

        let _: String = redis::cmd("PING")
            .query_async(&mut connection)
            .await
            .map_err(|e| SyncError::Cache(e.to_string()))?;

        info!("Redis cache store connected to {}:{}", config.host, config.port);
        Ok(Self { connection })
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> SyncResult<Option<CacheEntry>> {
        let mut connection = self.connection.clone();
        let raw: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut connection)
            .await
            .map_err(|e| {
                error!("Cache GET failed for key {}: {}", key, e);
                SyncError::Cache(e.to_string())
            })?;

        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self, entry), fields(key = %entry.key))]
    async fn put(&self, entry: &CacheEntry) -> SyncResult<()> {
        let mut connection = self.connection.clone();
        let _: () = redis::cmd("SET")
            .arg(&entry.key)
            .arg(serde_json::to_string(entry)?)
            .query_async(&mut connection)
            .await
            .map_err(|e| {
                error!("Cache SET failed for key {}: {}", entry.key, e);
                SyncError::Cache(e.to_string())
            })?;

        debug!("Cache SET success: {}", entry.key);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, key: &str) -> SyncResult<bool> {
        let mut connection = self.connection.clone();
        let removed: i64 = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut connection)
            .await
            .map_err(|e| SyncError::Cache(e.to_string()))?;
        Ok(removed > 0)
    }
}
