//! 读穿缓存
//!
//! 缓存条目不设过期时间，是否新鲜由每次读取时给出的时间窗口决定。
//! 读取失败降级为未命中；重新计算成功后的写入失败只记录日志。

pub mod redis_store;

pub use redis_store::RedisCacheStore;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use catalog_core::{
    config::{CacheBackend, CacheConfig},
    models::CacheEntry,
    traits::CacheStore,
    StructuredLogger, SyncResult,
};
use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use sqlx::SqlitePool;
use tracing::warn;

use crate::database::SqliteCacheStore;
use crate::observability::MetricsCollector;

/// 带命名空间的读穿缓存
#[derive(Clone)]
pub struct Cache {
    store: Arc<dyn CacheStore>,
    namespace: String,
    default_freshness: Duration,
    metrics: Arc<MetricsCollector>,
}

impl Cache {
    pub fn new(store: Arc<dyn CacheStore>, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
            default_freshness: Duration::from_secs(3600),
            metrics: Arc::new(MetricsCollector::new()),
        }
    }

    /// 调用方没有自己的新鲜度要求时使用的窗口
    pub fn with_default_freshness(mut self, freshness: Duration) -> Self {
        self.default_freshness = freshness;
        self
    }

    pub fn default_freshness(&self) -> Duration {
        self.default_freshness
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = metrics;
        self
    }

    /// 存储层使用的完整键 `<namespace>.<key>`
    pub fn namespaced_key(&self, key: &str) -> String {
        format!("{}.{}", self.namespace, key)
    }

    /// 新鲜的条目直接返回，否则执行 `block` 并在成功后写回
    ///
    /// `block` 失败时不写入任何内容，错误原样返回。
    pub async fn fetch<F, Fut>(&self, key: &str, freshness: Duration, block: F) -> SyncResult<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = SyncResult<String>>,
    {
        let full_key = self.namespaced_key(key);
        if let Some(value) = self.read_fresh(&full_key, freshness).await {
            self.record_hit(&full_key);
            return Ok(value);
        }

        let value = block().await?;
        self.write(&full_key, value.clone()).await;
        self.record_miss(&full_key);
        Ok(value)
    }

    /// 与 [`Cache::fetch`] 相同，值经过JSON序列化；无法解析的旧条目视为未命中
    pub async fn fetch_json<T, F, Fut>(
        &self,
        key: &str,
        freshness: Duration,
        block: F,
    ) -> SyncResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = SyncResult<T>>,
    {
        let full_key = self.namespaced_key(key);
        if let Some(raw) = self.read_fresh(&full_key, freshness).await {
            match serde_json::from_str(&raw) {
                Ok(value) => {
                    self.record_hit(&full_key);
                    return Ok(value);
                }
                Err(e) => warn!(key = %full_key, error = %e, "缓存条目无法解析，重新计算"),
            }
        }

        let value = block().await?;
        self.write(&full_key, serde_json::to_string(&value)?).await;
        self.record_miss(&full_key);
        Ok(value)
    }

    /// 删除条目
    ///
    /// 存储错误和读写失败一样记录日志与指标，同时返回给需要确认删除结果的调用方。
    pub async fn invalidate(&self, key: &str) -> SyncResult<()> {
        let full_key = self.namespaced_key(key);
        if let Err(e) = self.store.delete(&full_key).await {
            StructuredLogger::log_cache_store_error(&full_key, "delete", &e.to_string());
            self.metrics.record_cache_store_error();
            return Err(e);
        }
        Ok(())
    }

    async fn read_fresh(&self, full_key: &str, freshness: Duration) -> Option<String> {
        match self.store.get(full_key).await {
            Ok(Some(entry)) if entry.is_fresh(Utc::now(), freshness) => Some(entry.value),
            Ok(_) => None,
            Err(e) => {
                StructuredLogger::log_cache_store_error(full_key, "read", &e.to_string());
                self.metrics.record_cache_store_error();
                None
            }
        }
    }

    async fn write(&self, full_key: &str, value: String) {
        if let Err(e) = self.store.put(&CacheEntry::new(full_key, value)).await {
            StructuredLogger::log_cache_store_error(full_key, "write", &e.to_string());
            self.metrics.record_cache_store_error();
        }
    }

    fn record_hit(&self, full_key: &str) {
        StructuredLogger::log_cache_hit(full_key);
        self.metrics.record_cache_hit();
    }

    fn record_miss(&self, full_key: &str) {
        StructuredLogger::log_cache_miss(full_key);
        self.metrics.record_cache_miss();
    }
}

/// 根据配置创建缓存存储
pub async fn create_cache_store(
    config: &CacheConfig,
    pool: &SqlitePool,
) -> SyncResult<Arc<dyn CacheStore>> {
    match config.backend {
        CacheBackend::Database => Ok(Arc::new(SqliteCacheStore::new(pool.clone()))),
        CacheBackend::Redis => Ok(Arc::new(RedisCacheStore::new(&config.redis).await?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_core::SyncError;
    use catalog_testing_utils::MockCacheStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const HOUR: Duration = Duration::from_secs(3600);

    fn cache() -> (Cache, MockCacheStore) {
        let store = MockCacheStore::new();
        (Cache::new(Arc::new(store.clone()), "atleisure"), store)
    }

    #[tokio::test]
    async fn test_second_fetch_within_window_hits() {
        let (cache, store) = cache();
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let value = cache
                .fetch("regions", HOUR, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok("eu".to_string())
                })
                .await
                .unwrap();
            assert_eq!(value, "eu");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(store.get_entry("atleisure.regions").is_some());
    }

    #[tokio::test]
    async fn test_stale_entry_is_recomputed() {
        let (cache, store) = cache();
        let mut entry = CacheEntry::new("atleisure.regions", "old".to_string());
        entry.updated_at = Utc::now() - chrono::Duration::hours(2);
        store.insert(entry);

        let value = cache
            .fetch("regions", HOUR, || async { Ok("new".to_string()) })
            .await
            .unwrap();
        assert_eq!(value, "new");
        assert_eq!(store.get_entry("atleisure.regions").unwrap().value, "new");

        let value = cache
            .fetch("regions", Duration::from_secs(3 * 3600), || async {
                Ok("unused".to_string())
            })
            .await
            .unwrap();
        assert_eq!(value, "new");
    }

    #[tokio::test]
    async fn test_failed_block_writes_nothing() {
        let (cache, store) = cache();
        let result = cache
            .fetch("regions", HOUR, || async {
                Err(SyncError::upstream("500", "supplier down"))
            })
            .await;

        assert!(matches!(result, Err(SyncError::Upstream { .. })));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_invalidate_forces_recompute() {
        let (cache, _) = cache();
        cache
            .fetch("regions", HOUR, || async { Ok("first".to_string()) })
            .await
            .unwrap();
        cache.invalidate("regions").await.unwrap();

        let value = cache
            .fetch("regions", HOUR, || async { Ok("second".to_string()) })
            .await
            .unwrap();
        assert_eq!(value, "second");
    }

    #[tokio::test]
    async fn test_store_failures() {
        let (cache, store) = cache();

        store.fail_reads(true);
        store.fail_writes(true);
        let value = cache
            .fetch("regions", HOUR, || async { Ok("computed".to_string()) })
            .await
            .unwrap();
        assert_eq!(value, "computed");
        assert!(store.is_empty());

        // 删除失败时错误返回给调用方，已有条目保持不变
        store.fail_reads(false);
        store.fail_writes(false);
        cache
            .fetch("regions", HOUR, || async { Ok("kept".to_string()) })
            .await
            .unwrap();
        store.fail_deletes(true);
        assert!(cache.invalidate("regions").await.is_err());
        assert_eq!(store.get_entry("atleisure.regions").unwrap().value, "kept");

        store.fail_deletes(false);
        cache.invalidate("regions").await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_json_round_trip() {
        let (cache, store) = cache();
        let regions: Vec<String> = cache
            .fetch_json("regions", HOUR, || async {
                Ok(vec!["eu".to_string(), "us".to_string()])
            })
            .await
            .unwrap();
        assert_eq!(regions.len(), 2);
        assert_eq!(
            store.get_entry("atleisure.regions").unwrap().value,
            r#"["eu","us"]"#
        );

        let cached: Vec<String> = cache
            .fetch_json("regions", HOUR, || async { Ok(Vec::new()) })
            .await
            .unwrap();
        assert_eq!(cached, regions);
    }
}
