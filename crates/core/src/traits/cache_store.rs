use async_trait::async_trait;

use crate::{models::CacheEntry, SyncResult};

/// 缓存底层的持久化存储
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> SyncResult<Option<CacheEntry>>;

    /// 覆盖写入，包含时间戳
    async fn put(&self, entry: &CacheEntry) -> SyncResult<()>;

    async fn delete(&self, key: &str) -> SyncResult<bool>;
}
