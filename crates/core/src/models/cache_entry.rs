use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 缓存条目
///
/// 条目不会被后台清理，是否新鲜由每次读取时调用方给出的时间窗口决定。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheEntry {
    pub key: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(key: &str, value: String) -> Self {
        Self {
            key: key.to_string(),
            value,
            updated_at: Utc::now(),
        }
    }

    /// `now - updated_at <= freshness` 时条目有效；时钟回拨导致的负值视为新鲜
    pub fn is_fresh(&self, now: DateTime<Utc>, freshness: std::time::Duration) -> bool {
        match (now - self.updated_at).to_std() {
            Ok(age) => age <= freshness,
            Err(_) => true,
        }
    }
}
