use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 本地存储的房源
///
/// 以 (`host_id`, `identifier`) 唯一确定，`data` 为映射后的房源内容。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Property {
    pub host_id: i64,
    pub identifier: String,
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Property {
    pub fn new(host_id: i64, identifier: &str, data: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            host_id,
            identifier: identifier.to_string(),
            data,
            created_at: now,
            updated_at: now,
        }
    }
}
