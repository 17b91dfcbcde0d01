use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 供应商账户（Host）
///
/// `credentials` 原样交给上游抓取器使用，同步引擎本身不解析其内容。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Host {
    pub id: i64,
    pub supplier: String,
    pub identifier: String,
    pub credentials: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl Host {
    pub fn new(supplier: &str, identifier: &str, credentials: serde_json::Value) -> Self {
        Self {
            id: 0,
            supplier: supplier.to_string(),
            identifier: identifier.to_string(),
            credentials,
            created_at: Utc::now(),
        }
    }
}
