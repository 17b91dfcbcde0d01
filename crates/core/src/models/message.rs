use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{SyncError, SyncResult};

/// 队列操作
///
/// 可识别的操作集合是封闭的，未知操作在入队和消费时都会被拒绝。
/// 新增操作时在此追加变体即可。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// 执行一个后台同步任务，数据为 `{ "job_id": <i64> }`
    Sync,
}

impl Operation {
    pub const ALL: [Operation; 1] = [Operation::Sync];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Sync => "sync",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .iter()
            .find(|op| op.as_str() == s)
            .copied()
            .ok_or_else(|| SyncError::UnknownOperation(s.to_string()))
    }
}

/// 队列消息
///
/// 线上格式为 `{"operation": "<string>", "data": {...}}`。
#[derive(Debug, Clone, PartialEq)]
pub struct QueueMessage {
    pub operation: Operation,
    pub data: Map<String, Value>,
}

/// 线上格式，operation 保持原始字符串以便校验
#[derive(Serialize, Deserialize)]
struct WireMessage {
    operation: String,
    #[serde(default)]
    data: Map<String, Value>,
}

impl QueueMessage {
    pub fn new(operation: Operation, data: Map<String, Value>) -> Self {
        Self { operation, data }
    }

    /// 同步指定任务的消息
    pub fn sync(job_id: i64) -> Self {
        let mut data = Map::new();
        data.insert("job_id".to_string(), Value::from(job_id));
        Self::new(Operation::Sync, data)
    }

    pub fn job_id(&self) -> SyncResult<i64> {
        self.data
            .get("job_id")
            .and_then(Value::as_i64)
            .ok_or_else(|| SyncError::validation("消息缺少有效的 job_id"))
    }

    /// 消费端重新投递的次数，超出 `u32` 的值按上限处理
    pub fn attempts(&self) -> u32 {
        self.data
            .get("attempts")
            .and_then(Value::as_u64)
            .map_or(0, |attempts| u32::try_from(attempts).unwrap_or(u32::MAX))
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.data
            .insert("attempts".to_string(), Value::from(attempts));
        self
    }

    pub fn to_bytes(&self) -> SyncResult<Vec<u8>> {
        let wire = WireMessage {
            operation: self.operation.as_str().to_string(),
            data: self.data.clone(),
        };
        Ok(serde_json::to_vec(&wire)?)
    }

    /// 反序列化并校验操作名
    pub fn from_bytes(bytes: &[u8]) -> SyncResult<Self> {
        let wire: WireMessage = serde_json::from_slice(bytes)
            .map_err(|e| SyncError::validation(format!("无法解析队列消息: {e}")))?;
        let operation = wire.operation.parse::<Operation>()?;
        Ok(Self::new(operation, wire.data))
    }
}
