use thiserror::Error;

/// 同步引擎错误类型定义
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("数据库操作错误: {0}")]
    DatabaseOperation(String),

    #[error("后台任务未找到: {id}")]
    JobNotFound { id: i64 },

    #[error("Host未找到: {id}")]
    HostNotFound { id: i64 },

    #[error("数据验证失败: {0}")]
    Validation(String),

    #[error("无法识别的队列操作: {0}")]
    UnknownOperation(String),

    #[error("上游供应商错误 [{code}]: {message}")]
    Upstream { code: String, message: String },

    #[error("后台任务 {job_id} 执行超时 (超时时间: {seconds}秒)")]
    Timeout { job_id: i64, seconds: u64 },

    #[error("消息队列错误: {0}")]
    MessageQueue(String),

    #[error("缓存错误: {0}")]
    Cache(String),

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("同步会话已结束，不能再处理实体")]
    SessionFinished,

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 统一的Result类型
pub type SyncResult<T> = std::result::Result<T, SyncError>;

impl SyncError {
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    pub fn upstream<C: Into<String>, M: Into<String>>(code: C, message: M) -> Self {
        Self::Upstream {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn database_error<S: Into<String>>(msg: S) -> Self {
        Self::DatabaseOperation(msg.into())
    }

    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    /// 校验类错误在产生任何副作用之前被拒绝
    pub fn is_validation(&self) -> bool {
        matches!(self, SyncError::Validation(_) | SyncError::UnknownOperation(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, SyncError::Timeout { .. })
    }

    /// 基础设施类错误，重新投递后有机会成功
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::Database(_)
                | SyncError::DatabaseOperation(_)
                | SyncError::MessageQueue(_)
                | SyncError::Cache(_)
        )
    }

    /// 用于指标和日志的错误分类
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::Database(_) | SyncError::DatabaseOperation(_) => "database",
            SyncError::JobNotFound { .. } | SyncError::HostNotFound { .. } => "not_found",
            SyncError::Validation(_) | SyncError::UnknownOperation(_) => "validation",
            SyncError::Upstream { .. } => "upstream",
            SyncError::Timeout { .. } => "timeout",
            SyncError::MessageQueue(_) => "message_queue",
            SyncError::Cache(_) => "cache",
            SyncError::Serialization(_) => "serialization",
            SyncError::Configuration(_) => "configuration",
            SyncError::SessionFinished => "session",
            SyncError::Internal(_) => "internal",
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::Serialization(e.to_string())
    }
}
