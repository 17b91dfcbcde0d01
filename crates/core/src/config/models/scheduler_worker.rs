use serde::{Deserialize, Serialize};

/// 调度器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub tick_interval_seconds: u64,
    /// 每次tick附加的随机抖动上限，避免多个调度进程同时触发
    pub tick_jitter_ms: u64,
    pub max_concurrent_jobs: usize,
    pub job_timeout_seconds: u64,
    /// running/queued 状态超过该时长未更新的任务视为卡死
    pub stale_after_seconds: u64,
    /// 为 true 时到期任务经由队列派发，否则在tick中直接执行
    pub dispatch_via_queue: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tick_interval_seconds: 30,
            tick_jitter_ms: 1000,
            max_concurrent_jobs: 4,
            job_timeout_seconds: 1800,
            stale_after_seconds: 7200,
            dispatch_via_queue: false,
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.tick_interval_seconds == 0 {
            return Err(anyhow::anyhow!("调度间隔必须大于0"));
        }

        if self.max_concurrent_jobs == 0 {
            return Err(anyhow::anyhow!("最大并发任务数必须大于0"));
        }

        if self.job_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("任务超时时间必须大于0"));
        }

        if self.stale_after_seconds <= self.job_timeout_seconds {
            return Err(anyhow::anyhow!("卡死判定时间必须大于任务超时时间"));
        }

        Ok(())
    }
}

/// 队列消费者配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub enabled: bool,
    /// 为空时使用主机名
    pub worker_id: Option<String>,
    /// 锁定任务之前发生可重试错误时，消息最多重新入队的次数
    pub max_redeliveries: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            worker_id: None,
            max_redeliveries: 3,
        }
    }
}

impl WorkerConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(worker_id) = &self.worker_id {
            if worker_id.trim().is_empty() {
                return Err(anyhow::anyhow!("Worker ID不能为空字符串"));
            }
        }

        Ok(())
    }
}
