use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{SyncError, SyncResult};

/// 后台同步任务定义
///
/// 每个 Host 针对每种同步类型拥有一个任务，调度器根据 `interval_seconds`
/// 计算下一次运行时间，并通过 `status` 保证同一任务同一时刻只有一个执行实例。
///
/// # 字段说明
///
/// - `id`: 任务的唯一标识符
/// - `host_id`: 所属 Host
/// - `supplier`: 供应商名称，用于解析同步处理器
/// - `job_type`: 同步类型（metadata/availabilities）
/// - `interval_seconds`: 运行周期（秒）
/// - `status`: 当前状态（idle/queued/running）
/// - `next_run_at`: 下一次运行时间，从未运行过时为空
/// - `updated_at`: 最后一次状态变更时间，用于检测卡死的任务
///
/// # 使用示例
///
/// ```rust
/// use catalog_core::models::{Job, JobStatus, JobType};
/// use std::time::Duration;
///
/// let job = Job::new(1, "atleisure", JobType::Metadata, Duration::from_secs(3600));
/// assert_eq!(job.status, JobStatus::Idle);
/// assert!(job.next_run_at.is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    pub id: i64,
    pub host_id: i64,
    pub supplier: String,
    pub job_type: JobType,
    pub interval_seconds: i64,
    pub status: JobStatus,
    pub next_run_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 同步类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    /// 房源元数据同步
    Metadata,
    /// 房态日历同步
    Availabilities,
}

impl JobType {
    pub const ALL: [JobType; 2] = [JobType::Metadata, JobType::Availabilities];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Metadata => "metadata",
            JobType::Availabilities => "availabilities",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobType {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "metadata" => Ok(JobType::Metadata),
            "availabilities" => Ok(JobType::Availabilities),
            _ => Err(SyncError::validation(format!("无效的同步类型: {s}"))),
        }
    }
}

/// 任务状态
///
/// 状态流转为 idle → queued → running → idle，其中 queued 只在通过队列派发时出现。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Idle,
    Queued,
    Running,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Idle => "idle",
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
        }
    }

    /// 可以被加锁执行的状态
    pub const LOCKABLE: [JobStatus; 2] = [JobStatus::Idle, JobStatus::Queued];
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(JobStatus::Idle),
            "queued" => Ok(JobStatus::Queued),
            "running" => Ok(JobStatus::Running),
            _ => Err(SyncError::validation(format!("无效的任务状态: {s}"))),
        }
    }
}

impl Job {
    /// 允许的最大同步间隔（一年）
    pub const MAX_INTERVAL_SECONDS: u64 = 366 * 24 * 60 * 60;

    /// 创建新任务
    pub fn new(
        host_id: i64,
        supplier: &str,
        job_type: JobType,
        interval: std::time::Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: 0, // 将由数据库生成
            host_id,
            supplier: supplier.to_string(),
            job_type,
            interval_seconds: i64::try_from(interval.as_secs()).unwrap_or(i64::MAX),
            status: JobStatus::Idle,
            next_run_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// 空闲且到期（或从未运行）的任务可以被调度
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == JobStatus::Idle && self.next_run_at.map_or(true, |at| at <= now)
    }

    pub fn is_running(&self) -> bool {
        self.status == JobStatus::Running
    }

    /// 根据本次运行时间计算下一次运行时间
    ///
    /// 间隔不为正或结果超出可表示的时间范围时返回校验错误，不会得到早于
    /// `ran_at` 的时间。
    pub fn next_run_after(&self, ran_at: DateTime<Utc>) -> SyncResult<DateTime<Utc>> {
        if self.interval_seconds <= 0 {
            return Err(SyncError::validation(format!(
                "任务 {} 的同步间隔必须大于0: {}",
                self.id, self.interval_seconds
            )));
        }
        Duration::try_seconds(self.interval_seconds)
            .and_then(|interval| ran_at.checked_add_signed(interval))
            .ok_or_else(|| {
                SyncError::validation(format!(
                    "任务 {} 的同步间隔超出范围: {}s",
                    self.id, self.interval_seconds
                ))
            })
    }

    pub fn description(&self) -> String {
        format!(
            "任务 {} (host={}, supplier={}, type={})",
            self.id, self.host_id, self.supplier, self.job_type
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hourly_job() -> Job {
        Job::new(
            1,
            "atleisure",
            JobType::Metadata,
            std::time::Duration::from_secs(3600),
        )
    }

    #[test]
    fn test_never_run_job_is_due() {
        let job = hourly_job();
        assert!(job.is_due(Utc::now()));
    }

    #[test]
    fn test_due_respects_next_run_at_and_status() {
        let now = Utc::now();
        let mut job = hourly_job();

        job.next_run_at = Some(now + Duration::minutes(5));
        assert!(!job.is_due(now));

        job.next_run_at = Some(now);
        assert!(job.is_due(now));

        job.status = JobStatus::Running;
        assert!(!job.is_due(now));

        job.status = JobStatus::Queued;
        assert!(!job.is_due(now));
    }

    #[test]
    fn test_next_run_after() {
        let job = hourly_job();
        let ran_at = Utc::now();
        assert_eq!(job.next_run_after(ran_at).unwrap(), ran_at + Duration::hours(1));
    }

    #[test]
    fn test_oversized_interval_never_reschedules_into_the_past() {
        let ran_at = Utc::now();

        let job = Job::new(
            1,
            "atleisure",
            JobType::Metadata,
            std::time::Duration::from_secs(u64::MAX),
        );
        assert_eq!(job.interval_seconds, i64::MAX);
        assert!(job.next_run_after(ran_at).unwrap_err().is_validation());

        let mut job = hourly_job();
        job.interval_seconds = 10_i64.pow(16);
        assert!(job.next_run_after(ran_at).unwrap_err().is_validation());

        job.interval_seconds = -1;
        assert!(job.next_run_after(ran_at).is_err());
    }

    #[test]
    fn test_status_and_type_parsing() {
        assert_eq!("running".parse::<JobStatus>().unwrap(), JobStatus::Running);
        assert_eq!(
            "availabilities".parse::<JobType>().unwrap(),
            JobType::Availabilities
        );
        assert!("rates".parse::<JobType>().unwrap_err().is_validation());
        assert!("paused".parse::<JobStatus>().is_err());
    }
}
