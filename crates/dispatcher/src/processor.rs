use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, instrument, warn};

use catalog_core::{
    models::{Job, SyncRun},
    SyncError, SyncResult,
};
use catalog_domain::HandlerRegistry;
use catalog_infrastructure::MetricsCollector;

use crate::scheduler::JobScheduler;

/// 一次派发的结果
#[derive(Debug)]
pub enum DispatchOutcome {
    /// 同步完成（可能是批次级失败），运行记录已持久化
    Completed(SyncRun),
    /// 任务正在其他地方运行
    LockDenied,
    /// 加锁后同步失败，任务已解锁并重新调度
    Failed(SyncError),
    /// 超时，任务已解锁并重新调度
    TimedOut,
}

impl DispatchOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchOutcome::Completed(run) if run.successful => "completed",
            DispatchOutcome::Completed(_) => "completed_with_failure",
            DispatchOutcome::LockDenied => "lock_denied",
            DispatchOutcome::Failed(_) => "failed",
            DispatchOutcome::TimedOut => "timed_out",
        }
    }
}

/// 派发处理器
///
/// 队列消费者和调度 tick 共用：解析任务、加锁、执行同步处理器、解锁并重新调度。
pub struct DispatchProcessor {
    scheduler: Arc<JobScheduler>,
    handlers: Arc<HandlerRegistry>,
    job_timeout: Duration,
    metrics: Arc<MetricsCollector>,
}

impl DispatchProcessor {
    pub fn new(
        scheduler: Arc<JobScheduler>,
        handlers: Arc<HandlerRegistry>,
        job_timeout: Duration,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            scheduler,
            handlers,
            job_timeout,
            metrics,
        }
    }

    /// 按任务ID派发
    ///
    /// 加锁之前的失败（任务不存在、处理器未注册、数据库错误）以 `Err` 返回，
    /// 此时任务状态没有被修改。
    #[instrument(skip(self))]
    pub async fn process(&self, job_id: i64) -> SyncResult<DispatchOutcome> {
        let job = self
            .scheduler
            .jobs()
            .find_by_id(job_id)
            .await?
            .ok_or(SyncError::JobNotFound { id: job_id })?;
        self.process_job(&job).await
    }

    #[instrument(skip(self, job), fields(job_id = job.id, job_type = %job.job_type))]
    pub async fn process_job(&self, job: &Job) -> SyncResult<DispatchOutcome> {
        let handler = self.handlers.resolve(job)?;

        if !self.scheduler.try_lock(job).await? {
            return Ok(DispatchOutcome::LockDenied);
        }
        let ran_at = Utc::now();
        info!("开始执行{}", job.description());

        let result = self
            .scheduler
            .enforce_timeout(job, self.job_timeout, handler.synchronise(job))
            .await;

        // 无论结果如何都要解锁；解锁失败时任务会在卡死恢复中被放回
        self.scheduler.unlock(job, ran_at).await?;

        let outcome = match result {
            Ok(run) => {
                self.metrics.record_run(&run);
                DispatchOutcome::Completed(run)
            }
            Err(e) if e.is_timeout() => DispatchOutcome::TimedOut,
            Err(e) => {
                warn!(error = %e, "{}执行失败", job.description());
                self.metrics.record_dispatch_error(job.job_type, e.kind());
                DispatchOutcome::Failed(e)
            }
        };

        info!(outcome = outcome.as_str(), "{}执行结束", job.description());
        Ok(outcome)
    }
}
