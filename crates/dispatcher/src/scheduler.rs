use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use catalog_core::{
    models::{Job, JobStatus},
    traits::JobRepository,
    StructuredLogger, SyncError, SyncResult,
};
use catalog_infrastructure::MetricsCollector;

/// 后台任务调度与加锁
///
/// 任务的互斥只依赖持久化记录上的状态CAS，多个进程可以同时运行调度器。
pub struct JobScheduler {
    jobs: Arc<dyn JobRepository>,
    metrics: Arc<MetricsCollector>,
}

impl JobScheduler {
    pub fn new(jobs: Arc<dyn JobRepository>, metrics: Arc<MetricsCollector>) -> Self {
        Self { jobs, metrics }
    }

    pub fn jobs(&self) -> &Arc<dyn JobRepository> {
        &self.jobs
    }

    /// 空闲且 `next_run_at` 为空或不晚于 `now` 的任务
    pub async fn due_jobs(&self, now: DateTime<Utc>) -> SyncResult<Vec<Job>> {
        let mut jobs = self.jobs.find_by_status(&[JobStatus::Idle]).await?;
        jobs.retain(|job| job.is_due(now));
        debug!("发现 {} 个到期任务", jobs.len());
        Ok(jobs)
    }

    /// 把任务从 idle 或 queued 原子地切换为 running
    ///
    /// 返回 `false` 表示任务已在运行，不产生任何副作用。
    #[instrument(skip(self, job), fields(job_id = job.id))]
    pub async fn try_lock(&self, job: &Job) -> SyncResult<bool> {
        let locked = self
            .jobs
            .compare_and_set_status(job.id, &JobStatus::LOCKABLE, JobStatus::Running)
            .await?;

        if !locked {
            StructuredLogger::log_job_lock_denied(job);
            self.metrics.record_lock_denied();
        }
        Ok(locked)
    }

    /// 通过队列派发前把任务标记为 queued，避免下一次 tick 重复派发
    pub async fn mark_queued(&self, job: &Job) -> SyncResult<bool> {
        self.jobs
            .compare_and_set_status(job.id, &[JobStatus::Idle], JobStatus::Queued)
            .await
    }

    /// 入队失败时撤销 queued 标记
    pub async fn unmark_queued(&self, job: &Job) -> SyncResult<bool> {
        self.jobs
            .compare_and_set_status(job.id, &[JobStatus::Queued], JobStatus::Idle)
            .await
    }

    /// 状态回到 idle，`next_run_at = ran_at + interval`，与运行结果无关
    ///
    /// 任务已不在 running（被卡死恢复放回后可能已由其他进程重新加锁）时不做修改，
    /// 返回 `None`。
    #[instrument(skip(self, job), fields(job_id = job.id))]
    pub async fn unlock(
        &self,
        job: &Job,
        ran_at: DateTime<Utc>,
    ) -> SyncResult<Option<DateTime<Utc>>> {
        let next_run_at = job.next_run_after(ran_at)?;
        if !self.jobs.release(job.id, next_run_at).await? {
            warn!("{}已不在running状态，跳过重新调度", job.description());
            return Ok(None);
        }
        StructuredLogger::log_job_rescheduled(job, next_run_at);
        Ok(Some(next_run_at))
    }

    /// 在 `deadline` 内等待 `run` 完成，超时后放弃等待并返回 `Timeout`
    ///
    /// 超时的运行被直接丢弃，已写入的数据保留；调用方仍需解锁任务。
    pub async fn enforce_timeout<T, F>(&self, job: &Job, deadline: Duration, run: F) -> SyncResult<T>
    where
        F: Future<Output = SyncResult<T>>,
    {
        match tokio::time::timeout(deadline, run).await {
            Ok(result) => result,
            Err(_) => {
                let seconds = deadline.as_secs();
                StructuredLogger::log_job_timeout(job, seconds);
                self.metrics.record_job_timeout();
                Err(SyncError::Timeout {
                    job_id: job.id,
                    seconds,
                })
            }
        }
    }

    /// 把长时间停留在 running/queued 的任务放回 idle，并立即到期
    ///
    /// `updated_at` 早于 `now - stale_after` 的任务视为进程崩溃或消息丢失。
    #[instrument(skip(self))]
    pub async fn recover_stuck(
        &self,
        now: DateTime<Utc>,
        stale_after: Duration,
    ) -> SyncResult<Vec<Job>> {
        let stale_after = chrono::Duration::from_std(stale_after)
            .map_err(|e| SyncError::config_error(format!("无效的卡死判定时间: {e}")))?;
        let cutoff = now - stale_after;

        let candidates = self
            .jobs
            .find_by_status(&[JobStatus::Running, JobStatus::Queued])
            .await?;

        let mut recovered = Vec::new();
        for job in candidates.into_iter().filter(|job| job.updated_at < cutoff) {
            // 快照可能已过期：另一个调度器可能已经恢复并重新锁定了该任务，
            // 因此陈旧条件必须在持久化记录上再判断一次
            if !self
                .jobs
                .recover_stale(job.id, job.status, cutoff, now)
                .await?
            {
                continue;
            }
            StructuredLogger::log_job_recovered(&job);
            recovered.push(job);
        }

        if !recovered.is_empty() {
            info!("恢复了 {} 个卡死的任务", recovered.len());
            self.metrics
                .record_jobs_recovered(recovered.len() as u64);
        }
        Ok(recovered)
    }
}
