use std::sync::Arc;

use tracing::{info, instrument};

use catalog_core::{models::QueueMessage, SyncError, SyncResult};
use catalog_infrastructure::SyncQueue;

use crate::scheduler::JobScheduler;

/// 手动触发重新同步
///
/// 每个任务投递一条 `sync` 消息。只有空闲任务会被标记为 queued，
/// 正在运行的任务同样会收到消息，届时加锁失败并被忽略。
pub struct ResyncTrigger {
    scheduler: Arc<JobScheduler>,
    queue: SyncQueue,
}

impl ResyncTrigger {
    pub fn new(scheduler: Arc<JobScheduler>, queue: SyncQueue) -> Self {
        Self { scheduler, queue }
    }

    #[instrument(skip(self))]
    pub async fn resync_job(&self, job_id: i64) -> SyncResult<()> {
        let job = self
            .scheduler
            .jobs()
            .find_by_id(job_id)
            .await?
            .ok_or(SyncError::JobNotFound { id: job_id })?;

        let marked = self.scheduler.mark_queued(&job).await?;
        if let Err(e) = self.queue.enqueue_message(&QueueMessage::sync(job.id)).await {
            if marked {
                self.scheduler.unmark_queued(&job).await?;
            }
            return Err(e);
        }

        info!("{}已加入重新同步队列", job.description());
        Ok(())
    }

    /// 为全部任务投递同步消息，返回投递数量
    pub async fn resync_all(&self) -> SyncResult<usize> {
        let jobs = self.scheduler.jobs().find_all().await?;
        for job in &jobs {
            self.resync_job(job.id).await?;
        }
        info!("已为 {} 个任务投递重新同步消息", jobs.len());
        Ok(jobs.len())
    }
}
