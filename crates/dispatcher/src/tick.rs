use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use rand::Rng;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use catalog_core::{
    config::SchedulerConfig,
    models::{Job, QueueMessage},
    SyncResult,
};
use catalog_infrastructure::SyncQueue;

use crate::processor::{DispatchOutcome, DispatchProcessor};
use crate::scheduler::JobScheduler;

/// 一次 tick 的汇总
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub recovered: usize,
    pub due: usize,
    pub enqueued: usize,
    pub completed: usize,
    pub failed: usize,
    pub lock_denied: usize,
    pub timed_out: usize,
    pub errors: usize,
}

impl TickReport {
    fn record(&mut self, result: &SyncResult<DispatchOutcome>) {
        match result {
            Ok(DispatchOutcome::Completed(_)) => self.completed += 1,
            Ok(DispatchOutcome::Failed(_)) => self.failed += 1,
            Ok(DispatchOutcome::LockDenied) => self.lock_denied += 1,
            Ok(DispatchOutcome::TimedOut) => self.timed_out += 1,
            Err(_) => self.errors += 1,
        }
    }
}

/// 周期性扫描到期任务
///
/// 直接在本进程中并发执行（上限 `max_concurrent_jobs`），或者标记为 queued
/// 后投递到同步队列交给 worker 执行。
pub struct SchedulerTick {
    scheduler: Arc<JobScheduler>,
    processor: Arc<DispatchProcessor>,
    queue: Option<SyncQueue>,
    config: SchedulerConfig,
}

impl SchedulerTick {
    pub fn new(
        scheduler: Arc<JobScheduler>,
        processor: Arc<DispatchProcessor>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            scheduler,
            processor,
            queue: None,
            config,
        }
    }

    /// 通过队列派发到期任务
    pub fn with_queue(mut self, queue: SyncQueue) -> Self {
        self.queue = Some(queue);
        self
    }

    pub async fn tick(&self, now: DateTime<Utc>) -> SyncResult<TickReport> {
        let mut report = TickReport {
            recovered: self
                .scheduler
                .recover_stuck(now, Duration::from_secs(self.config.stale_after_seconds))
                .await?
                .len(),
            ..Default::default()
        };

        let due = self.scheduler.due_jobs(now).await?;
        report.due = due.len();
        if due.is_empty() {
            return Ok(report);
        }

        match &self.queue {
            Some(queue) => {
                for job in &due {
                    if self.enqueue(queue, job).await? {
                        report.enqueued += 1;
                    }
                }
            }
            None => {
                let results: Vec<SyncResult<DispatchOutcome>> = stream::iter(due)
                    .map(|job| {
                        let processor = Arc::clone(&self.processor);
                        async move { processor.process_job(&job).await }
                    })
                    .buffer_unordered(self.config.max_concurrent_jobs.max(1))
                    .collect()
                    .await;

                for result in &results {
                    if let Err(e) = result {
                        error!(error = %e, "派发任务失败");
                    }
                    report.record(result);
                }
            }
        }

        info!(
            due = report.due,
            enqueued = report.enqueued,
            completed = report.completed,
            failed = report.failed,
            "调度tick完成"
        );
        Ok(report)
    }

    /// 标记为 queued 并入队；入队失败时撤销标记并返回错误
    async fn enqueue(&self, queue: &SyncQueue, job: &Job) -> SyncResult<bool> {
        if !self.scheduler.mark_queued(job).await? {
            debug!("任务 {} 已被其他调度器处理", job.id);
            return Ok(false);
        }

        if let Err(e) = queue.enqueue_message(&QueueMessage::sync(job.id)).await {
            self.scheduler.unmark_queued(job).await?;
            return Err(e);
        }
        Ok(true)
    }

    /// 带随机抖动的 tick 间隔，避免多个调度进程同时触发
    pub fn next_delay(&self) -> Duration {
        let jitter = if self.config.tick_jitter_ms == 0 {
            0
        } else {
            rand::rng().random_range(0..=self.config.tick_jitter_ms)
        };
        Duration::from_secs(self.config.tick_interval_seconds) + Duration::from_millis(jitter)
    }

    /// 运行调度循环直到收到关闭信号
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!(
            "调度循环启动，间隔 {} 秒",
            self.config.tick_interval_seconds
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.next_delay()) => {
                    if let Err(e) = self.tick(Utc::now()).await {
                        warn!(error = %e, "调度tick失败");
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("调度循环收到关闭信号");
                    break;
                }
            }
        }
    }
}
