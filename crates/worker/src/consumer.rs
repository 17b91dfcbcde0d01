use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, error, info, instrument, warn};

use catalog_core::{
    config::WorkerConfig,
    models::{Operation, QueueMessage},
    StructuredLogger, SyncError, SyncResult,
};
use catalog_dispatcher::{DispatchOutcome, DispatchProcessor};
use catalog_infrastructure::{MetricsCollector, SyncQueue};

/// 同步队列消费者
///
/// 消息在处理前已从队列删除。只有在任务加锁之前发生、且可重试的基础设施错误
/// 才会重新入队，次数记录在消息数据的 `attempts` 字段中。
pub struct QueueConsumer {
    worker_id: String,
    queue: SyncQueue,
    processor: Arc<DispatchProcessor>,
    max_redeliveries: u32,
    poll_interval: Duration,
    metrics: Arc<MetricsCollector>,
}

impl QueueConsumer {
    pub fn new(
        config: &WorkerConfig,
        queue: SyncQueue,
        processor: Arc<DispatchProcessor>,
        poll_interval: Duration,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        let worker_id = config
            .worker_id
            .clone()
            .unwrap_or_else(Self::default_worker_id);

        Self {
            worker_id,
            queue,
            processor,
            max_redeliveries: config.max_redeliveries,
            poll_interval,
            metrics,
        }
    }

    /// `<主机名>-<进程ID>`
    pub fn default_worker_id() -> String {
        let host = hostname::get()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "worker".to_string());
        format!("{}-{}", host, std::process::id())
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// 处理一条已解码的消息
    #[instrument(skip(self, message), fields(worker_id = %self.worker_id, operation = %message.operation))]
    pub async fn handle(&self, message: QueueMessage) -> SyncResult<()> {
        match message.operation {
            Operation::Sync => self.handle_sync(message).await,
        }
    }

    async fn handle_sync(&self, message: QueueMessage) -> SyncResult<()> {
        let job_id = message.job_id()?;

        match self.processor.process(job_id).await {
            Ok(DispatchOutcome::Completed(run)) => {
                debug!(job_id, run_id = run.id, successful = run.successful, "同步消息处理完成");
                Ok(())
            }
            Ok(DispatchOutcome::LockDenied) => {
                debug!(job_id, "任务正在运行，忽略同步消息");
                Ok(())
            }
            Ok(DispatchOutcome::TimedOut) => {
                warn!(job_id, "同步任务超时");
                Ok(())
            }
            Ok(DispatchOutcome::Failed(e)) => Err(e),
            Err(e) => {
                self.redeliver(message, job_id, &e).await;
                Err(e)
            }
        }
    }

    /// 加锁前的可重试错误重新入队，超过上限后放弃
    async fn redeliver(&self, message: QueueMessage, job_id: i64, error: &SyncError) {
        let attempts = message.attempts();
        if !error.is_retryable() {
            return;
        }
        if attempts >= self.max_redeliveries {
            warn!(job_id, attempts, "超过最大重新投递次数，放弃消息");
            return;
        }

        let retry = message.with_attempts(attempts + 1);
        match self.queue.enqueue_message(&retry).await {
            Ok(()) => {
                StructuredLogger::log_message_redelivered(job_id, attempts + 1, &error.to_string());
                self.metrics.record_message_redelivered();
            }
            Err(e) => error!(job_id, error = %e, "重新投递消息失败"),
        }
    }

    /// 处理队列中的下一条消息，队列为空时返回 `Ok(false)`
    pub async fn poll_once(&self) -> SyncResult<bool> {
        self.queue.poll_once(|message| self.handle(message)).await
    }

    /// 消费循环，正在处理的消息不会被关闭信号打断
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!("Worker {} 开始消费队列 {}", self.worker_id, self.queue.name());

        loop {
            if !matches!(shutdown_rx.try_recv(), Err(TryRecvError::Empty)) {
                break;
            }

            match self.poll_once().await {
                Ok(true) => continue,
                Ok(false) => {}
                Err(e) => error!(worker_id = %self.worker_id, error = %e, "处理队列消息失败"),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = shutdown_rx.recv() => break,
            }
        }

        info!("Worker {} 已停止消费", self.worker_id);
    }
}
