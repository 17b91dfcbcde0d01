use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use catalog_core::{
    models::{Operation, QueueMessage},
    traits::{Delivery, QueueTransport},
    StructuredLogger, SyncResult,
};
use serde_json::{Map, Value};
use tracing::{debug, instrument};

use crate::observability::MetricsCollector;

/// 同步消息队列
///
/// 在传输层之上完成操作校验和序列化。消息在取出后、调用处理函数之前删除，
/// 因此对应用层是至多一次语义；需要重试的消费者自行重新入队。
#[derive(Clone)]
pub struct SyncQueue {
    transport: Arc<dyn QueueTransport>,
    poll_interval: Duration,
    metrics: Arc<MetricsCollector>,
}

impl SyncQueue {
    pub fn new(transport: Arc<dyn QueueTransport>, poll_interval: Duration) -> Self {
        Self {
            transport,
            poll_interval,
            metrics: Arc::new(MetricsCollector::new()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn name(&self) -> &str {
        self.transport.name()
    }

    /// 校验操作名后发送；未知操作返回校验错误且不会访问传输层
    #[instrument(skip(self, data), fields(queue = %self.transport.name()))]
    pub async fn enqueue(&self, operation: &str, data: Map<String, Value>) -> SyncResult<()> {
        let operation = operation.parse::<Operation>()?;
        self.enqueue_message(&QueueMessage::new(operation, data))
            .await
    }

    pub async fn enqueue_message(&self, message: &QueueMessage) -> SyncResult<()> {
        let body = message.to_bytes()?;
        let result = self.transport.send(&body).await;
        self.metrics
            .record_queue_operation("send", result.is_ok());
        result?;

        debug!("消息已入队: {}", message.operation);
        Ok(())
    }

    /// 阻塞直到取到一条消息，删除后交给 `handler`
    ///
    /// 处理函数的错误原样返回给调用方。
    pub async fn poll<F, Fut>(&self, handler: F) -> SyncResult<()>
    where
        F: FnOnce(QueueMessage) -> Fut,
        Fut: Future<Output = SyncResult<()>>,
    {
        let delivery = loop {
            match self.receive().await? {
                Some(delivery) => break delivery,
                None => tokio::time::sleep(self.poll_interval).await,
            }
        };
        self.dispatch(delivery, handler).await
    }

    /// 非阻塞版本的 [`SyncQueue::poll`]，队列为空时返回 `Ok(false)`
    pub async fn poll_once<F, Fut>(&self, handler: F) -> SyncResult<bool>
    where
        F: FnOnce(QueueMessage) -> Fut,
        Fut: Future<Output = SyncResult<()>>,
    {
        match self.receive().await? {
            Some(delivery) => self.dispatch(delivery, handler).await.map(|_| true),
            None => Ok(false),
        }
    }

    pub async fn size(&self) -> SyncResult<u32> {
        let size = self.transport.size().await?;
        self.metrics.update_queue_depth(size as f64);
        Ok(size)
    }

    async fn receive(&self) -> SyncResult<Option<Delivery>> {
        let result = self.transport.receive().await;
        if result.is_err() {
            self.metrics.record_queue_operation("receive", false);
        }
        result
    }

    async fn dispatch<F, Fut>(&self, delivery: Delivery, handler: F) -> SyncResult<()>
    where
        F: FnOnce(QueueMessage) -> Fut,
        Fut: Future<Output = SyncResult<()>>,
    {
        let deleted = self.transport.delete(&delivery).await;
        self.metrics
            .record_queue_operation("delete", deleted.is_ok());
        deleted?;

        let message = match QueueMessage::from_bytes(&delivery.body) {
            Ok(message) => message,
            Err(e) => {
                StructuredLogger::log_message_rejected(&e.to_string());
                self.metrics.record_message_rejected();
                return Err(e);
            }
        };

        handler(message).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_core::SyncError;
    use catalog_testing_utils::MockQueueTransport;
    use serde_json::json;
    use std::sync::Mutex;

    fn queue() -> (SyncQueue, MockQueueTransport) {
        let transport = MockQueueTransport::new();
        let queue = SyncQueue::new(Arc::new(transport.clone()), Duration::from_millis(10));
        (queue, transport)
    }

    fn job_data(job_id: i64) -> Map<String, Value> {
        match json!({ "job_id": job_id }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_unknown_operation_is_not_sent() {
        let (queue, transport) = queue();
        let err = queue.enqueue("unknown_op", Map::new()).await.unwrap_err();

        assert!(matches!(err, SyncError::UnknownOperation(_)));
        assert_eq!(transport.sent_count(), 0);
    }

    #[tokio::test]
    async fn test_enqueue_then_poll() {
        let (queue, transport) = queue();
        queue.enqueue("sync", job_data(42)).await.unwrap();
        assert_eq!(transport.sent_count(), 1);
        assert_eq!(queue.size().await.unwrap(), 1);

        let received = Arc::new(Mutex::new(None));
        let sink = received.clone();
        queue
            .poll(|message| async move {
                *sink.lock().unwrap() = Some(message);
                Ok(())
            })
            .await
            .unwrap();

        let message = received.lock().unwrap().take().unwrap();
        assert_eq!(message.operation, Operation::Sync);
        assert_eq!(message.job_id().unwrap(), 42);
        assert_eq!(transport.deleted().len(), 1);
        assert_eq!(transport.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_handler_error_is_returned_after_delete() {
        let (queue, transport) = queue();
        queue.enqueue("sync", job_data(1)).await.unwrap();

        let err = queue
            .poll(|_| async { Err(SyncError::upstream("500", "down")) })
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Upstream { .. }));
        assert_eq!(transport.deleted().len(), 1);
        assert_eq!(transport.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_garbage_body_is_deleted_and_rejected() {
        let (queue, transport) = queue();
        transport.push_raw(br#"{"operation": "drop_tables", "data": {}}"#);

        let called = Arc::new(Mutex::new(false));
        let flag = called.clone();
        let err = queue
            .poll(|_| async move {
                *flag.lock().unwrap() = true;
                Ok(())
            })
            .await
            .unwrap_err();

        assert!(err.is_validation());
        assert!(!*called.lock().unwrap());
        assert_eq!(transport.deleted().len(), 1);
    }

    #[tokio::test]
    async fn test_poll_waits_for_a_message() {
        let (queue, transport) = queue();
        let producer = transport.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            producer.push_raw(&QueueMessage::sync(7).to_bytes().unwrap());
        });

        let result = tokio::time::timeout(
            Duration::from_secs(2),
            queue.poll(|message| async move {
                assert_eq!(message.job_id().unwrap(), 7);
                Ok(())
            }),
        )
        .await;
        assert!(matches!(result, Ok(Ok(()))));
    }

    #[tokio::test]
    async fn test_poll_once_on_empty_queue() {
        let (queue, _) = queue();
        let handled = queue.poll_once(|_| async { Ok(()) }).await.unwrap();
        assert!(!handled);
    }

    #[tokio::test]
    async fn test_send_failure_propagates() {
        let (queue, transport) = queue();
        transport.fail_sends(true);
        let err = queue.enqueue("sync", job_data(1)).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
