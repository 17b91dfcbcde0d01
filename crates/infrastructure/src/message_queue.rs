use std::time::Duration;

use async_trait::async_trait;
use catalog_core::{
    config::MessageQueueConfig,
    traits::{Delivery, QueueTransport},
    SyncError, SyncResult,
};
use lapin::{
    options::*, types::FieldTable, BasicProperties, Channel, Connection, ConnectionProperties,
    Queue,
};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// RabbitMQ传输层
///
/// 使用单个通道完成收发和确认，delivery tag 只在同一通道内有效。
pub struct RabbitMqTransport {
    connection: Connection,
    channel: Mutex<Channel>,
    queue_name: String,
}

impl RabbitMqTransport {
    /// 连接RabbitMQ并声明持久化队列
    pub async fn new(config: &MessageQueueConfig) -> SyncResult<Self> {
        let connect = Connection::connect(&config.url, ConnectionProperties::default());
        let connection = tokio::time::timeout(
            Duration::from_secs(config.connection_timeout_seconds),
            connect,
        )
        .await
        .map_err(|_| {
            SyncError::MessageQueue(format!(
                "连接RabbitMQ超时 ({}秒)",
                config.connection_timeout_seconds
            ))
        })?
        .map_err(|e| SyncError::MessageQueue(format!("连接RabbitMQ失败: {e}")))?;

        let channel = connection
            .create_channel()
            .await
            .map_err(|e| SyncError::MessageQueue(format!("创建通道失败: {e}")))?;

        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(|e| SyncError::MessageQueue(format!("开启发布确认失败: {e}")))?;

        Self::declare_queue(&channel, &config.queue_name, false).await?;
        info!("成功连接到RabbitMQ，队列: {}", config.queue_name);

        Ok(Self {
            connection,
            channel: Mutex::new(channel),
            queue_name: config.queue_name.clone(),
        })
    }

    async fn declare_queue(channel: &Channel, queue_name: &str, passive: bool) -> SyncResult<Queue> {
        let queue = channel
            .queue_declare(
                queue_name,
                QueueDeclareOptions {
                    passive,
                    durable: true,
                    exclusive: false,
                    auto_delete: false,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| {
                SyncError::MessageQueue(format!("声明队列 {queue_name} 失败: {e}"))
            })?;

        debug!("队列 {} 声明成功", queue_name);
        Ok(queue)
    }

    pub fn is_connected(&self) -> bool {
        self.connection.status().connected()
    }

    pub async fn close(&self) -> SyncResult<()> {
        self.connection
            .close(200, "正常关闭")
            .await
            .map_err(|e| SyncError::MessageQueue(format!("关闭连接失败: {e}")))?;

        info!("RabbitMQ连接已关闭");
        Ok(())
    }
}

#[async_trait]
impl QueueTransport for RabbitMqTransport {
    async fn send(&self, body: &[u8]) -> SyncResult<()> {
        let channel = self.channel.lock().await;
        let confirm = channel
            .basic_publish(
                "",
                &self.queue_name,
                BasicPublishOptions::default(),
                body,
                BasicProperties::default().with_delivery_mode(2), // 2 = persistent
            )
            .await
            .map_err(|e| {
                SyncError::MessageQueue(format!("发布消息到队列 {} 失败: {e}", self.queue_name))
            })?;

        confirm
            .await
            .map_err(|e| SyncError::MessageQueue(format!("消息发布确认失败: {e}")))?;

        debug!("消息已发布到队列: {}", self.queue_name);
        Ok(())
    }

    async fn receive(&self) -> SyncResult<Option<Delivery>> {
        let channel = self.channel.lock().await;
        let message = channel
            .basic_get(&self.queue_name, BasicGetOptions::default())
            .await
            .map_err(|e| {
                SyncError::MessageQueue(format!("从队列 {} 获取消息失败: {e}", self.queue_name))
            })?;

        Ok(message.map(|message| Delivery {
            body: message.delivery.data.clone(),
            receipt: message.delivery.delivery_tag,
        }))
    }

    async fn delete(&self, delivery: &Delivery) -> SyncResult<()> {
        let channel = self.channel.lock().await;
        channel
            .basic_ack(delivery.receipt, BasicAckOptions::default())
            .await
            .map_err(|e| SyncError::MessageQueue(format!("确认消息失败: {e}")))?;
        Ok(())
    }

    async fn size(&self) -> SyncResult<u32> {
        let channel = self.channel.lock().await;
        let queue = Self::declare_queue(&channel, &self.queue_name, true).await?;
        Ok(queue.message_count())
    }

    fn name(&self) -> &str {
        &self.queue_name
    }
}
