use async_trait::async_trait;

use crate::SyncResult;

/// 从传输层取出但尚未删除的消息
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub body: Vec<u8>,
    /// 删除消息时使用的回执
    pub receipt: u64,
}

/// 消息队列传输层抽象
///
/// 传输层保证至少一次投递：消息在被 `delete` 之前可能再次投递给其他消费者。
#[async_trait]
pub trait QueueTransport: Send + Sync {
    /// 发送一条已序列化的消息
    async fn send(&self, body: &[u8]) -> SyncResult<()>;

    /// 非阻塞地取出一条消息，队列为空时返回 `None`
    async fn receive(&self) -> SyncResult<Option<Delivery>>;

    /// 从传输层删除消息
    async fn delete(&self, delivery: &Delivery) -> SyncResult<()>;

    /// 当前队列中的消息数量
    async fn size(&self) -> SyncResult<u32>;

    fn name(&self) -> &str;
}
