use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use catalog_core::{
    traits::{Delivery, QueueTransport},
    SyncResult,
};
use tokio::sync::Mutex;
use tracing::debug;

/// 内存消息队列
///
/// 单进程部署和测试使用。取出的消息在删除前保留在 in-flight 表中，
/// 可以通过 [`InMemoryTransport::recover_in_flight`] 放回队列头部。
#[derive(Debug)]
pub struct InMemoryTransport {
    name: String,
    state: Mutex<QueueState>,
}

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<Vec<u8>>,
    in_flight: HashMap<u64, Vec<u8>>,
    next_receipt: u64,
}

impl InMemoryTransport {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(QueueState::default()),
        }
    }

    /// 将所有未删除的消息重新放回队列，返回数量
    pub async fn recover_in_flight(&self) -> usize {
        let mut state = self.state.lock().await;
        let mut receipts: Vec<u64> = state.in_flight.keys().copied().collect();
        receipts.sort_unstable_by(|a, b| b.cmp(a));

        let recovered = receipts.len();
        for receipt in receipts {
            if let Some(body) = state.in_flight.remove(&receipt) {
                state.pending.push_front(body);
            }
        }
        if recovered > 0 {
            debug!("队列 {} 恢复了 {} 条未确认消息", self.name, recovered);
        }
        recovered
    }

    pub async fn in_flight_count(&self) -> usize {
        self.state.lock().await.in_flight.len()
    }
}

#[async_trait]
impl QueueTransport for InMemoryTransport {
    async fn send(&self, body: &[u8]) -> SyncResult<()> {
        self.state.lock().await.pending.push_back(body.to_vec());
        Ok(())
    }

    async fn receive(&self) -> SyncResult<Option<Delivery>> {
        let mut state = self.state.lock().await;
        let Some(body) = state.pending.pop_front() else {
            return Ok(None);
        };

        state.next_receipt += 1;
        let receipt = state.next_receipt;
        state.in_flight.insert(receipt, body.clone());
        Ok(Some(Delivery { body, receipt }))
    }

    async fn delete(&self, delivery: &Delivery) -> SyncResult<()> {
        self.state.lock().await.in_flight.remove(&delivery.receipt);
        Ok(())
    }

    async fn size(&self) -> SyncResult<u32> {
        Ok(self.state.lock().await.pending.len() as u32)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fifo_and_delete() {
        let queue = InMemoryTransport::new("catalog_sync");
        queue.send(b"first").await.unwrap();
        queue.send(b"second").await.unwrap();
        assert_eq!(queue.size().await.unwrap(), 2);

        let delivery = queue.receive().await.unwrap().unwrap();
        assert_eq!(delivery.body, b"first");
        assert_eq!(queue.size().await.unwrap(), 1);
        assert_eq!(queue.in_flight_count().await, 1);

        queue.delete(&delivery).await.unwrap();
        assert_eq!(queue.in_flight_count().await, 0);
    }

    #[tokio::test]
    async fn test_receive_on_empty_queue() {
        let queue = InMemoryTransport::new("catalog_sync");
        assert!(queue.receive().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_recover_in_flight_preserves_order() {
        let queue = InMemoryTransport::new("catalog_sync");
        for body in [b"a", b"b", b"c"] {
            queue.send(body).await.unwrap();
        }
        queue.receive().await.unwrap();
        queue.receive().await.unwrap();

        assert_eq!(queue.recover_in_flight().await, 2);
        assert_eq!(queue.size().await.unwrap(), 3);

        let order: Vec<Vec<u8>> = vec![
            queue.receive().await.unwrap().unwrap().body,
            queue.receive().await.unwrap().unwrap().body,
            queue.receive().await.unwrap().unwrap().body,
        ];
        assert_eq!(order, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    }
}
