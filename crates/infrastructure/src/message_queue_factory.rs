use std::sync::Arc;

use catalog_core::{
    config::{MessageQueueConfig, MessageQueueType},
    traits::QueueTransport,
    SyncResult,
};
use tracing::{debug, info};

use crate::{InMemoryTransport, RabbitMqTransport};

pub struct MessageQueueFactory;

impl MessageQueueFactory {
    pub async fn create(config: &MessageQueueConfig) -> SyncResult<Arc<dyn QueueTransport>> {
        debug!("Creating message queue with type: {:?}", config.r#type);

        match config.r#type {
            MessageQueueType::Rabbitmq => {
                info!("Initializing RabbitMQ message queue");
                Ok(Arc::new(RabbitMqTransport::new(config).await?))
            }
            MessageQueueType::InMemory => {
                info!("Initializing in-memory message queue");
                Ok(Arc::new(InMemoryTransport::new(config.queue_name.clone())))
            }
        }
    }
}
