pub mod app_config;
pub mod cache;
pub mod database;
pub mod message_queue;
pub mod observability;
pub mod scheduler_worker;

pub use app_config::AppConfig;
pub use cache::{CacheBackend, CacheConfig, RedisConfig};
pub use database::DatabaseConfig;
pub use message_queue::{MessageQueueConfig, MessageQueueType};
pub use observability::ObservabilityConfig;
pub use scheduler_worker::{SchedulerConfig, WorkerConfig};
