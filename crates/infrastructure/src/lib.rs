pub mod cache;
pub mod database;
pub mod in_memory_queue;
pub mod message_queue;
pub mod message_queue_factory;
pub mod observability;
pub mod sync_queue;

pub use cache::*;
pub use database::*;
pub use in_memory_queue::*;
pub use message_queue::*;
pub use message_queue_factory::*;
pub use observability::*;
pub use sync_queue::*;
