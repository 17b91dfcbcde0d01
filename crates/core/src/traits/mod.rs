pub mod cache_store;
pub mod message_queue;
pub mod repository;

pub use cache_store::*;
pub use message_queue::*;
pub use repository::*;
