//! 队列消费端
//!
//! 从同步队列取出 `sync` 消息并交给派发处理器执行。

pub mod consumer;

pub use consumer::QueueConsumer;
