//! 多供应商房源目录同步系统
//!
//! 二进制入口之外，嵌入方可以直接使用 [`app::Application`] 注册自己的
//! 供应商拉取实现。

pub mod app;
pub mod shutdown;

pub use app::{AppMode, Application};
pub use shutdown::ShutdownManager;
