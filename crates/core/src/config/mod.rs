//! 配置管理
//!
//! 配置按段组织（database、message_queue、cache、scheduler、worker、
//! observability），每段都有默认值和 `validate()`。加载入口为
//! [`AppConfig::load`]。

pub mod models;

pub use models::*;
