//! 调度与派发
//!
//! - [`scheduler`]: 任务加锁、解锁、超时和卡死恢复
//! - [`processor`]: 单个任务的派发流程
//! - [`tick`]: 周期性扫描到期任务
//! - [`trigger`]: 手动重新同步

pub mod processor;
pub mod scheduler;
pub mod tick;
pub mod trigger;

pub use processor::{DispatchOutcome, DispatchProcessor};
pub use scheduler::JobScheduler;
pub use tick::{SchedulerTick, TickReport};
pub use trigger::ResyncTrigger;
