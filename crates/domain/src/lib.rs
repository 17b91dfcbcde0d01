//! # 同步领域层
//!
//! - [`sync`]: 房源元数据与房态日历的同步会话
//! - [`provider`]: 供应商拉取接口与通用同步处理器
//! - [`registry`]: 按供应商和同步类型解析处理器
//! - [`host_registry`]: Host 注册与移除

pub mod host_registry;
pub mod provider;
pub mod registry;
pub mod sync;

pub use host_registry::HostRegistry;
pub use provider::{
    AvailabilitySync, CatalogStores, MetadataSync, ProviderFetcher, RemoteProperty, SyncHandler,
};
pub use registry::HandlerRegistry;
pub use sync::{CalendarSyncSession, PropertySyncSession};
