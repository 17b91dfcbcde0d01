use std::collections::HashMap;
use std::sync::Arc;

use catalog_core::{
    models::{Job, JobType},
    SyncError, SyncResult,
};
use tracing::info;

use crate::provider::{AvailabilitySync, CatalogStores, MetadataSync, ProviderFetcher, SyncHandler};

/// 同步处理器注册表，按 (供应商, 同步类型) 解析处理器
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<(String, JobType), Arc<dyn SyncHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册单个处理器，同一 (供应商, 类型) 重复注册时覆盖旧值
    pub fn register(&mut self, supplier: &str, handler: Arc<dyn SyncHandler>) {
        let job_type = handler.job_type();
        info!(supplier, job_type = %job_type, "注册同步处理器");
        self.handlers
            .insert((supplier.to_string(), job_type), handler);
    }

    /// 为供应商注册元数据和房态两种通用处理器
    pub fn register_provider(&mut self, fetcher: Arc<dyn ProviderFetcher>, stores: &CatalogStores) {
        let supplier = fetcher.supplier().to_string();
        self.register(
            &supplier,
            Arc::new(MetadataSync::new(fetcher.clone(), stores.clone())),
        );
        self.register(
            &supplier,
            Arc::new(AvailabilitySync::new(fetcher, stores.clone())),
        );
    }

    pub fn resolve(&self, job: &Job) -> SyncResult<Arc<dyn SyncHandler>> {
        self.handlers
            .get(&(job.supplier.clone(), job.job_type))
            .cloned()
            .ok_or_else(|| {
                SyncError::config_error(format!(
                    "没有为供应商 {} 注册 {} 同步处理器",
                    job.supplier, job.job_type
                ))
            })
    }

    pub fn suppliers(&self) -> Vec<String> {
        let mut suppliers: Vec<String> = self
            .handlers
            .keys()
            .map(|(supplier, _)| supplier.clone())
            .collect();
        suppliers.sort();
        suppliers.dedup();
        suppliers
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
