//! # 供应商接入接口
//!
//! 每个供应商的协议客户端和数据映射规则都在本仓库之外实现，引擎只通过
//! [`ProviderFetcher`] 与它们交互。[`MetadataSync`] 和 [`AvailabilitySync`]
//! 是驱动任意 `ProviderFetcher` 完成一次同步的通用处理器。

use std::sync::Arc;

use async_trait::async_trait;
use catalog_core::{
    models::{CalendarEntry, Host, Job, JobType, SyncRun},
    traits::{CalendarRepository, HostRepository, PropertyRepository, SyncRunRepository},
    SyncError, SyncResult,
};
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::sync::{CalendarSyncSession, PropertySyncSession};

/// 供应商侧列出的房源
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteProperty {
    pub identifier: String,
    /// 列表接口返回的原始数据
    pub payload: Value,
}

impl RemoteProperty {
    pub fn new(identifier: impl Into<String>, payload: Value) -> Self {
        Self {
            identifier: identifier.into(),
            payload,
        }
    }
}

/// 供应商数据拉取接口
///
/// 返回的错误应使用 [`SyncError::Upstream`] 携带供应商错误码。
#[async_trait]
pub trait ProviderFetcher: Send + Sync {
    /// 供应商名称，与 `Job::supplier` 对应
    fn supplier(&self) -> &str;

    /// 列出 Host 在供应商侧的全部房源
    async fn fetch_properties(&self, host: &Host) -> SyncResult<Vec<RemoteProperty>>;

    /// 获取单个房源映射后的完整数据，默认直接使用列表数据
    async fn fetch_property_details(
        &self,
        _host: &Host,
        property: &RemoteProperty,
    ) -> SyncResult<Value> {
        Ok(property.payload.clone())
    }

    /// 房源级校验，返回跳过原因
    fn validate(&self, _property: &RemoteProperty) -> Option<String> {
        None
    }

    async fn fetch_calendar(
        &self,
        host: &Host,
        property_identifier: &str,
    ) -> SyncResult<Vec<CalendarEntry>>;
}

/// 某一同步类型的执行入口
#[async_trait]
pub trait SyncHandler: Send + Sync {
    fn job_type(&self) -> JobType;

    /// 执行一次完整同步并返回已持久化的运行记录
    ///
    /// 批次级失败会体现在 `SyncRun::successful` 上；只有无法开始或无法
    /// 持久化运行记录时才返回错误。
    async fn synchronise(&self, job: &Job) -> SyncResult<SyncRun>;
}

/// 同步处理器使用的存储集合
#[derive(Clone)]
pub struct CatalogStores {
    pub hosts: Arc<dyn HostRepository>,
    pub properties: Arc<dyn PropertyRepository>,
    pub calendars: Arc<dyn CalendarRepository>,
    pub runs: Arc<dyn SyncRunRepository>,
}

impl CatalogStores {
    async fn load_host(&self, job: &Job) -> SyncResult<Host> {
        self.hosts
            .find_by_id(job.host_id)
            .await?
            .ok_or(SyncError::HostNotFound { id: job.host_id })
    }
}

/// 房源元数据同步处理器
pub struct MetadataSync {
    fetcher: Arc<dyn ProviderFetcher>,
    stores: CatalogStores,
}

impl MetadataSync {
    pub fn new(fetcher: Arc<dyn ProviderFetcher>, stores: CatalogStores) -> Self {
        Self { fetcher, stores }
    }
}

#[async_trait]
impl SyncHandler for MetadataSync {
    fn job_type(&self) -> JobType {
        JobType::Metadata
    }

    #[instrument(skip(self, job), fields(job_id = job.id, host_id = job.host_id))]
    async fn synchronise(&self, job: &Job) -> SyncResult<SyncRun> {
        let host = self.stores.load_host(job).await?;
        let mut session = PropertySyncSession::new(
            host.id,
            self.stores.properties.clone(),
            self.stores.calendars.clone(),
            self.stores.runs.clone(),
        );

        let remote = match session
            .new_context(|| self.fetcher.fetch_properties(&host))
            .await
        {
            Ok(remote) => remote,
            Err(e) => {
                warn!(supplier = %self.fetcher.supplier(), error = %e, "拉取房源列表失败");
                return session.finish().await;
            }
        };
        info!(count = remote.len(), "拉取房源列表成功");

        for property in &remote {
            if let Some(reason) = self.fetcher.validate(property) {
                session.skip_property(&property.identifier, &reason)?;
                continue;
            }
            session
                .start(&property.identifier, || {
                    self.fetcher.fetch_property_details(&host, property)
                })
                .await?;
        }

        session.finish().await
    }
}

/// 房态日历同步处理器，覆盖本地已存在的全部房源
pub struct AvailabilitySync {
    fetcher: Arc<dyn ProviderFetcher>,
    stores: CatalogStores,
}

impl AvailabilitySync {
    pub fn new(fetcher: Arc<dyn ProviderFetcher>, stores: CatalogStores) -> Self {
        Self { fetcher, stores }
    }
}

#[async_trait]
impl SyncHandler for AvailabilitySync {
    fn job_type(&self) -> JobType {
        JobType::Availabilities
    }

    #[instrument(skip(self, job), fields(job_id = job.id, host_id = job.host_id))]
    async fn synchronise(&self, job: &Job) -> SyncResult<SyncRun> {
        let host = self.stores.load_host(job).await?;
        let mut session = CalendarSyncSession::new(
            host.id,
            self.stores.calendars.clone(),
            self.stores.runs.clone(),
        );

        let identifiers = match session
            .new_context(|| self.stores.properties.all_identifiers_for_host(host.id))
            .await
        {
            Ok(identifiers) => identifiers,
            Err(e) => {
                warn!(error = %e, "读取本地房源失败");
                return session.finish().await;
            }
        };

        for identifier in &identifiers {
            session
                .start(identifier, || self.fetcher.fetch_calendar(&host, identifier))
                .await?;
        }

        session.finish().await
    }
}
