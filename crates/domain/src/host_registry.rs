use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use catalog_core::{
    models::{Host, Job, JobType},
    traits::{CalendarRepository, HostRepository, JobRepository, PropertyRepository},
    SyncError, SyncResult,
};
use tracing::{info, instrument};

/// Host注册服务
///
/// 注册 Host 时为每种同步类型创建一个后台任务；移除 Host 时删除其任务和
/// 全部本地数据。后台任务只会随 Host 一起删除。
pub struct HostRegistry {
    hosts: Arc<dyn HostRepository>,
    jobs: Arc<dyn JobRepository>,
    properties: Arc<dyn PropertyRepository>,
    calendars: Arc<dyn CalendarRepository>,
}

impl HostRegistry {
    pub fn new(
        hosts: Arc<dyn HostRepository>,
        jobs: Arc<dyn JobRepository>,
        properties: Arc<dyn PropertyRepository>,
        calendars: Arc<dyn CalendarRepository>,
    ) -> Self {
        Self {
            hosts,
            jobs,
            properties,
            calendars,
        }
    }

    #[instrument(skip(self, host, schedules), fields(supplier = %host.supplier, identifier = %host.identifier))]
    pub async fn register_host(
        &self,
        host: &Host,
        schedules: &[(JobType, Duration)],
    ) -> SyncResult<(Host, Vec<Job>)> {
        Self::validate(host, schedules)?;

        let host = self.hosts.create(host).await?;
        let mut jobs = Vec::with_capacity(schedules.len());
        for (job_type, interval) in schedules {
            let job = Job::new(host.id, &host.supplier, *job_type, *interval);
            jobs.push(self.jobs.create(&job).await?);
        }

        info!(host_id = host.id, jobs = jobs.len(), "Host注册成功");
        Ok((host, jobs))
    }

    /// 删除 Host 及其任务、房源、日历；Host 不存在时返回 `false`
    #[instrument(skip(self))]
    pub async fn remove_host(&self, host_id: i64) -> SyncResult<bool> {
        if self.hosts.find_by_id(host_id).await?.is_none() {
            return Ok(false);
        }

        let jobs = self.jobs.delete_by_host(host_id).await?;
        let properties = self.properties.delete_by_host(host_id).await?;
        let calendars = self.calendars.delete_by_host(host_id).await?;
        self.hosts.delete(host_id).await?;

        info!(host_id, jobs, properties, calendars, "Host已删除");
        Ok(true)
    }

    fn validate(host: &Host, schedules: &[(JobType, Duration)]) -> SyncResult<()> {
        if host.supplier.trim().is_empty() {
            return Err(SyncError::validation("供应商名称不能为空"));
        }
        if host.identifier.trim().is_empty() {
            return Err(SyncError::validation("Host标识不能为空"));
        }
        if schedules.is_empty() {
            return Err(SyncError::validation("至少需要一个同步任务"));
        }

        let mut seen = HashSet::new();
        for (job_type, interval) in schedules {
            if !seen.insert(*job_type) {
                return Err(SyncError::validation(format!("重复的同步类型: {job_type}")));
            }
            if interval.as_secs() == 0 {
                return Err(SyncError::validation(format!(
                    "{job_type} 同步间隔必须至少为1秒"
                )));
            }
            if interval.as_secs() > Job::MAX_INTERVAL_SECONDS {
                return Err(SyncError::validation(format!(
                    "{job_type} 同步间隔不能超过 {} 秒",
                    Job::MAX_INTERVAL_SECONDS
                )));
            }
        }
        Ok(())
    }
}
