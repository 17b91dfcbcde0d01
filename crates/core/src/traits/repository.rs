//! 数据仓储层接口定义
//!
//! 同步引擎只通过这些窄接口访问持久化层，具体存储技术对引擎透明：
//! - `JobRepository` - 后台任务定义，以及唯一的跨进程并发控制点（状态CAS）
//! - `HostRepository` - 供应商账户
//! - `PropertyRepository` - 本地房源存储
//! - `CalendarRepository` - 房源日历
//! - `SyncRunRepository` - 同步运行审计记录
//!
//! 所有实现必须是 `Send + Sync`，并以 `SyncResult<T>` 返回错误。

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    models::{Calendar, Host, Job, JobStatus, Property, SyncRun},
    SyncResult,
};

/// 后台任务仓储
#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn create(&self, job: &Job) -> SyncResult<Job>;

    async fn find_by_id(&self, id: i64) -> SyncResult<Option<Job>>;

    async fn find_all(&self) -> SyncResult<Vec<Job>>;

    async fn find_by_host(&self, host_id: i64) -> SyncResult<Vec<Job>>;

    /// 指定状态的任务
    async fn find_by_status(&self, statuses: &[JobStatus]) -> SyncResult<Vec<Job>>;

    /// 原子地把状态从 `expected` 之一改为 `new_status`，同时刷新 `updated_at`。
    ///
    /// 返回 `false` 表示当前状态不在 `expected` 中，记录未被修改。
    async fn compare_and_set_status(
        &self,
        id: i64,
        expected: &[JobStatus],
        new_status: JobStatus,
    ) -> SyncResult<bool>;

    /// 仅当任务仍处于 running 时置为 idle 并写入下一次运行时间
    ///
    /// 返回 `false` 表示任务已不在 running（例如已被卡死恢复放回 idle），
    /// 记录未被修改；任务不存在时返回 `JobNotFound`。
    async fn release(&self, id: i64, next_run_at: DateTime<Utc>) -> SyncResult<bool>;

    /// 仅当任务仍处于 `status` 且 `updated_at` 早于 `stale_before` 时放回 idle，
    /// 同时写入 `next_run_at`。
    ///
    /// 陈旧判断和状态切换在同一次条件更新中完成，其他进程刚刚加锁的任务不会被放回。
    async fn recover_stale(
        &self,
        id: i64,
        status: JobStatus,
        stale_before: DateTime<Utc>,
        next_run_at: DateTime<Utc>,
    ) -> SyncResult<bool>;

    async fn delete_by_host(&self, host_id: i64) -> SyncResult<u64>;
}

/// Host仓储
#[async_trait]
pub trait HostRepository: Send + Sync {
    async fn create(&self, host: &Host) -> SyncResult<Host>;

    async fn find_by_id(&self, id: i64) -> SyncResult<Option<Host>>;

    async fn find_all(&self) -> SyncResult<Vec<Host>>;

    async fn delete(&self, id: i64) -> SyncResult<bool>;
}

/// 本地房源存储
#[async_trait]
pub trait PropertyRepository: Send + Sync {
    async fn find_by_host_and_identifier(
        &self,
        host_id: i64,
        identifier: &str,
    ) -> SyncResult<Option<Property>>;

    /// 按 (host_id, identifier) 插入或更新
    async fn upsert(&self, property: &Property) -> SyncResult<Property>;

    async fn delete(&self, host_id: i64, identifier: &str) -> SyncResult<bool>;

    async fn all_identifiers_for_host(&self, host_id: i64) -> SyncResult<Vec<String>>;

    async fn delete_by_host(&self, host_id: i64) -> SyncResult<u64>;
}

/// 房源日历存储
#[async_trait]
pub trait CalendarRepository: Send + Sync {
    /// 整体替换房源日历
    async fn upsert(&self, calendar: &Calendar) -> SyncResult<()>;

    async fn find_by_property(
        &self,
        host_id: i64,
        property_identifier: &str,
    ) -> SyncResult<Option<Calendar>>;

    /// 删除单个房源的日历，不存在时返回 `false`
    async fn delete(&self, host_id: i64, property_identifier: &str) -> SyncResult<bool>;

    async fn delete_by_host(&self, host_id: i64) -> SyncResult<u64>;
}

/// 同步运行记录仓储，记录只追加不修改
#[async_trait]
pub trait SyncRunRepository: Send + Sync {
    async fn create(&self, run: &SyncRun) -> SyncResult<SyncRun>;

    /// 按开始时间倒序返回最近的运行记录
    async fn find_by_host(&self, host_id: i64, limit: i64) -> SyncResult<Vec<SyncRun>>;
}
