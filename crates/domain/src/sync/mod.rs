//! # 同步会话
//!
//! 一次同步会话对应一次“远端实体 → 本地存储”的对账运行。会话逐个处理实体，
//! 单个实体的失败只会被记录为跳过，不会影响同批次的其他实体；会话结束时
//! 按需清理本次未出现的本地实体，并持久化一条不可变的运行记录。
//!
//! 状态流转：created →（每个实体：started → succeeded | failed | skipped）* → finished。
//! 结束之后的任何操作都返回 [`SyncError::SessionFinished`]。

pub mod calendar_sync;
pub mod property_sync;

pub use calendar_sync::CalendarSyncSession;
pub use property_sync::PropertySyncSession;

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use catalog_core::{
    models::{JobType, RunStats, SkippedEntities, SyncRun},
    traits::SyncRunRepository,
    StructuredLogger, SyncError, SyncResult,
};
use chrono::{DateTime, Utc};

/// 两种会话共享的批次级状态
struct SessionCore {
    host_id: i64,
    runs: Arc<dyn SyncRunRepository>,
    started_at: DateTime<Utc>,
    failed: bool,
    purge_skipped: bool,
    finished: bool,
    skipped_ids: HashSet<String>,
}

impl SessionCore {
    fn new(host_id: i64, runs: Arc<dyn SyncRunRepository>) -> Self {
        Self {
            host_id,
            runs,
            started_at: Utc::now(),
            failed: false,
            purge_skipped: false,
            finished: false,
            skipped_ids: HashSet::new(),
        }
    }

    fn ensure_open(&self) -> SyncResult<()> {
        if self.finished {
            return Err(SyncError::SessionFinished);
        }
        Ok(())
    }

    fn record_skip(
        &mut self,
        id: &str,
        reason: &str,
        skipped: &mut u64,
        skipped_entities: &mut Vec<SkippedEntities>,
    ) {
        *skipped += 1;
        catalog_core::models::record_skip(skipped_entities, id, reason);
        self.skipped_ids.insert(id.to_string());
        StructuredLogger::log_entity_skipped(self.host_id, id, reason);
    }

    async fn new_context<T, F, Fut>(&mut self, block: F) -> SyncResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = SyncResult<T>>,
    {
        self.ensure_open()?;
        match block().await {
            Ok(value) => Ok(value),
            Err(e) => {
                self.failed = true;
                self.purge_skipped = true;
                Err(e)
            }
        }
    }

    /// 写入运行记录，会话在调用前已经被标记为结束
    async fn persist(&self, job_type: JobType, stats: RunStats) -> SyncResult<SyncRun> {
        debug_assert_eq!(stats.job_type(), job_type);
        let finished_at = Utc::now().max(self.started_at);
        let run = SyncRun {
            id: 0,
            host_id: self.host_id,
            job_type,
            started_at: self.started_at,
            finished_at,
            successful: !self.failed,
            stats,
        };

        let stored = self.runs.create(&run).await?;
        StructuredLogger::log_run_finished(&stored);
        Ok(stored)
    }
}
