use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use catalog_core::{
    models::{JobType, MetadataStats, Property, RunStats, SyncRun},
    traits::{CalendarRepository, PropertyRepository, SyncRunRepository},
    SyncResult,
};
use serde_json::Value;
use tracing::{debug, warn};

use super::SessionCore;

/// 房源元数据同步会话
///
/// 会话独占自己的统计累加器，实体按顺序处理。
pub struct PropertySyncSession {
    core: SessionCore,
    properties: Arc<dyn PropertyRepository>,
    calendars: Arc<dyn CalendarRepository>,
    stats: MetadataStats,
    touched: HashSet<String>,
}

impl PropertySyncSession {
    pub fn new(
        host_id: i64,
        properties: Arc<dyn PropertyRepository>,
        calendars: Arc<dyn CalendarRepository>,
        runs: Arc<dyn SyncRunRepository>,
    ) -> Self {
        Self {
            core: SessionCore::new(host_id, runs),
            properties,
            calendars,
            stats: MetadataStats::default(),
            touched: HashSet::new(),
        }
    }

    /// 处理单个实体
    ///
    /// `block` 返回映射后的房源数据，由会话负责写入本地存储。新建还是更新
    /// 取决于调用时本地是否已存在该标识。任何失败（查询、`block`、写入）
    /// 都只会把该实体记为跳过，返回的错误只有 `SessionFinished`。
    pub async fn start<F, Fut>(&mut self, id: &str, block: F) -> SyncResult<()>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = SyncResult<Value>>,
    {
        self.core.ensure_open()?;
        let host_id = self.core.host_id;

        let existed = match self
            .properties
            .find_by_host_and_identifier(host_id, id)
            .await
        {
            Ok(existing) => existing.is_some(),
            Err(e) => return self.skip_property(id, &e.to_string()),
        };

        let data = match block().await {
            Ok(data) => data,
            Err(e) => return self.skip_property(id, &e.to_string()),
        };

        if let Err(e) = self
            .properties
            .upsert(&Property::new(host_id, id, data))
            .await
        {
            return self.skip_property(id, &e.to_string());
        }

        if existed {
            self.stats.updated += 1;
        } else {
            self.stats.created += 1;
        }
        self.touched.insert(id.to_string());
        debug!(host_id, property = id, existed, "房源同步成功");
        Ok(())
    }

    /// 不执行任何操作，直接把实体记为跳过
    pub fn skip_property(&mut self, id: &str, reason: &str) -> SyncResult<()> {
        self.core.ensure_open()?;
        self.core.record_skip(
            id,
            reason,
            &mut self.stats.skipped,
            &mut self.stats.skipped_properties,
        );
        Ok(())
    }

    /// 标记整批失败
    pub fn fail(&mut self) {
        self.core.failed = true;
    }

    /// 本次运行结束时不清理本地实体
    pub fn skip_purge(&mut self) {
        self.core.purge_skipped = true;
    }

    /// 执行批量拉取，失败时标记失败并跳过清理，然后把错误返回给调用方
    pub async fn new_context<T, F, Fut>(&mut self, block: F) -> SyncResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = SyncResult<T>>,
    {
        self.core.new_context(block).await
    }

    /// 清理未触及的本地房源（连同其日历）并持久化运行记录
    ///
    /// 清理失败会把运行标记为失败；运行记录写入失败直接返回错误。
    pub async fn finish(&mut self) -> SyncResult<SyncRun> {
        self.core.ensure_open()?;

        if !self.core.purge_skipped {
            if let Err(e) = self.purge().await {
                warn!(host_id = self.core.host_id, error = %e, "清理本地房源失败");
                self.core.failed = true;
            }
        }

        self.core.finished = true;
        self.core
            .persist(JobType::Metadata, RunStats::Metadata(self.stats.clone()))
            .await
    }

    async fn purge(&mut self) -> SyncResult<()> {
        let host_id = self.core.host_id;
        let stored = self.properties.all_identifiers_for_host(host_id).await?;

        for identifier in stored {
            if self.touched.contains(&identifier) || self.core.skipped_ids.contains(&identifier) {
                continue;
            }
            if self.properties.delete(host_id, &identifier).await? {
                self.calendars.delete(host_id, &identifier).await?;
                self.stats.deleted += 1;
                debug!(host_id, property = %identifier, "已删除远端不存在的房源");
            }
        }

        Ok(())
    }

    pub fn stats(&self) -> &MetadataStats {
        &self.stats
    }

    pub fn is_failed(&self) -> bool {
        self.core.failed
    }

    pub fn is_finished(&self) -> bool {
        self.core.finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_core::SyncError;
    use catalog_testing_utils::{
        CalendarBuilder, MockCalendarRepository, MockPropertyRepository, MockSyncRunRepository,
        PropertyBuilder,
    };
    use chrono::NaiveDate;
    use serde_json::json;

    const HOST: i64 = 1;

    fn session_with(
        existing: &[&str],
    ) -> (PropertySyncSession, MockPropertyRepository, MockSyncRunRepository) {
        let properties = MockPropertyRepository::with_properties(
            existing
                .iter()
                .map(|id| PropertyBuilder::new(id).with_host_id(HOST).build())
                .collect(),
        );
        let runs = MockSyncRunRepository::new();
        let session = PropertySyncSession::new(
            HOST,
            Arc::new(properties.clone()),
            Arc::new(MockCalendarRepository::new()),
            Arc::new(runs.clone()),
        );
        (session, properties, runs)
    }

    #[tokio::test]
    async fn test_purge_is_scoped_to_the_session_host() {
        const OTHER_HOST: i64 = 2;
        let properties = MockPropertyRepository::with_properties(
            [(HOST, "A"), (HOST, "B"), (OTHER_HOST, "A"), (OTHER_HOST, "X")]
                .iter()
                .map(|(host_id, id)| PropertyBuilder::new(id).with_host_id(*host_id).build())
                .collect(),
        );
        let mut session = PropertySyncSession::new(
            HOST,
            Arc::new(properties.clone()),
            Arc::new(MockCalendarRepository::new()),
            Arc::new(MockSyncRunRepository::new()),
        );

        session.start("A", || async { Ok(json!({})) }).await.unwrap();
        let run = session.finish().await.unwrap();

        assert_eq!(properties.identifiers(HOST), vec!["A"]);
        assert_eq!(properties.identifiers(OTHER_HOST), vec!["A", "X"]);
        let RunStats::Metadata(stats) = &run.stats else {
            panic!("expected metadata stats");
        };
        assert_eq!(stats.deleted, 1);
    }

    #[tokio::test]
    async fn test_purge_removes_calendar_of_deleted_property() {
        let properties = MockPropertyRepository::with_properties(vec![
            PropertyBuilder::new("A").with_host_id(HOST).build(),
            PropertyBuilder::new("B").with_host_id(HOST).build(),
        ]);
        let calendars = MockCalendarRepository::new();
        let date = NaiveDate::from_ymd_opt(2026, 7, 1).unwrap();
        for id in ["A", "B"] {
            calendars
                .upsert(&CalendarBuilder::new(HOST, id, date).available(3, 120.0).build())
                .await
                .unwrap();
        }
        let mut session = PropertySyncSession::new(
            HOST,
            Arc::new(properties.clone()),
            Arc::new(calendars.clone()),
            Arc::new(MockSyncRunRepository::new()),
        );

        session.start("A", || async { Ok(json!({})) }).await.unwrap();
        session.finish().await.unwrap();

        assert!(calendars.get(HOST, "A").is_some());
        assert!(calendars.get(HOST, "B").is_none());
    }

    #[tokio::test]
    async fn test_purge_removes_untouched_properties() {
        let (mut session, properties, runs) = session_with(&["A", "B", "C"]);

        session.start("A", || async { Ok(json!({"n": 1})) }).await.unwrap();
        session.start("B", || async { Ok(json!({"n": 2})) }).await.unwrap();
        let run = session.finish().await.unwrap();

        assert_eq!(properties.identifiers(HOST), vec!["A", "B"]);
        let RunStats::Metadata(stats) = &run.stats else {
            panic!("expected metadata stats");
        };
        assert_eq!(stats.updated, 2);
        assert_eq!(stats.deleted, 1);
        assert!(run.successful);
        assert_eq!(runs.runs().len(), 1);
    }

    #[tokio::test]
    async fn test_skip_purge_keeps_everything() {
        let (mut session, properties, _) = session_with(&["A", "B", "C"]);

        session.start("A", || async { Ok(json!({})) }).await.unwrap();
        session.skip_purge();
        let run = session.finish().await.unwrap();

        assert_eq!(properties.identifiers(HOST), vec!["A", "B", "C"]);
        assert!(run.successful);
    }

    #[tokio::test]
    async fn test_entity_failures_are_isolated() {
        let (mut session, properties, _) = session_with(&[]);

        session
            .start("A", || async { Err(SyncError::upstream("404", "listing gone")) })
            .await
            .unwrap();
        session.start("B", || async { Ok(json!({"name": "B"})) }).await.unwrap();
        session
            .start("C", || async { Err(SyncError::validation("missing price")) })
            .await
            .unwrap();
        let run = session.finish().await.unwrap();

        assert_eq!(properties.identifiers(HOST), vec!["B"]);
        assert!(run.successful);
        let RunStats::Metadata(stats) = &run.stats else {
            panic!("expected metadata stats");
        };
        assert_eq!(stats.created, 1);
        assert_eq!(stats.skipped, 2);
        assert_eq!(stats.skipped_properties.len(), 2);
        assert_eq!(stats.skipped_properties[0].ids, vec!["A"]);
        assert!(stats.skipped_properties[0].reason.contains("listing gone"));
        assert_eq!(stats.skipped_properties[1].ids, vec!["C"]);
    }

    #[tokio::test]
    async fn test_skipped_properties_survive_purge() {
        let (mut session, properties, _) = session_with(&["A", "B"]);

        session.start("A", || async { Ok(json!({})) }).await.unwrap();
        session.skip_property("B", "temporarily unavailable").unwrap();
        let run = session.finish().await.unwrap();

        assert_eq!(properties.identifiers(HOST), vec!["A", "B"]);
        assert_eq!(run.stats.skipped(), 1);
    }

    #[tokio::test]
    async fn test_upsert_failure_becomes_skip() {
        let (mut session, properties, _) = session_with(&[]);
        properties.fail_upsert_for("A");

        session.start("A", || async { Ok(json!({})) }).await.unwrap();
        let run = session.finish().await.unwrap();

        assert!(properties.identifiers(HOST).is_empty());
        assert_eq!(run.stats.skipped(), 1);
        assert!(run.successful);
    }

    #[tokio::test]
    async fn test_new_context_failure_marks_run_failed_and_skips_purge() {
        let (mut session, properties, _) = session_with(&["A", "B"]);

        let result: SyncResult<Vec<String>> = session
            .new_context(|| async { Err(SyncError::upstream("503", "supplier down")) })
            .await;
        assert!(matches!(result, Err(SyncError::Upstream { .. })));
        assert!(session.is_failed());

        let run = session.finish().await.unwrap();
        assert!(!run.successful);
        assert_eq!(properties.identifiers(HOST), vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_explicit_failure_flag() {
        let (mut session, _, _) = session_with(&[]);
        session.start("A", || async { Ok(json!({})) }).await.unwrap();
        session.fail();
        let run = session.finish().await.unwrap();
        assert!(!run.successful);
        assert!(run.finished_at >= run.started_at);
    }

    #[tokio::test]
    async fn test_purge_failure_marks_run_unsuccessful() {
        let (mut session, properties, _) = session_with(&["A", "B"]);
        properties.fail_deletes(true);

        session.start("A", || async { Ok(json!({})) }).await.unwrap();
        let run = session.finish().await.unwrap();

        assert!(!run.successful);
        assert_eq!(properties.identifiers(HOST), vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_finished_session_rejects_further_work() {
        let (mut session, _, runs) = session_with(&[]);
        session.finish().await.unwrap();
        assert!(session.is_finished());

        let result = session.start("A", || async { Ok(json!({})) }).await;
        assert!(matches!(result, Err(SyncError::SessionFinished)));
        assert!(matches!(
            session.skip_property("A", "late"),
            Err(SyncError::SessionFinished)
        ));
        assert!(matches!(session.finish().await, Err(SyncError::SessionFinished)));
        assert_eq!(runs.runs().len(), 1);
    }

    #[tokio::test]
    async fn test_run_persist_failure_propagates() {
        let (mut session, _, runs) = session_with(&[]);
        runs.fail_creates(true);

        let result = session.finish().await;
        assert!(result.unwrap_err().is_retryable());
    }

    #[tokio::test]
    async fn test_created_vs_updated_uses_prior_existence() {
        let (mut session, properties, _) = session_with(&["existing"]);

        session
            .start("existing", || async { Ok(json!({"v": 2})) })
            .await
            .unwrap();
        session.start("new", || async { Ok(json!({"v": 1})) }).await.unwrap();

        assert_eq!(session.stats().created, 1);
        assert_eq!(session.stats().updated, 1);
        assert_eq!(properties.get(HOST, "existing").unwrap().data, json!({"v": 2}));
    }
}
