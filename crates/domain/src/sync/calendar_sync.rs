use std::future::Future;
use std::sync::Arc;

use catalog_core::{
    models::{AvailabilityStats, Calendar, CalendarEntry, JobType, RunStats, SyncRun},
    traits::{CalendarRepository, SyncRunRepository},
    SyncResult,
};
use tracing::debug;

use super::SessionCore;

/// 房态日历同步会话
///
/// 与元数据会话共享状态机，但每个房源的日历是整体替换的，因此没有清理步骤。
pub struct CalendarSyncSession {
    core: SessionCore,
    calendars: Arc<dyn CalendarRepository>,
    stats: AvailabilityStats,
}

impl CalendarSyncSession {
    pub fn new(
        host_id: i64,
        calendars: Arc<dyn CalendarRepository>,
        runs: Arc<dyn SyncRunRepository>,
    ) -> Self {
        Self {
            core: SessionCore::new(host_id, runs),
            calendars,
            stats: AvailabilityStats::default(),
        }
    }

    /// 用 `block` 返回的日历替换房源 `id` 的本地日历
    pub async fn start<F, Fut>(&mut self, id: &str, block: F) -> SyncResult<()>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = SyncResult<Vec<CalendarEntry>>>,
    {
        self.core.ensure_open()?;

        let entries = match block().await {
            Ok(entries) => entries,
            Err(e) => return self.skip_property(id, &e.to_string()),
        };

        let calendar = Calendar::new(self.core.host_id, id, entries);
        if let Err(e) = self.calendars.upsert(&calendar).await {
            return self.skip_property(id, &e.to_string());
        }

        self.stats.properties_processed += 1;
        self.stats.available_records += calendar.available_count();
        self.stats.unavailable_records += calendar.unavailable_count();
        debug!(
            host_id = self.core.host_id,
            property = id,
            entries = calendar.entries.len(),
            "房态日历已替换"
        );
        Ok(())
    }

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

    pub fn fail(&mut self) {
        self.core.failed = true;
    }

    pub async fn new_context<T, F, Fut>(&mut self, block: F) -> SyncResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = SyncResult<T>>,
    {
        self.core.new_context(block).await
    }

    pub async fn finish(&mut self) -> SyncResult<SyncRun> {
        self.core.ensure_open()?;
        self.core.finished = true;
        self.core
            .persist(
                JobType::Availabilities,
                RunStats::Availabilities(self.stats.clone()),
            )
            .await
    }

    pub fn stats(&self) -> &AvailabilityStats {
        &self.stats
    }

    pub fn is_failed(&self) -> bool {
        self.core.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_core::SyncError;
    use catalog_testing_utils::{CalendarBuilder, MockCalendarRepository, MockSyncRunRepository};
    use chrono::NaiveDate;

    fn start_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 7, 1).unwrap()
    }

    #[tokio::test]
    async fn test_calendar_replaced_and_tallied() {
        let calendars = MockCalendarRepository::new();
        let runs = MockSyncRunRepository::new();
        let mut session =
            CalendarSyncSession::new(1, Arc::new(calendars.clone()), Arc::new(runs.clone()));

        let entries = CalendarBuilder::new(1, "A", start_date())
            .available(3, 120.0)
            .unavailable(2)
            .build()
            .entries;
        session.start("A", || async { Ok(entries) }).await.unwrap();
        session
            .start("B", || async { Err(SyncError::upstream("timeout", "calendar fetch")) })
            .await
            .unwrap();

        let run = session.finish().await.unwrap();
        assert!(run.successful);
        assert_eq!(run.job_type, JobType::Availabilities);

        let RunStats::Availabilities(stats) = &run.stats else {
            panic!("expected availability stats");
        };
        assert_eq!(stats.properties_processed, 1);
        assert_eq!(stats.available_records, 3);
        assert_eq!(stats.unavailable_records, 2);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.skipped_properties[0].ids, vec!["B"]);

        assert_eq!(calendars.get(1, "A").unwrap().entries.len(), 5);
        assert!(calendars.get(1, "B").is_none());
    }

    #[tokio::test]
    async fn test_second_sync_replaces_previous_entries() {
        let calendars = MockCalendarRepository::new();
        let runs = MockSyncRunRepository::new();

        for nights in [5, 2] {
            let mut session =
                CalendarSyncSession::new(1, Arc::new(calendars.clone()), Arc::new(runs.clone()));
            let entries = CalendarBuilder::new(1, "A", start_date())
                .available(nights, 99.0)
                .build()
                .entries;
            session.start("A", || async { Ok(entries) }).await.unwrap();
            session.finish().await.unwrap();
        }

        assert_eq!(calendars.get(1, "A").unwrap().entries.len(), 2);
        assert_eq!(runs.runs().len(), 2);
    }

    #[tokio::test]
    async fn test_batch_failure_is_recorded() {
        let runs = MockSyncRunRepository::new();
        let mut session = CalendarSyncSession::new(
            1,
            Arc::new(MockCalendarRepository::new()),
            Arc::new(runs.clone()),
        );

        let result: SyncResult<()> = session
            .new_context(|| async { Err(SyncError::upstream("401", "credentials rejected")) })
            .await;
        assert!(result.is_err());
        assert!(session.is_failed());

        let run = session.finish().await.unwrap();
        assert!(!run.successful);
        assert!(matches!(session.finish().await, Err(SyncError::SessionFinished)));
    }
}
