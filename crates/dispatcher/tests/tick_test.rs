#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use catalog_core::config::SchedulerConfig;
    use catalog_core::models::{
        Job, JobStatus, JobType, MetadataStats, QueueMessage, RunStats, SyncRun,
    };
    use catalog_core::SyncResult;
    use catalog_dispatcher::{DispatchProcessor, JobScheduler, ResyncTrigger, SchedulerTick};
    use catalog_domain::{HandlerRegistry, SyncHandler};
    use catalog_infrastructure::{MetricsCollector, SyncQueue};
    use catalog_testing_utils::{JobBuilder, MockJobRepository, MockQueueTransport};
    use chrono::Utc;
    use tokio::sync::broadcast;

    struct InstantHandler;

    #[async_trait]
    impl SyncHandler for InstantHandler {
        fn job_type(&self) -> JobType {
            JobType::Metadata
        }

        async fn synchronise(&self, job: &Job) -> SyncResult<SyncRun> {
            let now = Utc::now();
            Ok(SyncRun {
                id: job.id,
                host_id: job.host_id,
                job_type: JobType::Metadata,
                started_at: now,
                finished_at: now,
                successful: true,
                stats: RunStats::Metadata(MetadataStats::default()),
            })
        }
    }

    fn create_config() -> SchedulerConfig {
        SchedulerConfig {
            tick_interval_seconds: 0,
            tick_jitter_ms: 0,
            max_concurrent_jobs: 2,
            ..Default::default()
        }
    }

    fn create_tick(repo: &MockJobRepository) -> (SchedulerTick, Arc<JobScheduler>) {
        let metrics = Arc::new(MetricsCollector::new());
        let scheduler = Arc::new(JobScheduler::new(Arc::new(repo.clone()), metrics.clone()));
        let mut registry = HandlerRegistry::new();
        registry.register("test_supplier", Arc::new(InstantHandler));
        let processor = Arc::new(DispatchProcessor::new(
            scheduler.clone(),
            Arc::new(registry),
            Duration::from_secs(5),
            metrics,
        ));
        (
            SchedulerTick::new(scheduler.clone(), processor, create_config()),
            scheduler,
        )
    }

    fn due_jobs(count: i64) -> Vec<Job> {
        (1..=count)
            .map(|id| JobBuilder::new().with_id(id).build())
            .collect()
    }

    #[tokio::test]
    async fn test_tick_runs_due_jobs_directly() {
        let mut jobs = due_jobs(3);
        jobs.push(JobBuilder::new().with_id(4).due_in_minutes(30).build());
        let repo = MockJobRepository::with_jobs(jobs);
        let (tick, _) = create_tick(&repo);

        let report = tick.tick(Utc::now()).await.unwrap();

        assert_eq!(report.due, 3);
        assert_eq!(report.completed, 3);
        assert_eq!(report.errors, 0);
        for id in 1..=3 {
            let job = repo.get(id).unwrap();
            assert_eq!(job.status, JobStatus::Idle);
            assert!(!job.is_due(Utc::now()));
        }

        let report = tick.tick(Utc::now()).await.unwrap();
        assert_eq!(report.due, 0);
    }

    #[tokio::test]
    async fn test_tick_enqueues_when_queue_configured() {
        let repo = MockJobRepository::with_jobs(due_jobs(2));
        let transport = MockQueueTransport::new();
        let (tick, _) = create_tick(&repo);
        let tick = tick.with_queue(SyncQueue::new(
            Arc::new(transport.clone()),
            Duration::from_millis(10),
        ));

        let report = tick.tick(Utc::now()).await.unwrap();

        assert_eq!(report.enqueued, 2);
        assert_eq!(report.completed, 0);
        assert_eq!(repo.get(1).unwrap().status, JobStatus::Queued);
        let first = QueueMessage::from_bytes(&transport.sent()[0]).unwrap();
        assert_eq!(first.job_id().unwrap(), 1);

        // 已在队列中的任务不会被再次派发
        let report = tick.tick(Utc::now()).await.unwrap();
        assert_eq!(report.due, 0);
        assert_eq!(transport.sent_count(), 2);
    }

    #[tokio::test]
    async fn test_failed_enqueue_reverts_queued_mark() {
        let repo = MockJobRepository::with_jobs(due_jobs(1));
        let transport = MockQueueTransport::new();
        transport.fail_sends(true);
        let (tick, _) = create_tick(&repo);
        let tick = tick.with_queue(SyncQueue::new(
            Arc::new(transport.clone()),
            Duration::from_millis(10),
        ));

        assert!(tick.tick(Utc::now()).await.is_err());
        assert_eq!(repo.get(1).unwrap().status, JobStatus::Idle);
    }

    #[tokio::test]
    async fn test_tick_recovers_stuck_jobs_first() {
        let long_ago = Utc::now() - chrono::Duration::days(1);
        let repo = MockJobRepository::with_jobs(vec![JobBuilder::new()
            .with_id(1)
            .running()
            .with_updated_at(long_ago)
            .build()]);
        let (tick, _) = create_tick(&repo);

        let report = tick.tick(Utc::now()).await.unwrap();

        assert_eq!(report.recovered, 1);
        assert_eq!(report.completed, 1);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let repo = MockJobRepository::with_jobs(due_jobs(1));
        let (tick, _) = create_tick(&repo);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let handle = tokio::spawn(async move { tick.run(shutdown_rx).await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown_tx.send(()).unwrap();

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(repo.get(1).unwrap().next_run_at.is_some());
    }

    #[tokio::test]
    async fn test_resync_trigger() {
        let mut jobs = due_jobs(2);
        jobs.push(JobBuilder::new().with_id(3).running().build());
        let repo = MockJobRepository::with_jobs(jobs);
        let transport = MockQueueTransport::new();
        let (_, scheduler) = create_tick(&repo);
        let trigger = ResyncTrigger::new(
            scheduler,
            SyncQueue::new(Arc::new(transport.clone()), Duration::from_millis(10)),
        );

        assert_eq!(trigger.resync_all().await.unwrap(), 3);
        assert_eq!(transport.sent_count(), 3);
        assert_eq!(repo.get(1).unwrap().status, JobStatus::Queued);
        assert_eq!(repo.get(3).unwrap().status, JobStatus::Running);

        assert!(trigger.resync_job(42).await.is_err());
    }
}
