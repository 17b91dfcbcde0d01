use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use catalog_core::{
    config::AppConfig,
    models::{Host, Job, JobType, SyncRun},
    traits::{JobRepository, SyncRunRepository},
};
use catalog_dispatcher::{DispatchProcessor, JobScheduler, ResyncTrigger, SchedulerTick};
use catalog_domain::{CatalogStores, HandlerRegistry, HostRegistry, ProviderFetcher};
use catalog_infrastructure::{
    create_cache_store, Cache, DatabaseManager, MessageQueueFactory, MetricsCollector,
    SqliteCalendarRepository, SqliteHostRepository, SqliteJobRepository,
    SqlitePropertyRepository, SqliteSyncRunRepository, SyncQueue,
};
use catalog_worker::QueueConsumer;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// 应用运行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    /// 仅运行调度tick
    Scheduler,
    /// 仅消费同步队列
    Worker,
    /// 运行所有组件
    All,
}

impl AppMode {
    pub fn parse(mode: &str) -> Result<Self> {
        match mode {
            "scheduler" => Ok(AppMode::Scheduler),
            "worker" => Ok(AppMode::Worker),
            "all" => Ok(AppMode::All),
            _ => Err(anyhow::anyhow!("不支持的运行模式: {mode}")),
        }
    }

    fn runs_scheduler(&self) -> bool {
        matches!(self, AppMode::Scheduler | AppMode::All)
    }

    fn runs_worker(&self) -> bool {
        matches!(self, AppMode::Worker | AppMode::All)
    }
}

/// 主应用程序
///
/// 供应商拉取实现通过 [`Application::register_provider`] 注入，
/// 调度器和 worker 按 (供应商, 同步类型) 解析对应的处理器。
pub struct Application {
    config: AppConfig,
    database: DatabaseManager,
    stores: CatalogStores,
    jobs: Arc<dyn JobRepository>,
    cache: Cache,
    queue: SyncQueue,
    handlers: HandlerRegistry,
    metrics: Arc<MetricsCollector>,
}

impl Application {
    /// 创建新的应用实例
    pub async fn new(config: AppConfig) -> Result<Self> {
        info!("初始化应用程序");

        let database = DatabaseManager::new(&config.database)
            .await
            .with_context(|| format!("连接数据库失败: {}", config.database.url))?;
        database.migrate().await.context("数据库迁移失败")?;
        let pool = database.pool().clone();

        let metrics = Arc::new(MetricsCollector::new());

        let stores = CatalogStores {
            hosts: Arc::new(SqliteHostRepository::new(pool.clone())),
            properties: Arc::new(SqlitePropertyRepository::new(pool.clone())),
            calendars: Arc::new(SqliteCalendarRepository::new(pool.clone())),
            runs: Arc::new(SqliteSyncRunRepository::new(pool.clone())),
        };
        let jobs: Arc<dyn JobRepository> = Arc::new(SqliteJobRepository::new(pool.clone()));

        let cache_store = create_cache_store(&config.cache, &pool)
            .await
            .context("创建缓存存储失败")?;
        let cache = Cache::new(cache_store, config.cache.namespace.clone())
            .with_default_freshness(Duration::from_secs(config.cache.default_freshness_seconds))
            .with_metrics(metrics.clone());

        let transport = MessageQueueFactory::create(&config.message_queue)
            .await
            .context("创建消息队列失败")?;
        let queue = SyncQueue::new(
            transport,
            Duration::from_millis(config.message_queue.poll_interval_ms),
        )
        .with_metrics(metrics.clone());

        info!("应用程序初始化完成，队列: {}", queue.name());
        Ok(Self {
            config,
            database,
            stores,
            jobs,
            cache,
            queue,
            handlers: HandlerRegistry::new(),
            metrics,
        })
    }

    /// 为供应商注册元数据和房态同步处理器
    pub fn register_provider(&mut self, fetcher: Arc<dyn ProviderFetcher>) {
        self.handlers.register_provider(fetcher, &self.stores);
    }

    /// 供应商拉取实现共享的读穿缓存
    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn host_registry(&self) -> HostRegistry {
        HostRegistry::new(
            self.stores.hosts.clone(),
            self.jobs.clone(),
            self.stores.properties.clone(),
            self.stores.calendars.clone(),
        )
    }

    fn scheduler(&self) -> Arc<JobScheduler> {
        Arc::new(JobScheduler::new(self.jobs.clone(), self.metrics.clone()))
    }

    fn processor(&self) -> Arc<DispatchProcessor> {
        Arc::new(DispatchProcessor::new(
            self.scheduler(),
            Arc::new(self.handlers.clone()),
            Duration::from_secs(self.config.scheduler.job_timeout_seconds),
            self.metrics.clone(),
        ))
    }

    pub fn resync_trigger(&self) -> ResyncTrigger {
        ResyncTrigger::new(self.scheduler(), self.queue.clone())
    }

    pub async fn register_host(
        &self,
        host: &Host,
        schedules: &[(JobType, Duration)],
    ) -> Result<(Host, Vec<Job>)> {
        Ok(self.host_registry().register_host(host, schedules).await?)
    }

    pub async fn recent_runs(&self, host_id: i64, limit: i64) -> Result<Vec<SyncRun>> {
        Ok(self.stores.runs.find_by_host(host_id, limit).await?)
    }

    /// 按模式运行调度器和/或 worker，直到收到关闭信号
    pub async fn run(&self, mode: AppMode, shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        if self.handlers.is_empty() {
            warn!("没有注册任何供应商处理器，所有任务都会因处理器缺失而失败");
        } else {
            info!("已注册供应商: {:?}", self.handlers.suppliers());
        }

        let processor = self.processor();
        let run_scheduler = mode.runs_scheduler() && self.config.scheduler.enabled;
        let run_worker = mode.runs_worker() && self.config.worker.enabled;

        let scheduler_task = async {
            if !run_scheduler {
                return;
            }
            let mut tick = SchedulerTick::new(
                self.scheduler(),
                processor.clone(),
                self.config.scheduler.clone(),
            );
            if self.config.scheduler.dispatch_via_queue {
                tick = tick.with_queue(self.queue.clone());
            }
            tick.run(shutdown_rx.resubscribe()).await;
        };

        let worker_task = async {
            if !run_worker {
                return;
            }
            let consumer = QueueConsumer::new(
                &self.config.worker,
                self.queue.clone(),
                processor.clone(),
                Duration::from_millis(self.config.message_queue.poll_interval_ms),
                self.metrics.clone(),
            );
            consumer.run(shutdown_rx.resubscribe()).await;
        };

        info!(
            scheduler = run_scheduler,
            worker = run_worker,
            "应用启动，模式: {:?}",
            mode
        );
        tokio::join!(scheduler_task, worker_task);

        self.database.close().await;
        info!("应用已停止");
        Ok(())
    }
}
