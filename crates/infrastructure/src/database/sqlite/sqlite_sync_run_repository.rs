use async_trait::async_trait;
use catalog_core::{models::SyncRun, traits::SyncRunRepository, SyncResult};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::{debug, instrument};

use crate::database::mapping::MappingHelpers;

pub struct SqliteSyncRunRepository {
    pool: SqlitePool,
}

impl SqliteSyncRunRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_run(row: &SqliteRow) -> SyncResult<SyncRun> {
        Ok(SyncRun {
            id: row.try_get("id")?,
            host_id: row.try_get("host_id")?,
            job_type: MappingHelpers::parse_enum(row, "job_type")?,
            started_at: row.try_get("started_at")?,
            finished_at: row.try_get("finished_at")?,
            successful: row.try_get("successful")?,
            stats: MappingHelpers::parse_json(row, "stats")?,
        })
    }
}

#[async_trait]
impl SyncRunRepository for SqliteSyncRunRepository {
    #[instrument(skip(self, run), fields(host_id = run.host_id, job_type = %run.job_type))]
    async fn create(&self, run: &SyncRun) -> SyncResult<SyncRun> {
        let row = sqlx::query(
            r#"
            INSERT INTO sync_runs (host_id, job_type, started_at, finished_at, successful, stats)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id, host_id, job_type, started_at, finished_at, successful, stats
            "#,
        )
        .bind(run.host_id)
        .bind(run.job_type.as_str())
        .bind(run.started_at)
        .bind(run.finished_at)
        .bind(run.successful)
        .bind(serde_json::to_string(&run.stats)?)
        .fetch_one(&self.pool)
        .await?;

        let created = Self::row_to_run(&row)?;
        debug!("保存同步运行记录成功: ID {}", created.id);
        Ok(created)
    }

    async fn find_by_host(&self, host_id: i64, limit: i64) -> SyncResult<Vec<SyncRun>> {
        let rows = sqlx::query(
            r#"
            SELECT id, host_id, job_type, started_at, finished_at, successful, stats
            FROM sync_runs
            WHERE host_id = ?
            ORDER BY started_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(host_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_run).collect()
    }
}
