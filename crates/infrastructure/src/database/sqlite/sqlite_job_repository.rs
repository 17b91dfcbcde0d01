use async_trait::async_trait;
use catalog_core::{
    models::{Job, JobStatus},
    traits::JobRepository,
    SyncError, SyncResult,
};
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::{debug, instrument};

use crate::database::mapping::MappingHelpers;

const JOB_COLUMNS: &str = "id, host_id, supplier, job_type, interval_seconds, status, next_run_at, created_at, updated_at";

pub struct SqliteJobRepository {
    pool: SqlitePool,
}

impl SqliteJobRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_job(row: &SqliteRow) -> SyncResult<Job> {
        Ok(Job {
            id: row.try_get("id")?,
            host_id: row.try_get("host_id")?,
            supplier: row.try_get("supplier")?,
            job_type: MappingHelpers::parse_enum(row, "job_type")?,
            interval_seconds: row.try_get("interval_seconds")?,
            status: MappingHelpers::parse_enum(row, "status")?,
            next_run_at: row.try_get("next_run_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn placeholders(count: usize) -> String {
        vec!["?"; count].join(", ")
    }
}

#[async_trait]
impl JobRepository for SqliteJobRepository {
    #[instrument(skip(self, job), fields(host_id = job.host_id, job_type = %job.job_type))]
    async fn create(&self, job: &Job) -> SyncResult<Job> {
        let sql = format!(
            "INSERT INTO jobs (host_id, supplier, job_type, interval_seconds, status, next_run_at, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING {JOB_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(job.host_id)
            .bind(&job.supplier)
            .bind(job.job_type.as_str())
            .bind(job.interval_seconds)
            .bind(job.status.as_str())
            .bind(job.next_run_at)
            .bind(job.created_at)
            .bind(job.updated_at)
            .fetch_one(&self.pool)
            .await?;

        let created = Self::row_to_job(&row)?;
        debug!("创建后台任务成功: {}", created.description());
        Ok(created)
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: i64) -> SyncResult<Option<Job>> {
        let sql = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_job).transpose()
    }

    async fn find_all(&self) -> SyncResult<Vec<Job>> {
        let sql = format!("SELECT {JOB_COLUMNS} FROM jobs ORDER BY id");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(Self::row_to_job).collect()
    }

    #[instrument(skip(self))]
    async fn find_by_host(&self, host_id: i64) -> SyncResult<Vec<Job>> {
        let sql = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE host_id = ? ORDER BY id");
        let rows = sqlx::query(&sql)
            .bind(host_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_job).collect()
    }

    #[instrument(skip(self))]
    async fn find_by_status(&self, statuses: &[JobStatus]) -> SyncResult<Vec<Job>> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE status IN ({}) ORDER BY id",
            Self::placeholders(statuses.len())
        );
        let mut query = sqlx::query(&sql);
        for status in statuses {
            query = query.bind(status.as_str());
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(Self::row_to_job).collect()
    }

    /// 条件更新是跨进程互斥的唯一依据，SQLite 对单条 UPDATE 保证原子性
    #[instrument(skip(self))]
    async fn compare_and_set_status(
        &self,
        id: i64,
        expected: &[JobStatus],
        new_status: JobStatus,
    ) -> SyncResult<bool> {
        if expected.is_empty() {
            return Ok(false);
        }

        let sql = format!(
            "UPDATE jobs SET status = ?, updated_at = ? WHERE id = ? AND status IN ({})",
            Self::placeholders(expected.len())
        );
        let mut query = sqlx::query(&sql)
            .bind(new_status.as_str())
            .bind(Utc::now())
            .bind(id);
        for status in expected {
            query = query.bind(status.as_str());
        }

        let result = query.execute(&self.pool).await?;
        let swapped = result.rows_affected() == 1;
        debug!(job_id = id, new_status = %new_status, swapped, "任务状态CAS");
        Ok(swapped)
    }

    #[instrument(skip(self))]
    async fn release(&self, id: i64, next_run_at: DateTime<Utc>) -> SyncResult<bool> {
        let result = sqlx::query(
            "UPDATE jobs SET status = ?, next_run_at = ?, updated_at = ? WHERE id = ? AND status = ?",
        )
        .bind(JobStatus::Idle.as_str())
        .bind(next_run_at)
        .bind(Utc::now())
        .bind(id)
        .bind(JobStatus::Running.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(true);
        }
        if self.find_by_id(id).await?.is_none() {
            return Err(SyncError::JobNotFound { id });
        }
        debug!(job_id = id, "任务已不在running状态，跳过释放");
        Ok(false)
    }

    /// 时间列统一由 sqlx 编码为 UTC 的 RFC3339 文本，可以直接按字符串比较
    #[instrument(skip(self))]
    async fn recover_stale(
        &self,
        id: i64,
        status: JobStatus,
        stale_before: DateTime<Utc>,
        next_run_at: DateTime<Utc>,
    ) -> SyncResult<bool> {
        let result = sqlx::query(
            "UPDATE jobs SET status = ?, next_run_at = ?, updated_at = ?
             WHERE id = ? AND status = ? AND updated_at < ?",
        )
        .bind(JobStatus::Idle.as_str())
        .bind(next_run_at)
        .bind(Utc::now())
        .bind(id)
        .bind(status.as_str())
        .bind(stale_before)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self))]
    async fn delete_by_host(&self, host_id: i64) -> SyncResult<u64> {
        let result = sqlx::query("DELETE FROM jobs WHERE host_id = ?")
            .bind(host_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
