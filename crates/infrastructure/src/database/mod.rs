pub mod mapping;
pub mod sqlite;

pub use sqlite::*;

use std::str::FromStr;
use std::time::Duration;

use catalog_core::{config::DatabaseConfig, SyncResult};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite, SqlitePool};
use tracing::{debug, info};

pub type DbPool = Pool<Sqlite>;

/// SQLite连接池与内置迁移
pub struct DatabaseManager {
    pool: SqlitePool,
}

impl DatabaseManager {
    pub async fn new(config: &DatabaseConfig) -> SyncResult<Self> {
        let connect_options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds))
            .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
            .connect_with(connect_options)
            .await?;

        info!("成功连接到SQLite数据库: {}", config.url);
        Ok(Self { pool })
    }

    /// 单连接的内存数据库，连接不会因空闲而回收
    pub async fn in_memory() -> SyncResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        let manager = Self { pool };
        manager.migrate().await?;
        Ok(manager)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn migrate(&self) -> SyncResult<()> {
        debug!("Running SQLite database migrations");

        let tables = [
            r#"
            CREATE TABLE IF NOT EXISTS hosts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                supplier TEXT NOT NULL,
                identifier TEXT NOT NULL,
                credentials TEXT NOT NULL DEFAULT '{}',
                created_at TEXT NOT NULL,
                UNIQUE (supplier, identifier)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                host_id INTEGER NOT NULL,
                supplier TEXT NOT NULL,
                job_type TEXT NOT NULL,
                interval_seconds INTEGER NOT NULL,
                status TEXT NOT NULL DEFAULT 'idle',
                next_run_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (host_id, job_type)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS properties (
                host_id INTEGER NOT NULL,
                identifier TEXT NOT NULL,
                data TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (host_id, identifier)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS calendars (
                host_id INTEGER NOT NULL,
                property_identifier TEXT NOT NULL,
                entries TEXT NOT NULL DEFAULT '[]',
                updated_at TEXT NOT NULL,
                PRIMARY KEY (host_id, property_identifier)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS sync_runs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                host_id INTEGER NOT NULL,
                job_type TEXT NOT NULL,
                started_at TEXT NOT NULL,
                finished_at TEXT NOT NULL,
                successful INTEGER NOT NULL,
                stats TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS cache_entries (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        ];

        for table_sql in tables {
            sqlx::query(table_sql).execute(&self.pool).await?;
        }

        let indexes = [
            "CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status)",
            "CREATE INDEX IF NOT EXISTS idx_jobs_host_id ON jobs(host_id)",
            "CREATE INDEX IF NOT EXISTS idx_sync_runs_host_started ON sync_runs(host_id, started_at)",
        ];

        for index_sql in indexes {
            sqlx::query(index_sql).execute(&self.pool).await?;
        }

        debug!("Successfully completed SQLite database migrations");
        Ok(())
    }

    pub async fn health_check(&self) -> SyncResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
