use async_trait::async_trait;
use catalog_core::{models::Host, traits::HostRepository, SyncResult};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::{debug, instrument};

use crate::database::mapping::MappingHelpers;

pub struct SqliteHostRepository {
    pool: SqlitePool,
}

impl SqliteHostRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_host(row: &SqliteRow) -> SyncResult<Host> {
        Ok(Host {
            id: row.try_get("id")?,
            supplier: row.try_get("supplier")?,
            identifier: row.try_get("identifier")?,
            credentials: MappingHelpers::parse_json(row, "credentials")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl HostRepository for SqliteHostRepository {
    #[instrument(skip(self, host), fields(supplier = %host.supplier, identifier = %host.identifier))]
    async fn create(&self, host: &Host) -> SyncResult<Host> {
        let row = sqlx::query(
            r#"
            INSERT INTO hosts (supplier, identifier, credentials, created_at)
            VALUES (?, ?, ?, ?)
            RETURNING id, supplier, identifier, credentials, created_at
            "#,
        )
        .bind(&host.supplier)
        .bind(&host.identifier)
        .bind(serde_json::to_string(&host.credentials)?)
        .bind(host.created_at)
        .fetch_one(&self.pool)
        .await?;

        let created = Self::row_to_host(&row)?;
        debug!("创建Host成功: ID {}", created.id);
        Ok(created)
    }

    async fn find_by_id(&self, id: i64) -> SyncResult<Option<Host>> {
        let row = sqlx::query(
            "SELECT id, supplier, identifier, credentials, created_at FROM hosts WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_host).transpose()
    }

    async fn find_all(&self) -> SyncResult<Vec<Host>> {
        let rows = sqlx::query(
            "SELECT id, supplier, identifier, credentials, created_at FROM hosts ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_host).collect()
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: i64) -> SyncResult<bool> {
        let result = sqlx::query("DELETE FROM hosts WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
