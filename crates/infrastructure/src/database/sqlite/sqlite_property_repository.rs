use async_trait::async_trait;
use catalog_core::{models::Property, traits::PropertyRepository, SyncError, SyncResult};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::{debug, instrument};

use crate::database::mapping::MappingHelpers;

pub struct SqlitePropertyRepository {
    pool: SqlitePool,
}

impl SqlitePropertyRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_property(row: &SqliteRow) -> SyncResult<Property> {
        Ok(Property {
            host_id: row.try_get("host_id")?,
            identifier: row.try_get("identifier")?,
            data: MappingHelpers::parse_json(row, "data")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl PropertyRepository for SqlitePropertyRepository {
    async fn find_by_host_and_identifier(
        &self,
        host_id: i64,
        identifier: &str,
    ) -> SyncResult<Option<Property>> {
        let row = sqlx::query(
            "SELECT host_id, identifier, data, created_at, updated_at FROM properties WHERE host_id = ? AND identifier = ?",
        )
        .bind(host_id)
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_property).transpose()
    }

    #[instrument(skip(self, property), fields(host_id = property.host_id, identifier = %property.identifier))]
    async fn upsert(&self, property: &Property) -> SyncResult<Property> {
        let row = sqlx::query(
            r#"
            INSERT INTO properties (host_id, identifier, data, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (host_id, identifier)
            DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at
            RETURNING host_id, identifier, data, created_at, updated_at
            "#,
        )
        .bind(property.host_id)
        .bind(&property.identifier)
        .bind(serde_json::to_string(&property.data)?)
        .bind(property.created_at)
        .bind(property.updated_at)
        .fetch_one(&self.pool)
        .await?;

        debug!("保存房源成功");
        Self::row_to_property(&row)
    }

    #[instrument(skip(self))]
    async fn delete(&self, host_id: i64, identifier: &str) -> SyncResult<bool> {
        let result = sqlx::query("DELETE FROM properties WHERE host_id = ? AND identifier = ?")
            .bind(host_id)
            .bind(identifier)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn all_identifiers_for_host(&self, host_id: i64) -> SyncResult<Vec<String>> {
        let rows = sqlx::query(
            "SELECT identifier FROM properties WHERE host_id = ? ORDER BY identifier",
        )
        .bind(host_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("identifier").map_err(SyncError::from))
            .collect()
    }

    #[instrument(skip(self))]
    async fn delete_by_host(&self, host_id: i64) -> SyncResult<u64> {
        let result = sqlx::query("DELETE FROM properties WHERE host_id = ?")
            .bind(host_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
