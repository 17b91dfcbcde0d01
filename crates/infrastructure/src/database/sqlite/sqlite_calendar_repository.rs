use async_trait::async_trait;
use catalog_core::{models::Calendar, traits::CalendarRepository, SyncResult};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::instrument;

use crate::database::mapping::MappingHelpers;

pub struct SqliteCalendarRepository {
    pool: SqlitePool,
}

impl SqliteCalendarRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_calendar(row: &SqliteRow) -> SyncResult<Calendar> {
        Ok(Calendar {
            host_id: row.try_get("host_id")?,
            property_identifier: row.try_get("property_identifier")?,
            entries: MappingHelpers::parse_json(row, "entries")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl CalendarRepository for SqliteCalendarRepository {
    #[instrument(skip(self, calendar), fields(host_id = calendar.host_id, property = %calendar.property_identifier))]
    async fn upsert(&self, calendar: &Calendar) -> SyncResult<()> {
        sqlx::query(
            r#"
            INSERT INTO calendars (host_id, property_identifier, entries, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (host_id, property_identifier)
            DO UPDATE SET entries = excluded.entries, updated_at = excluded.updated_at
            "#,
        )
        .bind(calendar.host_id)
        .bind(&calendar.property_identifier)
        .bind(serde_json::to_string(&calendar.entries)?)
        .bind(calendar.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_property(
        &self,
        host_id: i64,
        property_identifier: &str,
    ) -> SyncResult<Option<Calendar>> {
        let row = sqlx::query(
            "SELECT host_id, property_identifier, entries, updated_at FROM calendars WHERE host_id = ? AND property_identifier = ?",
        )
        .bind(host_id)
        .bind(property_identifier)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_calendar).transpose()
    }

    #[instrument(skip(self))]
    async fn delete(&self, host_id: i64, property_identifier: &str) -> SyncResult<bool> {
        let result =
            sqlx::query("DELETE FROM calendars WHERE host_id = ? AND property_identifier = ?")
                .bind(host_id)
                .bind(property_identifier)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_by_host(&self, host_id: i64) -> SyncResult<u64> {
        let result = sqlx::query("DELETE FROM calendars WHERE host_id = ?")
            .bind(host_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
