//! Shared row mapping helpers for the SQLite repositories
//!
//! JSON columns are stored as TEXT and enums as their `as_str` form.

use std::str::FromStr;

use catalog_core::{SyncError, SyncResult};
use serde::de::DeserializeOwned;
use sqlx::{sqlite::SqliteRow, Row};

pub struct MappingHelpers;

impl MappingHelpers {
    /// Parse a TEXT column holding JSON into any deserializable type
    pub fn parse_json<T: DeserializeOwned>(row: &SqliteRow, field_name: &str) -> SyncResult<T> {
        let json_str: String = row.try_get(field_name)?;
        serde_json::from_str(&json_str).map_err(|e| {
            SyncError::Serialization(format!("解析字段 {field_name} 失败: {e}"))
        })
    }

    /// Parse a TEXT column into an enum through its `FromStr` implementation
    pub fn parse_enum<T>(row: &SqliteRow, field_name: &str) -> SyncResult<T>
    where
        T: FromStr<Err = SyncError>,
    {
        let value: String = row.try_get(field_name)?;
        value.parse()
    }
}
