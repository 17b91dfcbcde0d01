use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::JobType;

/// 同步运行记录
///
/// 会话结束时持久化一次，之后不再修改，作为历史审计记录。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncRun {
    pub id: i64,
    pub host_id: i64,
    pub job_type: JobType,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub successful: bool,
    pub stats: RunStats,
}

impl SyncRun {
    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

/// 按同步类型区分的统计信息
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunStats {
    Metadata(MetadataStats),
    Availabilities(AvailabilityStats),
}

impl RunStats {
    pub fn skipped(&self) -> u64 {
        match self {
            RunStats::Metadata(stats) => stats.skipped,
            RunStats::Availabilities(stats) => stats.skipped,
        }
    }

    pub fn job_type(&self) -> JobType {
        match self {
            RunStats::Metadata(_) => JobType::Metadata,
            RunStats::Availabilities(_) => JobType::Availabilities,
        }
    }
}

/// 同一原因下被跳过的实体
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SkippedEntities {
    pub reason: String,
    pub ids: Vec<String>,
}

/// 房源元数据同步统计
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MetadataStats {
    pub created: u64,
    pub updated: u64,
    pub deleted: u64,
    pub skipped: u64,
    #[serde(default)]
    pub skipped_properties: Vec<SkippedEntities>,
}

/// 房态日历同步统计
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AvailabilityStats {
    pub properties_processed: u64,
    pub available_records: u64,
    pub unavailable_records: u64,
    pub skipped: u64,
    #[serde(default)]
    pub skipped_properties: Vec<SkippedEntities>,
}

/// 按原因归组记录一次跳过
pub fn record_skip(skipped: &mut Vec<SkippedEntities>, id: &str, reason: &str) {
    match skipped.iter_mut().find(|group| group.reason == reason) {
        Some(group) => group.ids.push(id.to_string()),
        None => skipped.push(SkippedEntities {
            reason: reason.to_string(),
            ids: vec![id.to_string()],
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_skip_groups_by_reason() {
        let mut skipped = Vec::new();
        record_skip(&mut skipped, "A", "missing price");
        record_skip(&mut skipped, "B", "upstream 500");
        record_skip(&mut skipped, "C", "missing price");

        assert_eq!(skipped.len(), 2);
        assert_eq!(skipped[0].reason, "missing price");
        assert_eq!(skipped[0].ids, vec!["A", "C"]);
        assert_eq!(skipped[1].ids, vec!["B"]);
    }

    #[test]
    fn test_stats_json_shape() {
        let stats = RunStats::Metadata(MetadataStats {
            created: 1,
            updated: 1,
            ..Default::default()
        });
        let value = serde_json::to_value(&stats).unwrap();
        assert_eq!(value["type"], json!("metadata"));
        assert_eq!(value["created"], json!(1));
        assert_eq!(value["updated"], json!(1));
        assert_eq!(stats.job_type(), JobType::Metadata);
    }
}
