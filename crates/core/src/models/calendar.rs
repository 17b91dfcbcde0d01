use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// 单日房态
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CalendarEntry {
    pub date: NaiveDate,
    pub available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nightly_rate: Option<f64>,
}

impl CalendarEntry {
    pub fn available(date: NaiveDate, nightly_rate: f64) -> Self {
        Self {
            date,
            available: true,
            nightly_rate: Some(nightly_rate),
        }
    }

    pub fn unavailable(date: NaiveDate) -> Self {
        Self {
            date,
            available: false,
            nightly_rate: None,
        }
    }
}

/// 房源日历，同步成功后整体替换
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Calendar {
    pub host_id: i64,
    pub property_identifier: String,
    pub entries: Vec<CalendarEntry>,
    pub updated_at: DateTime<Utc>,
}

impl Calendar {
    pub fn new(host_id: i64, property_identifier: &str, entries: Vec<CalendarEntry>) -> Self {
        Self {
            host_id,
            property_identifier: property_identifier.to_string(),
            entries,
            updated_at: Utc::now(),
        }
    }

    pub fn available_count(&self) -> u64 {
        self.entries.iter().filter(|e| e.available).count() as u64
    }

    pub fn unavailable_count(&self) -> u64 {
        self.entries.iter().filter(|e| !e.available).count() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calendar_counts() {
        let day = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        let calendar = Calendar::new(
            1,
            "villa-1",
            vec![
                CalendarEntry::available(day, 120.0),
                CalendarEntry::available(day.succ_opt().unwrap(), 125.0),
                CalendarEntry::unavailable(day.succ_opt().unwrap().succ_opt().unwrap()),
            ],
        );
        assert_eq!(calendar.available_count(), 2);
        assert_eq!(calendar.unavailable_count(), 1);
    }
}
