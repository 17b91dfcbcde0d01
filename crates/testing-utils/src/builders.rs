//! Test data builders with sensible defaults

use catalog_core::models::{
    Calendar, CalendarEntry, Host, Job, JobStatus, JobType, Property,
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde_json::{json, Value};

/// Builder for creating test Job entities
pub struct JobBuilder {
    job: Job,
}

impl JobBuilder {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            job: Job {
                id: 1,
                host_id: 1,
                supplier: "test_supplier".to_string(),
                job_type: JobType::Metadata,
                interval_seconds: 3600,
                status: JobStatus::Idle,
                next_run_at: None,
                created_at: now,
                updated_at: now,
            },
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.job.id = id;
        self
    }

    pub fn with_host_id(mut self, host_id: i64) -> Self {
        self.job.host_id = host_id;
        self
    }

    pub fn with_supplier(mut self, supplier: &str) -> Self {
        self.job.supplier = supplier.to_string();
        self
    }

    pub fn with_job_type(mut self, job_type: JobType) -> Self {
        self.job.job_type = job_type;
        self
    }

    pub fn with_interval_seconds(mut self, interval_seconds: i64) -> Self {
        self.job.interval_seconds = interval_seconds;
        self
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.job.status = status;
        self
    }

    pub fn with_next_run_at(mut self, next_run_at: DateTime<Utc>) -> Self {
        self.job.next_run_at = Some(next_run_at);
        self
    }

    pub fn with_updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.job.updated_at = updated_at;
        self
    }

    pub fn running(self) -> Self {
        self.with_status(JobStatus::Running)
    }

    pub fn queued(self) -> Self {
        self.with_status(JobStatus::Queued)
    }

    /// Not due until `minutes` from now
    pub fn due_in_minutes(self, minutes: i64) -> Self {
        self.with_next_run_at(Utc::now() + Duration::minutes(minutes))
    }

    pub fn build(self) -> Job {
        self.job
    }
}

impl Default for JobBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for creating test Host entities
pub struct HostBuilder {
    host: Host,
}

impl HostBuilder {
    pub fn new() -> Self {
        Self {
            host: Host {
                id: 1,
                supplier: "test_supplier".to_string(),
                identifier: "test_account".to_string(),
                credentials: json!({}),
                created_at: Utc::now(),
            },
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.host.id = id;
        self
    }

    pub fn with_supplier(mut self, supplier: &str) -> Self {
        self.host.supplier = supplier.to_string();
        self
    }

    pub fn with_identifier(mut self, identifier: &str) -> Self {
        self.host.identifier = identifier.to_string();
        self
    }

    pub fn with_credentials(mut self, credentials: Value) -> Self {
        self.host.credentials = credentials;
        self
    }

    pub fn build(self) -> Host {
        self.host
    }
}

impl Default for HostBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for creating test Property entities
pub struct PropertyBuilder {
    property: Property,
}

impl PropertyBuilder {
    pub fn new(identifier: &str) -> Self {
        let now = Utc::now();
        Self {
            property: Property {
                host_id: 1,
                identifier: identifier.to_string(),
                data: json!({ "name": format!("Property {identifier}") }),
                created_at: now,
                updated_at: now,
            },
        }
    }

    pub fn with_host_id(mut self, host_id: i64) -> Self {
        self.property.host_id = host_id;
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.property.data = data;
        self
    }

    pub fn build(self) -> Property {
        self.property
    }
}

/// Builder for creating test calendars, one entry per day starting at `start`
pub struct CalendarBuilder {
    calendar: Calendar,
    next_date: NaiveDate,
}

impl CalendarBuilder {
    pub fn new(host_id: i64, property_identifier: &str, start: NaiveDate) -> Self {
        Self {
            calendar: Calendar::new(host_id, property_identifier, Vec::new()),
            next_date: start,
        }
    }

    pub fn available(mut self, nights: u32, nightly_rate: f64) -> Self {
        for _ in 0..nights {
            self.calendar
                .entries
                .push(CalendarEntry::available(self.next_date, nightly_rate));
            self.next_date = self.next_date + Duration::days(1);
        }
        self
    }

    pub fn unavailable(mut self, nights: u32) -> Self {
        for _ in 0..nights {
            self.calendar
                .entries
                .push(CalendarEntry::unavailable(self.next_date));
            self.next_date = self.next_date + Duration::days(1);
        }
        self
    }

    pub fn build(self) -> Calendar {
        self.calendar
    }
}
