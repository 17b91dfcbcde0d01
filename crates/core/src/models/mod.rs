pub mod cache_entry;
pub mod calendar;
pub mod host;
pub mod job;
pub mod message;
pub mod property;
pub mod sync_run;

pub use cache_entry::CacheEntry;
pub use calendar::{Calendar, CalendarEntry};
pub use host::Host;
pub use job::{Job, JobStatus, JobType};
pub use message::{Operation, QueueMessage};
pub use property::Property;
pub use sync_run::{
    record_skip, AvailabilityStats, MetadataStats, RunStats, SkippedEntities, SyncRun,
};
