pub mod sqlite_cache_store;
pub mod sqlite_calendar_repository;
pub mod sqlite_host_repository;
pub mod sqlite_job_repository;
pub mod sqlite_property_repository;
pub mod sqlite_sync_run_repository;

pub use sqlite_cache_store::SqliteCacheStore;
pub use sqlite_calendar_repository::SqliteCalendarRepository;
pub use sqlite_host_repository::SqliteHostRepository;
pub use sqlite_job_repository::SqliteJobRepository;
pub use sqlite_property_repository::SqlitePropertyRepository;
pub use sqlite_sync_run_repository::SqliteSyncRunRepository;
