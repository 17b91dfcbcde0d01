pub mod config;
pub mod errors;
pub mod logging;
pub mod models;
pub mod traits;

pub use errors::{SyncError, SyncResult};
pub use logging::StructuredLogger;
