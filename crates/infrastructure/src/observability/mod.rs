//! Observability module
//!
//! Structured log events live in `catalog_core::logging`; this module counts
//! the same events through the `metrics` facade. Without an installed
//! recorder every call is a no-op.

pub mod metrics_collector;

pub use metrics_collector::MetricsCollector;
