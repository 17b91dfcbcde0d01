//! Metrics collector for the catalogue synchronisation engine

use catalog_core::models::{JobType, SyncRun};
use metrics::{counter, gauge, histogram, Counter, Gauge};

pub struct MetricsCollector {
    lock_denied_total: Counter,
    job_timeouts_total: Counter,
    jobs_recovered_total: Counter,
    cache_hits_total: Counter,
    cache_misses_total: Counter,
    cache_store_errors_total: Counter,
    messages_rejected_total: Counter,
    messages_redelivered_total: Counter,
    queue_depth: Gauge,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            lock_denied_total: counter!("catalog_job_lock_denied_total"),
            job_timeouts_total: counter!("catalog_job_timeouts_total"),
            jobs_recovered_total: counter!("catalog_jobs_recovered_total"),
            cache_hits_total: counter!("catalog_cache_hits_total"),
            cache_misses_total: counter!("catalog_cache_misses_total"),
            cache_store_errors_total: counter!("catalog_cache_store_errors_total"),
            messages_rejected_total: counter!("catalog_queue_messages_rejected_total"),
            messages_redelivered_total: counter!("catalog_queue_messages_redelivered_total"),
            queue_depth: gauge!("catalog_queue_depth"),
        }
    }

    // Scheduler metrics

    pub fn record_lock_denied(&self) {
        self.lock_denied_total.increment(1);
    }

    pub fn record_job_timeout(&self) {
        self.job_timeouts_total.increment(1);
    }

    pub fn record_jobs_recovered(&self, count: u64) {
        self.jobs_recovered_total.increment(count);
    }

    /// Record a finished synchronisation run by type and outcome
    pub fn record_run(&self, run: &SyncRun) {
        let outcome = if run.successful { "success" } else { "failure" };
        counter!(
            "catalog_sync_runs_total",
            "job_type" => run.job_type.as_str(),
            "outcome" => outcome
        )
        .increment(1);
        counter!(
            "catalog_entities_skipped_total",
            "job_type" => run.job_type.as_str()
        )
        .increment(run.stats.skipped());
        histogram!(
            "catalog_sync_run_duration_seconds",
            "job_type" => run.job_type.as_str()
        )
        .record(run.duration_ms() as f64 / 1000.0);
    }

    /// Record a dispatch that ended without a run record
    pub fn record_dispatch_error(&self, job_type: JobType, error_kind: &'static str) {
        counter!(
            "catalog_dispatch_errors_total",
            "job_type" => job_type.as_str(),
            "kind" => error_kind
        )
        .increment(1);
    }

    // Cache metrics

    pub fn record_cache_hit(&self) {
        self.cache_hits_total.increment(1);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses_total.increment(1);
    }

    pub fn record_cache_store_error(&self) {
        self.cache_store_errors_total.increment(1);
    }

    // Queue metrics

    pub fn record_queue_operation(&self, operation: &'static str, success: bool) {
        counter!(
            "catalog_queue_operations_total",
            "operation" => operation,
            "status" => if success { "success" } else { "error" }
        )
        .increment(1);
    }

    pub fn record_message_rejected(&self) {
        self.messages_rejected_total.increment(1);
    }

    pub fn record_message_redelivered(&self) {
        self.messages_redelivered_total.increment(1);
    }

    pub fn update_queue_depth(&self, depth: f64) {
        self.queue_depth.set(depth);
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_core::models::{MetadataStats, RunStats};
    use chrono::Utc;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        let metrics = MetricsCollector::new();
        metrics.record_lock_denied();
        metrics.record_cache_hit();
        metrics.record_queue_operation("send", true);
        metrics.record_run(&SyncRun {
            id: 1,
            host_id: 1,
            job_type: JobType::Metadata,
            started_at: Utc::now(),
            finished_at: Utc::now(),
            successful: true,
            stats: RunStats::Metadata(MetadataStats::default()),
        });
    }
}
