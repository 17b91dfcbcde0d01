//! Structured logging utilities
//!
//! Every engine event has exactly one helper here so that the `event` field
//! stays stable for log queries.

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::models::{Job, SyncRun};

pub struct StructuredLogger;

impl StructuredLogger {
    /// Another process holds the job; the attempt is a silent no-op.
    pub fn log_job_lock_denied(job: &Job) {
        debug!(
            event = "job_lock_denied",
            job.id = job.id,
            job.host_id = job.host_id,
            job.supplier = %job.supplier,
            job.kind = %job.job_type,
            "Job is already running, skipping"
        );
    }

    pub fn log_job_timeout(job: &Job, timeout_seconds: u64) {
        warn!(
            event = "job_timeout",
            job.id = job.id,
            job.host_id = job.host_id,
            job.kind = %job.job_type,
            job.timeout_seconds = timeout_seconds,
            "Job exceeded its deadline and was abandoned"
        );
    }

    pub fn log_job_rescheduled(job: &Job, next_run_at: DateTime<Utc>) {
        debug!(
            event = "job_rescheduled",
            job.id = job.id,
            job.next_run_at = %next_run_at,
            "Job unlocked and rescheduled"
        );
    }

    pub fn log_job_recovered(job: &Job) {
        warn!(
            event = "job_recovered",
            job.id = job.id,
            job.host_id = job.host_id,
            job.status = %job.status,
            job.updated_at = %job.updated_at,
            "Stuck job returned to idle"
        );
    }

    pub fn log_cache_hit(key: &str) {
        debug!(event = "cache_hit", cache.key = key, "Cache hit");
    }

    pub fn log_cache_miss(key: &str) {
        debug!(event = "cache_miss", cache.key = key, "Cache miss, value recomputed");
    }

    pub fn log_cache_store_error(key: &str, operation: &str, error: &str) {
        warn!(
            event = "cache_store_error",
            cache.key = key,
            cache.operation = operation,
            error = error,
            "Cache store operation failed"
        );
    }

    pub fn log_entity_skipped(host_id: i64, entity_id: &str, reason: &str) {
        info!(
            event = "entity_skipped",
            host.id = host_id,
            entity.id = entity_id,
            entity.reason = reason,
            "Entity skipped during synchronisation"
        );
    }

    pub fn log_run_finished(run: &SyncRun) {
        if run.successful {
            info!(
                event = "run_finished",
                run.id = run.id,
                host.id = run.host_id,
                run.kind = %run.job_type,
                run.successful = run.successful,
                run.skipped = run.stats.skipped(),
                run.duration_ms = run.duration_ms(),
                "Synchronisation run finished"
            );
        } else {
            error!(
                event = "run_finished",
                run.id = run.id,
                host.id = run.host_id,
                run.kind = %run.job_type,
                run.successful = run.successful,
                run.skipped = run.stats.skipped(),
                run.duration_ms = run.duration_ms(),
                "Synchronisation run finished unsuccessfully"
            );
        }
    }

    pub fn log_message_rejected(reason: &str) {
        warn!(
            event = "message_rejected",
            message.reason = reason,
            "Queue message rejected"
        );
    }

    pub fn log_message_redelivered(job_id: i64, attempts: u32, error: &str) {
        warn!(
            event = "message_redelivered",
            job.id = job_id,
            message.attempts = attempts,
            error = error,
            "Message re-enqueued after a retryable failure"
        );
    }
}
