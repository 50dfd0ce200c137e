//! Pipeline metrics.
//!
//! Recorded through the `metrics` facade; the API binary installs the
//! Prometheus recorder. Without a recorder these calls are no-ops.

use metrics::{counter, gauge, histogram};

use presently_models::{ErrorKind, Stage};

pub mod names {
    pub const JOBS_ACCEPTED_TOTAL: &str = "presently_jobs_accepted_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "presently_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "presently_jobs_failed_total";
    pub const JOBS_RUNNING: &str = "presently_jobs_running";
    pub const JOBS_EVICTED_TOTAL: &str = "presently_jobs_evicted_total";
    pub const REGISTRY_SIZE: &str = "presently_registry_size";
    pub const STAGE_DURATION_SECONDS: &str = "presently_stage_duration_seconds";
}

pub fn record_job_accepted() {
    counter!(names::JOBS_ACCEPTED_TOTAL).increment(1);
}

pub fn record_job_completed() {
    counter!(names::JOBS_COMPLETED_TOTAL).increment(1);
}

pub fn record_job_failed(kind: ErrorKind) {
    let labels = [("kind", kind.as_str().to_string())];
    counter!(names::JOBS_FAILED_TOTAL, &labels).increment(1);
}

pub fn inc_jobs_running() {
    gauge!(names::JOBS_RUNNING).increment(1.0);
}

pub fn dec_jobs_running() {
    gauge!(names::JOBS_RUNNING).decrement(1.0);
}

pub fn record_jobs_evicted(count: usize) {
    counter!(names::JOBS_EVICTED_TOTAL).increment(count as u64);
}

pub fn set_registry_size(size: usize) {
    gauge!(names::REGISTRY_SIZE).set(size as f64);
}

/// Record how long a stage ran, labelled by stage and outcome.
pub fn record_stage_duration(stage: Stage, success: bool, duration_secs: f64) {
    let labels = [
        ("stage", stage.as_str().to_string()),
        ("outcome", if success { "ok" } else { "error" }.to_string()),
    ];
    histogram!(names::STAGE_DURATION_SECONDS, &labels).record(duration_secs);
}
