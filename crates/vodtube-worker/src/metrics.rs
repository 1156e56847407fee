//! Worker metrics.

use std::net::SocketAddr;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and serve `/metrics` on `port`.
pub fn init_metrics(port: u16) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(SocketAddr::from(([0, 0, 0, 0], port)))
        .install()
}

/// Metric names as constants for consistency.
pub mod names {
    pub const UPLOADS_TOTAL: &str = "vodtube_uploads_total";
    pub const UPLOAD_DURATION_SECONDS: &str = "vodtube_upload_duration_seconds";
    pub const UPLOAD_BYTES_TOTAL: &str = "vodtube_upload_bytes_total";
    pub const ENHANCEMENT_WARNINGS_TOTAL: &str = "vodtube_upload_enhancement_warnings_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "vodtube_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "vodtube_jobs_failed_total";
    pub const JOBS_DEAD_LETTERED_TOTAL: &str = "vodtube_jobs_dead_lettered_total";
}

/// Record the outcome of one `process_upload` call.
///
/// `status` is `completed`, `failed`, `skipped_disabled` or
/// `skipped_completed`.
pub fn record_upload(status: &'static str, duration_secs: f64) {
    counter!(names::UPLOADS_TOTAL, "status" => status).increment(1);
    histogram!(names::UPLOAD_DURATION_SECONDS, "status" => status).record(duration_secs);
}

pub fn record_bytes_uploaded(bytes: u64) {
    counter!(names::UPLOAD_BYTES_TOTAL).increment(bytes);
}

pub fn record_enhancement_warning(kind: &'static str) {
    counter!(names::ENHANCEMENT_WARNINGS_TOTAL, "kind" => kind).increment(1);
}

pub fn record_job_completed(kind: &'static str) {
    counter!(names::JOBS_COMPLETED_TOTAL, "kind" => kind).increment(1);
}

pub fn record_job_failed(kind: &'static str, error: &'static str) {
    counter!(names::JOBS_FAILED_TOTAL, "kind" => kind, "error" => error).increment(1);
}

pub fn record_job_dead_lettered(kind: &'static str) {
    counter!(names::JOBS_DEAD_LETTERED_TOTAL, "kind" => kind).increment(1);
}
