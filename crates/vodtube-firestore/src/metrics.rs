//! Firestore request metrics.

use metrics::{counter, histogram};

pub mod names {
    /// Requests by operation and HTTP status.
    pub const REQUESTS_TOTAL: &str = "vodtube_firestore_requests_total";

    /// Retries by operation.
    pub const RETRIES_TOTAL: &str = "vodtube_firestore_retries_total";

    /// Request latency in seconds by operation.
    pub const LATENCY_SECONDS: &str = "vodtube_firestore_latency_seconds";
}

/// Record one finished request.
pub fn record_request(operation: &'static str, status: u16, latency_ms: f64) {
    counter!(
        names::REQUESTS_TOTAL,
        "operation" => operation,
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(names::LATENCY_SECONDS, "operation" => operation).record(latency_ms / 1000.0);
}

pub fn record_retry(operation: &'static str) {
    counter!(names::RETRIES_TOTAL, "operation" => operation).increment(1);
}
