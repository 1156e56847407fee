//! Worker configuration.

use std::time::Duration;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrent uploads
    pub max_concurrent_jobs: usize,
    /// Wall-clock bound on one upload attempt
    pub job_timeout: Duration,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
    /// How often the worker should scan for orphaned pending jobs
    pub claim_interval: Duration,
    /// Minimum idle time before a pending job can be claimed (crash recovery)
    pub claim_min_idle: Duration,
    /// Interval between liveness beats of a running job
    pub job_heartbeat_interval: Duration,
    /// Port for the Prometheus exporter; disabled when unset
    pub metrics_port: Option<u16>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 1,
            job_timeout: Duration::from_secs(12 * 3600),
            shutdown_timeout: Duration::from_secs(30),
            claim_interval: Duration::from_secs(30),
            claim_min_idle: Duration::from_secs(900),
            job_heartbeat_interval: Duration::from_secs(30),
            metrics_port: None,
        }
    }
}

fn env_secs(name: &str, default: u64) -> Duration {
    Duration::from_secs(
        std::env::var(name)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(default),
    )
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            max_concurrent_jobs: std::env::var("WORKER_MAX_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(1),
            job_timeout: env_secs("WORKER_JOB_TIMEOUT", 12 * 3600),
            shutdown_timeout: env_secs("WORKER_SHUTDOWN_TIMEOUT", 30),
            claim_interval: env_secs("WORKER_CLAIM_INTERVAL_SECS", 30),
            claim_min_idle: env_secs("WORKER_CLAIM_MIN_IDLE_SECS", 900),
            job_heartbeat_interval: env_secs("WORKER_JOB_HEARTBEAT_SECS", 30),
            metrics_port: std::env::var("METRICS_PORT")
                .ok()
                .and_then(|s| s.parse().ok()),
        }
    }
}
