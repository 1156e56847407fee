//! Upload worker.
//!
//! This crate provides:
//! - The upload state machine ([`process_upload`])
//! - Job executor with retry, DLQ, crash recovery and heartbeats
//! - Manual retry and status queries ([`UploadAdmin`])
//! - Graceful shutdown

pub mod admin;
pub mod config;
pub mod error;
pub mod executor;
pub mod heartbeat;
pub mod logging;
pub mod metrics;
pub mod retry;
pub mod upload;

pub use admin::{UploadAdmin, UploadScheduler};
pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::JobExecutor;
pub use heartbeat::HeartbeatHandle;
pub use logging::JobLogger;
pub use upload::{
    build_metadata, process_upload, target_playlists, EnhancementWarning, SkipReason,
    UploadContext, UploadOutcome,
};
