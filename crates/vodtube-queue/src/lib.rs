//! Redis Streams job queue for uploads.
//!
//! This crate provides:
//! - Upload job enqueueing with idempotency keys
//! - Worker consumption with retry counters, DLQ and crash recovery
//! - Liveness heartbeats for running jobs

pub mod error;
pub mod heartbeat;
pub mod job;
pub mod queue;

pub use error::{QueueError, QueueResult};
pub use heartbeat::{LivenessSink, RedisHeartbeat, HEARTBEAT_TTL_SECS};
pub use job::{JobId, QueueJob, UploadVideoJob};
pub use queue::{JobQueue, QueueConfig};
