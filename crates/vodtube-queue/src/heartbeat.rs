//! Job liveness signals.
//!
//! A worker reports each running job through a [`LivenessSink`]. The Redis
//! sink writes a short-lived key per job and resets the idle time of the
//! job's stream entry, so crash recovery does not reclaim a long upload that
//! is still making progress.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use tracing::debug;

use crate::error::QueueResult;
use crate::job::JobId;
use crate::queue::QueueConfig;

/// Seconds a heartbeat key outlives the last beat.
pub const HEARTBEAT_TTL_SECS: u64 = 120;

pub(crate) fn heartbeat_key(job_id: &JobId) -> String {
    format!("vodtube:heartbeat:{}", job_id)
}

/// Receives liveness signals for running jobs.
#[async_trait]
pub trait LivenessSink: Send + Sync {
    /// Report that `job_id`, read from stream entry `message_id`, is alive.
    async fn beat(&self, job_id: &JobId, message_id: &str) -> QueueResult<()>;

    /// Forget a job once it has finished.
    async fn clear(&self, job_id: &JobId) -> QueueResult<()>;
}

/// Redis-backed liveness sink.
#[derive(Clone)]
pub struct RedisHeartbeat {
    client: redis::Client,
    stream_name: String,
    consumer_group: String,
    consumer_name: String,
}

impl RedisHeartbeat {
    pub fn new(
        client: redis::Client,
        config: &QueueConfig,
        consumer_name: impl Into<String>,
    ) -> Self {
        Self {
            client,
            stream_name: config.stream_name.clone(),
            consumer_group: config.consumer_group.clone(),
            consumer_name: consumer_name.into(),
        }
    }

    /// Time of the last beat for `job_id`, if it has not expired.
    pub async fn last_beat(&self, job_id: &JobId) -> QueueResult<Option<DateTime<Utc>>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let value: Option<String> = conn.get(heartbeat_key(job_id)).await?;
        Ok(value
            .and_then(|v| DateTime::parse_from_rfc3339(&v).ok())
            .map(|t| t.with_timezone(&Utc)))
    }
}

#[async_trait]
impl LivenessSink for RedisHeartbeat {
    async fn beat(&self, job_id: &JobId, message_id: &str) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        conn.set_ex::<_, _, ()>(
            heartbeat_key(job_id),
            Utc::now().to_rfc3339(),
            HEARTBEAT_TTL_SECS,
        )
        .await?;

        // Re-claiming our own entry with min-idle 0 resets its idle time.
        redis::cmd("XCLAIM")
            .arg(&self.stream_name)
            .arg(&self.consumer_group)
            .arg(&self.consumer_name)
            .arg(0)
            .arg(message_id)
            .arg("JUSTID")
            .query_async::<()>(&mut conn)
            .await?;

        debug!(job_id = %job_id, message_id = %message_id, "Heartbeat");
        Ok(())
    }

    async fn clear(&self, job_id: &JobId) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.del::<_, ()>(heartbeat_key(job_id)).await?;
        Ok(())
    }
}
