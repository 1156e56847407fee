//! Background liveness beats for a running job.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use vodtube_queue::{JobId, LivenessSink};

use crate::retry::FailureTracker;

/// Consecutive beat failures logged before the rest are suppressed.
const MAX_LOGGED_FAILURES: u32 = 3;

/// Handle to a running heartbeat task.
///
/// The task only reads the job id and writes to the sink. Stopping it or
/// letting it fail has no effect on the job.
pub struct HeartbeatHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl HeartbeatHandle {
    /// Start beating for `job_id` every `interval` until stopped.
    pub fn spawn(
        sink: Arc<dyn LivenessSink>,
        job_id: JobId,
        message_id: String,
        interval: Duration,
    ) -> Self {
        let (stop, mut stop_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            let mut failures = FailureTracker::new(MAX_LOGGED_FAILURES);

            loop {
                tokio::select! {
                    _ = stop_rx.changed() => break,
                    _ = ticker.tick() => {
                        match sink.beat(&job_id, &message_id).await {
                            Ok(()) => failures.record_success(),
                            Err(e) => {
                                if failures.record_failure() {
                                    warn!(job_id = %job_id, "Heartbeat failed: {}", e);
                                }
                            }
                        }
                    }
                }
            }

            if let Err(e) = sink.clear(&job_id).await {
                debug!(job_id = %job_id, "Failed to clear heartbeat: {}", e);
            }
        });

        Self { stop, task }
    }

    /// Stop beating and wait briefly for the final clear.
    pub async fn stop(self) {
        let _ = self.stop.send(true);
        let abort = self.task.abort_handle();
        if tokio::time::timeout(Duration::from_secs(5), self.task)
            .await
            .is_err()
        {
            abort.abort();
        }
    }
}
