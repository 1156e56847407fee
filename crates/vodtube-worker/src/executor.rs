//! Job executor.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

use vodtube_queue::{JobQueue, LivenessSink, QueueJob};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::heartbeat::HeartbeatHandle;
use crate::logging::JobLogger;
use crate::metrics;
use crate::retry::{retry_async, RetryPolicy};
use crate::upload::{process_upload, UploadContext, UploadOutcome};

/// Shared state handed to every job task.
struct JobRuntime {
    config: WorkerConfig,
    queue: Arc<JobQueue>,
    liveness: Arc<dyn LivenessSink>,
    ctx: UploadContext,
}

/// Consumes upload jobs from the queue and runs them.
pub struct JobExecutor {
    runtime: Arc<JobRuntime>,
    job_semaphore: Arc<Semaphore>,
    shutdown: watch::Sender<bool>,
    consumer_name: String,
}

impl JobExecutor {
    pub fn new(config: WorkerConfig, queue: JobQueue, ctx: UploadContext) -> Self {
        let job_semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        let (shutdown, _) = watch::channel(false);
        let consumer_name = format!("worker-{}", Uuid::new_v4());
        let liveness: Arc<dyn LivenessSink> = Arc::new(queue.heartbeat(consumer_name.clone()));

        Self {
            runtime: Arc::new(JobRuntime {
                config,
                queue: Arc::new(queue),
                liveness,
                ctx,
            }),
            job_semaphore,
            shutdown,
            consumer_name,
        }
    }

    pub fn consumer_name(&self) -> &str {
        &self.consumer_name
    }

    /// Run until [`shutdown`](Self::shutdown) is signalled, then drain
    /// in-flight jobs.
    pub async fn run(&self) -> WorkerResult<()> {
        let config = &self.runtime.config;
        info!(
            "Starting job executor '{}' with {} max concurrent jobs",
            self.consumer_name, config.max_concurrent_jobs
        );

        self.runtime.queue.init().await?;

        let mut shutdown_rx = self.shutdown.subscribe();
        let claim_task = self.spawn_claim_task();

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping executor");
                        break;
                    }
                }
                result = self.consume_jobs() => {
                    if let Err(e) = result {
                        error!("Error consuming jobs: {}", e);
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        }

        claim_task.abort();

        info!("Waiting for in-flight jobs to complete...");
        if tokio::time::timeout(config.shutdown_timeout, self.wait_for_jobs())
            .await
            .is_err()
        {
            warn!(
                "In-flight jobs still running after {:?}; they will be reclaimed",
                config.shutdown_timeout
            );
        }

        info!("Job executor stopped");
        Ok(())
    }

    /// Periodically take over entries abandoned by crashed consumers.
    fn spawn_claim_task(&self) -> tokio::task::JoinHandle<()> {
        let runtime = Arc::clone(&self.runtime);
        let semaphore = Arc::clone(&self.job_semaphore);
        let consumer_name = self.consumer_name.clone();
        let mut shutdown_rx = self.shutdown.subscribe();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(runtime.config.claim_interval);
            let min_idle_ms = runtime.config.claim_min_idle.as_millis() as u64;

            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = interval.tick() => {
                        let available = semaphore.available_permits();
                        if available == 0 {
                            continue;
                        }
                        match runtime.queue.claim_pending(&consumer_name, min_idle_ms, available).await {
                            Ok(jobs) if !jobs.is_empty() => {
                                info!("Claimed {} pending jobs", jobs.len());
                                for (message_id, job) in jobs {
                                    let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                                        break;
                                    };
                                    let runtime = Arc::clone(&runtime);
                                    tokio::spawn(async move {
                                        let _permit = permit;
                                        Self::execute_job(runtime, message_id, job).await;
                                    });
                                }
                            }
                            Ok(_) => {}
                            Err(e) => warn!("Failed to claim pending jobs: {}", e),
                        }
                    }
                }
            }
        })
    }

    async fn consume_jobs(&self) -> WorkerResult<()> {
        let available = self.job_semaphore.available_permits();
        if available == 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            return Ok(());
        }

        let jobs = self
            .runtime
            .queue
            .consume(&self.consumer_name, 1000, available)
            .await?;

        if jobs.is_empty() {
            return Ok(());
        }

        debug!("Consumed {} jobs from queue", jobs.len());

        for (message_id, job) in jobs {
            let permit = Arc::clone(&self.job_semaphore)
                .acquire_owned()
                .await
                .map_err(|_| WorkerError::config_error("job semaphore closed"))?;
            let runtime = Arc::clone(&self.runtime);

            tokio::spawn(async move {
                let _permit = permit;
                Self::execute_job(runtime, message_id, job).await;
            });
        }

        Ok(())
    }

    /// Run one job under its timeout and settle it on the queue.
    async fn execute_job(runtime: Arc<JobRuntime>, message_id: String, job: QueueJob) {
        let logger = JobLogger::new(job.job_id(), job.video_id(), job.kind());
        let span = logger.create_span();

        async {
            let heartbeat = HeartbeatHandle::spawn(
                Arc::clone(&runtime.liveness),
                job.job_id().clone(),
                message_id.clone(),
                runtime.config.job_heartbeat_interval,
            );

            let result = Self::process_job(&runtime, &job, &logger).await;
            heartbeat.stop().await;

            match result {
                Ok(outcome) => {
                    if !outcome.is_skipped() {
                        info!("Job {} completed successfully", job.job_id());
                    }
                    metrics::record_job_completed(job.kind());
                    Self::settle(&runtime, &message_id, &job, None).await;
                }
                Err(e) => {
                    error!("Job {} failed: {}", job.job_id(), e);
                    metrics::record_job_failed(job.kind(), e.kind());
                    Self::handle_failure(&runtime, &message_id, &job, &e).await;
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn process_job(
        runtime: &JobRuntime,
        job: &QueueJob,
        logger: &JobLogger,
    ) -> WorkerResult<UploadOutcome> {
        let timeout = runtime.config.job_timeout.min(job.timeout());

        match job {
            QueueJob::UploadVideo(j) => {
                tokio::time::timeout(timeout, process_upload(&runtime.ctx, &j.video_id, logger))
                    .await
                    .map_err(|_| WorkerError::Timeout(timeout))?
            }
        }
    }

    /// Count the failed attempt and dead-letter the job once it is exhausted
    /// or cannot succeed.
    async fn handle_failure(
        runtime: &JobRuntime,
        message_id: &str,
        job: &QueueJob,
        error: &WorkerError,
    ) {
        let queue = &runtime.queue;
        let max_retries = queue.max_retries();
        let attempts = match queue.increment_retry(message_id).await {
            Ok(n) => n,
            Err(e) => {
                warn!("Failed to increment retry count for job {}: {}", job.job_id(), e);
                max_retries
            }
        };

        if attempts >= max_retries || !error.is_retryable() {
            warn!(
                "Job {} gave up after {} attempt(s) (max {}), moving to DLQ",
                job.job_id(),
                attempts,
                max_retries
            );
            metrics::record_job_dead_lettered(job.kind());
            Self::settle(runtime, message_id, job, Some(&error.to_string())).await;
        } else {
            info!(
                "Job {} will be retried (attempt {}/{})",
                job.job_id(),
                attempts,
                max_retries
            );
        }
    }

    /// Remove the job from the stream, to the DLQ when `dlq_reason` is set,
    /// and release its idempotency key.
    async fn settle(runtime: &JobRuntime, message_id: &str, job: &QueueJob, dlq_reason: Option<&str>) {
        let queue = &runtime.queue;
        let policy = RetryPolicy::new("settle_job");

        let settled = match dlq_reason {
            Some(reason) => retry_async(&policy, || queue.dlq(message_id, job, reason)).await,
            None => retry_async(&policy, || queue.ack(message_id)).await,
        };
        if let Err(e) = settled {
            error!("Failed to settle job {}: {}", job.job_id(), e);
        }

        if let Err(e) = queue.clear_dedup(job).await {
            warn!("Failed to clear dedup key for job {}: {}", job.job_id(), e);
        }
    }

    async fn wait_for_jobs(&self) {
        let max = self.runtime.config.max_concurrent_jobs;
        while self.job_semaphore.available_permits() < max {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}
