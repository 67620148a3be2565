//! Job executor.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use reel_models::AssemblyResult;
use reel_queue::{AssemblyJob, JobQueue, ProgressChannel};

use crate::assembler::Assembler;
use crate::error::{is_retryable_kind, WorkerError, WorkerResult};
use crate::progress::progress_channel;

/// What happens to a delivered message once its job has finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Settlement {
    Ack,
    DeadLetter,
    /// Left pending for redelivery if the retry budget allows it
    Retry,
}

fn settlement(result: &AssemblyResult) -> Settlement {
    if result.success {
        Settlement::Ack
    } else if result.error_kind.is_some_and(is_retryable_kind) {
        Settlement::Retry
    } else {
        Settlement::DeadLetter
    }
}

/// Whether a retryable job has used up its attempts.
fn retries_exhausted(retry_count: u32, max_retries: u32) -> bool {
    retry_count >= max_retries
}

/// Job executor that processes assembly jobs from the queue.
pub struct JobExecutor {
    queue: Arc<JobQueue>,
    progress: Arc<ProgressChannel>,
    assembler: Arc<Assembler>,
    job_semaphore: Arc<Semaphore>,
    max_concurrent_jobs: usize,
    shutdown: watch::Sender<bool>,
    consumer_name: String,
}

impl JobExecutor {
    pub fn new(queue: JobQueue, progress: ProgressChannel, assembler: Assembler) -> Self {
        let max_concurrent_jobs = assembler.config().max_concurrent_jobs.max(1);
        let (shutdown, _) = watch::channel(false);

        Self {
            queue: Arc::new(queue),
            progress: Arc::new(progress),
            assembler: Arc::new(assembler),
            job_semaphore: Arc::new(Semaphore::new(max_concurrent_jobs)),
            max_concurrent_jobs,
            shutdown,
            consumer_name: format!("worker-{}", Uuid::new_v4()),
        }
    }

    /// Consume jobs until [`JobExecutor::shutdown`] is called.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            "Starting job executor '{}' with {} max concurrent jobs",
            self.consumer_name, self.max_concurrent_jobs
        );

        self.queue.init().await?;

        let claim_task = self.spawn_claim_task();
        let mut shutdown_rx = self.shutdown.subscribe();

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
        let shutdown_timeout = self.assembler.config().shutdown_timeout;
        if tokio::time::timeout(shutdown_timeout, self.wait_for_jobs())
            .await
            .is_err()
        {
            warn!("In-flight jobs still running after {:?}", shutdown_timeout);
        }

        info!("Job executor stopped");
        Ok(())
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Periodically pick up jobs abandoned by crashed workers.
    fn spawn_claim_task(&self) -> tokio::task::JoinHandle<()> {
        let queue = Arc::clone(&self.queue);
        let progress = Arc::clone(&self.progress);
        let assembler = Arc::clone(&self.assembler);
        let semaphore = Arc::clone(&self.job_semaphore);
        let consumer_name = self.consumer_name.clone();
        let mut shutdown_rx = self.shutdown.subscribe();
        let claim_interval = self.assembler.config().claim_interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(claim_interval);
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
                        match queue.claim_pending(&consumer_name, available).await {
                            Ok(jobs) if !jobs.is_empty() => {
                                info!("Claimed {} pending jobs", jobs.len());
                                for (message_id, job) in jobs {
                                    let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                                        break;
                                    };
                                    let queue = Arc::clone(&queue);
                                    let progress = Arc::clone(&progress);
                                    let assembler = Arc::clone(&assembler);
                                    tokio::spawn(async move {
                                        let _permit = permit;
                                        Self::execute_job(assembler, queue, progress, message_id, job).await;
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

    /// Consume and dispatch jobs from the queue.
    async fn consume_jobs(&self) -> WorkerResult<()> {
        let available = self.job_semaphore.available_permits();
        if available == 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            return Ok(());
        }

        let jobs = self
            .queue
            .consume(&self.consumer_name, 1000, available.min(5))
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
            let queue = Arc::clone(&self.queue);
            let progress = Arc::clone(&self.progress);
            let assembler = Arc::clone(&self.assembler);

            tokio::spawn(async move {
                let _permit = permit;
                Self::execute_job(assembler, queue, progress, message_id, job).await;
            });
        }

        Ok(())
    }

    /// Run one job, forward its progress, and settle it with the queue.
    async fn execute_job(
        assembler: Arc<Assembler>,
        queue: Arc<JobQueue>,
        progress: Arc<ProgressChannel>,
        message_id: String,
        job: AssemblyJob,
    ) {
        let job_id = job.job_id.clone();
        info!(job_id = %job_id, "Executing job");

        let (tx, mut rx) = progress_channel();
        let forwarder = {
            let progress = Arc::clone(&progress);
            let job_id = job_id.clone();
            tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    if let Err(e) = progress.progress(&job_id, event).await {
                        warn!(job_id = %job_id, "Failed to publish progress: {}", e);
                    }
                }
            })
        };

        let result = assembler.run(&job_id, &job.spec, tx).await;
        // The sender was consumed by `run`, so the forwarder drains and exits
        forwarder.await.ok();

        if let Err(e) = progress.complete(&job_id, &result).await {
            warn!(job_id = %job_id, "Failed to publish result: {}", e);
        }

        Self::settle(&queue, &message_id, &job, &result).await;
    }

    async fn settle(queue: &JobQueue, message_id: &str, job: &AssemblyJob, result: &AssemblyResult) {
        let job_id = &job.job_id;
        let error = result.error.as_deref().unwrap_or("unknown error");

        match settlement(result) {
            Settlement::Ack => {
                info!(job_id = %job_id, "Job completed successfully");
                if let Err(e) = queue.ack(message_id).await {
                    error!(job_id = %job_id, "Failed to ack job: {}", e);
                }
                return;
            }
            Settlement::DeadLetter => {
                warn!(job_id = %job_id, "Job failed permanently: {}", error);
                if let Err(e) = queue.dlq(message_id, job, error).await {
                    error!(job_id = %job_id, "Failed to move job to DLQ: {}", e);
                }
                return;
            }
            Settlement::Retry => {}
        }

        // An unreadable counter counts as exhausted
        let retry_count = queue.increment_retry(message_id).await.unwrap_or(u32::MAX);
        let max_retries = queue.max_retries();

        if retries_exhausted(retry_count, max_retries) {
            warn!(job_id = %job_id, "Job exceeded max retries ({}), moving to DLQ", max_retries);
            if let Err(e) = queue.dlq(message_id, job, error).await {
                error!(job_id = %job_id, "Failed to move job to DLQ: {}", e);
            }
        } else {
            info!(
                job_id = %job_id,
                "Job will be retried (attempt {}/{})", retry_count, max_retries
            );
        }
    }

    /// Wait for all in-flight jobs to complete.
    async fn wait_for_jobs(&self) {
        while self.job_semaphore.available_permits() < self.max_concurrent_jobs {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}
