//! Fetch worker pool.
//!
//! Each worker is a queue consumer: dequeue an item, move the job to
//! running, fetch the target's base URL through the [`Fetcher`] contract,
//! and report the outcome back. Items whose job cannot even be loaded or
//! started because of storage trouble are requeued so another delivery can
//! try again; a redelivered item whose job is already running is resumed
//! (the fetch is replayed and reported); items whose job has already
//! finished are acknowledged and dropped.
//!
//! Shutdown: the pool owner cancels the token (and closes the queue). A
//! worker blocked in dequeue wakes and exits; a worker mid-item finishes
//! that item first.

use std::sync::Arc;
use std::time::Duration;

use handoff::{QueueError, WorkItem};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::common::JobId;
use crate::domain::{JobStatus, ScrapeJob, Target};
use crate::error::EngineError;
use crate::fetch::{FetchEngine, FetchRequest};
use crate::service::{CoordinatorKernel, FetchedPage};

#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Number of concurrent consumer tasks.
    pub workers: usize,
    /// Engine requested from the fetch contract.
    pub engine: FetchEngine,
    /// How long shutdown waits for in-flight items.
    pub drain_timeout: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            engine: FetchEngine::default(),
            drain_timeout: Duration::from_secs(30),
        }
    }
}

pub struct FetchWorker {
    kernel: Arc<CoordinatorKernel>,
    engine: FetchEngine,
    worker_id: String,
}

impl FetchWorker {
    pub fn new(kernel: Arc<CoordinatorKernel>, engine: FetchEngine, worker_id: String) -> Self {
        Self {
            kernel,
            engine,
            worker_id,
        }
    }

    pub async fn run(self, shutdown: CancellationToken) {
        info!(worker_id = %self.worker_id, engine = %self.engine, "fetch worker starting");

        loop {
            let item = tokio::select! {
                _ = shutdown.cancelled() => break,
                result = self.kernel.queue.dequeue() => match result {
                    Ok(item) => item,
                    Err(QueueError::Closed) => break,
                    Err(e) => {
                        error!(worker_id = %self.worker_id, error = %e, "dequeue failed");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                        continue;
                    }
                },
            };
            self.process_item(item).await;
        }

        info!(worker_id = %self.worker_id, "fetch worker stopped");
    }

    async fn process_item(&self, item: WorkItem) {
        let job_id = JobId::from_uuid(item.job_id);

        let (loaded, target) = match self.kernel.jobs.load_job_context(job_id).await {
            Ok(context) => context,
            Err(EngineError::NotFound { .. }) => {
                warn!(job_id = %job_id, "dropping work item for unknown job");
                self.acknowledge(&item).await;
                return;
            }
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "could not load job, requeueing item");
                self.requeue(item).await;
                return;
            }
        };

        let job = match self.kernel.jobs.start_job(job_id).await {
            Ok(job) => job,
            Err(EngineError::InvalidTransition {
                from: JobStatus::Running,
                ..
            }) => {
                // A previous delivery started the job but never got its
                // report through. The report paths only need the job to be
                // running and recording is idempotent, so replay the fetch
                // instead of stranding the job.
                info!(job_id = %job_id, attempt = item.attempt, "resuming job already running");
                loaded
            }
            Err(EngineError::InvalidTransition { from, .. }) => {
                info!(job_id = %job_id, status = %from, "skipping job no longer pending");
                self.acknowledge(&item).await;
                return;
            }
            Err(EngineError::NotFound { .. }) => {
                warn!(job_id = %job_id, "dropping work item for unknown job");
                self.acknowledge(&item).await;
                return;
            }
            Err(e) => {
                // The claim could not be delivered; nothing ran yet, so the
                // item is safe to hand to another consumer.
                warn!(job_id = %job_id, error = %e, "could not start job, requeueing item");
                self.requeue(item).await;
                return;
            }
        };

        let request = FetchRequest {
            url: target.base_url.to_string(),
            engine: self.engine,
            config: merged_config(&target, &job),
        };
        info!(
            worker_id = %self.worker_id,
            job_id = %job_id,
            url = %request.url,
            attempt = item.attempt,
            "fetching page"
        );

        let report = match self.kernel.fetcher.fetch(request).await {
            Ok(outcome) if outcome.is_success() => {
                let fetched = FetchedPage {
                    url: target.base_url.to_string(),
                    raw_content: outcome.raw_content,
                    http_status: outcome.http_status,
                    response_time_ms: outcome.response_time_ms,
                };
                self.kernel
                    .jobs
                    .report_completion(&item, 1, 1, vec![fetched])
                    .await
            }
            Ok(outcome) => {
                self.kernel
                    .jobs
                    .report_failure(&item, outcome.failure_message())
                    .await
            }
            Err(e) => {
                self.kernel
                    .jobs
                    .report_failure(&item, format!("fetch failed: {e:#}"))
                    .await
            }
        };

        if let Err(e) = report {
            // The job may be half-reported but recording is idempotent, so
            // a redelivery can replay it.
            error!(job_id = %job_id, error = %e, "failed to report job outcome, requeueing item");
            self.requeue(item).await;
        }
    }

    async fn acknowledge(&self, item: &WorkItem) {
        if let Err(e) = self.kernel.queue.acknowledge(item).await {
            error!(job_id = %item.job_id, error = %e, "failed to acknowledge work item");
        }
    }

    async fn requeue(&self, item: WorkItem) {
        let job_id = item.job_id;
        if let Err(e) = self.kernel.queue.requeue(item).await {
            error!(job_id = %job_id, error = %e, "failed to requeue work item");
        }
    }
}

/// Job config wins over target config on key collisions.
fn merged_config(target: &Target, job: &ScrapeJob) -> serde_json::Map<String, serde_json::Value> {
    let mut config = target.config.clone();
    for (key, value) in &job.config {
        config.insert(key.clone(), value.clone());
    }
    config
}

/// Spawns the worker pool. Returned handles outlive the token; pass them to
/// [`drain_workers`] on shutdown.
pub fn spawn_fetch_workers(
    kernel: Arc<CoordinatorKernel>,
    config: &WorkerPoolConfig,
    shutdown: &CancellationToken,
) -> Vec<JoinHandle<()>> {
    (0..config.workers)
        .map(|i| {
            let worker = FetchWorker::new(
                kernel.clone(),
                config.engine,
                format!("fetch-worker-{i}"),
            );
            let token = shutdown.clone();
            tokio::spawn(worker.run(token))
        })
        .collect()
}

/// Waits for every worker to finish, up to `timeout`.
pub async fn drain_workers(handles: Vec<JoinHandle<()>>, timeout: Duration) {
    match tokio::time::timeout(timeout, futures::future::join_all(handles)).await {
        Ok(_) => info!("all fetch workers stopped"),
        Err(_) => warn!("fetch workers did not stop within the drain timeout"),
    }
}
