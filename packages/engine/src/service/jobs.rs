//! Job orchestration: admission, lifecycle, and worker reports.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use handoff::{WorkItem, WorkQueue};

use crate::common::{JobId, PageRequest, Paged, TargetId, UserId};
use crate::domain::{JobStatus, ScrapeJob, Target};
use crate::error::{EngineError, StoreError};
use crate::service::dedup::DedupService;
use crate::store::{JobStore, TargetStore};

#[derive(Debug, Clone)]
pub struct CreateJobRequest {
    pub target_id: TargetId,
    pub config: serde_json::Map<String, serde_json::Value>,
    /// Earliest pickup time. `None` enqueues for immediate dispatch.
    pub scheduled_at: Option<DateTime<Utc>>,
}

/// One fetched page as reported by a worker.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub raw_content: String,
    pub http_status: i32,
    pub response_time_ms: i64,
}

/// What a worker report did to the job.
#[derive(Debug)]
pub enum ReportOutcome {
    Completed(ScrapeJob),
    Failed(ScrapeJob),
    /// The job had already reached a state the report no longer applies to
    /// (cancelled underneath the worker). Logged, acknowledged, no error.
    Ignored,
}

#[derive(Clone)]
pub struct JobService {
    targets: Arc<dyn TargetStore>,
    jobs: Arc<dyn JobStore>,
    dedup: DedupService,
    queue: Arc<dyn WorkQueue>,
}

impl JobService {
    pub fn new(
        targets: Arc<dyn TargetStore>,
        jobs: Arc<dyn JobStore>,
        dedup: DedupService,
        queue: Arc<dyn WorkQueue>,
    ) -> Self {
        Self {
            targets,
            jobs,
            dedup,
            queue,
        }
    }

    /// Admits and enqueues a new job. At most one pending or running job may
    /// exist per target; the check here fails fast and the storage
    /// constraint decides the race between concurrent creates.
    pub async fn create_job(
        &self,
        actor: UserId,
        request: CreateJobRequest,
    ) -> Result<ScrapeJob, EngineError> {
        let target = self
            .targets
            .get_target(request.target_id)
            .await?
            .ok_or_else(|| EngineError::not_found("target", request.target_id))?;
        if !target.is_owned_by(actor) {
            return Err(EngineError::access_denied("target"));
        }
        if !target.active {
            return Err(EngineError::TargetInactive {
                target_id: request.target_id.into_uuid(),
            });
        }
        if let Some(active) = self.jobs.find_active_job_by_target(request.target_id).await? {
            tracing::debug!(
                target_id = %request.target_id,
                active_job_id = %active.id,
                "Rejecting job creation, target already has an active job"
            );
            return Err(EngineError::DuplicateActiveJob {
                target_id: request.target_id.into_uuid(),
            });
        }

        let job = ScrapeJob::new(request.target_id, actor, request.config, request.scheduled_at);
        match self.jobs.insert_job(&job).await {
            Ok(()) => {}
            Err(StoreError::ActiveJobConflict) => {
                return Err(EngineError::DuplicateActiveJob {
                    target_id: request.target_id.into_uuid(),
                })
            }
            Err(e) => return Err(e.into()),
        }

        let item = match job.scheduled_at {
            Some(at) => WorkItem::scheduled(job.id.into_uuid(), job.target_id.into_uuid(), at),
            None => WorkItem::new(job.id.into_uuid(), job.target_id.into_uuid()),
        };
        if let Err(e) = self.queue.enqueue(item).await {
            // The pending row can never be delivered; fail it so the
            // target's admission slot is not left occupied by a job no
            // worker will ever see.
            tracing::error!(job_id = %job.id, error = %e, "Enqueue failed, failing the job");
            let failed = job.fail(Utc::now(), format!("could not enqueue job: {e}"))?;
            self.jobs.update_job(&failed, JobStatus::Pending).await?;
            return Err(e.into());
        }

        tracing::info!(
            job_id = %job.id,
            target_id = %job.target_id,
            scheduled_at = ?job.scheduled_at,
            "Created scrape job"
        );
        Ok(job)
    }

    /// Cancels a pending or running job. `InvalidTransition` once the job is
    /// terminal.
    pub async fn cancel_job(&self, actor: UserId, job_id: JobId) -> Result<ScrapeJob, EngineError> {
        loop {
            let job = self.authorized_job(actor, job_id).await?;
            let from = job.status;
            let cancelled = job.cancel(Utc::now())?;
            if self.jobs.update_job(&cancelled, from).await? {
                tracing::info!(job_id = %job_id, "Cancelled job");
                return Ok(cancelled);
            }
            // A concurrent transition won; re-read and judge the new status.
        }
    }

    pub async fn get_job(&self, actor: UserId, job_id: JobId) -> Result<ScrapeJob, EngineError> {
        self.authorized_job(actor, job_id).await
    }

    pub async fn list_jobs(
        &self,
        actor: UserId,
        status: Option<JobStatus>,
        page: PageRequest,
    ) -> Result<Paged<ScrapeJob>, EngineError> {
        let rows = self.jobs.list_jobs_by_user(actor, status, page).await?;
        Ok(Paged::from_overfetched(page, rows))
    }

    pub async fn list_jobs_for_target(
        &self,
        actor: UserId,
        target_id: TargetId,
    ) -> Result<Vec<ScrapeJob>, EngineError> {
        let target = self
            .targets
            .get_target(target_id)
            .await?
            .ok_or_else(|| EngineError::not_found("target", target_id))?;
        if !target.is_owned_by(actor) {
            return Err(EngineError::access_denied("target"));
        }
        Ok(self.jobs.list_jobs_by_target(target_id).await?)
    }

    /// Worker-facing: moves a freshly dequeued job to running. An
    /// `InvalidTransition` means the job was cancelled (or otherwise
    /// finished) after being enqueued; callers skip the item.
    pub async fn start_job(&self, job_id: JobId) -> Result<ScrapeJob, EngineError> {
        loop {
            let job = self
                .jobs
                .get_job(job_id)
                .await?
                .ok_or_else(|| EngineError::not_found("job", job_id))?;
            let from = job.status;
            let started = job.start(Utc::now())?;
            if self.jobs.update_job(&started, from).await? {
                tracing::info!(job_id = %job_id, "Started job");
                return Ok(started);
            }
        }
    }

    /// Worker-facing: the job and its target, no ownership check.
    pub async fn load_job_context(
        &self,
        job_id: JobId,
    ) -> Result<(ScrapeJob, Target), EngineError> {
        let job = self
            .jobs
            .get_job(job_id)
            .await?
            .ok_or_else(|| EngineError::not_found("job", job_id))?;
        let target = self
            .targets
            .get_target(job.target_id)
            .await?
            .ok_or_else(|| EngineError::not_found("target", job.target_id))?;
        Ok((job, target))
    }

    /// Records the fetched pages, completes the job, acknowledges the item.
    ///
    /// A failure while recording does not leave the job completed: the job
    /// fails with a message naming the page, and the pages recorded before
    /// the failure stay (they are deduplicated facts in their own right).
    pub async fn report_completion(
        &self,
        item: &WorkItem,
        pages_found: i32,
        pages_scraped: i32,
        fetched_pages: Vec<FetchedPage>,
    ) -> Result<ReportOutcome, EngineError> {
        let job_id = JobId::from_uuid(item.job_id);
        let job = self
            .jobs
            .get_job(job_id)
            .await?
            .ok_or_else(|| EngineError::not_found("job", job_id))?;
        if job.status != JobStatus::Running {
            return self.ignore_report(item, job_id, "completion").await;
        }

        let mut recording_failure: Option<(String, EngineError)> = None;
        for fetched in &fetched_pages {
            if let Err(e) = self.record_fetched(job.target_id, job_id, fetched).await {
                recording_failure = Some((fetched.url.clone(), e));
                break;
            }
        }

        match recording_failure {
            None => {
                let completed = job.complete(Utc::now(), pages_found, pages_scraped)?;
                if !self.jobs.update_job(&completed, JobStatus::Running).await? {
                    return self.ignore_report(item, job_id, "completion").await;
                }
                self.queue.acknowledge(item).await?;
                tracing::info!(
                    job_id = %job_id,
                    pages_found,
                    pages_scraped,
                    "Job completed"
                );
                Ok(ReportOutcome::Completed(completed))
            }
            Some((url, error)) => {
                tracing::error!(
                    job_id = %job_id,
                    url = %url,
                    error = %error,
                    "Failed to record fetched page, failing job"
                );
                let message = format!("failed to record page {url}: {error}");
                let failed = job.fail(Utc::now(), message)?;
                if !self.jobs.update_job(&failed, JobStatus::Running).await? {
                    return self.ignore_report(item, job_id, "completion").await;
                }
                self.queue.acknowledge(item).await?;
                Ok(ReportOutcome::Failed(failed))
            }
        }
    }

    /// Marks the job failed and acknowledges the item. The job is done;
    /// any retry is a new job created by a caller.
    pub async fn report_failure(
        &self,
        item: &WorkItem,
        message: impl Into<String>,
    ) -> Result<ReportOutcome, EngineError> {
        let message = message.into();
        let job_id = JobId::from_uuid(item.job_id);
        loop {
            let job = self
                .jobs
                .get_job(job_id)
                .await?
                .ok_or_else(|| EngineError::not_found("job", job_id))?;
            if job.is_terminal() {
                return self.ignore_report(item, job_id, "failure").await;
            }
            let from = job.status;
            let failed = job.fail(Utc::now(), message.clone())?;
            if self.jobs.update_job(&failed, from).await? {
                tracing::warn!(job_id = %job_id, error = %message, "Job failed");
                self.queue.acknowledge(item).await?;
                return Ok(ReportOutcome::Failed(failed));
            }
        }
    }

    async fn record_fetched(
        &self,
        target_id: TargetId,
        job_id: JobId,
        fetched: &FetchedPage,
    ) -> Result<(), EngineError> {
        let page = self
            .dedup
            .record_page(target_id, job_id, &fetched.url)
            .await?;
        self.dedup
            .record_version(
                page.id,
                job_id,
                fetched.raw_content.clone(),
                fetched.http_status,
                fetched.response_time_ms,
            )
            .await?;
        Ok(())
    }

    async fn ignore_report(
        &self,
        item: &WorkItem,
        job_id: JobId,
        report: &'static str,
    ) -> Result<ReportOutcome, EngineError> {
        let status = self.jobs.get_job(job_id).await?.map(|j| j.status);
        tracing::warn!(
            job_id = %job_id,
            status = ?status,
            report,
            "Ignoring report for job no longer running"
        );
        self.queue.acknowledge(item).await?;
        Ok(ReportOutcome::Ignored)
    }

    async fn authorized_job(&self, actor: UserId, job_id: JobId) -> Result<ScrapeJob, EngineError> {
        let job = self
            .jobs
            .get_job(job_id)
            .await?
            .ok_or_else(|| EngineError::not_found("job", job_id))?;
        if !job.is_owned_by(actor) {
            return Err(EngineError::access_denied("job"));
        }
        Ok(job)
    }
}
