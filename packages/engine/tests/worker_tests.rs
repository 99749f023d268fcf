//! Integration tests for the fetch worker pool.
//!
//! Spins up real worker tasks against the in-process queue and a mock
//! fetcher, then watches jobs move through the state machine end to end.

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::common::{create_test_job, create_test_target, test_kernel};
use async_trait::async_trait;
use chrono::Utc;
use handoff::InProcessQueue;
use scrape_engine::common::{JobId, PageRequest, TargetId, UserId};
use scrape_engine::domain::{JobStatus, ScrapeJob};
use scrape_engine::error::StoreError;
use scrape_engine::service::{CoordinatorKernel, CreateJobRequest};
use scrape_engine::store::{JobStore, MemoryStore};
use scrape_engine::test_dependencies::{MockFetcher, TestDependencies};
use scrape_engine::worker::{drain_workers, spawn_fetch_workers, WorkerPoolConfig};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Poll until the job reaches `status`, panicking after five seconds.
async fn wait_for_status(
    kernel: &Arc<CoordinatorKernel>,
    user: UserId,
    job_id: JobId,
    status: JobStatus,
) -> ScrapeJob {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let job = kernel.jobs.get_job(user, job_id).await.expect("get job");
        if job.status == status {
            return job;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("job stuck in {}, waiting for {}", job.status, status);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn spawn_pool(
    kernel: &Arc<CoordinatorKernel>,
    workers: usize,
) -> (CancellationToken, Vec<JoinHandle<()>>) {
    let config = WorkerPoolConfig {
        workers,
        ..WorkerPoolConfig::default()
    };
    let shutdown = CancellationToken::new();
    let handles = spawn_fetch_workers(kernel.clone(), &config, &shutdown);
    (shutdown, handles)
}

async fn stop_pool(
    queue: &Arc<InProcessQueue>,
    shutdown: CancellationToken,
    handles: Vec<JoinHandle<()>>,
) {
    shutdown.cancel();
    queue.close().await;
    drain_workers(handles, Duration::from_secs(5)).await;
}

// =============================================================================
// Happy Path Tests
// =============================================================================

/// Test that a worker picks up a pending job, fetches the target's base
/// URL, and records the page
#[tokio::test]
async fn worker_completes_a_job_end_to_end() {
    // Arrange
    let deps = TestDependencies::new()
        .mock_fetcher(MockFetcher::new().with_content("<html>hello</html>"));
    let fetcher = deps.fetcher.clone();
    let kernel = deps.clone().into_kernel();
    let user = UserId::new();
    let target = create_test_target(&kernel, user, "https://example.com").await;
    let job = create_test_job(&kernel, user, target.id).await;

    // Act
    let (shutdown, handles) = spawn_pool(&kernel, 1);
    let completed = wait_for_status(&kernel, user, job.id, JobStatus::Completed).await;
    stop_pool(&deps.queue, shutdown, handles).await;

    // Assert
    assert_eq!(completed.pages_found, 1);
    assert_eq!(completed.pages_scraped, 1);
    assert!(completed.started_at.is_some());
    assert!(completed.completed_at.is_some());
    assert!(
        fetcher.was_fetched("https://example.com/"),
        "worker fetches the target base URL, got: {:?}",
        fetcher.fetched_urls()
    );

    let pages = kernel
        .pages
        .list_pages(user, target.id, PageRequest::first())
        .await
        .expect("list pages");
    assert_eq!(pages.len(), 1);
    assert_eq!(pages.items[0].url, "https://example.com/");
}

/// Test that two workers drain a queue of jobs across targets
#[tokio::test]
async fn multiple_workers_share_the_queue() {
    let (kernel, deps) = test_kernel();
    let user = UserId::new();
    let mut jobs = Vec::new();
    for base_url in [
        "https://one.example",
        "https://two.example",
        "https://three.example",
    ] {
        let target = create_test_target(&kernel, user, base_url).await;
        jobs.push(create_test_job(&kernel, user, target.id).await);
    }

    let (shutdown, handles) = spawn_pool(&kernel, 2);
    for job in &jobs {
        wait_for_status(&kernel, user, job.id, JobStatus::Completed).await;
    }
    stop_pool(&deps.queue, shutdown, handles).await;

    assert_eq!(deps.fetcher.call_count(), 3, "every job fetched exactly once");
}

// =============================================================================
// Failure Path Tests
// =============================================================================

/// Test that an HTTP error status fails the job with the status in the
/// failure reason and records no page
#[tokio::test]
async fn failed_fetch_fails_the_job() {
    let deps = TestDependencies::new()
        .mock_fetcher(MockFetcher::new().with_status(503, "<html>unavailable</html>"));
    let kernel = deps.clone().into_kernel();
    let user = UserId::new();
    let target = create_test_target(&kernel, user, "https://example.com").await;
    let job = create_test_job(&kernel, user, target.id).await;

    let (shutdown, handles) = spawn_pool(&kernel, 1);
    let failed = wait_for_status(&kernel, user, job.id, JobStatus::Failed).await;
    stop_pool(&deps.queue, shutdown, handles).await;

    let message = failed.error_message.expect("failure reason recorded");
    assert!(message.contains("503"), "got: {message}");

    let pages = kernel
        .pages
        .list_pages(user, target.id, PageRequest::first())
        .await
        .expect("list pages");
    assert!(pages.is_empty(), "no page is recorded for a failed fetch");
}

/// Test that a broken fetch mechanism fails the job with the underlying
/// error in the failure reason
#[tokio::test]
async fn fetch_engine_error_fails_the_job() {
    let deps = TestDependencies::new()
        .mock_fetcher(MockFetcher::new().with_fetch_error("browser pool exhausted"));
    let kernel = deps.clone().into_kernel();
    let user = UserId::new();
    let target = create_test_target(&kernel, user, "https://example.com").await;
    let job = create_test_job(&kernel, user, target.id).await;

    let (shutdown, handles) = spawn_pool(&kernel, 1);
    let failed = wait_for_status(&kernel, user, job.id, JobStatus::Failed).await;
    stop_pool(&deps.queue, shutdown, handles).await;

    let message = failed.error_message.expect("failure reason recorded");
    assert!(message.contains("fetch failed"), "got: {message}");
    assert!(message.contains("browser pool exhausted"), "got: {message}");
}

// =============================================================================
// Queue Interaction Tests
// =============================================================================

/// Test that a job cancelled before pickup is skipped, not fetched
#[tokio::test]
async fn worker_skips_a_job_cancelled_before_pickup() {
    let (kernel, deps) = test_kernel();
    let user = UserId::new();
    let target = create_test_target(&kernel, user, "https://example.com").await;
    let job = create_test_job(&kernel, user, target.id).await;
    kernel.jobs.cancel_job(user, job.id).await.expect("cancel job");

    let (shutdown, handles) = spawn_pool(&kernel, 1);
    tokio::time::sleep(Duration::from_millis(200)).await;
    stop_pool(&deps.queue, shutdown, handles).await;

    let job = kernel.jobs.get_job(user, job.id).await.expect("get job");
    assert_eq!(job.status, JobStatus::Cancelled, "cancellation sticks");
    assert_eq!(deps.fetcher.call_count(), 0, "cancelled job must not be fetched");
}

/// Test that a scheduled job is not started before its deadline
#[tokio::test]
async fn scheduled_job_waits_for_its_deadline() {
    let (kernel, deps) = test_kernel();
    let user = UserId::new();
    let target = create_test_target(&kernel, user, "https://example.com").await;
    let at = Utc::now() + chrono::Duration::milliseconds(750);
    let job = kernel
        .jobs
        .create_job(
            user,
            CreateJobRequest {
                target_id: target.id,
                config: serde_json::Map::new(),
                scheduled_at: Some(at),
            },
        )
        .await
        .expect("create scheduled job");

    let (shutdown, handles) = spawn_pool(&kernel, 1);

    tokio::time::sleep(Duration::from_millis(100)).await;
    let early = kernel.jobs.get_job(user, job.id).await.expect("get job");
    assert_eq!(
        early.status,
        JobStatus::Pending,
        "job must not start before its deadline"
    );

    let completed = wait_for_status(&kernel, user, job.id, JobStatus::Completed).await;
    stop_pool(&deps.queue, shutdown, handles).await;

    let started = completed.started_at.expect("started_at set");
    assert!(
        started >= at,
        "job started at {started}, before its {at} deadline"
    );
}

// =============================================================================
// Redelivery Tests
// =============================================================================

/// JobStore that fails the first status write expecting `fail_expected`,
/// then behaves normally. Models a transient database outage hitting one
/// specific step of the worker pipeline.
struct FirstWriteFailure {
    inner: Arc<MemoryStore>,
    fail_expected: JobStatus,
    tripped: AtomicBool,
}

impl FirstWriteFailure {
    fn new(inner: Arc<MemoryStore>, fail_expected: JobStatus) -> Self {
        Self {
            inner,
            fail_expected,
            tripped: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl JobStore for FirstWriteFailure {
    async fn insert_job(&self, job: &ScrapeJob) -> Result<(), StoreError> {
        self.inner.insert_job(job).await
    }

    async fn update_job(&self, job: &ScrapeJob, expected: JobStatus) -> Result<bool, StoreError> {
        if expected == self.fail_expected && !self.tripped.swap(true, Ordering::SeqCst) {
            return Err(StoreError::Io(anyhow::anyhow!("connection reset")));
        }
        self.inner.update_job(job, expected).await
    }

    async fn get_job(&self, id: JobId) -> Result<Option<ScrapeJob>, StoreError> {
        self.inner.get_job(id).await
    }

    async fn find_active_job_by_target(
        &self,
        target_id: TargetId,
    ) -> Result<Option<ScrapeJob>, StoreError> {
        self.inner.find_active_job_by_target(target_id).await
    }

    async fn list_jobs_by_user(
        &self,
        user_id: UserId,
        status: Option<JobStatus>,
        page: PageRequest,
    ) -> Result<Vec<ScrapeJob>, StoreError> {
        self.inner.list_jobs_by_user(user_id, status, page).await
    }

    async fn list_jobs_by_target(
        &self,
        target_id: TargetId,
    ) -> Result<Vec<ScrapeJob>, StoreError> {
        self.inner.list_jobs_by_target(target_id).await
    }
}

fn flaky_kernel(
    fail_expected: JobStatus,
) -> (Arc<CoordinatorKernel>, Arc<InProcessQueue>, Arc<MockFetcher>) {
    let store = Arc::new(MemoryStore::new());
    let queue = Arc::new(InProcessQueue::new());
    let fetcher = Arc::new(MockFetcher::new());
    let kernel = Arc::new(CoordinatorKernel::new(
        store.clone(),
        Arc::new(FirstWriteFailure::new(store.clone(), fail_expected)),
        store,
        queue.clone(),
        fetcher.clone(),
    ));
    (kernel, queue, fetcher)
}

/// Test that a store error while starting the job requeues the claim and
/// a later delivery completes it
#[tokio::test]
async fn store_error_before_start_requeues_the_claim() {
    let (kernel, queue, fetcher) = flaky_kernel(JobStatus::Pending);
    let user = UserId::new();
    let target = create_test_target(&kernel, user, "https://example.com").await;
    let job = create_test_job(&kernel, user, target.id).await;

    let (shutdown, handles) = spawn_pool(&kernel, 1);
    let completed = wait_for_status(&kernel, user, job.id, JobStatus::Completed).await;
    stop_pool(&queue, shutdown, handles).await;

    assert_eq!(completed.pages_scraped, 1);
    assert_eq!(
        fetcher.call_count(),
        1,
        "nothing ran before the failed start, so exactly one fetch"
    );
}

/// Test that a claim requeued after a failed completion write is resumed:
/// the redelivered item replays the fetch against the running job and
/// finishes it instead of stranding it in running
#[tokio::test]
async fn redelivered_claim_resumes_a_running_job() {
    let (kernel, queue, fetcher) = flaky_kernel(JobStatus::Running);
    let user = UserId::new();
    let target = create_test_target(&kernel, user, "https://example.com").await;
    let job = create_test_job(&kernel, user, target.id).await;

    let (shutdown, handles) = spawn_pool(&kernel, 1);
    let completed = wait_for_status(&kernel, user, job.id, JobStatus::Completed).await;
    stop_pool(&queue, shutdown, handles).await;

    assert_eq!(completed.pages_found, 1);
    assert_eq!(fetcher.call_count(), 2, "the redelivered claim fetches again");

    // The replayed recording is deduplicated: one page, one version, both
    // scrape attempts counted.
    let pages = kernel
        .pages
        .list_pages(user, target.id, PageRequest::first())
        .await
        .expect("list pages");
    assert_eq!(pages.len(), 1);
    assert_eq!(pages.items[0].scrape_count, 2);

    let versions = kernel
        .pages
        .list_versions(user, pages.items[0].id, PageRequest::first())
        .await
        .expect("list versions");
    assert_eq!(versions.len(), 1);
}
