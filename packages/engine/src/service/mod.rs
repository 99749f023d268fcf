// CoordinatorKernel - the service layer with all dependencies
//
// The kernel holds the stores, the work queue, and the fetcher behind
// trait objects, and hands out the services built on them. The coordinator
// binary builds one from config; tests build one over the in-memory store
// and the in-process queue.

use std::sync::Arc;

use handoff::WorkQueue;

use crate::fetch::Fetcher;
use crate::store::{JobStore, PageStore, TargetStore};

pub mod dedup;
pub mod jobs;
pub mod pages;
pub mod targets;

pub use dedup::{DedupService, RecordedVersion};
pub use jobs::{CreateJobRequest, FetchedPage, JobService, ReportOutcome};
pub use pages::PageService;
pub use targets::{CreateTargetRequest, TargetService, UpdateTargetRequest};

/// CoordinatorKernel holds the services and their shared dependencies.
pub struct CoordinatorKernel {
    pub targets: TargetService,
    pub jobs: JobService,
    pub pages: PageService,
    pub dedup: DedupService,
    pub queue: Arc<dyn WorkQueue>,
    pub fetcher: Arc<dyn Fetcher>,
}

impl CoordinatorKernel {
    pub fn new(
        target_store: Arc<dyn TargetStore>,
        job_store: Arc<dyn JobStore>,
        page_store: Arc<dyn PageStore>,
        queue: Arc<dyn WorkQueue>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        let dedup = DedupService::new(page_store.clone());
        Self {
            targets: TargetService::new(target_store.clone()),
            jobs: JobService::new(
                target_store.clone(),
                job_store,
                dedup.clone(),
                queue.clone(),
            ),
            pages: PageService::new(target_store, page_store),
            dedup,
            queue,
            fetcher,
        }
    }
}
