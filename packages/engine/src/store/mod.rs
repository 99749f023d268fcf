//! Persistence ports.
//!
//! Three async traits, one per aggregate. Implementations must uphold two
//! uniqueness rules themselves, atomically:
//!
//! - [`JobStore::insert_job`] rejects a job whose target already has a
//!   pending or running job (`StoreError::ActiveJobConflict`). Postgres
//!   does this with a partial unique index; the in-memory store checks and
//!   inserts under one lock. A check in the caller is advisory only.
//! - [`PageStore::insert_page`] rejects a duplicate `url_hash`
//!   (`StoreError::UrlHashConflict`); the caller converges on the existing
//!   row.
//!
//! Listing methods take a [`PageRequest`] and return up to
//! [`PageRequest::fetch_limit`] rows; the caller trims the overflow row.

use async_trait::async_trait;

use crate::common::{JobId, PageId, PageRequest, TargetId, UserId};
use crate::domain::{JobStatus, Page, PageVersion, ScrapeJob, Target};
use crate::error::StoreError;
use crate::hash::UrlHash;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

#[async_trait]
pub trait TargetStore: Send + Sync {
    async fn insert_target(&self, target: &Target) -> Result<(), StoreError>;
    async fn update_target(&self, target: &Target) -> Result<(), StoreError>;
    async fn get_target(&self, id: TargetId) -> Result<Option<Target>, StoreError>;
    /// Newest first, all targets of the owner including deactivated ones.
    async fn list_targets_by_user(
        &self,
        user_id: UserId,
        page: PageRequest,
    ) -> Result<Vec<Target>, StoreError>;
    async fn list_active_targets_by_user(&self, user_id: UserId)
        -> Result<Vec<Target>, StoreError>;
    async fn count_targets_by_user(&self, user_id: UserId) -> Result<i64, StoreError>;
}

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Admission-guarded insert: fails with
    /// [`StoreError::ActiveJobConflict`] when the target already holds an
    /// active job. The check and the insert are one atomic step.
    async fn insert_job(&self, job: &ScrapeJob) -> Result<(), StoreError>;

    /// Persists `job` only while the stored row still has status
    /// `expected`; returns `false` when a concurrent transition won the
    /// race. Keeps terminal statuses immutable under concurrency.
    async fn update_job(&self, job: &ScrapeJob, expected: JobStatus) -> Result<bool, StoreError>;

    async fn get_job(&self, id: JobId) -> Result<Option<ScrapeJob>, StoreError>;
    async fn find_active_job_by_target(
        &self,
        target_id: TargetId,
    ) -> Result<Option<ScrapeJob>, StoreError>;
    /// Newest first, optionally narrowed to one status.
    async fn list_jobs_by_user(
        &self,
        user_id: UserId,
        status: Option<JobStatus>,
        page: PageRequest,
    ) -> Result<Vec<ScrapeJob>, StoreError>;
    async fn list_jobs_by_target(&self, target_id: TargetId)
        -> Result<Vec<ScrapeJob>, StoreError>;
}

#[async_trait]
pub trait PageStore: Send + Sync {
    /// Identity-guarded insert: fails with
    /// [`StoreError::UrlHashConflict`] when the URL hash is already
    /// recorded, anywhere in the system.
    async fn insert_page(&self, page: &Page) -> Result<(), StoreError>;

    async fn update_page(&self, page: &Page) -> Result<(), StoreError>;
    async fn get_page(&self, id: PageId) -> Result<Option<Page>, StoreError>;
    async fn find_page_by_url_hash(&self, url_hash: &UrlHash)
        -> Result<Option<Page>, StoreError>;
    /// Newest first.
    async fn list_pages_by_target(
        &self,
        target_id: TargetId,
        page: PageRequest,
    ) -> Result<Vec<Page>, StoreError>;
    async fn count_pages_by_target(&self, target_id: TargetId) -> Result<i64, StoreError>;

    async fn insert_version(&self, version: &PageVersion) -> Result<(), StoreError>;
    /// Most recently scraped version, the one content comparison runs
    /// against.
    async fn latest_version(&self, page_id: PageId) -> Result<Option<PageVersion>, StoreError>;
    /// Scraped-at descending.
    async fn list_versions(
        &self,
        page_id: PageId,
        page: PageRequest,
    ) -> Result<Vec<PageVersion>, StoreError>;
}
