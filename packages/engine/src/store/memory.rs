//! In-memory store.
//!
//! The single-process reference implementation; integration tests run
//! against it. One mutex guards all tables, so the admission check and the
//! insert in [`JobStore::insert_job`] are a single critical section, same
//! for the url-hash check in [`PageStore::insert_page`]. Correct only
//! inside one process.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::common::{JobId, PageId, PageRequest, TargetId, UserId, VersionId};
use crate::domain::{JobStatus, Page, PageVersion, ScrapeJob, Target};
use crate::error::StoreError;
use crate::hash::UrlHash;
use crate::store::{JobStore, PageStore, TargetStore};

#[derive(Default)]
struct Inner {
    targets: HashMap<TargetId, Target>,
    jobs: HashMap<JobId, ScrapeJob>,
    pages: HashMap<PageId, Page>,
    pages_by_hash: HashMap<UrlHash, PageId>,
    versions: HashMap<VersionId, PageVersion>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn window<T>(mut items: Vec<T>, page: PageRequest) -> Vec<T> {
    let offset = page.offset() as usize;
    if offset >= items.len() {
        return Vec::new();
    }
    let end = (offset + page.fetch_limit() as usize).min(items.len());
    items.drain(..offset);
    items.truncate(end - offset);
    items
}

#[async_trait]
impl TargetStore for MemoryStore {
    async fn insert_target(&self, target: &Target) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner.targets.insert(target.id, target.clone());
        Ok(())
    }

    async fn update_target(&self, target: &Target) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner.targets.insert(target.id, target.clone());
        Ok(())
    }

    async fn get_target(&self, id: TargetId) -> Result<Option<Target>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.targets.get(&id).cloned())
    }

    async fn list_targets_by_user(
        &self,
        user_id: UserId,
        page: PageRequest,
    ) -> Result<Vec<Target>, StoreError> {
        let inner = self.inner.lock().await;
        let mut targets: Vec<Target> = inner
            .targets
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        targets.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(window(targets, page))
    }

    async fn list_active_targets_by_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Target>, StoreError> {
        let inner = self.inner.lock().await;
        let mut targets: Vec<Target> = inner
            .targets
            .values()
            .filter(|t| t.user_id == user_id && t.active)
            .cloned()
            .collect();
        targets.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(targets)
    }

    async fn count_targets_by_user(&self, user_id: UserId) -> Result<i64, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.targets.values().filter(|t| t.user_id == user_id).count() as i64)
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn insert_job(&self, job: &ScrapeJob) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let occupied = inner
            .jobs
            .values()
            .any(|j| j.target_id == job.target_id && j.is_active());
        if occupied {
            return Err(StoreError::ActiveJobConflict);
        }
        inner.jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn update_job(&self, job: &ScrapeJob, expected: JobStatus) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        match inner.jobs.get_mut(&job.id) {
            Some(stored) if stored.status == expected => {
                *stored = job.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get_job(&self, id: JobId) -> Result<Option<ScrapeJob>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.jobs.get(&id).cloned())
    }

    async fn find_active_job_by_target(
        &self,
        target_id: TargetId,
    ) -> Result<Option<ScrapeJob>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .jobs
            .values()
            .find(|j| j.target_id == target_id && j.is_active())
            .cloned())
    }

    async fn list_jobs_by_user(
        &self,
        user_id: UserId,
        status: Option<JobStatus>,
        page: PageRequest,
    ) -> Result<Vec<ScrapeJob>, StoreError> {
        let inner = self.inner.lock().await;
        let mut jobs: Vec<ScrapeJob> = inner
            .jobs
            .values()
            .filter(|j| j.user_id == user_id && status.map_or(true, |s| j.status == s))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(window(jobs, page))
    }

    async fn list_jobs_by_target(
        &self,
        target_id: TargetId,
    ) -> Result<Vec<ScrapeJob>, StoreError> {
        let inner = self.inner.lock().await;
        let mut jobs: Vec<ScrapeJob> = inner
            .jobs
            .values()
            .filter(|j| j.target_id == target_id)
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(jobs)
    }
}

#[async_trait]
impl PageStore for MemoryStore {
    async fn insert_page(&self, page: &Page) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.pages_by_hash.contains_key(&page.url_hash) {
            return Err(StoreError::UrlHashConflict);
        }
        inner.pages_by_hash.insert(page.url_hash.clone(), page.id);
        inner.pages.insert(page.id, page.clone());
        Ok(())
    }

    async fn update_page(&self, page: &Page) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner.pages.insert(page.id, page.clone());
        Ok(())
    }

    async fn get_page(&self, id: PageId) -> Result<Option<Page>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.pages.get(&id).cloned())
    }

    async fn find_page_by_url_hash(
        &self,
        url_hash: &UrlHash,
    ) -> Result<Option<Page>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .pages_by_hash
            .get(url_hash)
            .and_then(|id| inner.pages.get(id))
            .cloned())
    }

    async fn list_pages_by_target(
        &self,
        target_id: TargetId,
        page: PageRequest,
    ) -> Result<Vec<Page>, StoreError> {
        let inner = self.inner.lock().await;
        let mut pages: Vec<Page> = inner
            .pages
            .values()
            .filter(|p| p.target_id == target_id)
            .cloned()
            .collect();
        pages.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(window(pages, page))
    }

    async fn count_pages_by_target(&self, target_id: TargetId) -> Result<i64, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .pages
            .values()
            .filter(|p| p.target_id == target_id)
            .count() as i64)
    }

    async fn insert_version(&self, version: &PageVersion) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner.versions.insert(version.id, version.clone());
        Ok(())
    }

    async fn latest_version(&self, page_id: PageId) -> Result<Option<PageVersion>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .versions
            .values()
            .filter(|v| v.page_id == page_id)
            .max_by(|a, b| a.scraped_at.cmp(&b.scraped_at).then(a.id.cmp(&b.id)))
            .cloned())
    }

    async fn list_versions(
        &self,
        page_id: PageId,
        page: PageRequest,
    ) -> Result<Vec<PageVersion>, StoreError> {
        let inner = self.inner.lock().await;
        let mut versions: Vec<PageVersion> = inner
            .versions
            .values()
            .filter(|v| v.page_id == page_id)
            .cloned()
            .collect();
        versions.sort_by(|a, b| b.scraped_at.cmp(&a.scraped_at).then(b.id.cmp(&a.id)));
        Ok(window(versions, page))
    }
}
