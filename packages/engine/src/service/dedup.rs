//! Deduplicated recording of pages and page versions.
//!
//! Both operations are idempotent against the hash identities: rediscovery
//! of a URL converges on the existing page, re-observation of identical
//! content stores nothing new. That idempotence is what makes at-least-once
//! delivery from the work queue safe; a redelivered job can replay its
//! recording without duplicating rows.

use std::sync::Arc;

use chrono::Utc;

use crate::common::{JobId, PageId, TargetId};
use crate::domain::{Page, PageVersion};
use crate::error::{EngineError, StoreError};
use crate::hash::UrlHash;
use crate::store::PageStore;

/// Result of [`DedupService::record_version`]. `version` is the freshly
/// stored snapshot, or the existing latest one when the content had not
/// changed.
#[derive(Debug, Clone)]
pub struct RecordedVersion {
    pub version: PageVersion,
    pub is_new_content: bool,
}

#[derive(Clone)]
pub struct DedupService {
    pages: Arc<dyn PageStore>,
}

impl DedupService {
    pub fn new(pages: Arc<dyn PageStore>) -> Self {
        Self { pages }
    }

    /// Returns the page identified by `url`, creating it if this is the
    /// first time the URL is seen. The creating job becomes the discoverer;
    /// a job that loses the creation race converges on the winner's row.
    pub async fn record_page(
        &self,
        target_id: TargetId,
        job_id: JobId,
        url: &str,
    ) -> Result<Page, EngineError> {
        let url_hash = UrlHash::from_url(url);
        if let Some(existing) = self.pages.find_page_by_url_hash(&url_hash).await? {
            return Ok(existing);
        }

        let page = Page::new(target_id, url, job_id);
        match self.pages.insert_page(&page).await {
            Ok(()) => {
                tracing::debug!(page_id = %page.id, job_id = %job_id, "Discovered new page");
                Ok(page)
            }
            Err(StoreError::UrlHashConflict) => self
                .pages
                .find_page_by_url_hash(&url_hash)
                .await?
                .ok_or_else(|| {
                    EngineError::Storage(anyhow::anyhow!(
                        "page for url hash {url_hash} vanished after insert conflict"
                    ))
                }),
            Err(e) => Err(e.into()),
        }
    }

    /// Stores a new version of `page_id` unless the content is identical to
    /// the newest existing version. The page's scrape bookkeeping is bumped
    /// either way; the attempt happened.
    pub async fn record_version(
        &self,
        page_id: PageId,
        job_id: JobId,
        raw_content: String,
        http_status: i32,
        response_time_ms: i64,
    ) -> Result<RecordedVersion, EngineError> {
        let page = self
            .pages
            .get_page(page_id)
            .await?
            .ok_or_else(|| EngineError::not_found("page", page_id))?;
        let latest = self.pages.latest_version(page_id).await?;
        let now = Utc::now();

        let recorded = match latest {
            Some(prior) if prior.matches_content(&raw_content) => RecordedVersion {
                version: prior,
                is_new_content: false,
            },
            _ => {
                let version =
                    PageVersion::new(page_id, job_id, raw_content, http_status, response_time_ms);
                self.pages.insert_version(&version).await?;
                RecordedVersion {
                    version,
                    is_new_content: true,
                }
            }
        };

        self.pages.update_page(&page.mark_scraped(now)).await?;
        Ok(recorded)
    }
}
