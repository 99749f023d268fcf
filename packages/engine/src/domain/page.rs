//! Pages and their observed content versions.
//!
//! A `Page` is the URL-keyed identity of a resource inside a target; a
//! `PageVersion` is one content snapshot of it. Identity and change
//! detection both run on SHA-256 digests, never on string comparison of
//! URLs or content.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::{JobId, PageId, TargetId, VersionId};
use crate::hash::{ContentHash, UrlHash};

/// A URL-identified resource within a target.
///
/// The URL is kept exactly as discovered. `url_hash` is unique across the
/// whole system, so one URL maps to one page everywhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub id: PageId,
    pub target_id: TargetId,
    pub url: String,
    pub url_hash: UrlHash,
    /// The job that first recorded this URL.
    pub discovered_by_job_id: JobId,
    /// Set by the first successful scrape, bumped on every one after.
    pub last_scraped_at: Option<DateTime<Utc>>,
    pub scrape_count: i32,
    pub created_at: DateTime<Utc>,
}

impl Page {
    pub fn new(target_id: TargetId, url: impl Into<String>, discovered_by_job_id: JobId) -> Self {
        let url = url.into();
        let url_hash = UrlHash::from_url(&url);
        Self {
            id: PageId::new(),
            target_id,
            url,
            url_hash,
            discovered_by_job_id,
            last_scraped_at: None,
            scrape_count: 0,
            created_at: Utc::now(),
        }
    }

    /// Counts a scrape attempt: bumps `scrape_count` and `last_scraped_at`.
    /// Runs whether or not the attempt produced new content.
    pub fn mark_scraped(self, now: DateTime<Utc>) -> Self {
        Self {
            last_scraped_at: Some(now),
            scrape_count: self.scrape_count + 1,
            ..self
        }
    }
}

/// One immutable content snapshot of a page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageVersion {
    pub id: VersionId,
    pub page_id: PageId,
    /// The job whose scrape produced this snapshot.
    pub job_id: JobId,
    pub raw_content: String,
    pub content_hash: ContentHash,
    pub http_status: i32,
    pub response_time_ms: i64,
    pub scraped_at: DateTime<Utc>,
}

impl PageVersion {
    pub fn new(
        page_id: PageId,
        job_id: JobId,
        raw_content: impl Into<String>,
        http_status: i32,
        response_time_ms: i64,
    ) -> Self {
        let raw_content = raw_content.into();
        let content_hash = ContentHash::from_content(&raw_content);
        Self {
            id: VersionId::new(),
            page_id,
            job_id,
            raw_content,
            content_hash,
            http_status,
            response_time_ms,
            scraped_at: Utc::now(),
        }
    }

    /// True when `content` would hash to this version, i.e. storing it
    /// again would duplicate this snapshot.
    pub fn matches_content(&self, content: &str) -> bool {
        self.content_hash == ContentHash::from_content(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_page_starts_unscraped() {
        let page = Page::new(TargetId::new(), "https://example.com/a", JobId::new());
        assert_eq!(page.scrape_count, 0);
        assert!(page.last_scraped_at.is_none());
        assert_eq!(page.url_hash, UrlHash::from_url("https://example.com/a"));
    }

    #[test]
    fn mark_scraped_bumps_count_and_timestamp() {
        let now = Utc::now();
        let page = Page::new(TargetId::new(), "https://example.com/a", JobId::new())
            .mark_scraped(now)
            .mark_scraped(now);
        assert_eq!(page.scrape_count, 2);
        assert_eq!(page.last_scraped_at, Some(now));
    }

    #[test]
    fn version_hash_comes_from_content() {
        let version = PageVersion::new(PageId::new(), JobId::new(), "<html>X</html>", 200, 120);
        assert!(version.matches_content("<html>X</html>"));
        assert!(!version.matches_content("<html>Y</html>"));
    }
}
