//! PostgreSQL store.
//!
//! Runtime queries over a shared [`PgPool`]. The two uniqueness rules live
//! in the schema: the partial unique index
//! `uq_scrape_jobs_one_active_per_target` backs job admission and the
//! `uq_pages_url_hash` constraint backs page identity. Violations of those
//! two are translated to their conflict errors by constraint name; every
//! other database error is I/O.

use anyhow::Context;
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use url::Url;

use crate::common::{JobId, PageId, PageRequest, TargetId, UserId};
use crate::domain::{JobStatus, Page, PageVersion, ScrapeJob, Target};
use crate::error::StoreError;
use crate::hash::{ContentHash, UrlHash};
use crate::store::{JobStore, PageStore, TargetStore};

const ACTIVE_JOB_CONSTRAINT: &str = "uq_scrape_jobs_one_active_per_target";
const URL_HASH_CONSTRAINT: &str = "uq_pages_url_hash";

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn is_unique_violation(err: &sqlx::Error, constraint: &str) -> bool {
    err.as_database_error().is_some_and(|db| {
        db.kind() == sqlx::error::ErrorKind::UniqueViolation && db.constraint() == Some(constraint)
    })
}

fn target_from_row(r: &PgRow) -> Result<Target, StoreError> {
    let base_url: String = r.get("base_url");
    let base_url = Url::parse(&base_url)
        .with_context(|| format!("Stored base_url is not a valid URL: {base_url}"))?;
    let config: serde_json::Value = r.get("config");
    Ok(Target {
        id: r.get("id"),
        user_id: r.get("user_id"),
        name: r.get("name"),
        base_url,
        description: r.get("description"),
        config: config.as_object().cloned().unwrap_or_default(),
        active: r.get("active"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    })
}

fn job_from_row(r: &PgRow) -> ScrapeJob {
    let config: serde_json::Value = r.get("config");
    ScrapeJob {
        id: r.get("id"),
        target_id: r.get("target_id"),
        user_id: r.get("user_id"),
        status: r.get("status"),
        config: config.as_object().cloned().unwrap_or_default(),
        scheduled_at: r.get("scheduled_at"),
        started_at: r.get("started_at"),
        completed_at: r.get("completed_at"),
        pages_found: r.get("pages_found"),
        pages_scraped: r.get("pages_scraped"),
        error_message: r.get("error_message"),
        created_at: r.get("created_at"),
    }
}

fn page_from_row(r: &PgRow) -> Result<Page, StoreError> {
    let url_hash: String = r.get("url_hash");
    let url_hash = UrlHash::parse(&url_hash).context("Stored url_hash is malformed")?;
    Ok(Page {
        id: r.get("id"),
        target_id: r.get("target_id"),
        url: r.get("url"),
        url_hash,
        discovered_by_job_id: r.get("discovered_by_job_id"),
        last_scraped_at: r.get("last_scraped_at"),
        scrape_count: r.get("scrape_count"),
        created_at: r.get("created_at"),
    })
}

fn version_from_row(r: &PgRow) -> Result<PageVersion, StoreError> {
    let content_hash: String = r.get("content_hash");
    let content_hash = ContentHash::parse(&content_hash).context("Stored content_hash is malformed")?;
    Ok(PageVersion {
        id: r.get("id"),
        page_id: r.get("page_id"),
        job_id: r.get("job_id"),
        raw_content: r.get("raw_content"),
        content_hash,
        http_status: r.get("http_status"),
        response_time_ms: r.get("response_time_ms"),
        scraped_at: r.get("scraped_at"),
    })
}

#[async_trait]
impl TargetStore for PostgresStore {
    async fn insert_target(&self, target: &Target) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO targets (
                id, user_id, name, base_url, description, config, active,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(target.id)
        .bind(target.user_id)
        .bind(&target.name)
        .bind(target.base_url.as_str())
        .bind(&target.description)
        .bind(serde_json::Value::Object(target.config.clone()))
        .bind(target.active)
        .bind(target.created_at)
        .bind(target.updated_at)
        .execute(&self.pool)
        .await
        .context("Failed to insert target")?;
        Ok(())
    }

    async fn update_target(&self, target: &Target) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE targets
            SET name = $2, base_url = $3, description = $4, config = $5,
                active = $6, updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(target.id)
        .bind(&target.name)
        .bind(target.base_url.as_str())
        .bind(&target.description)
        .bind(serde_json::Value::Object(target.config.clone()))
        .bind(target.active)
        .bind(target.updated_at)
        .execute(&self.pool)
        .await
        .context("Failed to update target")?;
        Ok(())
    }

    async fn get_target(&self, id: TargetId) -> Result<Option<Target>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, name, base_url, description, config, active,
                   created_at, updated_at
            FROM targets
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to get target")?;
        row.map(|r| target_from_row(&r)).transpose()
    }

    async fn list_targets_by_user(
        &self,
        user_id: UserId,
        page: PageRequest,
    ) -> Result<Vec<Target>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, name, base_url, description, config, active,
                   created_at, updated_at
            FROM targets
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(page.fetch_limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list targets")?;
        rows.iter().map(target_from_row).collect()
    }

    async fn list_active_targets_by_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Target>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, name, base_url, description, config, active,
                   created_at, updated_at
            FROM targets
            WHERE user_id = $1 AND active
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list active targets")?;
        rows.iter().map(target_from_row).collect()
    }

    async fn count_targets_by_user(&self, user_id: UserId) -> Result<i64, StoreError> {
        let row = sqlx::query(r#"SELECT COUNT(*) AS count FROM targets WHERE user_id = $1"#)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .context("Failed to count targets")?;
        Ok(row.get("count"))
    }
}

#[async_trait]
impl JobStore for PostgresStore {
    async fn insert_job(&self, job: &ScrapeJob) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO scrape_jobs (
                id, target_id, user_id, status, config, scheduled_at,
                started_at, completed_at, pages_found, pages_scraped,
                error_message, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(job.id)
        .bind(job.target_id)
        .bind(job.user_id)
        .bind(job.status)
        .bind(serde_json::Value::Object(job.config.clone()))
        .bind(job.scheduled_at)
        .bind(job.started_at)
        .bind(job.completed_at)
        .bind(job.pages_found)
        .bind(job.pages_scraped)
        .bind(&job.error_message)
        .bind(job.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e, ACTIVE_JOB_CONSTRAINT) => {
                Err(StoreError::ActiveJobConflict)
            }
            Err(e) => Err(StoreError::Io(
                anyhow::Error::new(e).context("Failed to insert scrape job"),
            )),
        }
    }

    async fn update_job(&self, job: &ScrapeJob, expected: JobStatus) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE scrape_jobs
            SET status = $2, started_at = $3, completed_at = $4,
                pages_found = $5, pages_scraped = $6, error_message = $7
            WHERE id = $1 AND status = $8
            "#,
        )
        .bind(job.id)
        .bind(job.status)
        .bind(job.started_at)
        .bind(job.completed_at)
        .bind(job.pages_found)
        .bind(job.pages_scraped)
        .bind(&job.error_message)
        .bind(expected)
        .execute(&self.pool)
        .await
        .context("Failed to update scrape job")?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_job(&self, id: JobId) -> Result<Option<ScrapeJob>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, target_id, user_id, status, config, scheduled_at,
                   started_at, completed_at, pages_found, pages_scraped,
                   error_message, created_at
            FROM scrape_jobs
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to get scrape job")?;
        Ok(row.map(|r| job_from_row(&r)))
    }

    async fn find_active_job_by_target(
        &self,
        target_id: TargetId,
    ) -> Result<Option<ScrapeJob>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, target_id, user_id, status, config, scheduled_at,
                   started_at, completed_at, pages_found, pages_scraped,
                   error_message, created_at
            FROM scrape_jobs
            WHERE target_id = $1 AND status IN ('pending', 'running')
            "#,
        )
        .bind(target_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to find active job for target")?;
        Ok(row.map(|r| job_from_row(&r)))
    }

    async fn list_jobs_by_user(
        &self,
        user_id: UserId,
        status: Option<JobStatus>,
        page: PageRequest,
    ) -> Result<Vec<ScrapeJob>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, target_id, user_id, status, config, scheduled_at,
                   started_at, completed_at, pages_found, pages_scraped,
                   error_message, created_at
            FROM scrape_jobs
            WHERE user_id = $1 AND ($2::job_status IS NULL OR status = $2)
            ORDER BY created_at DESC, id DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(user_id)
        .bind(status)
        .bind(page.fetch_limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list scrape jobs")?;
        Ok(rows.iter().map(job_from_row).collect())
    }

    async fn list_jobs_by_target(
        &self,
        target_id: TargetId,
    ) -> Result<Vec<ScrapeJob>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, target_id, user_id, status, config, scheduled_at,
                   started_at, completed_at, pages_found, pages_scraped,
                   error_message, created_at
            FROM scrape_jobs
            WHERE target_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(target_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list scrape jobs for target")?;
        Ok(rows.iter().map(job_from_row).collect())
    }
}

#[async_trait]
impl PageStore for PostgresStore {
    async fn insert_page(&self, page: &Page) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO pages (
                id, target_id, url, url_hash, discovered_by_job_id,
                last_scraped_at, scrape_count, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(page.id)
        .bind(page.target_id)
        .bind(&page.url)
        .bind(page.url_hash.as_str())
        .bind(page.discovered_by_job_id)
        .bind(page.last_scraped_at)
        .bind(page.scrape_count)
        .bind(page.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e, URL_HASH_CONSTRAINT) => {
                Err(StoreError::UrlHashConflict)
            }
            Err(e) => Err(StoreError::Io(
                anyhow::Error::new(e).context("Failed to insert page"),
            )),
        }
    }

    async fn update_page(&self, page: &Page) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE pages
            SET last_scraped_at = $2, scrape_count = $3
            WHERE id = $1
            "#,
        )
        .bind(page.id)
        .bind(page.last_scraped_at)
        .bind(page.scrape_count)
        .execute(&self.pool)
        .await
        .context("Failed to update page")?;
        Ok(())
    }

    async fn get_page(&self, id: PageId) -> Result<Option<Page>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, target_id, url, url_hash, discovered_by_job_id,
                   last_scraped_at, scrape_count, created_at
            FROM pages
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to get page")?;
        row.map(|r| page_from_row(&r)).transpose()
    }

    async fn find_page_by_url_hash(
        &self,
        url_hash: &UrlHash,
    ) -> Result<Option<Page>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, target_id, url, url_hash, discovered_by_job_id,
                   last_scraped_at, scrape_count, created_at
            FROM pages
            WHERE url_hash = $1
            "#,
        )
        .bind(url_hash.as_str())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to find page by url hash")?;
        row.map(|r| page_from_row(&r)).transpose()
    }

    async fn list_pages_by_target(
        &self,
        target_id: TargetId,
        page: PageRequest,
    ) -> Result<Vec<Page>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, target_id, url, url_hash, discovered_by_job_id,
                   last_scraped_at, scrape_count, created_at
            FROM pages
            WHERE target_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(target_id)
        .bind(page.fetch_limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list pages")?;
        rows.iter().map(page_from_row).collect()
    }

    async fn count_pages_by_target(&self, target_id: TargetId) -> Result<i64, StoreError> {
        let row = sqlx::query(r#"SELECT COUNT(*) AS count FROM pages WHERE target_id = $1"#)
            .bind(target_id)
            .fetch_one(&self.pool)
            .await
            .context("Failed to count pages")?;
        Ok(row.get("count"))
    }

    async fn insert_version(&self, version: &PageVersion) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO page_versions (
                id, page_id, job_id, raw_content, content_hash, http_status,
                response_time_ms, scraped_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(version.id)
        .bind(version.page_id)
        .bind(version.job_id)
        .bind(&version.raw_content)
        .bind(version.content_hash.as_str())
        .bind(version.http_status)
        .bind(version.response_time_ms)
        .bind(version.scraped_at)
        .execute(&self.pool)
        .await
        .context("Failed to insert page version")?;
        Ok(())
    }

    async fn latest_version(&self, page_id: PageId) -> Result<Option<PageVersion>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, page_id, job_id, raw_content, content_hash, http_status,
                   response_time_ms, scraped_at
            FROM page_versions
            WHERE page_id = $1
            ORDER BY scraped_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(page_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to get latest page version")?;
        row.map(|r| version_from_row(&r)).transpose()
    }

    async fn list_versions(
        &self,
        page_id: PageId,
        page: PageRequest,
    ) -> Result<Vec<PageVersion>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, page_id, job_id, raw_content, content_hash, http_status,
                   response_time_ms, scraped_at
            FROM page_versions
            WHERE page_id = $1
            ORDER BY scraped_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(page_id)
        .bind(page.fetch_limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list page versions")?;
        rows.iter().map(version_from_row).collect()
    }
}
