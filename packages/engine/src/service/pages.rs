//! Owner-scoped page and version queries.

use std::sync::Arc;

use crate::common::{PageId, PageRequest, Paged, TargetId, UserId};
use crate::domain::{Page, PageVersion};
use crate::error::EngineError;
use crate::store::{PageStore, TargetStore};

#[derive(Clone)]
pub struct PageService {
    targets: Arc<dyn TargetStore>,
    pages: Arc<dyn PageStore>,
}

impl PageService {
    pub fn new(targets: Arc<dyn TargetStore>, pages: Arc<dyn PageStore>) -> Self {
        Self { targets, pages }
    }

    pub async fn list_pages(
        &self,
        actor: UserId,
        target_id: TargetId,
        page: PageRequest,
    ) -> Result<Paged<Page>, EngineError> {
        self.authorize_target(actor, target_id).await?;
        let rows = self.pages.list_pages_by_target(target_id, page).await?;
        let total = self.pages.count_pages_by_target(target_id).await?;
        Ok(Paged::from_overfetched(page, rows).with_total(total))
    }

    /// Version history of one page, newest scrape first.
    pub async fn list_versions(
        &self,
        actor: UserId,
        page_id: PageId,
        page: PageRequest,
    ) -> Result<Paged<PageVersion>, EngineError> {
        let stored = self
            .pages
            .get_page(page_id)
            .await?
            .ok_or_else(|| EngineError::not_found("page", page_id))?;
        self.authorize_target(actor, stored.target_id).await?;
        let rows = self.pages.list_versions(page_id, page).await?;
        Ok(Paged::from_overfetched(page, rows))
    }

    async fn authorize_target(&self, actor: UserId, target_id: TargetId) -> Result<(), EngineError> {
        let target = self
            .targets
            .get_target(target_id)
            .await?
            .ok_or_else(|| EngineError::not_found("target", target_id))?;
        if !target.is_owned_by(actor) {
            return Err(EngineError::access_denied("target"));
        }
        Ok(())
    }
}
