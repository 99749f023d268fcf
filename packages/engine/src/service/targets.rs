//! Target management: registration, updates, soft delete, owner-scoped
//! listings.

use std::sync::Arc;

use chrono::Utc;
use url::Url;

use crate::common::{PageRequest, Paged, TargetId, UserId};
use crate::domain::{Target, TargetUpdate};
use crate::error::EngineError;
use crate::store::TargetStore;

#[derive(Debug, Clone)]
pub struct CreateTargetRequest {
    pub name: String,
    pub base_url: String,
    pub description: Option<String>,
    pub config: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateTargetRequest {
    pub name: Option<String>,
    pub base_url: Option<String>,
    pub description: Option<String>,
    pub config: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Clone)]
pub struct TargetService {
    targets: Arc<dyn TargetStore>,
}

impl TargetService {
    pub fn new(targets: Arc<dyn TargetStore>) -> Self {
        Self { targets }
    }

    pub async fn create_target(
        &self,
        actor: UserId,
        request: CreateTargetRequest,
    ) -> Result<Target, EngineError> {
        let name = validate_name(&request.name)?;
        let base_url = validate_base_url(&request.base_url)?;

        let target = Target::new(actor, name, base_url, request.description, request.config);
        self.targets.insert_target(&target).await?;
        tracing::info!(target_id = %target.id, user_id = %actor, "Created target");
        Ok(target)
    }

    pub async fn update_target(
        &self,
        actor: UserId,
        target_id: TargetId,
        request: UpdateTargetRequest,
    ) -> Result<Target, EngineError> {
        let target = self.authorized_target(actor, target_id).await?;

        let update = TargetUpdate {
            name: request.name.as_deref().map(validate_name).transpose()?,
            base_url: request
                .base_url
                .as_deref()
                .map(validate_base_url)
                .transpose()?,
            description: request.description,
            config: request.config,
        };

        let updated = target.with_update(update, Utc::now());
        self.targets.update_target(&updated).await?;
        Ok(updated)
    }

    pub async fn deactivate_target(
        &self,
        actor: UserId,
        target_id: TargetId,
    ) -> Result<Target, EngineError> {
        let target = self.authorized_target(actor, target_id).await?;
        let deactivated = target.deactivate(Utc::now());
        self.targets.update_target(&deactivated).await?;
        tracing::info!(target_id = %target_id, "Deactivated target");
        Ok(deactivated)
    }

    pub async fn get_target(
        &self,
        actor: UserId,
        target_id: TargetId,
    ) -> Result<Target, EngineError> {
        self.authorized_target(actor, target_id).await
    }

    pub async fn list_targets(
        &self,
        actor: UserId,
        page: PageRequest,
    ) -> Result<Paged<Target>, EngineError> {
        let rows = self.targets.list_targets_by_user(actor, page).await?;
        let total = self.targets.count_targets_by_user(actor).await?;
        Ok(Paged::from_overfetched(page, rows).with_total(total))
    }

    pub async fn list_active_targets(&self, actor: UserId) -> Result<Vec<Target>, EngineError> {
        Ok(self.targets.list_active_targets_by_user(actor).await?)
    }

    async fn authorized_target(
        &self,
        actor: UserId,
        target_id: TargetId,
    ) -> Result<Target, EngineError> {
        let target = self
            .targets
            .get_target(target_id)
            .await?
            .ok_or_else(|| EngineError::not_found("target", target_id))?;
        if !target.is_owned_by(actor) {
            return Err(EngineError::access_denied("target"));
        }
        Ok(target)
    }
}

fn validate_name(name: &str) -> Result<String, EngineError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(EngineError::validation("target name must not be empty"));
    }
    Ok(trimmed.to_string())
}

fn validate_base_url(raw: &str) -> Result<Url, EngineError> {
    let url = Url::parse(raw)
        .map_err(|e| EngineError::validation(format!("base_url is not a valid URL: {e}")))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(EngineError::validation(format!(
            "base_url must be http or https, got {}",
            url.scheme()
        )));
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_is_trimmed_and_must_be_non_empty() {
        assert_eq!(validate_name("  Docs  ").unwrap(), "Docs");
        assert!(matches!(
            validate_name("   "),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn base_url_must_be_absolute_http() {
        assert!(validate_base_url("https://example.com").is_ok());
        assert!(validate_base_url("http://example.com/docs").is_ok());
        assert!(matches!(
            validate_base_url("example.com"),
            Err(EngineError::Validation(_))
        ));
        assert!(matches!(
            validate_base_url("ftp://example.com"),
            Err(EngineError::Validation(_))
        ));
    }
}
