//! User-registered scrape targets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::common::{TargetId, UserId};

/// A website registered for crawling, owned by exactly one user.
///
/// Deactivation is a soft delete: the row survives, listings of active
/// targets skip it, and job admission rejects it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    pub id: TargetId,
    pub user_id: UserId,
    pub name: String,
    pub base_url: Url,
    pub description: Option<String>,
    /// Free-form scrape configuration, passed through to fetch workers
    /// uninterpreted.
    pub config: serde_json::Map<String, serde_json::Value>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields a caller may change on an existing target. `None` leaves the
/// field as it was.
#[derive(Debug, Clone, Default)]
pub struct TargetUpdate {
    pub name: Option<String>,
    pub base_url: Option<Url>,
    pub description: Option<String>,
    pub config: Option<serde_json::Map<String, serde_json::Value>>,
}

impl Target {
    pub fn new(
        user_id: UserId,
        name: String,
        base_url: Url,
        description: Option<String>,
        config: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: TargetId::new(),
            user_id,
            name,
            base_url,
            description,
            config,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns the snapshot with the update applied and `updated_at` bumped.
    pub fn with_update(self, update: TargetUpdate, now: DateTime<Utc>) -> Self {
        Self {
            name: update.name.unwrap_or(self.name),
            base_url: update.base_url.unwrap_or(self.base_url),
            description: update.description.or(self.description),
            config: update.config.unwrap_or(self.config),
            updated_at: now,
            ..self
        }
    }

    /// Soft delete. Idempotent: deactivating a deactivated target is fine.
    pub fn deactivate(self, now: DateTime<Utc>) -> Self {
        Self {
            active: false,
            updated_at: now,
            ..self
        }
    }

    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.user_id == user_id
    }
}
