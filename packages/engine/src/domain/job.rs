//! Scrape job lifecycle.
//!
//! A job is an immutable snapshot; every state change is a transition
//! function that consumes the old snapshot and returns the new one (or an
//! [`EngineError::InvalidTransition`] without touching anything). There are
//! no status setters, so an illegal transition cannot be written around the
//! state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::{JobId, TargetId, UserId};
use crate::error::EngineError;

// ============================================================================
// Status
// ============================================================================

/// Lifecycle states. `Pending` and `Running` are active; the rest are
/// terminal and immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "job_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    /// Active means the job still occupies its target's admission slot.
    pub fn is_active(&self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Running)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Job model
// ============================================================================

/// One execution attempt of crawling a target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeJob {
    pub id: JobId,
    pub target_id: TargetId,
    pub user_id: UserId,
    pub status: JobStatus,
    /// Opaque per-job configuration, merged by fetch workers with the
    /// target's config. Never interpreted here.
    pub config: serde_json::Map<String, serde_json::Value>,
    /// Earliest instant the job should be picked up. `None` means run as
    /// soon as a worker is free.
    pub scheduled_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub pages_found: i32,
    pub pages_scraped: i32,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ScrapeJob {
    pub fn new(
        target_id: TargetId,
        user_id: UserId,
        config: serde_json::Map<String, serde_json::Value>,
        scheduled_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: JobId::new(),
            target_id,
            user_id,
            status: JobStatus::Pending,
            config,
            scheduled_at,
            started_at: None,
            completed_at: None,
            pages_found: 0,
            pages_scraped: 0,
            error_message: None,
            created_at: Utc::now(),
        }
    }

    /// Pending -> Running. Stamps `started_at`.
    pub fn start(self, now: DateTime<Utc>) -> Result<Self, EngineError> {
        match self.status {
            JobStatus::Pending => Ok(Self {
                status: JobStatus::Running,
                started_at: Some(now),
                ..self
            }),
            from => Err(EngineError::InvalidTransition {
                from,
                event: "start",
            }),
        }
    }

    /// Running -> Completed. Stamps `completed_at` and records the counters.
    pub fn complete(
        self,
        now: DateTime<Utc>,
        pages_found: i32,
        pages_scraped: i32,
    ) -> Result<Self, EngineError> {
        match self.status {
            JobStatus::Running => Ok(Self {
                status: JobStatus::Completed,
                completed_at: Some(now),
                pages_found,
                pages_scraped,
                ..self
            }),
            from => Err(EngineError::InvalidTransition {
                from,
                event: "complete",
            }),
        }
    }

    /// Pending|Running -> Failed. Stamps `completed_at` and keeps the message.
    pub fn fail(self, now: DateTime<Utc>, message: impl Into<String>) -> Result<Self, EngineError> {
        match self.status {
            JobStatus::Pending | JobStatus::Running => Ok(Self {
                status: JobStatus::Failed,
                completed_at: Some(now),
                error_message: Some(message.into()),
                ..self
            }),
            from => Err(EngineError::InvalidTransition { from, event: "fail" }),
        }
    }

    /// Pending|Running -> Cancelled. Stamps `completed_at`.
    pub fn cancel(self, now: DateTime<Utc>) -> Result<Self, EngineError> {
        match self.status {
            JobStatus::Pending | JobStatus::Running => Ok(Self {
                status: JobStatus::Cancelled,
                completed_at: Some(now),
                ..self
            }),
            from => Err(EngineError::InvalidTransition {
                from,
                event: "cancel",
            }),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.user_id == user_id
    }
}
