//! Error taxonomy for the engine.
//!
//! Two layers:
//! - [`StoreError`] - what persistence ports return. Conflict arms exist so
//!   a store can report a uniqueness violation distinctly from plain I/O
//!   trouble; the service layer translates them into domain terms.
//! - [`EngineError`] - what the service layer returns to callers. Domain
//!   rule violations each get their own kind; a boundary layer (HTTP, RPC)
//!   maps kinds to transport codes without inspecting messages.
//!
//! Nothing here is retried inside the engine. `NotFound` and `AccessDenied`
//! are distinct kinds on purpose; collapsing them into one "not accessible"
//! answer is a boundary-layer decision.

use uuid::Uuid;

use crate::domain::job::JobStatus;
use crate::hash::InvalidHash;

/// Failures surfaced by persistence ports.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The "one active job per target" constraint rejected an insert.
    #[error("target already has an active job")]
    ActiveJobConflict,

    /// The url_hash uniqueness constraint rejected an insert.
    #[error("a page with this url hash already exists")]
    UrlHashConflict,

    /// Driver or connectivity failure. Eligible for caller-directed retry.
    #[error(transparent)]
    Io(#[from] anyhow::Error),
}

/// Caller-facing failures of the service layer.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The referenced entity does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    /// The actor does not own the resource.
    #[error("not authorized to access this {entity}")]
    AccessDenied { entity: &'static str },

    /// An illegal job state change was attempted; state is unchanged.
    #[error("cannot {event} a job in status {from}")]
    InvalidTransition {
        from: JobStatus,
        event: &'static str,
    },

    /// The target already has a PENDING or RUNNING job.
    #[error("target {target_id} already has an active job")]
    DuplicateActiveJob { target_id: Uuid },

    /// A job was requested against a deactivated target.
    #[error("target {target_id} is deactivated")]
    TargetInactive { target_id: Uuid },

    /// Malformed input (empty name, bad URL, bad digest).
    #[error("validation failed: {0}")]
    Validation(String),

    /// Storage-layer I/O failure, distinguished from domain errors.
    #[error("storage failure: {0}")]
    Storage(#[source] anyhow::Error),

    /// Work-queue failure, distinguished from domain errors.
    #[error("queue failure: {0}")]
    Queue(#[from] handoff::QueueError),
}

impl EngineError {
    pub fn not_found(entity: &'static str, id: impl Into<Uuid>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn access_denied(entity: &'static str) -> Self {
        Self::AccessDenied { entity }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Whether a caller may reasonably retry the same call unchanged.
    /// True only for infrastructure failures; domain violations will fail
    /// the same way every time.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Queue(_))
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Io(e) => Self::Storage(e),
            // Conflicts reaching this default mapping were not expected by
            // the caller; surface them as infrastructure trouble rather
            // than inventing a domain meaning.
            other => Self::Storage(anyhow::Error::new(other)),
        }
    }
}

impl From<InvalidHash> for EngineError {
    fn from(err: InvalidHash) -> Self {
        Self::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_are_not_retryable() {
        let err = EngineError::DuplicateActiveJob {
            target_id: Uuid::nil(),
        };
        assert!(!err.is_retryable());
        assert!(!EngineError::access_denied("job").is_retryable());
    }

    #[test]
    fn infrastructure_errors_are_retryable() {
        let storage = EngineError::Storage(anyhow::anyhow!("connection reset"));
        assert!(storage.is_retryable());
        let queue = EngineError::Queue(handoff::QueueError::Closed);
        assert!(queue.is_retryable());
    }

    #[test]
    fn store_io_maps_to_storage() {
        let err: EngineError = StoreError::Io(anyhow::anyhow!("timeout")).into();
        assert!(matches!(err, EngineError::Storage(_)));
    }

    #[test]
    fn display_names_the_entity() {
        let id = Uuid::nil();
        let err = EngineError::not_found("job", id);
        assert_eq!(err.to_string(), format!("job {id} not found"));
    }

    #[test]
    fn invalid_transition_reports_status_and_event() {
        let err = EngineError::InvalidTransition {
            from: JobStatus::Completed,
            event: "cancel",
        };
        assert_eq!(err.to_string(), "cannot cancel a job in status completed");
    }
}
