use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The unit of hand-off between a job producer and a worker.
///
/// Carries identifiers only. The consumer looks up current state for
/// `job_id` before acting, so an item that outlives its job (cancelled
/// between enqueue and dequeue) is detected at execution time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    /// The job this item asks a worker to execute.
    pub job_id: Uuid,

    /// The target the job runs against. Carried for logging and routing;
    /// workers still authorize against stored state.
    pub target_id: Uuid,

    /// Earliest instant the item may be handed to a worker. `None` means
    /// immediately.
    pub not_before: Option<DateTime<Utc>>,

    /// The delivery attempt (1-based). First delivery is 1, first
    /// redelivery after a requeue is 2, etc.
    pub attempt: i32,

    /// When the item was first enqueued.
    pub enqueued_at: DateTime<Utc>,
}

impl WorkItem {
    /// Create an item for immediate delivery.
    pub fn new(job_id: Uuid, target_id: Uuid) -> Self {
        Self {
            job_id,
            target_id,
            not_before: None,
            attempt: 1,
            enqueued_at: Utc::now(),
        }
    }

    /// Create an item that must not be delivered before `not_before`.
    pub fn scheduled(job_id: Uuid, target_id: Uuid, not_before: DateTime<Utc>) -> Self {
        Self {
            not_before: Some(not_before),
            ..Self::new(job_id, target_id)
        }
    }

    /// Whether the item may be delivered at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.not_before {
            Some(due) => due <= now,
            None => true,
        }
    }

    /// The item as redelivered after a requeue: same identity, next attempt.
    pub fn next_attempt(mut self) -> Self {
        self.attempt += 1;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn new_item_is_immediately_due() {
        let item = WorkItem::new(Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(item.attempt, 1);
        assert!(item.is_due(Utc::now()));
    }

    #[test]
    fn scheduled_item_is_due_only_after_deadline() {
        let due = Utc::now() + Duration::minutes(5);
        let item = WorkItem::scheduled(Uuid::new_v4(), Uuid::new_v4(), due);
        assert!(!item.is_due(Utc::now()));
        assert!(item.is_due(due));
        assert!(item.is_due(due + Duration::seconds(1)));
    }

    #[test]
    fn next_attempt_increments_and_keeps_identity() {
        let item = WorkItem::new(Uuid::new_v4(), Uuid::new_v4());
        let job_id = item.job_id;
        let redelivered = item.next_attempt();
        assert_eq!(redelivered.attempt, 2);
        assert_eq!(redelivered.job_id, job_id);
    }

    #[test]
    fn item_round_trips_through_json() {
        let item = WorkItem::scheduled(Uuid::new_v4(), Uuid::new_v4(), Utc::now());
        let json = serde_json::to_string(&item).unwrap();
        let back: WorkItem = serde_json::from_str(&json).unwrap();
        assert_eq!(back, item);
    }
}
