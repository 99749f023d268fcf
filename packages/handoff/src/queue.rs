use crate::item::WorkItem;

/// Failure modes shared by all queue implementations.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// The queue has been closed and accepts no further operations.
    /// Dequeuers blocked at close time receive this instead of an item.
    #[error("queue is closed")]
    Closed,

    /// The backing transport failed (broker connectivity, serialization).
    /// Never produced by the in-process implementation.
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Hand-off channel between job producers and fetch workers.
///
/// Implementations must guarantee:
/// - an enqueued item is delivered to exactly one `dequeue` caller at a
///   time (never to two concurrent callers),
/// - an item with a `not_before` deadline is not delivered before it,
/// - delivery is at-least-once: an unacknowledged item becomes visible
///   again via `requeue` or an implementation-level redelivery timeout.
///
/// `dequeue` is the only call that may block indefinitely. Callers that
/// need to abandon a blocked dequeue (worker shutdown) race it against
/// their cancellation signal.
#[async_trait::async_trait]
pub trait WorkQueue: Send + Sync {
    /// Make `item` visible to exactly one future `dequeue` caller.
    async fn enqueue(&self, item: WorkItem) -> Result<(), QueueError>;

    /// Block until an item is available and return it. The returned item
    /// is invisible to other callers until acknowledged or requeued.
    async fn dequeue(&self) -> Result<WorkItem, QueueError>;

    /// Mark the item's queue entry as permanently consumed. No-op where
    /// the implementation has no redelivery concept.
    async fn acknowledge(&self, item: &WorkItem) -> Result<(), QueueError>;

    /// Make the item visible again for another `dequeue`, with its attempt
    /// counter bumped. Used after a worker-side failure that should not be
    /// treated as a job failure. Does not touch the job's domain status.
    async fn requeue(&self, item: WorkItem) -> Result<(), QueueError>;
}
