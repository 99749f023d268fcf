//! In-process queue backed by process memory.
//!
//! Correct only for a single-process deployment: the queue dies with the
//! process, and an item claimed by a worker that crashes is gone since
//! there is no redelivery timeout. Redelivery happens only through an
//! explicit [`WorkQueue::requeue`] from a worker that is still alive.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, VecDeque};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, Notify};

use crate::item::WorkItem;
use crate::queue::{QueueError, WorkQueue};

/// A delayed item, ordered by deadline then insertion sequence.
struct Delayed {
    due: DateTime<Utc>,
    seq: u64,
    item: WorkItem,
}

impl PartialEq for Delayed {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Delayed {}

impl PartialOrd for Delayed {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Delayed {
    fn cmp(&self, other: &Self) -> Ordering {
        self.due.cmp(&other.due).then(self.seq.cmp(&other.seq))
    }
}

#[derive(Default)]
struct State {
    ready: VecDeque<WorkItem>,
    delayed: BinaryHeap<Reverse<Delayed>>,
    next_seq: u64,
    closed: bool,
}

impl State {
    fn push(&mut self, item: WorkItem, now: DateTime<Utc>) {
        match item.not_before {
            Some(due) if due > now => {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.delayed.push(Reverse(Delayed { due, seq, item }));
            }
            _ => self.ready.push_back(item),
        }
    }

    fn promote_due(&mut self, now: DateTime<Utc>) {
        while self
            .delayed
            .peek()
            .map_or(false, |Reverse(head)| head.due <= now)
        {
            if let Some(Reverse(due_now)) = self.delayed.pop() {
                self.ready.push_back(due_now.item);
            }
        }
    }

    fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.delayed.peek().map(|Reverse(d)| d.due)
    }
}

/// Queue for a single process: a FIFO of ready items plus a holding pen for
/// items whose `not_before` has not arrived yet.
///
/// `close` stops new enqueues and lets consumers drain what is already
/// ready; items still waiting on a deadline at close time are dropped with
/// the queue. Requeues are accepted even after close, so a worker draining
/// during shutdown can hand its claim back.
pub struct InProcessQueue {
    state: Mutex<State>,
    wake: Notify,
}

impl InProcessQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            wake: Notify::new(),
        }
    }

    /// Stop accepting new items. Blocked dequeuers wake up and receive
    /// [`QueueError::Closed`] once the ready items are drained.
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        state.closed = true;
        drop(state);
        self.wake.notify_waiters();
    }

    /// Items currently held, ready and delayed together.
    pub async fn len(&self) -> usize {
        let state = self.state.lock().await;
        state.ready.len() + state.delayed.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for InProcessQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl WorkQueue for InProcessQueue {
    async fn enqueue(&self, item: WorkItem) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(QueueError::Closed);
        }
        state.push(item, Utc::now());
        drop(state);
        self.wake.notify_waiters();
        Ok(())
    }

    async fn dequeue(&self) -> Result<WorkItem, QueueError> {
        loop {
            let notified = self.wake.notified();
            tokio::pin!(notified);
            // Register for wakeups before inspecting state, so a push
            // between the inspection and the await below is not lost.
            notified.as_mut().enable();

            let next_due = {
                let mut state = self.state.lock().await;
                state.promote_due(Utc::now());
                if let Some(item) = state.ready.pop_front() {
                    return Ok(item);
                }
                if state.closed {
                    return Err(QueueError::Closed);
                }
                state.next_deadline()
            };

            match next_due {
                Some(due) => {
                    let wait = (due - Utc::now()).to_std().unwrap_or(Duration::ZERO);
                    tokio::select! {
                        _ = &mut notified => {}
                        _ = tokio::time::sleep(wait) => {}
                    }
                }
                None => notified.await,
            }
        }
    }

    async fn acknowledge(&self, _item: &WorkItem) -> Result<(), QueueError> {
        // Dequeue already removed the entry and there is no redelivery
        // tracking to clear.
        Ok(())
    }

    async fn requeue(&self, item: WorkItem) -> Result<(), QueueError> {
        let item = item.next_attempt();
        tracing::debug!(job_id = %item.job_id, attempt = item.attempt, "requeueing work item");
        let mut state = self.state.lock().await;
        state.ready.push_back(item);
        drop(state);
        self.wake.notify_waiters();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use std::sync::Arc;
    use tokio::time::timeout;
    use uuid::Uuid;

    fn item() -> WorkItem {
        WorkItem::new(Uuid::new_v4(), Uuid::new_v4())
    }

    #[tokio::test]
    async fn delivers_in_fifo_order() {
        let queue = InProcessQueue::new();
        let first = item();
        let second = item();
        queue.enqueue(first.clone()).await.unwrap();
        queue.enqueue(second.clone()).await.unwrap();

        assert_eq!(queue.dequeue().await.unwrap().job_id, first.job_id);
        assert_eq!(queue.dequeue().await.unwrap().job_id, second.job_id);
    }

    #[tokio::test]
    async fn dequeue_blocks_until_an_item_arrives() {
        let queue = Arc::new(InProcessQueue::new());

        assert!(timeout(Duration::from_millis(50), queue.dequeue())
            .await
            .is_err());

        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.dequeue().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let expected = item();
        queue.enqueue(expected.clone()).await.unwrap();

        let got = timeout(Duration::from_secs(1), consumer)
            .await
            .expect("consumer should wake")
            .unwrap()
            .unwrap();
        assert_eq!(got.job_id, expected.job_id);
    }

    #[tokio::test]
    async fn concurrent_consumers_never_share_an_item() {
        let queue = Arc::new(InProcessQueue::new());
        let a = item();
        let b = item();
        queue.enqueue(a.clone()).await.unwrap();
        queue.enqueue(b.clone()).await.unwrap();

        let c1 = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.dequeue().await.unwrap() })
        };
        let c2 = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.dequeue().await.unwrap() })
        };

        let got1 = c1.await.unwrap();
        let got2 = c2.await.unwrap();
        assert_ne!(got1.job_id, got2.job_id);
        let mut seen = vec![got1.job_id, got2.job_id];
        seen.sort();
        let mut expected = vec![a.job_id, b.job_id];
        expected.sort();
        assert_eq!(seen, expected);
    }

    #[tokio::test]
    async fn delayed_item_is_not_delivered_before_its_deadline() {
        let queue = InProcessQueue::new();
        let due = Utc::now() + ChronoDuration::milliseconds(150);
        queue
            .enqueue(WorkItem::scheduled(Uuid::new_v4(), Uuid::new_v4(), due))
            .await
            .unwrap();

        assert!(timeout(Duration::from_millis(50), queue.dequeue())
            .await
            .is_err());

        let got = timeout(Duration::from_secs(2), queue.dequeue())
            .await
            .expect("item should become due")
            .unwrap();
        assert!(Utc::now() >= due);
        assert_eq!(got.not_before, Some(due));
    }

    #[tokio::test]
    async fn earlier_deadline_is_delivered_first() {
        let queue = InProcessQueue::new();
        let now = Utc::now();
        let late = WorkItem::scheduled(
            Uuid::new_v4(),
            Uuid::new_v4(),
            now + ChronoDuration::milliseconds(250),
        );
        let early = WorkItem::scheduled(
            Uuid::new_v4(),
            Uuid::new_v4(),
            now + ChronoDuration::milliseconds(100),
        );
        queue.enqueue(late.clone()).await.unwrap();
        queue.enqueue(early.clone()).await.unwrap();

        let first = timeout(Duration::from_secs(2), queue.dequeue())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.job_id, early.job_id);
    }

    #[tokio::test]
    async fn immediate_item_overtakes_a_waiting_delayed_item() {
        let queue = InProcessQueue::new();
        let delayed = WorkItem::scheduled(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Utc::now() + ChronoDuration::seconds(30),
        );
        let immediate = item();
        queue.enqueue(delayed).await.unwrap();
        queue.enqueue(immediate.clone()).await.unwrap();

        let got = queue.dequeue().await.unwrap();
        assert_eq!(got.job_id, immediate.job_id);
        assert_eq!(queue.len().await, 1);
    }

    #[tokio::test]
    async fn requeue_redelivers_with_bumped_attempt() {
        let queue = InProcessQueue::new();
        queue.enqueue(item()).await.unwrap();

        let claimed = queue.dequeue().await.unwrap();
        assert_eq!(claimed.attempt, 1);

        queue.requeue(claimed.clone()).await.unwrap();
        let redelivered = queue.dequeue().await.unwrap();
        assert_eq!(redelivered.job_id, claimed.job_id);
        assert_eq!(redelivered.attempt, 2);
    }

    #[tokio::test]
    async fn acknowledged_item_is_never_redelivered() {
        let queue = InProcessQueue::new();
        queue.enqueue(item()).await.unwrap();

        let claimed = queue.dequeue().await.unwrap();
        queue.acknowledge(&claimed).await.unwrap();

        assert!(queue.is_empty().await);
        assert!(timeout(Duration::from_millis(50), queue.dequeue())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn close_wakes_a_blocked_dequeuer() {
        let queue = Arc::new(InProcessQueue::new());
        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.dequeue().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        queue.close().await;
        let result = timeout(Duration::from_secs(1), consumer)
            .await
            .expect("dequeuer should wake")
            .unwrap();
        assert!(matches!(result, Err(QueueError::Closed)));
    }

    #[tokio::test]
    async fn close_drains_ready_items_before_reporting_closed() {
        let queue = InProcessQueue::new();
        let pending = item();
        queue.enqueue(pending.clone()).await.unwrap();
        queue.close().await;

        assert_eq!(queue.dequeue().await.unwrap().job_id, pending.job_id);
        assert!(matches!(queue.dequeue().await, Err(QueueError::Closed)));
    }

    #[tokio::test]
    async fn enqueue_after_close_is_rejected() {
        let queue = InProcessQueue::new();
        queue.close().await;
        assert!(matches!(
            queue.enqueue(item()).await,
            Err(QueueError::Closed)
        ));
    }

    #[tokio::test]
    async fn requeue_after_close_is_accepted() {
        let queue = InProcessQueue::new();
        queue.enqueue(item()).await.unwrap();
        let claimed = queue.dequeue().await.unwrap();

        queue.close().await;
        queue.requeue(claimed.clone()).await.unwrap();

        assert_eq!(queue.dequeue().await.unwrap().job_id, claimed.job_id);
    }
}
