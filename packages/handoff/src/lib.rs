//! Work hand-off interfaces for job coordination.
//!
//! This crate provides the contract between job producers and the workers
//! that execute them:
//! - [`WorkQueue`] - Trait for enqueueing and claiming work items
//! - [`WorkItem`] - The unit of hand-off, identified by raw UUIDs
//! - [`InProcessQueue`] - Reference implementation backed by process memory
//! - [`QueueError`] - Failure modes shared by all implementations
//!
//! # Design Philosophy
//!
//! handoff owns interfaces only. Policy decisions (what a job means, whether
//! a failed job is retried, how many workers consume the queue) belong to
//! the application. Items carry identifiers, never domain state: workers are
//! expected to reload whatever the identifiers point at, so a stale snapshot
//! can never be executed.
//!
//! # Delivery semantics
//!
//! Delivery is at-least-once. An item handed to a worker that never calls
//! [`WorkQueue::acknowledge`] must become visible again, either through an
//! explicit [`WorkQueue::requeue`] or a broker-level redelivery timeout.
//! [`InProcessQueue`] has no timeout and no crash recovery; it is correct
//! only for a single-process deployment where the worker and the queue die
//! together. That limitation is part of its contract, not an implementation
//! detail to discover later.

pub mod in_process;
pub mod item;
pub mod queue;

pub use in_process::InProcessQueue;
pub use item::WorkItem;
pub use queue::{QueueError, WorkQueue};
