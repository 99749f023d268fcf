//! Shared building blocks: typed ids and pagination.

pub mod entity_ids;
pub mod id;
pub mod pagination;

pub use entity_ids::{ChunkId, JobId, PageId, TargetId, UserId, VersionId};
pub use id::Id;
pub use pagination::{PageRequest, Paged, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
