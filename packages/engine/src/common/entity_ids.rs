//! Typed id definitions for all domain entities.
//!
//! One marker type per entity, plus the alias that is the actual API. The
//! markers are deliberately separate from the entity structs in `domain` so
//! that an id can exist without pulling the entity's data model along.

pub use super::id::Id;

// ============================================================================
// Entity marker types
// ============================================================================

/// Marker type for users (opaque owners; the engine stores no user data).
pub struct User;

/// Marker type for scrape targets (registered websites).
pub struct Target;

/// Marker type for scrape jobs (one crawl execution).
pub struct ScrapeJob;

/// Marker type for pages (URL-identified resources of a target).
pub struct Page;

/// Marker type for page versions (content snapshots of a page).
pub struct PageVersion;

/// Marker type for chunks (downstream text segments of a page version).
pub struct Chunk;

// ============================================================================
// Type aliases - the primary API
// ============================================================================

/// Typed id for users.
pub type UserId = Id<User>;

/// Typed id for scrape targets.
pub type TargetId = Id<Target>;

/// Typed id for scrape jobs.
pub type JobId = Id<ScrapeJob>;

/// Typed id for pages.
pub type PageId = Id<Page>;

/// Typed id for page versions.
pub type VersionId = Id<PageVersion>;

/// Typed id for chunks.
pub type ChunkId = Id<Chunk>;
