//! Domain model: immutable entity snapshots and their transition functions.

pub mod chunk;
pub mod job;
pub mod page;
pub mod target;

pub use chunk::Chunk;
pub use job::{JobStatus, ScrapeJob};
pub use page::{Page, PageVersion};
pub use target::{Target, TargetUpdate};
