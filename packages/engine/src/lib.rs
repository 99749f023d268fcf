// Scrape Coordinator - Core Engine
//
// This crate provides job admission, content deduplication, and the fetch
// worker pool behind the scrape coordinator. Storage is pluggable: Postgres
// for deployments, an in-memory store for tests and local runs.

pub mod common;
pub mod config;
pub mod domain;
pub mod error;
pub mod fetch;
pub mod hash;
pub mod service;
pub mod store;
pub mod test_dependencies;
pub mod worker;

// Re-exports for clean API
pub use common::{PageRequest, Paged};
pub use config::*;
pub use domain::{Chunk, JobStatus, Page, PageVersion, ScrapeJob, Target, TargetUpdate};
pub use error::{EngineError, StoreError};
pub use fetch::{FetchEngine, FetchOutcome, FetchRequest, Fetcher, HttpFetcher};
pub use hash::{ContentHash, UrlHash};
pub use service::CoordinatorKernel;
pub use store::{JobStore, MemoryStore, PageStore, PostgresStore, TargetStore};
