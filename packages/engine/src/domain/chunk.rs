//! Text chunks cut from a page version.
//!
//! Chunking, embedding, and retrieval happen in a downstream subsystem;
//! the engine only defines the shape, so that subsystem and this one agree
//! on identity and ordering. Nothing in the engine mutates chunks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::{ChunkId, VersionId};

/// A contiguous slice of a page version's text. Chunks of one version are
/// ordered by `chunk_index`, 0-based and gap-free.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub page_version_id: VersionId,
    pub content: String,
    pub chunk_index: i32,
    pub token_count: i32,
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl Chunk {
    pub fn new(
        page_version_id: VersionId,
        content: impl Into<String>,
        chunk_index: i32,
        token_count: i32,
    ) -> Self {
        Self {
            id: ChunkId::new(),
            page_version_id,
            content: content.into(),
            chunk_index,
            token_count,
            metadata: serde_json::Map::new(),
            created_at: Utc::now(),
        }
    }
}
