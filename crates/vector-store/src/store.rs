use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One embedded code block, ready for storage.
///
/// The id is stable across re-indexing runs for an unchanged block position,
/// so upserts replace rather than duplicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockPoint {
    pub id: String,
    pub file_path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub content_hash: String,
    pub embedding: Vec<f32>,
}

/// Stable point id for the block at `index` within `file_path`.
#[must_use]
pub fn block_id(file_path: &str, index: usize) -> String {
    format!("{file_path}#{index}")
}

/// Contract the orchestration layer holds against the collection backend.
///
/// Every operation is idempotent: repeating a call against the same state is
/// safe and observationally equivalent to calling it once.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Ensure the workspace collection exists.
    ///
    /// Returns `true` when a new collection had to be created, which tells
    /// the caller any hash cache describing the old collection is invalid.
    async fn initialize(&self) -> Result<bool>;

    /// Write a batch of embedded blocks, replacing points with matching ids.
    async fn upsert_blocks(&self, points: Vec<BlockPoint>) -> Result<()>;

    /// Drop every point that belongs to `file_path`.
    async fn remove_file_blocks(&self, file_path: &str) -> Result<()>;

    /// Empty the collection but keep it initialized.
    async fn clear_collection(&self) -> Result<()>;

    /// Remove the collection entirely.
    async fn delete_collection(&self) -> Result<()>;

    /// Number of points currently stored.
    async fn point_count(&self) -> Result<usize>;
}
