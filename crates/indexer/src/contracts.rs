//! Collaborator contracts the orchestrator composes.
//!
//! The orchestration core never talks to a concrete backend; each concern
//! comes in through one narrow trait object, which keeps the lifecycle
//! testable against scripted doubles.

use crate::progress::{BatchProgress, BatchStarted, BatchSummary, ScanEvent};
use crate::stats::ScanStats;
use crate::Result;
use async_trait::async_trait;
use std::path::Path;
use tokio::sync::{broadcast, mpsc};

/// Read-only view of "is this feature fully configured".
///
/// True only when credentials, an embedding provider, and a vector store
/// endpoint are all present.
pub trait ConfigGate: Send + Sync {
    fn is_fully_configured(&self) -> bool;
}

/// Durable map of content hash to indexed status.
///
/// Lets a scan skip files whose content the collection already holds.
/// `clear` is idempotent.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn is_indexed(&self, content_hash: &str) -> bool;

    async fn mark_indexed(&self, content_hash: &str, file_path: &str) -> Result<()>;

    /// Drop any record of `file_path`, whatever hash it was stored under.
    async fn forget_file(&self, file_path: &str) -> Result<()>;

    async fn clear(&self) -> Result<()>;
}

/// One long-running walk of the workspace tree.
///
/// Progress flows through `events` in delivery order; per-batch failures are
/// reported as [`ScanEvent::BatchError`] and never abort the walk. A healthy
/// implementation always returns `Ok(Some(stats))`; `Ok(None)` is the one
/// programming-contract violation the orchestrator refuses to interpret.
#[async_trait]
pub trait Scanner: Send + Sync {
    async fn scan(&self, root: &Path, events: mpsc::Sender<ScanEvent>)
        -> Result<Option<ScanStats>>;
}

/// Debounced change feed layered on top of a completed scan.
///
/// Three event streams, each independently subscribable; a subscription is a
/// plain broadcast receiver, disposed by dropping it (the orchestrator wraps
/// each one in an abortable task).
#[async_trait]
pub trait FileWatcher: Send + Sync {
    /// Start watching. Safe to call when already watching.
    async fn initialize(&self) -> Result<()>;

    /// Stop watching and release the underlying OS watcher. Idempotent.
    async fn dispose(&self);

    fn subscribe_batch_started(&self) -> broadcast::Receiver<BatchStarted>;

    fn subscribe_batch_progress(&self) -> broadcast::Receiver<BatchProgress>;

    fn subscribe_batch_finished(&self) -> broadcast::Receiver<BatchSummary>;
}
