//! # Atlas Indexer
//!
//! Orchestration core for the workspace code index.
//!
//! ## Lifecycle
//!
//! ```text
//! start_indexing()
//!     │
//!     ├──> Vector Store (ensure collection; fresh collection drops the cache)
//!     │
//!     ├──> Scanner (walk, chunk, embed, upsert)
//!     │      └─> ScanEvent stream ──> one aggregation loop ──> StateManager
//!     │
//!     ├──> classify (success / partial failure / total failure)
//!     │
//!     └──> File Watcher (debounced batches keep the index fresh)
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use atlas_indexer::{IndexOrchestrator, SystemState};
//! # async fn demo(orchestrator: IndexOrchestrator) {
//! orchestrator.start_indexing().await;
//! if orchestrator.state() == SystemState::Indexed {
//!     // watcher is live; edits now flow into the index
//! }
//! # }
//! ```

mod cache;
mod chunker;
mod config;
mod contracts;
mod error;
mod orchestrator;
mod outcome;
mod progress;
mod registry;
mod scanner;
mod state;
mod stats;
mod watcher;

pub use cache::FileHashCache;
pub use chunker::{BlockChunk, BlockChunker, LineBlockChunker};
pub use config::{CollectionSettings, EmbeddingSettings, WorkspaceConfig, DATA_DIR_NAME};
pub use contracts::{CacheStore, ConfigGate, FileWatcher, Scanner};
pub use error::{IndexerError, Result};
pub use orchestrator::IndexOrchestrator;
pub use outcome::{ScanOutcome, ScanVerdict, MAX_PARTIAL_FAILURE_RATE};
pub use progress::{
    BatchError, BatchProgress, BatchStarted, BatchSummary, FileOutcome, FileStatus, ScanEvent,
};
pub use registry::WorkspaceRegistry;
pub use scanner::{FileSyncOutcome, WorkspaceScanner};
pub use state::{
    BlockProgress, ErrorDetail, IndexStatus, IndexedDetail, IndexingPhase, QueueProgress,
    StandbyReason, StateManager, StatusSnapshot, SystemState,
};
pub use stats::ScanStats;
pub use watcher::{WatcherConfig, WorkspaceWatcher};
