use serde::Serialize;
use std::fmt;
use tokio::sync::watch;

/// Coarse lifecycle state surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemState {
    Standby,
    Indexing,
    Indexed,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StandbyReason {
    Idle,
    MissingConfiguration,
    IndexDataCleared,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexingPhase {
    InitializingServices,
    Scanning,
    InitializingWatcher,
    ProcessingFileChanges,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexedDetail {
    WatcherStarted,
    FileChangesProcessed,
    QueueDrained,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorDetail {
    MissingWorkspace,
    ScanContract,
    NoBlocksIndexed,
    PartialIndexingFailure {
        blocks_indexed: u64,
        blocks_found: u64,
        detail: String,
    },
    IndexingFailed {
        detail: String,
    },
    ClearFailed {
        detail: String,
    },
}

/// Closed pairing of lifecycle state and reason.
///
/// Each variant carries only the reasons valid for that state, so a nonsense
/// combination (say, `Indexed` with a failure message) cannot be built. The
/// user-visible message string is derived, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum IndexStatus {
    Standby(StandbyReason),
    Indexing(IndexingPhase),
    Indexed(IndexedDetail),
    Error(ErrorDetail),
}

impl IndexStatus {
    #[must_use]
    pub const fn state(&self) -> SystemState {
        match self {
            Self::Standby(_) => SystemState::Standby,
            Self::Indexing(_) => SystemState::Indexing,
            Self::Indexed(_) => SystemState::Indexed,
            Self::Error(_) => SystemState::Error,
        }
    }
}

impl fmt::Display for IndexStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standby(StandbyReason::Idle) => write!(f, "standby"),
            Self::Standby(StandbyReason::MissingConfiguration) => {
                write!(f, "missing configuration")
            }
            Self::Standby(StandbyReason::IndexDataCleared) => write!(f, "index data cleared"),
            Self::Indexing(IndexingPhase::InitializingServices) => {
                write!(f, "initializing services")
            }
            Self::Indexing(IndexingPhase::Scanning) => write!(f, "services ready, starting scan"),
            Self::Indexing(IndexingPhase::InitializingWatcher) => {
                write!(f, "initializing file watcher")
            }
            Self::Indexing(IndexingPhase::ProcessingFileChanges) => {
                write!(f, "processing file changes")
            }
            Self::Indexed(IndexedDetail::WatcherStarted) => write!(f, "file watcher started"),
            Self::Indexed(IndexedDetail::FileChangesProcessed) => {
                write!(f, "file changes processed")
            }
            Self::Indexed(IndexedDetail::QueueDrained) => {
                write!(f, "index up-to-date, queue empty")
            }
            Self::Error(ErrorDetail::MissingWorkspace) => write!(f, "indexing requires a workspace"),
            Self::Error(ErrorDetail::ScanContract) => {
                write!(f, "scan failed, is scanner initialized?")
            }
            Self::Error(ErrorDetail::NoBlocksIndexed) => {
                write!(f, "indexing failed, no blocks indexed")
            }
            Self::Error(ErrorDetail::PartialIndexingFailure {
                blocks_indexed,
                blocks_found,
                detail,
            }) => write!(
                f,
                "indexing partially failed: only {blocks_indexed} of {blocks_found} blocks indexed: {detail}"
            ),
            Self::Error(ErrorDetail::IndexingFailed { detail }) => write!(f, "{detail}"),
            Self::Error(ErrorDetail::ClearFailed { detail }) => {
                write!(f, "failed to clear index data: {detail}")
            }
        }
    }
}

/// Running block counters for the current scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BlockProgress {
    pub indexed: u64,
    pub found: u64,
}

/// Ephemeral file-queue progress reported by the watcher.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueProgress {
    pub processed: u64,
    pub total: u64,
    pub current_file: Option<String>,
}

/// Everything the UI layer reads, published as one value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub status: IndexStatus,
    pub block_progress: BlockProgress,
    pub queue_progress: Option<QueueProgress>,
}

impl StatusSnapshot {
    fn initial() -> Self {
        Self {
            status: IndexStatus::Standby(StandbyReason::Idle),
            block_progress: BlockProgress::default(),
            queue_progress: None,
        }
    }
}

/// Single-writer status bulletin board.
///
/// The orchestrator publishes transitions and progress; consumers subscribe
/// to the watch channel or poll the latest snapshot. Publishing is
/// fire-and-forget with last-write-wins semantics, so a slow or absent
/// subscriber never backs up the orchestrator.
pub struct StateManager {
    tx: watch::Sender<StatusSnapshot>,
}

impl StateManager {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = watch::channel(StatusSnapshot::initial());
        Self { tx }
    }

    pub fn set_status(&self, status: IndexStatus) {
        log::info!("Index status: {} ({:?})", status, status.state());
        self.tx.send_modify(|snapshot| snapshot.status = status);
    }

    pub fn report_block_progress(&self, indexed: u64, found: u64) {
        self.tx.send_modify(|snapshot| {
            snapshot.block_progress = BlockProgress { indexed, found };
        });
    }

    pub fn report_queue_progress(&self, processed: u64, total: u64, current_file: Option<&str>) {
        self.tx.send_modify(|snapshot| {
            snapshot.queue_progress = Some(QueueProgress {
                processed,
                total,
                current_file: current_file.map(str::to_string),
            });
        });
    }

    /// Zero the run-scoped counters at the start of a fresh run.
    pub fn reset_run_progress(&self) {
        self.tx.send_modify(|snapshot| {
            snapshot.block_progress = BlockProgress::default();
            snapshot.queue_progress = None;
        });
    }

    #[must_use]
    pub fn snapshot(&self) -> StatusSnapshot {
        self.tx.borrow().clone()
    }

    #[must_use]
    pub fn status(&self) -> IndexStatus {
        self.tx.borrow().status.clone()
    }

    #[must_use]
    pub fn state(&self) -> SystemState {
        self.tx.borrow().status.state()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.tx.subscribe()
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}
