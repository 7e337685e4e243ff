use crate::contracts::{CacheStore, ConfigGate, FileWatcher, Scanner};
use crate::outcome::{ScanOutcome, ScanVerdict};
use crate::progress::{BatchProgress, BatchStarted, BatchSummary, ScanEvent};
use crate::state::{
    ErrorDetail, IndexStatus, IndexedDetail, IndexingPhase, StandbyReason, StateManager,
    StatusSnapshot, SystemState,
};
use crate::{IndexerError, Result};
use atlas_vector_store::VectorStore;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

const SCAN_EVENT_CAPACITY: usize = 256;

/// Drives one workspace's index through its whole lifecycle.
///
/// One instance exists per workspace root and outlives individual runs.
/// `start_indexing` owns the full pipeline (vector store, cache, scan,
/// watcher) and publishes every transition to the [`StateManager`]. All
/// run-scoped data (the [`ScanOutcome`], the watcher subscriptions) is
/// created and torn down inside one `start_indexing`/`stop_watcher` cycle.
pub struct IndexOrchestrator {
    root: PathBuf,
    config: Arc<dyn ConfigGate>,
    cache: Arc<dyn CacheStore>,
    vector_store: Arc<dyn VectorStore>,
    scanner: Arc<dyn Scanner>,
    watcher: Arc<dyn FileWatcher>,
    state: Arc<StateManager>,
    processing: AtomicBool,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl IndexOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        root: impl Into<PathBuf>,
        config: Arc<dyn ConfigGate>,
        cache: Arc<dyn CacheStore>,
        vector_store: Arc<dyn VectorStore>,
        scanner: Arc<dyn Scanner>,
        watcher: Arc<dyn FileWatcher>,
        state: Arc<StateManager>,
    ) -> Self {
        Self {
            root: root.into(),
            config,
            cache,
            vector_store,
            scanner,
            watcher,
            state,
            processing: AtomicBool::new(false),
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Current lifecycle state. Pure read, never suspends.
    #[must_use]
    pub fn state(&self) -> SystemState {
        self.state.state()
    }

    #[must_use]
    pub fn status(&self) -> IndexStatus {
        self.state.status()
    }

    #[must_use]
    pub fn subscribe(&self) -> tokio::sync::watch::Receiver<StatusSnapshot> {
        self.state.subscribe()
    }

    /// Run one full indexing pass and, on success, leave the watcher running.
    ///
    /// Never returns an error to the caller: configuration problems surface
    /// as state messages, collaborator failures are classified and converted
    /// into compensating cleanup plus an `Error` state, and re-entrant calls
    /// are logged no-ops. The outcome is whatever [`Self::state`] reports
    /// when this returns.
    pub async fn start_indexing(&self) {
        if !self.root.is_dir() {
            self.state
                .set_status(IndexStatus::Error(ErrorDetail::MissingWorkspace));
            return;
        }

        if !self.config.is_fully_configured() {
            self.state
                .set_status(IndexStatus::Standby(StandbyReason::MissingConfiguration));
            return;
        }

        let current = self.state.state();
        if !matches!(
            current,
            SystemState::Standby | SystemState::Error | SystemState::Indexed
        ) {
            log::info!("start_indexing ignored: state is {current:?}");
            return;
        }

        let Some(_guard) = ProcessingGuard::acquire(&self.processing) else {
            log::info!("start_indexing ignored: another guarded operation is running");
            return;
        };

        self.state.reset_run_progress();
        self.state
            .set_status(IndexStatus::Indexing(IndexingPhase::InitializingServices));

        if let Err(failure) = self.run_indexing_pass().await {
            log::error!("Indexing run failed: {failure}");
            if let Err(e) = self.vector_store.clear_collection().await {
                log::warn!("Failed to clear vector collection after failed run: {e}");
            }
            if let Err(e) = self.cache.clear().await {
                log::warn!("Failed to clear hash cache after failed run: {e}");
            }
            self.state
                .set_status(IndexStatus::Error(error_detail(&failure)));
            self.halt_watcher().await;
        }
    }

    /// The fallible middle of `start_indexing`; every error thrown here is
    /// caught at that boundary and turned into cleanup + an `Error` state.
    async fn run_indexing_pass(&self) -> Result<()> {
        let created_new = self.vector_store.initialize().await?;
        if created_new {
            log::info!("Vector collection is new; clearing stale hash cache");
            self.cache.clear().await?;
        }

        self.state
            .set_status(IndexStatus::Indexing(IndexingPhase::Scanning));

        let (events_tx, mut events_rx) = mpsc::channel(SCAN_EVENT_CAPACITY);
        let scan = self.scanner.scan(&self.root, events_tx);
        tokio::pin!(scan);

        let mut outcome = ScanOutcome::new();
        let scan_result = loop {
            tokio::select! {
                biased;
                Some(event) = events_rx.recv() => {
                    self.apply_scan_event(&mut outcome, event);
                }
                result = &mut scan => break result,
            }
        };
        // The scan future owned the only sender, so this drains to closure.
        while let Some(event) = events_rx.recv().await {
            self.apply_scan_event(&mut outcome, event);
        }

        let stats = scan_result?.ok_or(IndexerError::ScanContract)?;
        log::info!(
            "Scan complete: {}/{} blocks indexed, {} batch errors, {} files walked",
            outcome.blocks_indexed(),
            outcome.blocks_found(),
            outcome.batch_errors().len(),
            stats.files_walked
        );

        match outcome.classify() {
            ScanVerdict::Success => {
                self.start_watcher().await?;
                self.state
                    .set_status(IndexStatus::Indexed(IndexedDetail::WatcherStarted));
                Ok(())
            }
            ScanVerdict::TotalFailure { first_error } => match first_error {
                Some(error) => Err(IndexerError::IndexingFailed {
                    detail: error.to_string(),
                }),
                None => Err(IndexerError::NoBlocksIndexed),
            },
            ScanVerdict::PartialFailure {
                blocks_indexed,
                blocks_found,
                first_error,
            } => Err(IndexerError::PartialIndexingFailure {
                blocks_indexed,
                blocks_found,
                detail: first_error.to_string(),
            }),
        }
    }

    fn apply_scan_event(&self, outcome: &mut ScanOutcome, event: ScanEvent) {
        if let ScanEvent::BatchError(error) = &event {
            log::warn!("Scan batch error: {error}");
        }
        outcome.apply(event);
        self.state
            .report_block_progress(outcome.blocks_indexed(), outcome.blocks_found());
    }

    /// Bring up the watcher and register the three event subscriptions.
    /// A second call while subscriptions are live is a no-op.
    async fn start_watcher(&self) -> Result<()> {
        if !self.config.is_fully_configured() {
            return Err(IndexerError::NotConfigured);
        }

        if !self.lock_subscriptions().is_empty() {
            log::debug!("File watcher already running for {}", self.root.display());
            return Ok(());
        }

        self.state
            .set_status(IndexStatus::Indexing(IndexingPhase::InitializingWatcher));
        self.watcher.initialize().await?;

        let subscriptions = vec![
            spawn_batch_started_hook(self.watcher.subscribe_batch_started()),
            spawn_batch_progress_hook(
                self.watcher.subscribe_batch_progress(),
                Arc::clone(&self.state),
            ),
            spawn_batch_finished_hook(self.watcher.subscribe_batch_finished()),
        ];
        *self.lock_subscriptions() = subscriptions;
        Ok(())
    }

    /// Stop the watcher and release the re-entrancy gate.
    ///
    /// Safe to call at any time, including when nothing is running. An
    /// `Error` state is sticky: stopping the watcher does not clear it.
    pub async fn stop_watcher(&self) {
        self.halt_watcher().await;
        self.processing.store(false, Ordering::SeqCst);
    }

    /// Watcher teardown shared by `stop_watcher` and the guarded operations.
    /// Leaves the `ProcessingFlag` alone so a guarded caller keeps holding it.
    async fn halt_watcher(&self) {
        self.watcher.dispose().await;

        let mut subscriptions = self.lock_subscriptions();
        for subscription in subscriptions.drain(..) {
            subscription.dispose();
        }
        drop(subscriptions);

        if self.state.state() != SystemState::Error {
            self.state
                .set_status(IndexStatus::Standby(StandbyReason::Idle));
        }
    }

    /// Tear down the watcher and drop all durable index data.
    ///
    /// A failure to delete the collection is logged and surfaced as an
    /// `Error` state but never propagated; the hash cache is cleared
    /// regardless.
    pub async fn clear_index_data(&self) {
        let Some(_guard) = ProcessingGuard::acquire(&self.processing) else {
            log::info!("clear_index_data ignored: another guarded operation is running");
            return;
        };

        self.halt_watcher().await;

        if self.config.is_fully_configured() {
            if let Err(e) = self.vector_store.delete_collection().await {
                log::error!("Failed to delete vector collection: {e}");
                self.state.set_status(IndexStatus::Error(ErrorDetail::ClearFailed {
                    detail: e.to_string(),
                }));
            }
        } else {
            log::debug!("Skipping vector collection delete: feature not configured");
        }

        if let Err(e) = self.cache.clear().await {
            log::error!("Failed to clear hash cache: {e}");
        }

        if self.state.state() != SystemState::Error {
            self.state
                .set_status(IndexStatus::Standby(StandbyReason::IndexDataCleared));
        }
    }

    fn lock_subscriptions(&self) -> std::sync::MutexGuard<'_, Vec<Subscription>> {
        self.subscriptions
            .lock()
            .expect("subscription list mutex poisoned")
    }
}

/// RAII hold on the orchestrator's re-entrancy gate. Acquisition is a single
/// compare-and-swap; release happens on every exit path via `Drop`.
struct ProcessingGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> ProcessingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
            .then_some(Self { flag })
    }
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// One disposable watcher subscription: an event-pump task that is aborted
/// on dispose (or drop, whichever comes first).
struct Subscription {
    handle: JoinHandle<()>,
}

impl Subscription {
    fn new(handle: JoinHandle<()>) -> Self {
        Self { handle }
    }

    fn dispose(self) {
        self.handle.abort();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn spawn_batch_started_hook(mut rx: broadcast::Receiver<BatchStarted>) -> Subscription {
    Subscription::new(tokio::spawn(async move {
        loop {
            match rx.recv().await {
                // Reserved hook: batch start needs no state transition yet.
                Ok(batch) => log::debug!("Watcher batch started ({} files)", batch.total),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    log::warn!("Dropped {n} batch-start events");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }))
}

fn spawn_batch_progress_hook(
    mut rx: broadcast::Receiver<BatchProgress>,
    state: Arc<StateManager>,
) -> Subscription {
    Subscription::new(tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(progress) => {
                    state.report_queue_progress(
                        progress.processed,
                        progress.total,
                        progress.current_file.as_deref(),
                    );

                    if progress.total > 0 && state.state() != SystemState::Indexing {
                        state.set_status(IndexStatus::Indexing(
                            IndexingPhase::ProcessingFileChanges,
                        ));
                    }

                    if progress.processed == progress.total {
                        if progress.total > 0 {
                            state.set_status(IndexStatus::Indexed(
                                IndexedDetail::FileChangesProcessed,
                            ));
                        } else if state.state() == SystemState::Indexing {
                            state.set_status(IndexStatus::Indexed(IndexedDetail::QueueDrained));
                        }
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    log::warn!("Dropped {n} batch-progress events");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }))
}

fn spawn_batch_finished_hook(mut rx: broadcast::Receiver<BatchSummary>) -> Subscription {
    Subscription::new(tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(summary) => {
                    let (indexed, rejected, unreadable) = summary.tally();
                    log::info!(
                        "Watcher batch finished: {indexed} indexed, {rejected} rejected, {unreadable} unreadable"
                    );
                    if let Some(error) = &summary.batch_error {
                        log::warn!("Watcher batch error: {error}");
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    log::warn!("Dropped {n} batch-finished events");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }))
}

fn error_detail(error: &IndexerError) -> ErrorDetail {
    match error {
        IndexerError::ScanContract => ErrorDetail::ScanContract,
        IndexerError::NoBlocksIndexed => ErrorDetail::NoBlocksIndexed,
        IndexerError::PartialIndexingFailure {
            blocks_indexed,
            blocks_found,
            detail,
        } => ErrorDetail::PartialIndexingFailure {
            blocks_indexed: *blocks_indexed,
            blocks_found: *blocks_found,
            detail: detail.clone(),
        },
        IndexerError::IndexingFailed { detail } => ErrorDetail::IndexingFailed {
            detail: detail.clone(),
        },
        other => ErrorDetail::IndexingFailed {
            detail: other.to_string(),
        },
    }
}
