use crate::config::DATA_DIR_NAME;
use crate::contracts::FileWatcher;
use crate::progress::{BatchProgress, BatchStarted, BatchSummary, FileOutcome, FileStatus};
use crate::scanner::{normalize_path, FileSyncOutcome, WorkspaceScanner};
use crate::{IndexerError, Result};
use async_trait::async_trait;
use notify::{Config as NotifyConfig, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::time;

const EVENT_CHANNEL_CAPACITY: usize = 1024;
const BATCH_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub debounce: Duration,
    pub max_batch_wait: Duration,
    pub notify_poll_interval: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(750),
            max_batch_wait: Duration::from_secs(3),
            notify_poll_interval: Duration::from_secs(2),
        }
    }
}

/// Debounced workspace watcher.
///
/// Edits are coalesced into batches: a batch fires after a quiet period, or
/// once the oldest pending change has waited `max_batch_wait`, whichever
/// comes first. Each batch re-syncs the changed files through the scanner
/// pipeline and reports over three broadcast streams (started, progress,
/// finished).
pub struct WorkspaceWatcher {
    root: PathBuf,
    scanner: Arc<WorkspaceScanner>,
    config: WatcherConfig,
    started_tx: broadcast::Sender<BatchStarted>,
    progress_tx: broadcast::Sender<BatchProgress>,
    finished_tx: broadcast::Sender<BatchSummary>,
    runtime: Mutex<Option<WatcherRuntime>>,
}

struct WatcherRuntime {
    shutdown_tx: mpsc::Sender<()>,
    _fs_watcher: RecommendedWatcher,
}

impl WorkspaceWatcher {
    pub fn new(root: impl Into<PathBuf>, scanner: Arc<WorkspaceScanner>, config: WatcherConfig) -> Self {
        let (started_tx, _) = broadcast::channel(BATCH_CHANNEL_CAPACITY);
        let (progress_tx, _) = broadcast::channel(BATCH_CHANNEL_CAPACITY);
        let (finished_tx, _) = broadcast::channel(BATCH_CHANNEL_CAPACITY);
        Self {
            root: root.into(),
            scanner,
            config,
            started_tx,
            progress_tx,
            finished_tx,
            runtime: Mutex::new(None),
        }
    }
}

#[async_trait]
impl FileWatcher for WorkspaceWatcher {
    async fn initialize(&self) -> Result<()> {
        let mut runtime = self.runtime.lock().await;
        if runtime.is_some() {
            log::debug!("File watcher already running for {}", self.root.display());
            return Ok(());
        }

        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let fs_watcher =
            create_fs_watcher(&self.root, event_tx, self.config.notify_poll_interval)?;
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        spawn_watch_loop(WatchLoop {
            root: self.root.clone(),
            scanner: Arc::clone(&self.scanner),
            config: self.config.clone(),
            event_rx,
            shutdown_rx,
            started_tx: self.started_tx.clone(),
            progress_tx: self.progress_tx.clone(),
            finished_tx: self.finished_tx.clone(),
        });

        *runtime = Some(WatcherRuntime {
            shutdown_tx,
            _fs_watcher: fs_watcher,
        });
        log::info!("File watcher started for {}", self.root.display());
        Ok(())
    }

    async fn dispose(&self) {
        let mut runtime = self.runtime.lock().await;
        if let Some(runtime) = runtime.take() {
            let _ = runtime.shutdown_tx.send(()).await;
            log::info!("File watcher stopped for {}", self.root.display());
        }
    }

    fn subscribe_batch_started(&self) -> broadcast::Receiver<BatchStarted> {
        self.started_tx.subscribe()
    }

    fn subscribe_batch_progress(&self) -> broadcast::Receiver<BatchProgress> {
        self.progress_tx.subscribe()
    }

    fn subscribe_batch_finished(&self) -> broadcast::Receiver<BatchSummary> {
        self.finished_tx.subscribe()
    }
}

fn create_fs_watcher(
    root: &Path,
    sender: mpsc::Sender<notify::Result<Event>>,
    poll_interval: Duration,
) -> Result<RecommendedWatcher> {
    let mut watcher = RecommendedWatcher::new(
        move |res| {
            let _ = sender.blocking_send(res);
        },
        NotifyConfig::default().with_poll_interval(poll_interval),
    )
    .map_err(|e| IndexerError::WatchError(format!("watcher init failed: {e}")))?;
    watcher
        .watch(root, RecursiveMode::Recursive)
        .map_err(|e| IndexerError::WatchError(format!("failed to watch {}: {e}", root.display())))?;
    Ok(watcher)
}

struct WatchLoop {
    root: PathBuf,
    scanner: Arc<WorkspaceScanner>,
    config: WatcherConfig,
    event_rx: mpsc::Receiver<notify::Result<Event>>,
    shutdown_rx: mpsc::Receiver<()>,
    started_tx: broadcast::Sender<BatchStarted>,
    progress_tx: broadcast::Sender<BatchProgress>,
    finished_tx: broadcast::Sender<BatchSummary>,
}

fn spawn_watch_loop(mut ctx: WatchLoop) {
    tokio::spawn(async move {
        let mut debounce = DebounceState::new(ctx.config.debounce, ctx.config.max_batch_wait);

        loop {
            let next_deadline = debounce.next_deadline();

            tokio::select! {
                _ = ctx.shutdown_rx.recv() => break,
                maybe_event = ctx.event_rx.recv() => {
                    match maybe_event {
                        Some(event) => handle_event(&ctx.root, event, &mut debounce),
                        None => break,
                    }
                }
                () = async {
                    if let Some(deadline) = next_deadline {
                        time::sleep_until(deadline).await;
                    }
                }, if debounce.should_run() && next_deadline.is_some() => {
                    let paths = debounce.take_batch();
                    process_batch(&ctx, paths).await;
                }
            }
        }

        log::debug!("Watch loop for {} stopped", ctx.root.display());
    });
}

fn handle_event(root: &Path, event: notify::Result<Event>, debounce: &mut DebounceState) {
    match event {
        Ok(event) => {
            for path in event.paths {
                if is_relevant_path(root, &path) {
                    debounce.record_path(path);
                }
            }
        }
        Err(e) => log::warn!("Watcher error: {e}"),
    }
}

async fn process_batch(ctx: &WatchLoop, paths: Vec<PathBuf>) {
    let total = paths.len() as u64;
    let _ = ctx.started_tx.send(BatchStarted { total });

    let mut summary = BatchSummary::default();
    let mut processed = 0u64;

    if total == 0 {
        let _ = ctx.progress_tx.send(BatchProgress {
            processed: 0,
            total: 0,
            current_file: None,
        });
        let _ = ctx.finished_tx.send(summary);
        return;
    }

    for path in paths {
        let rel_path = normalize_path(&ctx.root, &path);
        let _ = ctx.progress_tx.send(BatchProgress {
            processed,
            total,
            current_file: Some(rel_path.clone()),
        });

        let status = match ctx.scanner.sync_file(&ctx.root, &path).await {
            Ok(FileSyncOutcome::Indexed { blocks }) => {
                log::debug!("Re-indexed {rel_path} ({blocks} blocks)");
                FileStatus::Success
            }
            Ok(FileSyncOutcome::Unchanged | FileSyncOutcome::Removed) => FileStatus::Success,
            Err(IndexerError::IoError(e)) => {
                log::warn!("Could not read {rel_path}: {e}");
                FileStatus::LocalError
            }
            Err(e) => {
                log::warn!("Failed to re-index {rel_path}: {e}");
                FileStatus::Error
            }
        };

        processed += 1;
        summary.processed_files.push(FileOutcome {
            path: rel_path,
            status,
        });
    }

    let _ = ctx.progress_tx.send(BatchProgress {
        processed,
        total,
        current_file: None,
    });
    let _ = ctx.finished_tx.send(summary);
}

fn is_relevant_path(root: &Path, path: &Path) -> bool {
    const IGNORED: &[&str] = &[
        ".git",
        ".hg",
        ".svn",
        DATA_DIR_NAME,
        "target",
        "node_modules",
        "dist",
        "build",
        "out",
    ];

    let Ok(relative) = path.strip_prefix(root) else {
        return false;
    };

    for component in relative.components() {
        let name = component.as_os_str().to_string_lossy();
        if IGNORED.iter().any(|ignored| name == *ignored) {
            return false;
        }
    }

    !relative
        .file_name()
        .map(|f| f.to_string_lossy() == ".gitignore")
        .unwrap_or(false)
}

/// Batching state for the watch loop.
///
/// A batch becomes due `debounce` after the newest event, but never later
/// than `max_batch` after the oldest pending one, so a steady stream of
/// edits cannot starve the queue forever.
struct DebounceState {
    debounce: Duration,
    max_batch: Duration,
    pending: BTreeSet<PathBuf>,
    last_event: Option<Instant>,
    first_event: Option<Instant>,
}

impl DebounceState {
    fn new(debounce: Duration, max_batch: Duration) -> Self {
        Self {
            debounce,
            max_batch,
            pending: BTreeSet::new(),
            last_event: None,
            first_event: None,
        }
    }

    fn record_path(&mut self, path: PathBuf) {
        self.pending.insert(path);
        self.last_event = Some(Instant::now());
        self.first_event.get_or_insert_with(Instant::now);
    }

    fn should_run(&self) -> bool {
        !self.pending.is_empty()
    }

    fn next_deadline(&self) -> Option<time::Instant> {
        if self.pending.is_empty() {
            return None;
        }

        let mut deadline = self.last_event.map(|last| last + self.debounce);

        if let Some(first) = self.first_event {
            let forced = first + self.max_batch;
            deadline = Some(match deadline {
                Some(current) if forced < current => forced,
                Some(current) => current,
                None => forced,
            });
        }

        deadline.map(time::Instant::from_std)
    }

    fn take_batch(&mut self) -> Vec<PathBuf> {
        let paths = std::mem::take(&mut self.pending).into_iter().collect();
        self.last_event = None;
        self.first_event = None;
        paths
    }
}
