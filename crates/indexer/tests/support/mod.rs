//! Scripted collaborator doubles for orchestrator lifecycle tests.
#![allow(dead_code)]

use async_trait::async_trait;
use atlas_indexer::{
    BatchProgress, BatchStarted, BatchSummary, CacheStore, ConfigGate, FileWatcher,
    IndexOrchestrator, Result, ScanEvent, ScanStats, Scanner, StateManager, StatusSnapshot,
};
use atlas_vector_store::mock::MockVectorStore;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::{broadcast, mpsc, oneshot};

/// Shared call journal so tests can assert cross-collaborator ordering.
pub type Journal = Arc<Mutex<Vec<String>>>;

pub fn journal_entries(journal: &Journal) -> Vec<String> {
    journal.lock().expect("journal lock").clone()
}

pub struct StaticConfigGate {
    configured: bool,
}

impl StaticConfigGate {
    pub fn new(configured: bool) -> Self {
        Self { configured }
    }
}

impl ConfigGate for StaticConfigGate {
    fn is_fully_configured(&self) -> bool {
        self.configured
    }
}

#[derive(Default)]
pub struct RecordingCache {
    clear_calls: AtomicUsize,
    journal: Journal,
}

impl RecordingCache {
    pub fn new(journal: Journal) -> Self {
        Self {
            clear_calls: AtomicUsize::new(0),
            journal,
        }
    }

    pub fn clear_calls(&self) -> usize {
        self.clear_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CacheStore for RecordingCache {
    async fn is_indexed(&self, _content_hash: &str) -> bool {
        false
    }

    async fn mark_indexed(&self, _content_hash: &str, _file_path: &str) -> Result<()> {
        Ok(())
    }

    async fn forget_file(&self, _file_path: &str) -> Result<()> {
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.clear_calls.fetch_add(1, Ordering::SeqCst);
        self.journal
            .lock()
            .expect("journal lock")
            .push("cache.clear".to_string());
        Ok(())
    }
}

/// One scripted `scan` invocation.
pub enum ScanScript {
    /// Emit the events in order, then return the stats (`None` models the
    /// scan-returned-nothing contract violation).
    Deliver {
        events: Vec<ScanEvent>,
        stats: Option<ScanStats>,
    },
    /// Park until released, then finish as an empty successful scan.
    BlockUntil(oneshot::Receiver<()>),
}

pub struct ScriptedScanner {
    scripts: Mutex<VecDeque<ScanScript>>,
    calls: AtomicUsize,
    journal: Journal,
}

impl ScriptedScanner {
    pub fn new(journal: Journal, scripts: Vec<ScanScript>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            calls: AtomicUsize::new(0),
            journal,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Scanner for ScriptedScanner {
    async fn scan(
        &self,
        _root: &Path,
        events: mpsc::Sender<ScanEvent>,
    ) -> Result<Option<ScanStats>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.journal
            .lock()
            .expect("journal lock")
            .push("scanner.scan".to_string());

        let script = self
            .scripts
            .lock()
            .expect("script lock")
            .pop_front()
            .unwrap_or(ScanScript::Deliver {
                events: Vec::new(),
                stats: Some(ScanStats::new()),
            });

        match script {
            ScanScript::Deliver {
                events: scripted,
                stats,
            } => {
                for event in scripted {
                    let _ = events.send(event).await;
                }
                Ok(stats)
            }
            ScanScript::BlockUntil(release) => {
                let _ = release.await;
                Ok(Some(ScanStats::new()))
            }
        }
    }
}

pub struct MockWatcher {
    initialize_calls: AtomicUsize,
    dispose_calls: AtomicUsize,
    started_tx: broadcast::Sender<BatchStarted>,
    progress_tx: broadcast::Sender<BatchProgress>,
    finished_tx: broadcast::Sender<BatchSummary>,
}

impl Default for MockWatcher {
    fn default() -> Self {
        let (started_tx, _) = broadcast::channel(16);
        let (progress_tx, _) = broadcast::channel(16);
        let (finished_tx, _) = broadcast::channel(16);
        Self {
            initialize_calls: AtomicUsize::new(0),
            dispose_calls: AtomicUsize::new(0),
            started_tx,
            progress_tx,
            finished_tx,
        }
    }
}

impl MockWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initialize_calls(&self) -> usize {
        self.initialize_calls.load(Ordering::SeqCst)
    }

    pub fn dispose_calls(&self) -> usize {
        self.dispose_calls.load(Ordering::SeqCst)
    }

    pub fn emit_started(&self, total: u64) {
        let _ = self.started_tx.send(BatchStarted { total });
    }

    pub fn emit_progress(&self, processed: u64, total: u64, current_file: Option<&str>) {
        let _ = self.progress_tx.send(BatchProgress {
            processed,
            total,
            current_file: current_file.map(str::to_string),
        });
    }

    pub fn emit_finished(&self, summary: BatchSummary) {
        let _ = self.finished_tx.send(summary);
    }
}

#[async_trait]
impl FileWatcher for MockWatcher {
    async fn initialize(&self) -> Result<()> {
        self.initialize_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn dispose(&self) {
        self.dispose_calls.fetch_add(1, Ordering::SeqCst);
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

pub struct Harness {
    pub root: TempDir,
    pub orchestrator: Arc<IndexOrchestrator>,
    pub cache: Arc<RecordingCache>,
    pub store: Arc<MockVectorStore>,
    pub scanner: Arc<ScriptedScanner>,
    pub watcher: Arc<MockWatcher>,
    pub state: Arc<StateManager>,
    pub journal: Journal,
}

pub struct HarnessBuilder {
    configured: bool,
    store: MockVectorStore,
    scripts: Vec<ScanScript>,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            configured: true,
            // Most tests want an already-existing collection so the pre-scan
            // cache invalidation stays out of their call counts.
            store: MockVectorStore::new().with_existing_collection(),
            scripts: Vec::new(),
        }
    }

    pub fn unconfigured(mut self) -> Self {
        self.configured = false;
        self
    }

    pub fn store(mut self, store: MockVectorStore) -> Self {
        self.store = store;
        self
    }

    pub fn script(mut self, script: ScanScript) -> Self {
        self.scripts.push(script);
        self
    }

    pub fn build(self) -> Harness {
        let root = TempDir::new().expect("temp workspace");
        let journal: Journal = Journal::default();
        let cache = Arc::new(RecordingCache::new(Arc::clone(&journal)));
        let store = Arc::new(self.store);
        let scanner = Arc::new(ScriptedScanner::new(Arc::clone(&journal), self.scripts));
        let watcher = Arc::new(MockWatcher::new());
        let state = Arc::new(StateManager::new());

        let orchestrator = Arc::new(IndexOrchestrator::new(
            root.path(),
            Arc::new(StaticConfigGate::new(self.configured)),
            Arc::clone(&cache) as Arc<dyn CacheStore>,
            Arc::clone(&store) as Arc<dyn atlas_vector_store::VectorStore>,
            Arc::clone(&scanner) as Arc<dyn Scanner>,
            Arc::clone(&watcher) as Arc<dyn FileWatcher>,
            Arc::clone(&state),
        ));

        Harness {
            root,
            orchestrator,
            cache,
            store,
            scanner,
            watcher,
            state,
            journal,
        }
    }
}

/// Successful-scan event triple: found, indexed, then errors.
pub fn scan_events(found: u64, indexed: u64, errors: &[&str]) -> Vec<ScanEvent> {
    let mut events = Vec::new();
    if found > 0 {
        events.push(ScanEvent::BlocksFound(found));
    }
    if indexed > 0 {
        events.push(ScanEvent::BlocksIndexed(indexed));
    }
    for message in errors {
        events.push(ScanEvent::BatchError(atlas_indexer::BatchError::new(
            *message,
        )));
    }
    events
}

pub fn delivered(found: u64, indexed: u64, errors: &[&str]) -> ScanScript {
    ScanScript::Deliver {
        events: scan_events(found, indexed, errors),
        stats: Some(ScanStats::new()),
    }
}

/// Wait until the published snapshot satisfies `pred`, or panic after 5s.
pub async fn wait_for_snapshot(
    orchestrator: &IndexOrchestrator,
    pred: impl Fn(&StatusSnapshot) -> bool,
) {
    let mut rx = orchestrator.subscribe();
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if pred(&rx.borrow()) {
                return;
            }
            if rx.changed().await.is_err() {
                panic!("status channel closed before condition held");
            }
        }
    })
    .await
    .expect("status condition timed out");
}
