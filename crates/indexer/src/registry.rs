use crate::orchestrator::IndexOrchestrator;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Host-owned map of workspace root to orchestrator.
///
/// The host constructs one registry at startup and disposes it on shutdown;
/// an orchestrator registered here lives until its workspace is closed. This
/// replaces any global singleton: orchestrator identity is the workspace
/// root, nothing else.
#[derive(Default)]
pub struct WorkspaceRegistry {
    orchestrators: Mutex<HashMap<PathBuf, Arc<IndexOrchestrator>>>,
}

impl WorkspaceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `orchestrator` for its workspace root, returning the shared
    /// handle. A root that is already registered keeps its existing
    /// orchestrator; the new one is dropped.
    pub async fn register(&self, orchestrator: IndexOrchestrator) -> Arc<IndexOrchestrator> {
        let mut orchestrators = self.orchestrators.lock().await;
        let root = orchestrator.root().to_path_buf();
        Arc::clone(
            orchestrators
                .entry(root)
                .or_insert_with(|| Arc::new(orchestrator)),
        )
    }

    pub async fn get(&self, root: &Path) -> Option<Arc<IndexOrchestrator>> {
        self.orchestrators.lock().await.get(root).cloned()
    }

    /// Stop the workspace's watcher and drop its orchestrator.
    pub async fn close_workspace(&self, root: &Path) {
        let removed = self.orchestrators.lock().await.remove(root);
        if let Some(orchestrator) = removed {
            orchestrator.stop_watcher().await;
        }
    }

    /// Tear down every registered workspace; called on host shutdown.
    pub async fn close_all(&self) {
        let orchestrators: Vec<_> = self.orchestrators.lock().await.drain().collect();
        for (_, orchestrator) in orchestrators {
            orchestrator.stop_watcher().await;
        }
    }

    pub async fn workspace_count(&self) -> usize {
        self.orchestrators.lock().await.len()
    }
}
