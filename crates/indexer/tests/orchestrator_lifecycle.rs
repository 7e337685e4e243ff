mod support;

use atlas_indexer::{BatchSummary, ScanStats, SystemState};
use atlas_vector_store::mock::MockVectorStore;
use pretty_assertions::assert_eq;
use support::{delivered, journal_entries, wait_for_snapshot, HarnessBuilder, ScanScript};
use tokio::sync::oneshot;

#[tokio::test]
async fn missing_workspace_surfaces_error_without_running() {
    let harness = HarnessBuilder::new().build();
    let missing_root = harness.root.path().join("does-not-exist");
    let orchestrator = atlas_indexer::IndexOrchestrator::new(
        missing_root,
        std::sync::Arc::new(support::StaticConfigGate::new(true)),
        harness.cache.clone() as std::sync::Arc<dyn atlas_indexer::CacheStore>,
        harness.store.clone() as std::sync::Arc<dyn atlas_vector_store::VectorStore>,
        harness.scanner.clone() as std::sync::Arc<dyn atlas_indexer::Scanner>,
        harness.watcher.clone() as std::sync::Arc<dyn atlas_indexer::FileWatcher>,
        harness.state.clone(),
    );

    orchestrator.start_indexing().await;

    assert_eq!(orchestrator.state(), SystemState::Error);
    assert_eq!(
        orchestrator.status().to_string(),
        "indexing requires a workspace"
    );
    assert_eq!(harness.scanner.calls(), 0);
}

#[tokio::test]
async fn unconfigured_workspace_stays_in_standby() {
    let harness = HarnessBuilder::new().unconfigured().build();

    harness.orchestrator.start_indexing().await;

    assert_eq!(harness.orchestrator.state(), SystemState::Standby);
    assert_eq!(
        harness.orchestrator.status().to_string(),
        "missing configuration"
    );
    assert_eq!(harness.scanner.calls(), 0);
    assert_eq!(harness.store.initialize_calls(), 0);
}

#[tokio::test]
async fn empty_workspace_scan_is_success_with_watcher_running() {
    let harness = HarnessBuilder::new().script(delivered(0, 0, &[])).build();

    harness.orchestrator.start_indexing().await;

    assert_eq!(harness.orchestrator.state(), SystemState::Indexed);
    assert_eq!(
        harness.orchestrator.status().to_string(),
        "file watcher started"
    );
    assert_eq!(harness.watcher.initialize_calls(), 1);
    assert_eq!(harness.cache.clear_calls(), 0);
}

#[tokio::test]
async fn total_failure_cleans_up_exactly_once() {
    let harness = HarnessBuilder::new()
        .script(delivered(10, 0, &["embedding backend offline", "second failure"]))
        .build();

    harness.orchestrator.start_indexing().await;

    assert_eq!(harness.orchestrator.state(), SystemState::Error);
    // Earliest recorded batch error wins the surfaced message.
    assert_eq!(
        harness.orchestrator.status().to_string(),
        "embedding backend offline"
    );
    assert_eq!(harness.store.clear_calls(), 1);
    assert_eq!(harness.cache.clear_calls(), 1);
    assert_eq!(harness.watcher.initialize_calls(), 0);
    assert!(harness.watcher.dispose_calls() >= 1);
}

#[tokio::test]
async fn total_failure_without_errors_uses_generic_message() {
    let harness = HarnessBuilder::new().script(delivered(10, 0, &[])).build();

    harness.orchestrator.start_indexing().await;

    assert_eq!(harness.orchestrator.state(), SystemState::Error);
    assert_eq!(
        harness.orchestrator.status().to_string(),
        "indexing failed, no blocks indexed"
    );
}

#[tokio::test]
async fn five_percent_loss_still_ends_indexed() {
    let harness = HarnessBuilder::new()
        .script(delivered(100, 95, &["one bad batch"]))
        .build();

    harness.orchestrator.start_indexing().await;

    assert_eq!(harness.orchestrator.state(), SystemState::Indexed);
    let snapshot = harness.state.snapshot();
    assert_eq!(snapshot.block_progress.indexed, 95);
    assert_eq!(snapshot.block_progress.found, 100);
}

#[tokio::test]
async fn twenty_percent_loss_fails_with_partial_message() {
    let harness = HarnessBuilder::new()
        .script(delivered(100, 80, &["first", "second", "third"]))
        .build();

    harness.orchestrator.start_indexing().await;

    assert_eq!(harness.orchestrator.state(), SystemState::Error);
    assert_eq!(
        harness.orchestrator.status().to_string(),
        "indexing partially failed: only 80 of 100 blocks indexed: first"
    );
    assert_eq!(harness.store.clear_calls(), 1);
    assert_eq!(harness.cache.clear_calls(), 1);
}

#[tokio::test]
async fn fresh_collection_clears_cache_before_scanning() {
    let harness = HarnessBuilder::new()
        .store(MockVectorStore::new())
        .script(delivered(5, 5, &[]))
        .build();

    harness.orchestrator.start_indexing().await;

    assert_eq!(harness.orchestrator.state(), SystemState::Indexed);
    assert_eq!(harness.cache.clear_calls(), 1);
    assert_eq!(
        journal_entries(&harness.journal),
        vec!["cache.clear".to_string(), "scanner.scan".to_string()]
    );
}

#[tokio::test]
async fn scan_returning_nothing_is_a_contract_violation() {
    let harness = HarnessBuilder::new()
        .script(ScanScript::Deliver {
            events: Vec::new(),
            stats: None,
        })
        .build();

    harness.orchestrator.start_indexing().await;

    assert_eq!(harness.orchestrator.state(), SystemState::Error);
    assert_eq!(
        harness.orchestrator.status().to_string(),
        "scan failed, is scanner initialized?"
    );
}

#[tokio::test]
async fn second_start_while_running_is_a_noop() {
    let (release_tx, release_rx) = oneshot::channel();
    let harness = HarnessBuilder::new()
        .script(ScanScript::BlockUntil(release_rx))
        .build();

    let orchestrator = harness.orchestrator.clone();
    let first = tokio::spawn(async move { orchestrator.start_indexing().await });
    wait_for_snapshot(&harness.orchestrator, |snapshot| {
        snapshot.status.state() == SystemState::Indexing
    })
    .await;

    harness.orchestrator.start_indexing().await;
    assert_eq!(harness.scanner.calls(), 1);
    assert_eq!(harness.orchestrator.state(), SystemState::Indexing);

    release_tx.send(()).expect("release scan");
    first.await.expect("first run");
    assert_eq!(harness.orchestrator.state(), SystemState::Indexed);
    assert_eq!(harness.scanner.calls(), 1);
    assert_eq!(harness.watcher.initialize_calls(), 1);
}

#[tokio::test]
async fn stop_watcher_is_idempotent() {
    let harness = HarnessBuilder::new().script(delivered(3, 3, &[])).build();
    harness.orchestrator.start_indexing().await;
    assert_eq!(harness.orchestrator.state(), SystemState::Indexed);

    harness.orchestrator.stop_watcher().await;
    assert_eq!(harness.orchestrator.state(), SystemState::Standby);

    harness.orchestrator.stop_watcher().await;
    assert_eq!(harness.orchestrator.state(), SystemState::Standby);
    assert_eq!(harness.watcher.dispose_calls(), 2);
}

#[tokio::test]
async fn stop_watcher_keeps_error_state_sticky() {
    let harness = HarnessBuilder::new()
        .script(delivered(10, 0, &["backend down"]))
        .build();
    harness.orchestrator.start_indexing().await;
    assert_eq!(harness.orchestrator.state(), SystemState::Error);

    harness.orchestrator.stop_watcher().await;

    assert_eq!(harness.orchestrator.state(), SystemState::Error);
}

#[tokio::test]
async fn clear_index_data_is_rejected_while_a_run_is_active() {
    let (release_tx, release_rx) = oneshot::channel();
    let harness = HarnessBuilder::new()
        .script(ScanScript::BlockUntil(release_rx))
        .build();

    let orchestrator = harness.orchestrator.clone();
    let run = tokio::spawn(async move { orchestrator.start_indexing().await });
    wait_for_snapshot(&harness.orchestrator, |snapshot| {
        snapshot.status.state() == SystemState::Indexing
    })
    .await;

    harness.orchestrator.clear_index_data().await;
    assert_eq!(harness.store.delete_calls(), 0);

    release_tx.send(()).expect("release scan");
    run.await.expect("blocked run");
    assert_eq!(harness.orchestrator.state(), SystemState::Indexed);
}

#[tokio::test]
async fn error_state_accepts_a_restart() {
    let harness = HarnessBuilder::new()
        .script(delivered(10, 0, &["backend down"]))
        .script(delivered(10, 10, &[]))
        .build();

    harness.orchestrator.start_indexing().await;
    assert_eq!(harness.orchestrator.state(), SystemState::Error);

    harness.orchestrator.start_indexing().await;
    assert_eq!(harness.orchestrator.state(), SystemState::Indexed);
    assert_eq!(harness.scanner.calls(), 2);
}

#[tokio::test]
async fn clear_index_data_deletes_collection_and_cache() {
    let harness = HarnessBuilder::new().script(delivered(3, 3, &[])).build();
    harness.orchestrator.start_indexing().await;

    harness.orchestrator.clear_index_data().await;

    assert_eq!(harness.store.delete_calls(), 1);
    assert!(harness.cache.clear_calls() >= 1);
    assert_eq!(harness.orchestrator.state(), SystemState::Standby);
    assert_eq!(
        harness.orchestrator.status().to_string(),
        "index data cleared"
    );
}

#[tokio::test]
async fn clear_index_data_survives_delete_failure() {
    let harness = HarnessBuilder::new()
        .store(MockVectorStore::new().with_existing_collection().with_delete_failure())
        .build();

    harness.orchestrator.clear_index_data().await;

    assert_eq!(harness.orchestrator.state(), SystemState::Error);
    assert!(harness
        .orchestrator
        .status()
        .to_string()
        .starts_with("failed to clear index data"));
    // The cache is cleared even when the collection delete fails.
    assert_eq!(harness.cache.clear_calls(), 1);
}

#[tokio::test]
async fn clear_index_data_skips_collection_when_unconfigured() {
    let harness = HarnessBuilder::new().unconfigured().build();

    harness.orchestrator.clear_index_data().await;

    assert_eq!(harness.store.delete_calls(), 0);
    assert_eq!(harness.cache.clear_calls(), 1);
    assert_eq!(harness.orchestrator.state(), SystemState::Standby);
}

#[tokio::test]
async fn watcher_batches_drive_state_transitions() {
    let harness = HarnessBuilder::new().script(delivered(2, 2, &[])).build();
    harness.orchestrator.start_indexing().await;
    assert_eq!(harness.orchestrator.state(), SystemState::Indexed);

    harness.watcher.emit_started(2);
    harness.watcher.emit_progress(0, 2, Some("src/lib.rs"));
    wait_for_snapshot(&harness.orchestrator, |snapshot| {
        snapshot.status.to_string() == "processing file changes"
    })
    .await;

    harness.watcher.emit_progress(2, 2, None);
    wait_for_snapshot(&harness.orchestrator, |snapshot| {
        snapshot.status.to_string() == "file changes processed"
    })
    .await;
    assert_eq!(harness.orchestrator.state(), SystemState::Indexed);
}

#[tokio::test]
async fn empty_queue_flush_reports_up_to_date() {
    let harness = HarnessBuilder::new().script(delivered(2, 2, &[])).build();
    harness.orchestrator.start_indexing().await;

    // Put the watcher mid-batch so the state is Indexing again.
    harness.watcher.emit_progress(0, 1, Some("src/lib.rs"));
    wait_for_snapshot(&harness.orchestrator, |snapshot| {
        snapshot.status.state() == SystemState::Indexing
    })
    .await;

    // An empty flush from Indexing means the queue drained with nothing to do.
    harness.watcher.emit_progress(0, 0, None);
    wait_for_snapshot(&harness.orchestrator, |snapshot| {
        snapshot.status.to_string() == "index up-to-date, queue empty"
    })
    .await;
    assert_eq!(harness.orchestrator.state(), SystemState::Indexed);
}

#[tokio::test]
async fn batch_finished_is_diagnostic_only() {
    let harness = HarnessBuilder::new().script(delivered(2, 2, &[])).build();
    harness.orchestrator.start_indexing().await;
    let before = harness.orchestrator.status();

    harness.watcher.emit_finished(BatchSummary::default());
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    assert_eq!(harness.orchestrator.status(), before);
}

#[tokio::test]
async fn block_progress_is_republished_in_delivery_order() {
    let harness = HarnessBuilder::new()
        .script(ScanScript::Deliver {
            events: vec![
                atlas_indexer::ScanEvent::BlocksFound(4),
                atlas_indexer::ScanEvent::BlocksIndexed(4),
                atlas_indexer::ScanEvent::BlocksFound(6),
                atlas_indexer::ScanEvent::BlocksIndexed(6),
            ],
            stats: Some(ScanStats::new()),
        })
        .build();

    harness.orchestrator.start_indexing().await;

    let snapshot = harness.state.snapshot();
    assert_eq!(snapshot.block_progress.found, 10);
    assert_eq!(snapshot.block_progress.indexed, 10);
}
