//! In-memory [`VectorStore`] double for lifecycle tests.
//!
//! Stores points in memory, records every call, and can be scripted to fail
//! individual operations so orchestration error paths are exercisable without
//! a real backend.

use crate::store::{BlockPoint, VectorStore};
use crate::{Result, VectorStoreError};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct MockCounters {
    initialize: AtomicUsize,
    upsert: AtomicUsize,
    clear: AtomicUsize,
    delete: AtomicUsize,
}

/// Scripted in-memory store.
#[derive(Clone, Default)]
pub struct MockVectorStore {
    points: Arc<Mutex<BTreeMap<String, BlockPoint>>>,
    exists: Arc<AtomicBool>,
    counters: Arc<MockCounters>,
    fail_initialize: Arc<AtomicBool>,
    fail_upsert: Arc<AtomicBool>,
    fail_clear: Arc<AtomicBool>,
    fail_delete: Arc<AtomicBool>,
}

impl MockVectorStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend the collection already exists, so `initialize` reports `false`.
    #[must_use]
    pub fn with_existing_collection(self) -> Self {
        self.exists.store(true, Ordering::SeqCst);
        self
    }

    #[must_use]
    pub fn with_initialize_failure(self) -> Self {
        self.fail_initialize.store(true, Ordering::SeqCst);
        self
    }

    #[must_use]
    pub fn with_upsert_failure(self) -> Self {
        self.fail_upsert.store(true, Ordering::SeqCst);
        self
    }

    #[must_use]
    pub fn with_clear_failure(self) -> Self {
        self.fail_clear.store(true, Ordering::SeqCst);
        self
    }

    #[must_use]
    pub fn with_delete_failure(self) -> Self {
        self.fail_delete.store(true, Ordering::SeqCst);
        self
    }

    pub fn initialize_calls(&self) -> usize {
        self.counters.initialize.load(Ordering::SeqCst)
    }

    pub fn upsert_calls(&self) -> usize {
        self.counters.upsert.load(Ordering::SeqCst)
    }

    pub fn clear_calls(&self) -> usize {
        self.counters.clear.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.counters.delete.load(Ordering::SeqCst)
    }

    pub fn stored_points(&self) -> Vec<BlockPoint> {
        self.points.lock().expect("mock lock").values().cloned().collect()
    }
}

#[async_trait]
impl VectorStore for MockVectorStore {
    async fn initialize(&self) -> Result<bool> {
        self.counters.initialize.fetch_add(1, Ordering::SeqCst);
        if self.fail_initialize.load(Ordering::SeqCst) {
            return Err(VectorStoreError::CollectionError(
                "mock initialize failure".to_string(),
            ));
        }
        let created_new = !self.exists.swap(true, Ordering::SeqCst);
        Ok(created_new)
    }

    async fn upsert_blocks(&self, points: Vec<BlockPoint>) -> Result<()> {
        self.counters.upsert.fetch_add(1, Ordering::SeqCst);
        if self.fail_upsert.load(Ordering::SeqCst) {
            return Err(VectorStoreError::CollectionError(
                "mock upsert failure".to_string(),
            ));
        }
        let mut stored = self.points.lock().expect("mock lock");
        for point in points {
            stored.insert(point.id.clone(), point);
        }
        Ok(())
    }

    async fn remove_file_blocks(&self, file_path: &str) -> Result<()> {
        let mut stored = self.points.lock().expect("mock lock");
        stored.retain(|_, point| point.file_path != file_path);
        Ok(())
    }

    async fn clear_collection(&self) -> Result<()> {
        self.counters.clear.fetch_add(1, Ordering::SeqCst);
        if self.fail_clear.load(Ordering::SeqCst) {
            return Err(VectorStoreError::CollectionError(
                "mock clear failure".to_string(),
            ));
        }
        self.points.lock().expect("mock lock").clear();
        Ok(())
    }

    async fn delete_collection(&self) -> Result<()> {
        self.counters.delete.fetch_add(1, Ordering::SeqCst);
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(VectorStoreError::CollectionError(
                "mock delete failure".to_string(),
            ));
        }
        self.points.lock().expect("mock lock").clear();
        self.exists.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn point_count(&self) -> Result<usize> {
        Ok(self.points.lock().expect("mock lock").len())
    }
}
