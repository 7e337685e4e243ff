use crate::store::{BlockPoint, VectorStore};
use crate::{Result, VectorStoreError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

const COLLECTION_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Default, Serialize, Deserialize)]
struct Collection {
    #[serde(default)]
    schema_version: u32,
    points: BTreeMap<String, BlockPoint>,
}

impl Collection {
    fn empty() -> Self {
        Self {
            schema_version: COLLECTION_SCHEMA_VERSION,
            points: BTreeMap::new(),
        }
    }
}

/// Collection backend persisted as JSON under the workspace data directory.
///
/// The collection lives at `<data_dir>/collections/<name>.json` and is
/// rewritten atomically (write to temp, rename) after every mutation, so a
/// crash mid-write never leaves a truncated collection behind.
pub struct LocalVectorStore {
    collection_path: PathBuf,
    collection: Mutex<Option<Collection>>,
}

impl LocalVectorStore {
    pub fn new(data_dir: impl AsRef<Path>, collection_name: &str) -> Self {
        let collection_path = data_dir
            .as_ref()
            .join("collections")
            .join(format!("{}.json", sanitize_name(collection_name)));
        Self {
            collection_path,
            collection: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn collection_path(&self) -> &Path {
        &self.collection_path
    }

    async fn load(&self) -> Result<Collection> {
        let bytes = tokio::fs::read(&self.collection_path).await?;
        let collection: Collection = serde_json::from_slice(&bytes)?;
        Ok(collection)
    }

    async fn persist(&self, collection: &Collection) -> Result<()> {
        if let Some(parent) = self.collection_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec(collection)?;
        let tmp = self.collection_path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.collection_path).await?;
        Ok(())
    }

    /// Run `mutate` against the loaded collection and persist the result.
    async fn with_collection<F>(&self, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut Collection),
    {
        let mut guard = self.collection.lock().await;
        let collection = match guard.as_mut() {
            Some(collection) => collection,
            None => {
                return Err(VectorStoreError::CollectionError(
                    "collection not initialized".to_string(),
                ))
            }
        };
        mutate(collection);
        self.persist(collection).await
    }
}

#[async_trait]
impl VectorStore for LocalVectorStore {
    async fn initialize(&self) -> Result<bool> {
        let mut guard = self.collection.lock().await;

        if self.collection_path.exists() {
            match self.load().await {
                Ok(collection) => {
                    *guard = Some(collection);
                    return Ok(false);
                }
                Err(e) => {
                    log::warn!(
                        "Failed to load collection {}: {e}; recreating",
                        self.collection_path.display()
                    );
                }
            }
        }

        let collection = Collection::empty();
        self.persist(&collection).await?;
        *guard = Some(collection);
        Ok(true)
    }

    async fn upsert_blocks(&self, points: Vec<BlockPoint>) -> Result<()> {
        self.with_collection(|collection| {
            for point in points {
                collection.points.insert(point.id.clone(), point);
            }
        })
        .await
    }

    async fn remove_file_blocks(&self, file_path: &str) -> Result<()> {
        self.with_collection(|collection| {
            collection.points.retain(|_, point| point.file_path != file_path);
        })
        .await
    }

    async fn clear_collection(&self) -> Result<()> {
        let mut guard = self.collection.lock().await;
        let collection = guard.get_or_insert_with(Collection::empty);
        collection.points.clear();
        self.persist(collection).await
    }

    async fn delete_collection(&self) -> Result<()> {
        let mut guard = self.collection.lock().await;
        *guard = None;
        match tokio::fs::remove_file(&self.collection_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn point_count(&self) -> Result<usize> {
        let guard = self.collection.lock().await;
        Ok(guard.as_ref().map_or(0, |c| c.points.len()))
    }
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => c,
            _ => '_',
        })
        .collect()
}
