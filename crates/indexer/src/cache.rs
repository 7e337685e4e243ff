use crate::contracts::CacheStore;
use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

const CACHE_FILE_NAME: &str = "cache.json";

/// Durable hash cache persisted as JSON under the workspace data directory.
///
/// Keys are blake3 hex digests of file content; the value remembers which
/// file the content came from so deletions can evict by path. The map is
/// loaded lazily on first use and rewritten atomically after every mutation.
pub struct FileHashCache {
    cache_path: PathBuf,
    entries: Mutex<Option<HashMap<String, String>>>,
}

impl FileHashCache {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            cache_path: data_dir.as_ref().join(CACHE_FILE_NAME),
            entries: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    /// Hex digest used as the cache key for `content`.
    #[must_use]
    pub fn content_hash(content: &str) -> String {
        blake3::hash(content.as_bytes()).to_hex().to_string()
    }

    pub async fn entry_count(&self) -> usize {
        let mut guard = self.entries.lock().await;
        self.ensure_loaded(&mut guard).len()
    }

    fn ensure_loaded<'a>(
        &self,
        guard: &'a mut Option<HashMap<String, String>>,
    ) -> &'a mut HashMap<String, String> {
        guard.get_or_insert_with(|| match std::fs::read(&self.cache_path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                log::warn!(
                    "Hash cache {} is corrupt ({e}); starting empty",
                    self.cache_path.display()
                );
                HashMap::new()
            }),
            Err(_) => HashMap::new(),
        })
    }

    async fn persist(&self, entries: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.cache_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec(entries)?;
        let tmp = self.cache_path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.cache_path).await?;
        Ok(())
    }
}

#[async_trait]
impl CacheStore for FileHashCache {
    async fn is_indexed(&self, content_hash: &str) -> bool {
        let mut guard = self.entries.lock().await;
        self.ensure_loaded(&mut guard).contains_key(content_hash)
    }

    async fn mark_indexed(&self, content_hash: &str, file_path: &str) -> Result<()> {
        let mut guard = self.entries.lock().await;
        let entries = self.ensure_loaded(&mut guard);
        // A re-save of the same path under new content replaces the old key.
        entries.retain(|_, path| path != file_path);
        entries.insert(content_hash.to_string(), file_path.to_string());
        let snapshot = entries.clone();
        drop(guard);
        self.persist(&snapshot).await
    }

    async fn forget_file(&self, file_path: &str) -> Result<()> {
        let mut guard = self.entries.lock().await;
        let entries = self.ensure_loaded(&mut guard);
        let before = entries.len();
        entries.retain(|_, path| path != file_path);
        if entries.len() == before {
            return Ok(());
        }
        let snapshot = entries.clone();
        drop(guard);
        self.persist(&snapshot).await
    }

    async fn clear(&self) -> Result<()> {
        let mut guard = self.entries.lock().await;
        *guard = Some(HashMap::new());
        drop(guard);
        match tokio::fs::remove_file(&self.cache_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[tokio::test]
    async fn marked_content_is_reported_indexed() {
        let dir = TempDir::new().unwrap();
        let cache = FileHashCache::new(dir.path());
        let hash = FileHashCache::content_hash("fn main() {}");

        assert!(!cache.is_indexed(&hash).await);
        cache.mark_indexed(&hash, "src/main.rs").await.unwrap();
        assert!(cache.is_indexed(&hash).await);

        // Survives a fresh handle over the same directory.
        let reopened = FileHashCache::new(dir.path());
        assert!(reopened.is_indexed(&hash).await);
    }

    #[tokio::test]
    async fn remarking_a_file_evicts_its_old_hash() {
        let dir = TempDir::new().unwrap();
        let cache = FileHashCache::new(dir.path());
        let old_hash = FileHashCache::content_hash("v1");
        let new_hash = FileHashCache::content_hash("v2");

        cache.mark_indexed(&old_hash, "src/lib.rs").await.unwrap();
        cache.mark_indexed(&new_hash, "src/lib.rs").await.unwrap();

        assert!(!cache.is_indexed(&old_hash).await);
        assert!(cache.is_indexed(&new_hash).await);
        assert_eq!(cache.entry_count().await, 1);
    }

    #[tokio::test]
    async fn forget_file_only_evicts_that_path() {
        let dir = TempDir::new().unwrap();
        let cache = FileHashCache::new(dir.path());
        let a = FileHashCache::content_hash("a");
        let b = FileHashCache::content_hash("b");
        cache.mark_indexed(&a, "a.rs").await.unwrap();
        cache.mark_indexed(&b, "b.rs").await.unwrap();

        cache.forget_file("a.rs").await.unwrap();

        assert!(!cache.is_indexed(&a).await);
        assert!(cache.is_indexed(&b).await);
    }

    #[tokio::test]
    async fn clear_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let cache = FileHashCache::new(dir.path());
        let hash = FileHashCache::content_hash("x");
        cache.mark_indexed(&hash, "x.rs").await.unwrap();

        cache.clear().await.unwrap();
        cache.clear().await.unwrap();

        assert!(!cache.is_indexed(&hash).await);
        assert!(!cache.cache_path().exists());
    }

    #[tokio::test]
    async fn corrupt_cache_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        tokio::fs::write(dir.path().join(CACHE_FILE_NAME), b"not json")
            .await
            .unwrap();
        let cache = FileHashCache::new(dir.path());
        assert_eq!(cache.entry_count().await, 0);
    }
}
