use crate::cache::FileHashCache;
use crate::chunker::BlockChunker;
use crate::config::DATA_DIR_NAME;
use crate::contracts::{CacheStore, Scanner};
use crate::progress::{BatchError, ScanEvent};
use crate::stats::ScanStats;
use crate::{IndexerError, Result};
use async_trait::async_trait;
use atlas_vector_store::{block_id, BlockPoint, EmbeddingProvider, VectorStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

const MAX_CONCURRENT_READS: usize = 16;
const EMBED_BATCH_SIZE: usize = 32;
const MAX_FILE_BYTES: u64 = 1_048_576;

/// How `sync_file` left a single file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileSyncOutcome {
    Indexed { blocks: u64 },
    Unchanged,
    Removed,
}

/// Walks the workspace, embeds blocks, and upserts them in bounded batches.
///
/// Also the single-file engine behind the watcher: a changed file goes
/// through exactly the same read → hash → chunk → embed → upsert pipeline as
/// the full scan.
pub struct WorkspaceScanner {
    cache: Arc<dyn CacheStore>,
    vector_store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    chunker: Arc<dyn BlockChunker>,
}

impl WorkspaceScanner {
    pub fn new(
        cache: Arc<dyn CacheStore>,
        vector_store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        chunker: Arc<dyn BlockChunker>,
    ) -> Self {
        Self {
            cache,
            vector_store,
            embedder,
            chunker,
        }
    }

    /// Re-index one file, or prune it when it no longer exists.
    pub async fn sync_file(&self, root: &Path, abs_path: &Path) -> Result<FileSyncOutcome> {
        let rel_path = normalize_path(root, abs_path);

        if !abs_path.exists() {
            self.vector_store.remove_file_blocks(&rel_path).await?;
            self.cache.forget_file(&rel_path).await?;
            return Ok(FileSyncOutcome::Removed);
        }

        let content = tokio::fs::read_to_string(abs_path).await?;
        let content_hash = FileHashCache::content_hash(&content);
        if self.cache.is_indexed(&content_hash).await {
            return Ok(FileSyncOutcome::Unchanged);
        }

        let blocks = self.chunker.chunk(&content);
        let indexed = self
            .replace_file_blocks(&rel_path, &content_hash, &blocks, None)
            .await?;
        Ok(FileSyncOutcome::Indexed { blocks: indexed })
    }

    /// Embed and upsert `blocks` for one file, replacing whatever the
    /// collection held for it. Progress is reported per embed batch.
    async fn replace_file_blocks(
        &self,
        rel_path: &str,
        content_hash: &str,
        blocks: &[crate::chunker::BlockChunk],
        events: Option<&mpsc::Sender<ScanEvent>>,
    ) -> Result<u64> {
        // Stale trailing blocks from a longer previous version must go first.
        self.vector_store.remove_file_blocks(rel_path).await?;

        let mut indexed = 0u64;
        for (batch_index, batch) in blocks.chunks(EMBED_BATCH_SIZE).enumerate() {
            let texts: Vec<&str> = batch.iter().map(|b| b.text.as_str()).collect();
            let embeddings = self.embedder.embed_batch(&texts).await?;

            let base = batch_index * EMBED_BATCH_SIZE;
            let points: Vec<BlockPoint> = batch
                .iter()
                .zip(embeddings)
                .enumerate()
                .map(|(offset, (block, embedding))| BlockPoint {
                    id: block_id(rel_path, base + offset),
                    file_path: rel_path.to_string(),
                    start_line: block.start_line,
                    end_line: block.end_line,
                    content_hash: content_hash.to_string(),
                    embedding,
                })
                .collect();
            let count = points.len() as u64;
            self.vector_store.upsert_blocks(points).await?;

            indexed += count;
            if let Some(events) = events {
                let _ = events.send(ScanEvent::BlocksIndexed(count)).await;
            }
        }

        self.cache.mark_indexed(content_hash, rel_path).await?;
        Ok(indexed)
    }

    async fn scan_file(
        &self,
        rel_path: &str,
        content: &str,
        events: &mpsc::Sender<ScanEvent>,
        stats: &mut ScanStats,
    ) {
        let content_hash = FileHashCache::content_hash(content);
        if self.cache.is_indexed(&content_hash).await {
            log::debug!("Skipping unchanged file {rel_path}");
            stats.add_skipped_file();
            return;
        }

        let blocks = self.chunker.chunk(content);
        stats.blocks_found += blocks.len() as u64;
        let _ = events
            .send(ScanEvent::BlocksFound(blocks.len() as u64))
            .await;

        match self
            .replace_file_blocks(rel_path, &content_hash, &blocks, Some(events))
            .await
        {
            Ok(indexed) => stats.add_indexed_file(indexed),
            Err(e) => {
                stats.add_failed_file();
                let _ = events
                    .send(ScanEvent::BatchError(BatchError::with_cause(
                        format!("failed to index {rel_path}"),
                        e.to_string(),
                    )))
                    .await;
            }
        }
    }
}

#[async_trait]
impl Scanner for WorkspaceScanner {
    async fn scan(
        &self,
        root: &Path,
        events: mpsc::Sender<ScanEvent>,
    ) -> Result<Option<ScanStats>> {
        let started = Instant::now();
        let mut stats = ScanStats::new();

        let files = walk_workspace(root).await?;
        stats.files_walked = files.len() as u64;
        log::info!("Scanning {} files under {}", files.len(), root.display());

        for file_chunk in files.chunks(MAX_CONCURRENT_READS) {
            let mut tasks = Vec::with_capacity(file_chunk.len());
            for file_path in file_chunk {
                let file_path = file_path.clone();
                tasks.push(tokio::spawn(async move { read_file(file_path).await }));
            }

            for task in tasks {
                let read = match task.await {
                    Ok(read) => read,
                    Err(e) => {
                        stats.add_failed_file();
                        let _ = events
                            .send(ScanEvent::BatchError(BatchError::with_cause(
                                "file read task panicked",
                                e.to_string(),
                            )))
                            .await;
                        continue;
                    }
                };

                match read {
                    FileRead::Text { path, content } => {
                        let rel_path = normalize_path(root, &path);
                        self.scan_file(&rel_path, &content, &events, &mut stats).await;
                    }
                    FileRead::Skipped { path, reason } => {
                        log::debug!("Skipping {}: {reason}", path.display());
                        stats.add_skipped_file();
                    }
                    FileRead::Failed { path, error } => {
                        stats.add_failed_file();
                        let _ = events
                            .send(ScanEvent::BatchError(BatchError::with_cause(
                                format!("failed to read {}", path.display()),
                                error,
                            )))
                            .await;
                    }
                }
            }
        }

        stats.time_ms = started.elapsed().as_millis() as u64;
        log::info!(
            "Scan finished: {} indexed, {} skipped, {} failed, {} blocks in {}ms",
            stats.files_indexed,
            stats.files_skipped,
            stats.files_failed,
            stats.blocks_indexed,
            stats.time_ms
        );
        Ok(Some(stats))
    }
}

enum FileRead {
    Text { path: PathBuf, content: String },
    Skipped { path: PathBuf, reason: String },
    Failed { path: PathBuf, error: String },
}

async fn read_file(path: PathBuf) -> FileRead {
    match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.len() > MAX_FILE_BYTES => {
            return FileRead::Skipped {
                path,
                reason: format!("file exceeds {MAX_FILE_BYTES} bytes"),
            };
        }
        Ok(_) => {}
        Err(e) => {
            return FileRead::Failed {
                path,
                error: e.to_string(),
            };
        }
    }

    match tokio::fs::read_to_string(&path).await {
        Ok(content) => FileRead::Text { path, content },
        Err(e) if e.kind() == std::io::ErrorKind::InvalidData => FileRead::Skipped {
            path,
            reason: "not valid UTF-8".to_string(),
        },
        Err(e) => FileRead::Failed {
            path,
            error: e.to_string(),
        },
    }
}

/// Gitignore-aware file walk, run off the async threads.
async fn walk_workspace(root: &Path) -> Result<Vec<PathBuf>> {
    let root = root.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let mut files = Vec::new();
        let walker = ignore::WalkBuilder::new(&root)
            .filter_entry(|entry| entry.file_name() != std::ffi::OsStr::new(DATA_DIR_NAME))
            .build();
        for entry in walker {
            match entry {
                Ok(entry) => {
                    if entry.file_type().is_some_and(|ft| ft.is_file()) {
                        files.push(entry.into_path());
                    }
                }
                Err(e) => log::warn!("Walk error under {}: {e}", root.display()),
            }
        }
        files.sort();
        files
    })
    .await
    .map_err(|e| IndexerError::Other(format!("workspace walk task failed: {e}")))
}

pub(crate) fn normalize_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let mut normalized = relative.to_string_lossy().to_string();
    if normalized.contains('\\') {
        normalized = normalized.replace('\\', "/");
    }
    normalized
}
