use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexerError>;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Vector store error: {0}")]
    VectorStoreError(#[from] atlas_vector_store::VectorStoreError),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Invalid workspace path: {0}")]
    InvalidPath(String),

    #[error("File watch error: {0}")]
    WatchError(String),

    #[error("indexing requires configured services")]
    NotConfigured,

    #[error("scan failed, is scanner initialized?")]
    ScanContract,

    #[error("indexing failed, no blocks indexed")]
    NoBlocksIndexed,

    #[error("{detail}")]
    IndexingFailed { detail: String },

    #[error("indexing partially failed: only {blocks_indexed} of {blocks_found} blocks indexed: {detail}")]
    PartialIndexingFailure {
        blocks_indexed: u64,
        blocks_found: u64,
        detail: String,
    },

    #[error("{0}")]
    Other(String),
}
