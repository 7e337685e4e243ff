use crate::contracts::ConfigGate;
use crate::{IndexerError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directory under the workspace root holding all index state.
pub const DATA_DIR_NAME: &str = ".atlas";

const CONFIG_FILE_NAME: &str = "config.toml";

/// Workspace-level settings read from `.atlas/config.toml`.
///
/// A missing file parses as the default (unconfigured) settings; the feature
/// gate stays closed until both an embedding provider and a collection name
/// are present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    pub embedding: EmbeddingSettings,
    pub collection: CollectionSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Provider id, e.g. `"hashing"`.
    pub provider: Option<String>,
    pub dimension: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionSettings {
    /// Name of the workspace collection in the vector store.
    pub name: Option<String>,
}

impl WorkspaceConfig {
    /// Defaults for a freshly initialized workspace.
    #[must_use]
    pub fn local_defaults() -> Self {
        Self {
            embedding: EmbeddingSettings {
                provider: Some("hashing".to_string()),
                dimension: Some(256),
            },
            collection: CollectionSettings {
                name: Some("workspace".to_string()),
            },
        }
    }

    #[must_use]
    pub fn data_dir(root: &Path) -> PathBuf {
        root.join(DATA_DIR_NAME)
    }

    #[must_use]
    pub fn config_path(root: &Path) -> PathBuf {
        Self::data_dir(root).join(CONFIG_FILE_NAME)
    }

    pub async fn load(root: &Path) -> Result<Self> {
        let path = Self::config_path(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = tokio::fs::read_to_string(&path).await?;
        toml::from_str(&raw)
            .map_err(|e| IndexerError::ConfigError(format!("{}: {e}", path.display())))
    }

    pub async fn save(&self, root: &Path) -> Result<()> {
        let path = Self::config_path(root);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let raw = toml::to_string_pretty(self)
            .map_err(|e| IndexerError::ConfigError(e.to_string()))?;
        tokio::fs::write(&path, raw).await?;
        Ok(())
    }
}

impl ConfigGate for WorkspaceConfig {
    fn is_fully_configured(&self) -> bool {
        self.embedding.provider.is_some() && self.collection.name.is_some()
    }
}
