//! Configuration structures for LinHash.

use crate::error::{LinHashError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Storage configuration shared by every relation opened through it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the `.info`, `.data` and `.ovflow` files.
    pub data_dir: PathBuf,
    /// Enable fsync after page writes.
    pub fsync_enabled: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            fsync_enabled: false,
        }
    }
}

impl StorageConfig {
    /// Creates a configuration rooted at `data_dir`.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Loads a configuration from a JSON file. Missing keys fall back to defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text)
            .map_err(|e| LinHashError::ConfigError(format!("{}: {}", path.display(), e)))
    }

    /// Returns the path of a relation file with the given extension.
    pub fn relation_file(&self, relation: &str, extension: &str) -> PathBuf {
        self.data_dir.join(format!("{}.{}", relation, extension))
    }
}
