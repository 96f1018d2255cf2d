//! Storage path management using the XDG Base Directory specification
//!
//! Models land under `$XDG_DATA_HOME/qaserve/models`, one directory per
//! model identifier.

use std::path::{Path, PathBuf};
use xdg::BaseDirectories;

use crate::error::{QaError, Result};

/// Application name for XDG directories
const APP_NAME: &str = "qaserve";

/// Storage manager for the model cache
pub struct StoragePaths {
    base_dirs: BaseDirectories,
}

impl StoragePaths {
    /// Create a new storage paths manager
    pub fn new() -> Result<Self> {
        let base_dirs = BaseDirectories::with_prefix(APP_NAME)
            .map_err(|e| QaError::Config(format!("Failed to create XDG base directories: {}", e)))?;

        Ok(Self { base_dirs })
    }

    /// Get the models directory path, creating it if needed
    pub fn models_dir(&self) -> Result<PathBuf> {
        let models_dir = self.base_dirs.get_data_home().join("models");
        ensure_dir_exists(&models_dir)?;
        Ok(models_dir)
    }
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path).map_err(|e| {
            QaError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to create directory {}: {}", path.display(), e),
            ))
        })?;
    }
    Ok(())
}
