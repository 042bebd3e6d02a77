//! Persistent storage
//!
//! Handles the writable data directory, model asset staging and settings.

pub mod assets;
pub mod settings;

use directories::ProjectDirs;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Could not determine the application data directory")]
    NoDataDir,

    #[error("Asset not found: {0}")]
    AssetMissing(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Per-user private data directory for the application
pub fn get_data_dir() -> Result<PathBuf, StorageError> {
    ProjectDirs::from("", "", "zenzrs")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or(StorageError::NoDataDir)
}
