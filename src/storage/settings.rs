//! Settings storage
//!
//! Manages persistence of model and generation settings.

use crate::storage::{get_data_dir, StorageError};
use crate::text::FramingStrategy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name of the packaged zenz model
pub const DEFAULT_MODEL_FILE: &str = "ggml-model-Q5_K_M.gguf";

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    /// Read-only packaged model file
    pub asset_path: PathBuf,
    /// Writable directory the model is staged into before loading
    pub models_directory: PathBuf,
    /// How prompts are framed for the engine
    #[serde(default)]
    pub framing: FramingStrategy,
    /// Maximum number of tokens to generate per request
    pub max_tokens: u32,
    /// Context window size
    pub context_size: u32,
    /// Threads used for decoding
    pub threads: u32,
    /// Number of GPU layers to offload (0 = CPU only)
    pub gpu_layers: u32,
    /// Upper bound on how long a caller waits for a result
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            asset_path: PathBuf::from("assets").join(DEFAULT_MODEL_FILE),
            models_directory: get_data_dir()
                .ok()
                .map(|d| d.join("models"))
                .unwrap_or_else(|| PathBuf::from("./models")),
            framing: FramingStrategy::Structured,
            max_tokens: 32,
            context_size: 512,
            threads: 4,
            gpu_layers: 0,
            request_timeout_secs: None,
        }
    }
}

impl AppSettings {
    /// Validate settings values
    ///
    /// Ensures all parameters are within acceptable ranges.
    pub fn validate(&mut self) {
        self.max_tokens = self.max_tokens.clamp(1, 256);
        self.context_size = self.context_size.clamp(128, 8192);

        if self.max_tokens >= self.context_size {
            self.max_tokens = self.context_size / 2;
        }

        if self.threads == 0 {
            self.threads = 4;
        }

        if self.request_timeout_secs == Some(0) {
            tracing::warn!("Request timeout of 0s is unusable, disabling it");
            self.request_timeout_secs = None;
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

/// Get the settings file path
fn get_settings_path() -> Result<PathBuf, StorageError> {
    Ok(get_data_dir()?.join("settings.json"))
}

/// Load settings from disk
///
/// Returns default settings if the file doesn't exist or is corrupted
pub fn load_settings() -> AppSettings {
    match get_settings_path().and_then(|path| load_settings_from(&path)) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!("Failed to load settings, using defaults: {}", e);
            AppSettings::default()
        }
    }
}

/// Load and validate settings from a specific file
pub fn load_settings_from(path: &Path) -> Result<AppSettings, StorageError> {
    if !path.exists() {
        tracing::info!("Settings file not found, using defaults");
        return Ok(AppSettings::default());
    }

    let json = fs::read_to_string(path)?;
    let mut settings: AppSettings = serde_json::from_str(&json)?;
    settings.validate();

    tracing::debug!("Loaded settings from {:?}", path);
    Ok(settings)
}

/// Save settings to disk
pub fn save_settings(settings: &AppSettings) -> Result<(), StorageError> {
    save_settings_to(&get_settings_path()?, settings)
}

/// Save settings to a specific file
pub fn save_settings_to(path: &Path, settings: &AppSettings) -> Result<(), StorageError> {
    // Ensure the parent directory exists
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(settings)?;
    fs::write(path, json)?;

    tracing::debug!("Saved settings to {:?}", path);
    Ok(())
}
