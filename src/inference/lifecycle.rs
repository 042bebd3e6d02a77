//! Model lifecycle
//!
//! Tracks `Unloaded -> Loading -> Ready | Failed` and owns the model handle
//! once a load succeeds. `Ready` and `Failed` are terminal: there is no unload
//! and no retry.

use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, OnceLock};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;

use crate::inference::engine::{panic_message, Engine, EngineError};
use crate::storage::assets::copy_if_absent;
use crate::storage::StorageError;

/// Represents the current state of the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelLifecycleState {
    Unloaded,
    Loading,
    Ready,
    Failed(String),
}

impl ModelLifecycleState {
    /// Ready or Failed
    pub fn is_terminal(&self) -> bool {
        matches!(self, ModelLifecycleState::Ready | ModelLifecycleState::Failed(_))
    }
}

impl std::fmt::Display for ModelLifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelLifecycleState::Unloaded => write!(f, "model not loaded"),
            ModelLifecycleState::Loading => write!(f, "model is still loading"),
            ModelLifecycleState::Ready => write!(f, "model ready"),
            ModelLifecycleState::Failed(reason) => write!(f, "model failed to load: {}", reason),
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("model load already started")]
    AlreadyStarted,

    #[error("Failed to stage model asset: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Owns the engine and, after a successful load, the model handle.
pub struct ModelLifecycle<E: Engine> {
    engine: E,
    models_directory: PathBuf,
    started: AtomicBool,
    /// Set exactly once, when the load settles
    outcome: OnceLock<Result<Mutex<E::Model>, String>>,
    notify: watch::Sender<ModelLifecycleState>,
}

impl<E: Engine> ModelLifecycle<E> {
    /// `models_directory` is the writable location the asset is staged into.
    pub fn new(engine: E, models_directory: impl Into<PathBuf>) -> Self {
        let (notify, _) = watch::channel(ModelLifecycleState::Unloaded);
        Self {
            engine,
            models_directory: models_directory.into(),
            started: AtomicBool::new(false),
            outcome: OnceLock::new(),
            notify,
        }
    }

    /// Stages the packaged model and loads it.
    ///
    /// Blocks for as long as the load takes, so call it from a worker thread.
    /// Only the first call does anything; later calls return
    /// [`LoadError::AlreadyStarted`] without touching the state.
    pub fn begin_load(&self, asset_path: &Path) -> Result<(), LoadError> {
        if self.started.swap(true, Ordering::AcqRel) {
            tracing::warn!("Ignoring repeated model load request for {:?}", asset_path);
            return Err(LoadError::AlreadyStarted);
        }
        self.notify.send_replace(ModelLifecycleState::Loading);
        tracing::info!("Loading model from {:?}", asset_path);

        // A panicking load must still settle the state
        let loaded = panic::catch_unwind(AssertUnwindSafe(|| {
            copy_if_absent(asset_path, &self.models_directory)
                .map_err(LoadError::from)
                .and_then(|path| self.engine.load_model(&path).map_err(LoadError::from))
        }))
        .unwrap_or_else(|payload| {
            Err(LoadError::Engine(EngineError::ModelLoad(panic_message(payload))))
        });

        match loaded {
            Ok(model) => {
                let _ = self.outcome.set(Ok(Mutex::new(model)));
                self.notify.send_replace(ModelLifecycleState::Ready);
                tracing::info!("Model ready");
                Ok(())
            }
            Err(e) => {
                let reason = e.to_string();
                tracing::error!("Model load failed: {}", reason);
                let _ = self.outcome.set(Err(reason.clone()));
                self.notify.send_replace(ModelLifecycleState::Failed(reason));
                Err(e)
            }
        }
    }

    /// Non-blocking read, safe from any thread
    pub fn state(&self) -> ModelLifecycleState {
        match self.outcome.get() {
            Some(Ok(_)) => ModelLifecycleState::Ready,
            Some(Err(reason)) => ModelLifecycleState::Failed(reason.clone()),
            None if self.started.load(Ordering::Acquire) => ModelLifecycleState::Loading,
            None => ModelLifecycleState::Unloaded,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.outcome.get(), Some(Ok(_)))
    }

    /// Receiver that observes every transition
    pub fn subscribe(&self) -> watch::Receiver<ModelLifecycleState> {
        self.notify.subscribe()
    }

    /// Runs `f` with exclusive access to the loaded model.
    ///
    /// Returns `None` when no model is ready.
    pub fn with_model<R>(&self, f: impl FnOnce(&E, &mut E::Model) -> R) -> Option<R> {
        let Some(Ok(handle)) = self.outcome.get() else {
            return None;
        };
        // A panic during an earlier call poisons the lock; the model itself is
        // still usable for the next request.
        let mut model = handle.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Some(f(&self.engine, &mut *model))
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }
}
