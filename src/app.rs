//! Application wiring
//!
//! Builds the model lifecycle and the orchestrator from settings and starts
//! the one-time model load off the interactive thread.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::inference::{
    Engine, GenerationParams, InferenceOrchestrator, LlamaEngine, ModelLifecycle,
    ModelLifecycleState,
};
use crate::storage::settings::AppSettings;
use crate::text::PromptFramer;

/// Shared application state handed to the presentation layer
pub struct AppState<E: Engine> {
    pub settings: AppSettings,
    pub lifecycle: Arc<ModelLifecycle<E>>,
    pub orchestrator: Arc<InferenceOrchestrator<E>>,
}

impl AppState<LlamaEngine> {
    /// State backed by the llama.cpp engine
    pub fn from_settings(settings: AppSettings) -> Self {
        let engine = LlamaEngine::new(GenerationParams::from(&settings));
        Self::with_engine(engine, settings)
    }
}

impl<E: Engine> AppState<E> {
    pub fn with_engine(engine: E, settings: AppSettings) -> Self {
        let lifecycle = Arc::new(ModelLifecycle::new(
            engine,
            settings.models_directory.clone(),
        ));
        let orchestrator = InferenceOrchestrator::new(
            lifecycle.clone(),
            PromptFramer::new(settings.framing),
        )
        .with_request_timeout(settings.request_timeout());

        tracing::info!(
            "AppState initialized (framing: {:?}, models: {:?})",
            settings.framing,
            settings.models_directory
        );

        Self {
            settings,
            lifecycle,
            orchestrator: Arc::new(orchestrator),
        }
    }

    /// Kicks off the model load on the blocking pool.
    ///
    /// The returned handle resolves to the settled lifecycle state. Must be
    /// called from within a tokio runtime.
    pub fn start_loading(&self) -> JoinHandle<ModelLifecycleState> {
        let lifecycle = self.lifecycle.clone();
        let asset_path = self.settings.asset_path.clone();
        tokio::task::spawn_blocking(move || {
            // Failures are already recorded in the lifecycle state
            let _ = lifecycle.begin_load(&asset_path);
            lifecycle.state()
        })
    }
}
