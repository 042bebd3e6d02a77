//! Inference engine boundary
//!
//! The [`Engine`] trait is the black-box capability the orchestrator drives:
//! load a model from a path, then turn prompts into generated text. Every call
//! blocks the calling thread for its whole duration.
//!
//! [`LlamaEngine`] binds the trait to llama.cpp through `llama-cpp-2` and
//! decodes greedily, the way the zenz models are meant to be sampled.

use std::any::Any;
use std::num::NonZeroU32;
use std::path::Path;
use std::sync::OnceLock;

use llama_cpp_2::context::params::LlamaContextParams;
use llama_cpp_2::llama_backend::LlamaBackend;
use llama_cpp_2::llama_batch::LlamaBatch;
use llama_cpp_2::model::params::LlamaModelParams;
use llama_cpp_2::model::{AddBos, LlamaModel, Special};
use llama_cpp_2::sampling::LlamaSampler;
use thiserror::Error;

use crate::inference::model::{validate_gguf, ModelError};
use crate::storage::settings::AppSettings;
use crate::text::framing::context_prompt;
use crate::text::kana::preprocess_for_model;

/// Errors that can occur during inference operations
#[derive(Debug, Error, Clone)]
pub enum EngineError {
    #[error("Failed to initialize backend: {0}")]
    BackendInit(String),

    #[error("Failed to load model: {0}")]
    ModelLoad(String),

    #[error("Failed to create context: {0}")]
    ContextCreate(String),

    #[error("Model validation failed: {0}")]
    ModelValidation(String),

    #[error("Tokenization failed: {0}")]
    Tokenization(String),

    #[error("Inference failed: {0}")]
    Inference(String),
}

impl From<ModelError> for EngineError {
    fn from(e: ModelError) -> Self {
        EngineError::ModelValidation(e.to_string())
    }
}

/// Describes a panic caught at an engine boundary
pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("engine panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("engine panicked: {}", s)
    } else {
        "engine panicked".to_string()
    }
}

/// A synchronous text-generation capability.
///
/// Implementations are not assumed to be re-entrant: callers must never run
/// two calls against the same model at once.
pub trait Engine: Send + Sync + 'static {
    /// Opaque handle produced by a successful load
    type Model: Send + 'static;

    fn load_model(&self, path: &Path) -> Result<Self::Model, EngineError>;

    fn generate(&self, model: &mut Self::Model, prompt: &str) -> Result<String, EngineError>;

    fn generate_with_context(
        &self,
        model: &mut Self::Model,
        left_context: &str,
        input: &str,
    ) -> Result<String, EngineError>;
}

/// Decoding parameters for [`LlamaEngine`]
#[derive(Debug, Clone)]
pub struct GenerationParams {
    /// Maximum number of tokens to generate
    pub max_tokens: u32,
    /// Context window size
    pub context_size: u32,
    /// Threads for prompt and generation decoding
    pub threads: u32,
    /// Layers offloaded to the GPU (0 = CPU only)
    pub gpu_layers: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: 32,
            context_size: 512,
            threads: 4,
            gpu_layers: 0,
        }
    }
}

impl From<&AppSettings> for GenerationParams {
    fn from(settings: &AppSettings) -> Self {
        Self {
            max_tokens: settings.max_tokens,
            context_size: settings.context_size,
            threads: settings.threads,
            gpu_layers: settings.gpu_layers,
        }
    }
}

/// Global llama.cpp backend (can only be initialized once per process)
static LLAMA_BACKEND: OnceLock<Result<LlamaBackend, String>> = OnceLock::new();

fn get_backend() -> Result<&'static LlamaBackend, EngineError> {
    let result = LLAMA_BACKEND.get_or_init(|| {
        let mut backend = LlamaBackend::init().map_err(|e| e.to_string())?;
        backend.void_logs();
        tracing::info!("llama.cpp backend initialized");
        Ok(backend)
    });
    result
        .as_ref()
        .map_err(|e| EngineError::BackendInit(e.clone()))
}

/// llama.cpp engine for zenz GGUF models
#[derive(Debug, Clone, Default)]
pub struct LlamaEngine {
    params: GenerationParams,
}

impl LlamaEngine {
    pub fn new(params: GenerationParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &GenerationParams {
        &self.params
    }

    fn context_params(&self) -> Result<LlamaContextParams, EngineError> {
        let n_ctx = NonZeroU32::new(self.params.context_size)
            .ok_or_else(|| EngineError::ContextCreate("context size must be non-zero".into()))?;
        let threads = self.params.threads.max(1) as i32;
        Ok(LlamaContextParams::default()
            .with_n_ctx(Some(n_ctx))
            .with_n_batch(512)
            .with_n_threads(threads)
            .with_n_threads_batch(threads))
    }

    /// Greedy decoding with a fresh context per call
    fn greedy_decode(&self, model: &LlamaModel, prompt: &str) -> Result<String, EngineError> {
        let backend = get_backend()?;
        let text = preprocess_for_model(prompt);

        let tokens = model
            .str_to_token(&text, AddBos::Never)
            .map_err(|e| EngineError::Tokenization(e.to_string()))?;
        if tokens.is_empty() {
            return Ok(String::new());
        }

        let n_ctx = self.params.context_size as usize;
        if tokens.len() + self.params.max_tokens as usize > n_ctx {
            return Err(EngineError::Inference(format!(
                "prompt of {} tokens does not fit a {} token context",
                tokens.len(),
                n_ctx
            )));
        }

        let mut ctx = model
            .new_context(backend, self.context_params()?)
            .map_err(|e| EngineError::ContextCreate(e.to_string()))?;

        let mut batch = LlamaBatch::new(n_ctx, 1);
        let last = tokens.len() - 1;
        for (i, token) in tokens.iter().enumerate() {
            batch
                .add(*token, i as i32, &[0], i == last)
                .map_err(|e| EngineError::Inference(e.to_string()))?;
        }
        ctx.decode(&mut batch)
            .map_err(|e| EngineError::Inference(format!("Failed to decode prompt: {}", e)))?;

        let mut sampler = LlamaSampler::greedy();
        let mut n_cur = tokens.len() as i32;
        let mut bytes: Vec<u8> = Vec::new();

        for _ in 0..self.params.max_tokens {
            let next = sampler.sample(&ctx, batch.n_tokens() - 1);
            sampler.accept(next);

            if model.is_eog_token(next) {
                break;
            }

            // Plaintext rendering drops control tokens from the output
            let piece = model
                .token_to_bytes(next, Special::Plaintext)
                .map_err(|e| EngineError::Inference(e.to_string()))?;
            bytes.extend_from_slice(&piece);

            batch.clear();
            batch
                .add(next, n_cur, &[0], true)
                .map_err(|e| EngineError::Inference(e.to_string()))?;
            ctx.decode(&mut batch)
                .map_err(|e| EngineError::Inference(format!("Failed to decode: {}", e)))?;
            n_cur += 1;
        }

        tracing::debug!(
            "Generated {} tokens from a {} token prompt",
            n_cur as usize - tokens.len(),
            tokens.len()
        );
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl Engine for LlamaEngine {
    type Model = LlamaModel;

    fn load_model(&self, path: &Path) -> Result<LlamaModel, EngineError> {
        let metadata = validate_gguf(path)?;
        tracing::debug!(
            "GGUF v{} header ok: {} tensors, {} bytes",
            metadata.version,
            metadata.tensor_count,
            metadata.file_size
        );

        let backend = get_backend()?;
        let model_params = LlamaModelParams::default().with_n_gpu_layers(self.params.gpu_layers);
        let model = LlamaModel::load_from_file(backend, path, &model_params)
            .map_err(|e| EngineError::ModelLoad(e.to_string()))?;

        tracing::info!(
            "Model loaded: {:?} ({} params, {} vocab, {} ctx)",
            path,
            model.n_params(),
            model.n_vocab(),
            model.n_ctx_train()
        );
        Ok(model)
    }

    fn generate(&self, model: &mut LlamaModel, prompt: &str) -> Result<String, EngineError> {
        self.greedy_decode(model, prompt)
    }

    fn generate_with_context(
        &self,
        model: &mut LlamaModel,
        left_context: &str,
        input: &str,
    ) -> Result<String, EngineError> {
        self.greedy_decode(model, &context_prompt(left_context, input))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message() {
        assert_eq!(panic_message(Box::new("boom")), "engine panicked: boom");
        assert_eq!(
            panic_message(Box::new(String::from("bang"))),
            "engine panicked: bang"
        );
        assert_eq!(panic_message(Box::new(42u8)), "engine panicked");
    }

    #[test]
    fn test_generation_params_default() {
        let params = GenerationParams::default();
        assert_eq!(params.max_tokens, 32);
        assert_eq!(params.context_size, 512);
        assert_eq!(params.threads, 4);
        assert_eq!(params.gpu_layers, 0);
    }

    #[test]
    fn test_params_from_settings() {
        let mut settings = AppSettings::default();
        settings.max_tokens = 48;
        settings.gpu_layers = 99;
        let params = GenerationParams::from(&settings);
        assert_eq!(params.max_tokens, 48);
        assert_eq!(params.gpu_layers, 99);
    }

    #[test]
    fn test_load_rejects_non_gguf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.gguf");
        std::fs::write(&path, vec![0u8; 64]).unwrap();

        let engine = LlamaEngine::default();
        assert!(matches!(
            engine.load_model(&path),
            Err(EngineError::ModelValidation(_))
        ));
    }

    #[test]
    fn test_zero_context_rejected() {
        let engine = LlamaEngine::new(GenerationParams {
            context_size: 0,
            ..GenerationParams::default()
        });
        assert!(matches!(
            engine.context_params(),
            Err(EngineError::ContextCreate(_))
        ));
    }
}
