//! LLM inference
//!
//! Model lifecycle, request orchestration and the llama.cpp engine binding.

pub mod engine;
pub mod lifecycle;
pub mod model;
pub mod orchestrator;

#[cfg(test)]
pub(crate) mod testing;

// Re-export main types for convenience
pub use engine::{Engine, EngineError, GenerationParams, LlamaEngine};
pub use lifecycle::{LoadError, ModelLifecycle, ModelLifecycleState};
pub use model::{validate_gguf, GgufMetadata, ModelError, GGUF_MAGIC};
pub use orchestrator::{CompletionSink, InferenceOrchestrator};
