//! Generation request and result types
//!
//! Defines what the presentation layer submits and what it gets back.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single kana-to-text generation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Text preceding the input, may be empty
    left_context: String,
    /// Kana typed by the user
    raw_input: String,
}

impl GenerationRequest {
    /// Create a new request
    pub fn new(left_context: impl Into<String>, raw_input: impl Into<String>) -> Self {
        Self {
            left_context: left_context.into(),
            raw_input: raw_input.into(),
        }
    }

    /// Create a request with no left context
    pub fn without_context(raw_input: impl Into<String>) -> Self {
        Self::new(String::new(), raw_input)
    }

    pub fn left_context(&self) -> &str {
        &self.left_context
    }

    pub fn raw_input(&self) -> &str {
        &self.raw_input
    }

    /// True when the input is empty after trimming
    pub fn is_blank(&self) -> bool {
        self.raw_input.trim().is_empty()
    }
}

/// Why a request produced no text
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("empty input")]
    EmptyInput,

    #[error("model not ready")]
    NotReady,

    #[error("busy")]
    Busy,

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("timed out waiting for the model")]
    TimedOut,

    #[error("inference worker unavailable")]
    WorkerUnavailable,
}

impl GenerationError {
    /// Errors raised before the engine is contacted
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            GenerationError::EmptyInput | GenerationError::NotReady | GenerationError::Busy
        )
    }
}

/// Outcome of one request, delivered exactly once
pub type GenerationResult = Result<String, GenerationError>;
