//! Text preparation
//!
//! Kana normalization and prompt framing applied before anything reaches the engine.

pub mod framing;
pub mod kana;

pub use framing::{FramingStrategy, NormalizedPrompt, PromptFramer};
pub use kana::{preprocess_for_model, to_katakana};
