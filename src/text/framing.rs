//! Prompt framing
//!
//! Wraps normalized input (and optional left context) in the boundary markers
//! the zenz models were trained on.

use serde::{Deserialize, Serialize};

use crate::text::kana::to_katakana;
use crate::types::generation::GenerationRequest;

/// Marks the start of the kana reading
pub const INPUT_START: char = '\u{ee00}';
/// Marks the end of the reading; generation continues from here
pub const INPUT_END: char = '\u{ee01}';
/// Marks the start of left context in the structured zenz prompt
pub const CONTEXT_START: char = '\u{ee02}';

/// Which engine entry point a prompt is framed for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FramingStrategy {
    /// Context and input go to the engine as two separate fields
    #[default]
    Structured,
    /// Everything is concatenated into a single marker-delimited string
    Inline,
}

/// Final prompt handed to the engine. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizedPrompt {
    /// For `generate`
    Single(String),
    /// For `generate_with_context`
    WithContext { left_context: String, input: String },
}

/// Builds [`NormalizedPrompt`]s for one framing strategy
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptFramer {
    strategy: FramingStrategy,
}

impl PromptFramer {
    pub fn new(strategy: FramingStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> FramingStrategy {
        self.strategy
    }

    /// Frames already-normalized text.
    ///
    /// In the inline shape `left_context` is prepended verbatim in front of the
    /// marker sequence, without a delimiter of its own.
    pub fn frame(&self, normalized: &str, left_context: &str) -> NormalizedPrompt {
        match self.strategy {
            FramingStrategy::Structured => NormalizedPrompt::WithContext {
                left_context: left_context.to_string(),
                input: normalized.to_string(),
            },
            FramingStrategy::Inline => {
                NormalizedPrompt::Single(inline_prompt(normalized, left_context))
            }
        }
    }

    /// Trims, normalizes and frames a request.
    pub fn frame_request(&self, request: &GenerationRequest) -> NormalizedPrompt {
        let normalized = to_katakana(request.raw_input().trim());
        self.frame(&normalized, request.left_context().trim())
    }
}

/// `left_context` + U+EE00 + input + U+EE01
pub fn inline_prompt(normalized: &str, left_context: &str) -> String {
    let mut prompt = String::with_capacity(left_context.len() + normalized.len() + 6);
    prompt.push_str(left_context);
    prompt.push(INPUT_START);
    prompt.push_str(normalized);
    prompt.push(INPUT_END);
    prompt
}

/// Zenz prompt with a dedicated context field.
///
/// The context marker is only emitted when there is context to mark.
pub fn context_prompt(left_context: &str, input: &str) -> String {
    if left_context.is_empty() {
        return inline_prompt(input, "");
    }
    let mut prompt = String::with_capacity(left_context.len() + input.len() + 9);
    prompt.push(CONTEXT_START);
    prompt.push_str(left_context);
    prompt.push(INPUT_START);
    prompt.push_str(input);
    prompt.push(INPUT_END);
    prompt
}
