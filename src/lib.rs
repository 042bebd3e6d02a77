//! zenzrs Library
//!
//! Kana-to-kanji generation on top of a locally hosted zenz GGUF model.
//! The crate owns the model lifecycle, gates requests on readiness and runs
//! every engine call off the interactive thread, one at a time.

pub mod app;
pub mod inference;
pub mod storage;
pub mod text;
pub mod types;
