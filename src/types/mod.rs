//! Shared type definitions
//!
//! This module contains the request/result types shared across the crate.

pub mod generation;

pub use generation::{GenerationError, GenerationRequest, GenerationResult};
