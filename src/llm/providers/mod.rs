//! LLM provider implementations
//!
//! Concrete implementations of the LlmProvider trait.

pub mod ollama;

pub use ollama::*;
