//! LLM provider abstraction layer
//!
//! A provider-agnostic interface for model calls plus the Ollama client the
//! service ships with.

pub mod provider;
pub mod providers;

pub use provider::*;
pub use providers::*;
