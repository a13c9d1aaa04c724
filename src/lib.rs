//! agentcrew
//!
//! A self-bootstrapping HTTP service that forwards chat messages to a fixed
//! four-agent crew (CEO, Manager, Researcher, Writer) backed by a local
//! Ollama model.
//!
//! # Overview
//!
//! - [`bootstrap`] prepares the workspace, installs models and relaunches
//!   the binary in server mode
//! - [`server`] exposes `POST /chat`
//! - [`pipeline`] holds the four agents and builds the four tasks
//! - [`crew`] runs tasks sequentially against an [`llm::LlmProvider`]
//!
//! # Quick Start
//!
//! ```rust
//! use agentcrew::config::CrewSection;
//! use agentcrew::crew::SharedLlm;
//! use agentcrew::pipeline::CrewPipeline;
//! use agentcrew::testing::MockLlmProvider;
//! use std::sync::Arc;
//!
//! let runtime = tokio::runtime::Runtime::new().unwrap();
//! runtime.block_on(async {
//!     let llm = SharedLlm::with_model(Arc::new(MockLlmProvider::echo_role()), "mock");
//!     let pipeline = CrewPipeline::new(llm, CrewSection::default());
//!
//!     let output = pipeline.process("Write a haiku about ferris").await.unwrap();
//!     assert_eq!(output.tasks_output.len(), 4);
//!     assert_eq!(output.raw, "Writer done");
//! });
//! ```

pub mod bootstrap;
pub mod config;
pub mod crew;
pub mod error;
pub mod llm;
pub mod observability;
pub mod pipeline;
pub mod server;
pub mod testing;

pub use bootstrap::{Bootstrapper, Environment, ModelInstaller, SERVER_MARKER};
pub use config::*;
pub use crew::{AgentRole, Crew, CrewOutput, Process, SharedLlm, Task, TaskOutput};
pub use error::{CrewError, CrewResult};
pub use pipeline::CrewPipeline;
pub use server::{ChatRequest, ChatResponse, ChatState};
