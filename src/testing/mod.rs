//! Testing utilities and mock implementations
//!
//! Mocks for running the crew, server and bootstrap without a live model
//! service.

pub mod mocks;

pub use mocks::*;
