//! Common utilities for integration tests

#![allow(dead_code)]

pub mod cli;
pub mod env;
pub mod sse;

// Re-export commonly used items
pub use cli::{CliOutput, RlCommand};
pub use env::{free_port, ServerProcess, TestEnv};
pub use sse::{SseMessage, SseReader};
