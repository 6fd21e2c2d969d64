//! Shared utilities for the llm-endpoints workspace
//!
//! Logging setup and settings loading used by the `llm` binary.

pub mod config;
pub mod logging;

pub use config::{ConfigError, Settings};
pub use logging::{LogFormat, init_tracing, init_tracing_with};
