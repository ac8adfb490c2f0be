//! multiquery - ask several LLMs the same question and let a judge model
//! merge their answers into one.
//!
//! The pipeline has two phases: every enabled endpoint is queried
//! concurrently and joined, then the successful responses go to a single
//! judge call that evaluates and merges them.

pub mod app;
pub mod config;
pub mod error;
pub mod llm;
pub mod ui;

pub use config::{Config, Credentials, EndpointConfig, ProviderKind};
pub use error::{QueryError, Result};
pub use llm::{JudgeOutput, MergedResult, QueryEngine, QueryReport, QueryState};
