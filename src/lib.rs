//! kataforge: Curriculum evaluation harness for code-generation agents.
//!
//! This library drives an agent through a manifest of algorithm
//! exercises, executes the extracted code against an external
//! interpreter, scores it, and optionally closes a mentoring feedback
//! loop.

// Core modules
pub mod agent;
pub mod batch;
pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod exercise;
pub mod extract;
pub mod feedback;
pub mod prompts;
pub mod run;
pub mod score;
pub mod testspec;

// Re-export commonly used error types
pub use error::{AgentError, CorpusError, SpecError};
