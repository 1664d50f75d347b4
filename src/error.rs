//! Error types for kataforge operations.
//!
//! Two disjoint error classes flow through the harness:
//! - Recoverable call failures (`AgentError`): caught at the phase
//!   boundary that produced them and converted into a failed run
//!   outcome. They never abort sibling runs. Interpreter-level failures
//!   are not errors at all; they surface as failed test results.
//! - Fatal corpus-integrity errors (`CorpusError`): never caught locally.
//!   They propagate and abort the whole batch, because they indicate a
//!   corrupted input corpus rather than a transient runtime condition.

use thiserror::Error;

/// Recoverable failures when calling the agent or mentor collaborators.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Agent call timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Agent API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Malformed agent response: {0}")]
    MalformedResponse(String),

    #[error("Agent returned an empty response")]
    EmptyResponse,
}

/// Fatal corpus-integrity errors. These abort the entire batch.
#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("Exercise '{exercise}' is missing required field '{field}'")]
    MissingField { exercise: String, field: String },

    #[error("Exercise '{exercise}' has no test-case spec text")]
    MissingTests { exercise: String },

    #[error("Conflicting exercise id {id} must be greater than 100")]
    IdOutOfRange { id: u32 },

    #[error("Expected exactly one teaching doc prefixed '{prefix}' in {dir}, found {found}")]
    TeachingDocCount {
        prefix: String,
        dir: String,
        found: usize,
    },

    #[error("Failed to load exercise manifest '{path}': {message}")]
    Manifest { path: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Errors that can occur while parsing a test-case spec.
#[derive(Debug, Error, PartialEq)]
pub enum SpecError {
    #[error("Test-case spec text is empty")]
    Empty,
}

