//! Harness configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::executor::ExecutorConfig;

/// Configuration for the evaluation harness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Execution adapter configuration.
    pub executor: ExecutorConfig,
    /// Directory holding conflicting-algorithm teaching docs, named by
    /// zero-padded algorithm id prefix.
    pub docs_dir: PathBuf,
    /// Global switch for the feedback round.
    pub feedback_enabled: bool,
}

impl HarnessConfig {
    /// Creates a configuration with defaults.
    pub fn new() -> Self {
        Self {
            executor: ExecutorConfig::default(),
            docs_dir: PathBuf::from("./docs"),
            feedback_enabled: true,
        }
    }

    /// Sets the execution adapter configuration.
    pub fn with_executor(mut self, executor: ExecutorConfig) -> Self {
        self.executor = executor;
        self
    }

    /// Sets the teaching-docs directory.
    pub fn with_docs_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.docs_dir = dir.into();
        self
    }

    /// Enables or disables the feedback round globally.
    pub fn with_feedback(mut self, enabled: bool) -> Self {
        self.feedback_enabled = enabled;
        self
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self::new()
    }
}
