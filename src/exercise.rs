//! Exercise descriptors and manifest loading.
//!
//! Descriptors are read once per batch from an ordered YAML manifest and
//! never mutated. The `statement`, `reference` and `tests` fields are
//! private corpus material: they drive test execution and feedback
//! generation and are never sent verbatim to the agent as the task
//! prompt.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CorpusError;

/// Whether the agent is asked to implement an algorithm from scratch or
/// to review existing seed code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunKind {
    Implement,
    Review,
}

impl Default for RunKind {
    fn default() -> Self {
        RunKind::Implement
    }
}

/// One algorithm-implementation or review task to present to the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exercise {
    /// Numeric algorithm id; also keys the teaching-doc lookup.
    pub id: u32,
    /// Display name.
    pub name: String,
    /// Function name invoked by the staged test program.
    pub entry_point: String,
    /// Run kind.
    #[serde(default)]
    pub kind: RunKind,
    /// Seed code to review (review kind only).
    #[serde(default)]
    pub seed_code: Option<String>,
    /// Marks an exercise teaching a superseding variant of an earlier
    /// algorithm; its doc must be taught just-in-time before generation.
    #[serde(default)]
    pub conflicting: bool,
    /// Marks a second attempt that follows a feedback round.
    #[serde(default)]
    pub retry_after_feedback: bool,
    /// Correlation id for the primary task conversation.
    pub task_uid: String,
    /// Correlation id for the conflicting-doc teaching conversation.
    #[serde(default)]
    pub conflict_uid: Option<String>,
    /// Correlation id for the feedback conversation.
    #[serde(default)]
    pub feedback_uid: Option<String>,
    /// Plain-text algorithm statement (feedback generation only).
    #[serde(default)]
    pub statement: Option<String>,
    /// Reference implementation (feedback generation only).
    #[serde(default)]
    pub reference: Option<String>,
    /// Test-case spec text (execution only).
    #[serde(default)]
    pub tests: Option<String>,
}

impl Exercise {
    /// Zero-padded id prefix that names this exercise's teaching doc.
    pub fn doc_prefix(&self) -> String {
        format!("{:03}", self.id)
    }
}

/// Loads an ordered exercise list from a YAML manifest.
pub fn load_manifest(path: &Path) -> Result<Vec<Exercise>, CorpusError> {
    let content = std::fs::read_to_string(path).map_err(|e| CorpusError::Manifest {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    serde_yaml::from_str(&content).map_err(|e| CorpusError::Manifest {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}
