//! Per-exercise run state machine.
//!
//! Phases are strictly ordered:
//! `Init → [ConflictTeaching] → Generation → Extraction → Testing →
//! [Feedback] → Terminal`. Each phase runs under a named span and
//! returns a tagged outcome: advance to the next phase, or stop with a
//! recoverable failure that becomes a failed `RunOutcome`. Fatal
//! corpus-integrity errors are never converted; they propagate out of
//! `run_exercise` and abort the batch.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{info, info_span, warn, Instrument};

use crate::agent::Agent;
use crate::batch::TraceContext;
use crate::config::HarnessConfig;
use crate::error::CorpusError;
use crate::executor::{Executor, TestResult};
use crate::exercise::Exercise;
use crate::extract::extract_code;
use crate::feedback::Mentor;
use crate::prompts;
use crate::score::score;
use crate::testspec::parse_spec;

/// Terminal status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// The pipeline completed; the score may still be zero.
    Success,
    /// A phase signalled a recoverable error.
    Failed,
}

/// The terminal record for one exercise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    /// Exercise id.
    pub id: u32,
    /// Exercise display name.
    pub name: String,
    /// Terminal status.
    pub status: RunStatus,
    /// Extracted code (success only).
    pub code: Option<String>,
    /// Per-case results (success only).
    pub results: Vec<TestResult>,
    /// Final score, set once at completion and never recomputed.
    pub score: Option<f64>,
    /// Total elapsed time for the run.
    pub elapsed: Duration,
    /// Latency of the conflict-teaching agent call, when one happened.
    pub teach_latency: Option<Duration>,
    /// Latency of the primary task agent call.
    pub task_latency: Option<Duration>,
    /// Latency of the loop-closing feedback agent call.
    pub feedback_latency: Option<Duration>,
    /// Failure message (failed only).
    pub error: Option<String>,
}

impl RunOutcome {
    fn completed(exercise: &Exercise, state: RunState, elapsed: Duration) -> Self {
        Self {
            id: exercise.id,
            name: exercise.name.clone(),
            status: RunStatus::Success,
            code: state.code,
            results: state.results,
            score: state.score,
            elapsed,
            teach_latency: state.teach_latency,
            task_latency: state.task_latency,
            feedback_latency: state.feedback_latency,
            error: None,
        }
    }

    fn failed(exercise: &Exercise, message: String, state: RunState, elapsed: Duration) -> Self {
        Self {
            id: exercise.id,
            name: exercise.name.clone(),
            status: RunStatus::Failed,
            code: None,
            results: Vec::new(),
            score: None,
            elapsed,
            teach_latency: state.teach_latency,
            task_latency: state.task_latency,
            feedback_latency: state.feedback_latency,
            error: Some(message),
        }
    }

    /// Returns true if the run reached the `Success` terminal state.
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }
}

/// Named pipeline phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Init,
    ConflictTeaching,
    Generation,
    Extraction,
    Testing,
    Feedback,
    Terminal,
}

impl Phase {
    fn name(self) -> &'static str {
        match self {
            Phase::Init => "init",
            Phase::ConflictTeaching => "conflict_teaching",
            Phase::Generation => "generation",
            Phase::Extraction => "extraction",
            Phase::Testing => "testing",
            Phase::Feedback => "feedback",
            Phase::Terminal => "terminal",
        }
    }
}

/// Tagged outcome of one phase step.
enum PhaseOutcome {
    /// Continue with the next phase.
    Advance(Phase),
    /// A recoverable call failure; the run terminates as `Failed`.
    Recoverable(String),
}

/// Mutable state accumulated across phases of one run.
#[derive(Default)]
struct RunState {
    response: Option<String>,
    code: Option<String>,
    results: Vec<TestResult>,
    score: Option<f64>,
    teach_latency: Option<Duration>,
    task_latency: Option<Duration>,
    feedback_latency: Option<Duration>,
}

/// Drives one exercise through the pipeline.
pub struct Runner {
    agent: Arc<dyn Agent>,
    mentor: Arc<dyn Mentor>,
    executor: Executor,
    config: HarnessConfig,
}

impl Runner {
    /// Creates a new runner.
    pub fn new(agent: Arc<dyn Agent>, mentor: Arc<dyn Mentor>, config: HarnessConfig) -> Self {
        Self {
            agent,
            mentor,
            executor: Executor::new(config.executor.clone()),
            config,
        }
    }

    /// Executes the full pipeline for one exercise.
    ///
    /// # Errors
    ///
    /// Returns `CorpusError` only for fatal corpus-integrity violations;
    /// recoverable call failures are reported inside the `RunOutcome`.
    pub async fn run_exercise(
        &self,
        exercise: &Exercise,
        ctx: &TraceContext,
    ) -> Result<RunOutcome, CorpusError> {
        let start = Instant::now();
        let mut state = RunState::default();
        let mut phase = Phase::Init;

        loop {
            if phase == Phase::Terminal {
                break;
            }

            let span = info_span!(
                "phase",
                name = phase.name(),
                exercise = exercise.id,
                trace = %ctx.child(phase.name()).path(),
                batch = %ctx.batch(),
            );

            let outcome = self
                .step(phase, exercise, &mut state)
                .instrument(span)
                .await?;

            match outcome {
                PhaseOutcome::Advance(next) => phase = next,
                PhaseOutcome::Recoverable(message) => {
                    info!(exercise = exercise.id, error = %message, "Run failed");
                    return Ok(RunOutcome::failed(exercise, message, state, start.elapsed()));
                }
            }
        }

        if state.score == Some(0.0) {
            // Notable but not a pipeline failure.
            warn!(exercise = exercise.id, "Run completed with a zero score");
        }

        Ok(RunOutcome::completed(exercise, state, start.elapsed()))
    }

    /// Executes a single phase.
    async fn step(
        &self,
        phase: Phase,
        exercise: &Exercise,
        state: &mut RunState,
    ) -> Result<PhaseOutcome, CorpusError> {
        match phase {
            Phase::Init => {
                let next = if exercise.conflicting && !exercise.retry_after_feedback {
                    Phase::ConflictTeaching
                } else {
                    Phase::Generation
                };
                Ok(PhaseOutcome::Advance(next))
            }
            Phase::ConflictTeaching => self.teach_conflict(exercise, state).await,
            Phase::Generation => self.generate(exercise, state).await,
            Phase::Extraction => {
                let response = state.response.as_deref().unwrap_or("");
                state.code = Some(extract_code(response));
                Ok(PhaseOutcome::Advance(Phase::Testing))
            }
            Phase::Testing => self.test(exercise, state).await,
            Phase::Feedback => self.run_feedback(exercise, state).await,
            Phase::Terminal => unreachable!("terminal phase is handled by the run loop"),
        }
    }

    /// Sends the prerequisite teaching doc for a conflicting exercise.
    ///
    /// Preconditions are hard invariants: violating them means the input
    /// corpus is corrupted, so they abort the batch rather than the run.
    async fn teach_conflict(
        &self,
        exercise: &Exercise,
        state: &mut RunState,
    ) -> Result<PhaseOutcome, CorpusError> {
        if exercise.id <= 100 {
            return Err(CorpusError::IdOutOfRange { id: exercise.id });
        }

        let uid = exercise
            .conflict_uid
            .as_deref()
            .ok_or_else(|| CorpusError::MissingField {
                exercise: exercise.name.clone(),
                field: "conflict_uid".to_string(),
            })?;

        let doc = self.locate_teaching_doc(exercise)?;

        match self.agent.ask(&doc, uid).await {
            Ok(reply) => {
                state.teach_latency = Some(reply.latency);
                Ok(PhaseOutcome::Advance(Phase::Generation))
            }
            Err(e) => Ok(PhaseOutcome::Recoverable(format!(
                "conflict teaching failed: {}",
                e
            ))),
        }
    }

    /// Locates the single teaching doc named by the zero-padded id prefix.
    fn locate_teaching_doc(&self, exercise: &Exercise) -> Result<String, CorpusError> {
        let prefix = exercise.doc_prefix();
        let mut matches = Vec::new();

        for entry in std::fs::read_dir(&self.config.docs_dir)? {
            let entry = entry?;
            if entry.file_name().to_string_lossy().starts_with(&prefix) {
                matches.push(entry.path());
            }
        }

        if matches.len() != 1 {
            return Err(CorpusError::TeachingDocCount {
                prefix,
                dir: self.config.docs_dir.display().to_string(),
                found: matches.len(),
            });
        }

        Ok(std::fs::read_to_string(&matches[0])?)
    }

    /// Requests a solution under the run's primary correlation id.
    async fn generate(
        &self,
        exercise: &Exercise,
        state: &mut RunState,
    ) -> Result<PhaseOutcome, CorpusError> {
        let prompt = prompts::task_prompt(exercise);

        match self.agent.ask(&prompt, &exercise.task_uid).await {
            Ok(reply) => {
                state.task_latency = Some(reply.latency);
                state.response = Some(reply.text);
                Ok(PhaseOutcome::Advance(Phase::Extraction))
            }
            Err(e) => Ok(PhaseOutcome::Recoverable(format!(
                "generation failed: {}",
                e
            ))),
        }
    }

    /// Parses the spec text, executes the extracted code, and scores it.
    async fn test(
        &self,
        exercise: &Exercise,
        state: &mut RunState,
    ) -> Result<PhaseOutcome, CorpusError> {
        let tests = exercise
            .tests
            .as_deref()
            .ok_or_else(|| CorpusError::MissingTests {
                exercise: exercise.name.clone(),
            })?;

        let cases = parse_spec(tests).map_err(|_| CorpusError::MissingTests {
            exercise: exercise.name.clone(),
        })?;

        let code = state.code.as_deref().unwrap_or("");
        state.results = self.executor.run(&exercise.entry_point, code, &cases).await;
        let run_score = score(&state.results);
        state.score = Some(run_score);

        info!(
            exercise = exercise.id,
            score = run_score,
            cases = state.results.len(),
            "Testing complete"
        );

        let next = if self.config.feedback_enabled
            && !exercise.retry_after_feedback
            && run_score < 1.0
        {
            Phase::Feedback
        } else {
            Phase::Terminal
        };
        Ok(PhaseOutcome::Advance(next))
    }

    /// Obtains mentoring text and closes the loop conversationally.
    ///
    /// The recorded score is never recomputed from this exchange.
    async fn run_feedback(
        &self,
        exercise: &Exercise,
        state: &mut RunState,
    ) -> Result<PhaseOutcome, CorpusError> {
        let missing = |field: &str| CorpusError::MissingField {
            exercise: exercise.name.clone(),
            field: field.to_string(),
        };

        let statement = exercise
            .statement
            .as_deref()
            .ok_or_else(|| missing("statement"))?;
        let reference = exercise
            .reference
            .as_deref()
            .ok_or_else(|| missing("reference"))?;
        let uid = exercise
            .feedback_uid
            .as_deref()
            .ok_or_else(|| missing("feedback_uid"))?;

        let code = state.code.as_deref().unwrap_or("");

        let mentoring = match self
            .mentor
            .mentor(statement, code, &state.results, reference)
            .await
        {
            Ok(text) => text,
            Err(e) => {
                return Ok(PhaseOutcome::Recoverable(format!(
                    "feedback generation failed: {}",
                    e
                )))
            }
        };

        let message = prompts::feedback_message(&exercise.name, code, &mentoring);

        match self.agent.ask(&message, uid).await {
            Ok(reply) => {
                state.feedback_latency = Some(reply.latency);
                Ok(PhaseOutcome::Advance(Phase::Terminal))
            }
            Err(e) => Ok(PhaseOutcome::Recoverable(format!(
                "feedback delivery failed: {}",
                e
            ))),
        }
    }
}
