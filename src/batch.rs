//! Batch scheduling and aggregation.
//!
//! A batch drives a set of exercises through the runner under one of two
//! schedules: strictly sequential, or bounded-concurrent behind a
//! semaphore. Outcomes are aggregated in completion order. A fatal
//! `CorpusError` from any run aborts the whole batch; outcomes already
//! collected stay in the caller-owned `Batch`.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::error::CorpusError;
use crate::exercise::Exercise;
use crate::run::{RunOutcome, Runner};

/// Explicit trace identity threaded through every run.
///
/// The path is a `/`-separated chain of segments from the batch root
/// down to the current unit of work.
#[derive(Debug, Clone)]
pub struct TraceContext {
    batch: Uuid,
    path: String,
}

impl TraceContext {
    /// Creates the root context for a batch.
    pub fn root(batch: Uuid) -> Self {
        Self {
            batch,
            path: "batch".to_string(),
        }
    }

    /// Derives a child context with `segment` appended to the path.
    pub fn child(&self, segment: &str) -> Self {
        Self {
            batch: self.batch,
            path: format!("{}/{}", self.path, segment),
        }
    }

    /// Returns the batch id.
    pub fn batch(&self) -> Uuid {
        self.batch
    }

    /// Returns the full trace path.
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// How runs within a batch are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleMode {
    /// One run at a time, in manifest order.
    Sequential,
    /// Up to the given number of runs in flight at once.
    Bounded(usize),
}

/// Aggregate of a batch's run outcomes, owned by the caller so that
/// completed outcomes survive a fatal abort.
#[derive(Debug)]
pub struct Batch {
    id: Uuid,
    started_at: Option<DateTime<Utc>>,
    outcomes: Vec<RunOutcome>,
}

impl Batch {
    /// Creates an empty batch with a fresh id.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: None,
            outcomes: Vec::new(),
        }
    }

    /// Returns the batch id.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns when the batch started running, if it has.
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Records one completed run.
    pub fn push(&mut self, outcome: RunOutcome) {
        self.outcomes.push(outcome);
    }

    /// Returns outcomes in completion order.
    pub fn outcomes(&self) -> &[RunOutcome] {
        &self.outcomes
    }

    /// Computes summary statistics over the collected outcomes.
    pub fn summary(&self) -> BatchSummary {
        let total = self.outcomes.len();
        let failed = self.outcomes.iter().filter(|o| !o.is_success()).count();

        let scores: Vec<f64> = self.outcomes.iter().filter_map(|o| o.score).collect();
        let mean_score = if scores.is_empty() {
            0.0
        } else {
            scores.iter().sum::<f64>() / scores.len() as f64
        };

        BatchSummary {
            total,
            failed,
            mean_score,
            mean_teach_latency: mean_latency(self.outcomes.iter().filter_map(|o| o.teach_latency)),
            mean_task_latency: mean_latency(self.outcomes.iter().filter_map(|o| o.task_latency)),
        }
    }
}

impl Default for Batch {
    fn default() -> Self {
        Self::new()
    }
}

fn mean_latency(latencies: impl Iterator<Item = Duration>) -> Option<Duration> {
    let latencies: Vec<Duration> = latencies.collect();
    if latencies.is_empty() {
        return None;
    }
    Some(latencies.iter().sum::<Duration>() / latencies.len() as u32)
}

/// Summary statistics for a batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    /// Number of runs that reached a terminal state.
    pub total: usize,
    /// Number of runs that terminated as failed.
    pub failed: usize,
    /// Mean score over scored runs, 0.0 when none were scored.
    pub mean_score: f64,
    /// Mean conflict-teaching call latency, when any run had one.
    pub mean_teach_latency: Option<Duration>,
    /// Mean task call latency, when any run had one.
    pub mean_task_latency: Option<Duration>,
}

/// Drives a batch of exercises through a runner.
pub struct BatchRunner {
    runner: Arc<Runner>,
    mode: ScheduleMode,
}

impl BatchRunner {
    /// Creates a batch runner with the given schedule.
    pub fn new(runner: Arc<Runner>, mode: ScheduleMode) -> Self {
        Self { runner, mode }
    }

    /// Runs every exercise, pushing outcomes into `batch` as they
    /// complete.
    ///
    /// # Errors
    ///
    /// Returns the first fatal `CorpusError`. In-flight runs are
    /// abandoned; `batch` keeps everything completed before the abort.
    pub async fn run(
        &self,
        exercises: Vec<Exercise>,
        batch: &mut Batch,
    ) -> Result<(), CorpusError> {
        batch.started_at = Some(Utc::now());
        let ctx = TraceContext::root(batch.id());
        let span = info_span!("batch", id = %batch.id(), exercises = exercises.len());

        info!(
            id = %batch.id(),
            exercises = exercises.len(),
            mode = ?self.mode,
            "Starting batch"
        );

        let result = match self.mode {
            ScheduleMode::Sequential => {
                self.run_sequential(exercises, batch, &ctx).instrument(span).await
            }
            ScheduleMode::Bounded(width) => {
                self.run_bounded(exercises, batch, &ctx, width)
                    .instrument(span)
                    .await
            }
        };

        let summary = batch.summary();
        match &result {
            Ok(()) => info!(
                id = %batch.id(),
                total = summary.total,
                failed = summary.failed,
                mean_score = summary.mean_score,
                "Batch complete"
            ),
            Err(e) => warn!(
                id = %batch.id(),
                completed = summary.total,
                error = %e,
                "Batch aborted"
            ),
        }

        result
    }

    async fn run_sequential(
        &self,
        exercises: Vec<Exercise>,
        batch: &mut Batch,
        ctx: &TraceContext,
    ) -> Result<(), CorpusError> {
        for exercise in &exercises {
            let run_ctx = ctx.child(&format!("run-{}", exercise.id));
            let outcome = self.runner.run_exercise(exercise, &run_ctx).await?;
            batch.push(outcome);
        }
        Ok(())
    }

    async fn run_bounded(
        &self,
        exercises: Vec<Exercise>,
        batch: &mut Batch,
        ctx: &TraceContext,
        width: usize,
    ) -> Result<(), CorpusError> {
        let semaphore = Arc::new(Semaphore::new(width.max(1)));
        let mut in_flight = FuturesUnordered::new();

        for exercise in exercises {
            let runner = Arc::clone(&self.runner);
            let semaphore = Arc::clone(&semaphore);
            let run_ctx = ctx.child(&format!("run-{}", exercise.id));

            in_flight.push(async move {
                // The semaphore is never closed.
                let _permit = semaphore
                    .acquire()
                    .await
                    .expect("Semaphore closed unexpectedly");
                runner.run_exercise(&exercise, &run_ctx).await
            });
        }

        while let Some(result) = in_flight.next().await {
            match result {
                Ok(outcome) => batch.push(outcome),
                Err(e) => {
                    warn!(
                        unresolved = in_flight.len(),
                        error = %e,
                        "Fatal error, abandoning in-flight runs"
                    );
                    return Err(e);
                }
            }
        }

        Ok(())
    }
}
