//! Per-run state: stage identifiers, the orchestrator state machine, and
//! the timing harness that wraps every stage.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{error, info};
use uuid::Uuid;

use crate::error::{FailureKind, RagError, Result};
use crate::record::QuestionAnswerPair;

/// A pipeline stage, in execution order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Ingest,
    Chunk,
    Index,
    Retrieve,
    Answer,
}

impl Stage {
    /// Every stage in execution order.
    pub const ALL: [Stage; 5] =
        [Stage::Ingest, Stage::Chunk, Stage::Index, Stage::Retrieve, Stage::Answer];

    /// Stable key used in timing maps and log fields.
    pub fn key(self) -> &'static str {
        match self {
            Self::Ingest => "ingest",
            Self::Chunk => "chunk",
            Self::Index => "index",
            Self::Retrieve => "retrieve",
            Self::Answer => "answer",
        }
    }

    /// The failure category reported when this stage fails.
    pub fn failure_kind(self) -> FailureKind {
        match self {
            Self::Ingest => FailureKind::Ingestion,
            Self::Chunk => FailureKind::Chunking,
            Self::Index => FailureKind::Indexing,
            Self::Retrieve => FailureKind::Retrieval,
            Self::Answer => FailureKind::Answer,
        }
    }

    /// Build this stage's failure error.
    pub fn failure(self, message: impl Into<String>) -> RagError {
        let message = message.into();
        match self {
            Self::Ingest => RagError::Ingestion(message),
            Self::Chunk => RagError::Chunking(message),
            Self::Index => RagError::Indexing(message),
            Self::Retrieve => RagError::Retrieval(message),
            Self::Answer => RagError::Answer(message),
        }
    }

    fn running_state(self) -> PipelineState {
        match self {
            Self::Ingest => PipelineState::Ingesting,
            Self::Chunk => PipelineState::Chunking,
            Self::Index => PipelineState::Indexing,
            Self::Retrieve => PipelineState::Retrieving,
            Self::Answer => PipelineState::Answering,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Orchestrator state.
///
/// Runs advance strictly along
/// `Init → Ingesting → Chunking → Indexing → Retrieving → Answering → Aggregating → Done`;
/// `Failed` is reachable from every non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum PipelineState {
    Init,
    Ingesting,
    Chunking,
    Indexing,
    Retrieving,
    Answering,
    Aggregating,
    Done,
    Failed {
        /// `None` when the run failed before the first stage (configuration).
        stage: Option<Stage>,
        kind: FailureKind,
    },
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed { .. })
    }

    fn successor(&self) -> Option<PipelineState> {
        match self {
            Self::Init => Some(Self::Ingesting),
            Self::Ingesting => Some(Self::Chunking),
            Self::Chunking => Some(Self::Indexing),
            Self::Indexing => Some(Self::Retrieving),
            Self::Retrieving => Some(Self::Answering),
            Self::Answering => Some(Self::Aggregating),
            Self::Aggregating => Some(Self::Done),
            Self::Done | Self::Failed { .. } => None,
        }
    }

    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(&self, next: &PipelineState) -> bool {
        if self.is_terminal() {
            return false;
        }
        matches!(next, Self::Failed { .. }) || self.successor().as_ref() == Some(next)
    }
}

/// Elapsed seconds per stage.
///
/// Keyed by [`Stage`], so iteration follows execution order no matter in
/// which order entries were recorded. Serializes as `{"ingest": 0.12, ...}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageTimings(BTreeMap<Stage, f64>);

impl StageTimings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the elapsed time of `stage`. Negative or non-finite values are clamped to zero.
    pub fn record(&mut self, stage: Stage, seconds: f64) {
        let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
        self.0.insert(stage, seconds);
    }

    pub fn get(&self, stage: Stage) -> Option<f64> {
        self.0.get(&stage).copied()
    }

    pub fn contains(&self, stage: Stage) -> bool {
        self.0.contains_key(&stage)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Stage, f64)> + '_ {
        self.0.iter().map(|(stage, secs)| (*stage, *secs))
    }

    /// Sum of all recorded stage times.
    pub fn total(&self) -> f64 {
        self.0.values().sum()
    }
}

/// State of one pipeline run, passed explicitly through the orchestrator.
#[derive(Debug, Clone)]
pub struct RunContext {
    run_id: Uuid,
    state: PipelineState,
    timings: StageTimings,
    partial_answers: Vec<QuestionAnswerPair>,
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RunContext {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            state: PipelineState::Init,
            timings: StageTimings::new(),
            partial_answers: Vec::new(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn timings(&self) -> &StageTimings {
        &self.timings
    }

    /// Answers for the questions that succeeded in a run that failed on
    /// other questions, in input order.
    pub fn partial_answers(&self) -> &[QuestionAnswerPair] {
        &self.partial_answers
    }

    pub(crate) fn keep_partial_answers(&mut self, answers: Vec<QuestionAnswerPair>) {
        self.partial_answers = answers;
    }

    /// The stage and category of the failure, if the run failed.
    pub fn failure(&self) -> Option<(Option<Stage>, FailureKind)> {
        match self.state {
            PipelineState::Failed { stage, kind } => Some((stage, kind)),
            _ => None,
        }
    }

    /// Advance to `next`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidState`] for transitions the state machine
    /// does not allow (skipping a stage, leaving a terminal state, ...).
    pub fn transition(&mut self, next: PipelineState) -> Result<()> {
        if !self.state.can_transition_to(&next) {
            return Err(RagError::InvalidState(format!(
                "cannot move from {:?} to {next:?}",
                self.state
            )));
        }
        self.state = next;
        Ok(())
    }

    /// Mark the run as failed. No-op once the run is terminal.
    pub fn fail(&mut self, stage: Option<Stage>, kind: FailureKind) {
        if !self.state.is_terminal() {
            self.state = PipelineState::Failed { stage, kind };
        }
    }

    /// Run `work` as `stage`, recording its wall-clock time.
    ///
    /// The timing entry is written before the outcome is inspected, so a
    /// failed stage still shows up in [`timings`](Self::timings). On failure
    /// the error is rewritten with [`RagError::at_stage`], logged once as
    /// `stage failed`, and the run moves to [`PipelineState::Failed`].
    /// Exceeding `timeout` counts as a failure of `stage`.
    pub async fn measure<T, F>(
        &mut self,
        stage: Stage,
        timeout: Option<Duration>,
        work: F,
    ) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.transition(stage.running_state())?;

        let started = Instant::now();
        let outcome = match timeout {
            Some(limit) => match tokio::time::timeout(limit, work).await {
                Ok(outcome) => outcome,
                Err(_) => Err(stage.failure(format!("timed out after {}s", limit.as_secs_f64()))),
            },
            None => work.await,
        };
        let elapsed_secs = started.elapsed().as_secs_f64();
        self.timings.record(stage, elapsed_secs);

        match outcome {
            Ok(value) => {
                info!(run_id = %self.run_id, stage = stage.key(), elapsed_secs, "stage finished");
                Ok(value)
            }
            Err(err) => {
                let err = err.at_stage(stage);
                let kind = err.kind();
                error!(
                    run_id = %self.run_id,
                    stage = stage.key(),
                    kind = kind.as_str(),
                    elapsed_secs,
                    error = %err,
                    "stage failed"
                );
                self.fail(Some(stage), kind);
                Err(err)
            }
        }
    }
}
