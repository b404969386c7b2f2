//! Run state and the reports handed back to callers.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::stage::Stage;
use crate::generate::Answer;
use crate::sandbox::ExecutionError;
use crate::store::RunId;
use crate::submit::SubmissionResult;

/// Terminal (or in-flight) status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    CollectionFailed,
    ProcessingFailed,
    Errored,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::CollectionFailed => "collection_failed",
            RunStatus::ProcessingFailed => "processing_failed",
            RunStatus::Errored => "errored",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageOutcome {
    Ok,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageRecord {
    pub stage: Stage,
    pub outcome: StageOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// One pipeline run as recorded in `run.json`.
///
/// Only the orchestrator mutates it; callers receive it by value once the
/// run is over.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineRun {
    pub id: RunId,
    pub url: String,
    pub status: RunStatus,
    pub stages: Vec<StageRecord>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl PipelineRun {
    pub fn new(id: RunId, url: impl Into<String>) -> Self {
        Self {
            id,
            url: url.into(),
            status: RunStatus::Running,
            stages: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub(crate) fn record(
        &mut self,
        stage: Stage,
        outcome: StageOutcome,
        error: Option<String>,
        elapsed: Duration,
    ) {
        self.stages.push(StageRecord {
            stage,
            outcome,
            error,
            duration_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        });
    }

    /// Mark every stage after the last recorded one as skipped.
    pub(crate) fn skip_remaining(&mut self) {
        let done = self.stages.len();
        for stage in Stage::ALL.iter().skip(done) {
            self.record(*stage, StageOutcome::Skipped, None, Duration::ZERO);
        }
    }

    pub(crate) fn finish(&mut self, status: RunStatus) {
        self.status = status;
        self.finished_at = Some(Utc::now());
    }

    pub fn stage(&self, stage: Stage) -> Option<&StageRecord> {
        self.stages.iter().find(|r| r.stage == stage)
    }

    /// Whether `stage` was actually attempted.
    pub fn reached(&self, stage: Stage) -> bool {
        self.stage(stage)
            .is_some_and(|r| r.outcome != StageOutcome::Skipped)
    }
}

/// How a run ended, from the caller's point of view.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Completed {
        answer: Answer,
        submission: SubmissionResult,
    },
    /// An execution stage failed under a `halt` policy.
    Halted { stage: Stage, error: ExecutionError },
}

/// Everything a caller gets back from a finished run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run: PipelineRun,
    pub run_folder: PathBuf,
    pub outcome: RunOutcome,
}

impl RunReport {
    pub fn status(&self) -> RunStatus {
        self.run.status
    }
}
