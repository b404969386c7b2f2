//! Drives one run through the fixed stage sequence.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::error::PipelineError;
use super::policy::{FailureAction, FailurePolicy};
use super::run::{PipelineRun, RunOutcome, RunReport, RunStatus, StageOutcome};
use super::stage::{ScriptSubmission, Stage};
use crate::fs_util;
use crate::generate::{AnswerGenerator, ScriptGenerator, ScriptRequest};
use crate::render::PageRenderer;
use crate::sandbox::{ExecutionResult, SandboxedExecutor};
use crate::store::{ArtifactStore, RunId};
use crate::submit::{Submission, Submitter};

/// An authorized request to run the pipeline against one page.
#[derive(Clone)]
pub struct RunRequest {
    pub email: String,
    pub secret: String,
    pub url: String,
}

impl std::fmt::Debug for RunRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunRequest")
            .field("email", &self.email)
            .field("secret", &"<redacted>")
            .field("url", &self.url)
            .finish()
    }
}

/// The external systems a run depends on.
#[derive(Clone)]
pub struct Collaborators {
    pub renderer: Arc<dyn PageRenderer>,
    pub scripts: Arc<dyn ScriptGenerator>,
    pub answers: Arc<dyn AnswerGenerator>,
    pub executor: Arc<SandboxedExecutor>,
    pub submitter: Arc<dyn Submitter>,
    pub store: Arc<dyn ArtifactStore>,
}

/// Sequences render → generate/execute collector → generate/execute
/// processor → answer → submit, persisting every intermediate artifact.
///
/// Execution failures go through the [`FailurePolicy`]; render and
/// generation failures end the run with a [`PipelineError`]. Either way the
/// run folder receives a `run.json` manifest.
pub struct PipelineOrchestrator {
    collaborators: Collaborators,
    policy: FailurePolicy,
}

impl PipelineOrchestrator {
    pub fn new(collaborators: Collaborators, policy: FailurePolicy) -> Self {
        Self {
            collaborators,
            policy,
        }
    }

    pub fn executor(&self) -> &SandboxedExecutor {
        &self.collaborators.executor
    }

    pub async fn run(&self, request: &RunRequest) -> Result<RunReport, PipelineError> {
        let store = &self.collaborators.store;
        let run_id = store.create_run().await?;
        let run_folder = store.run_path(&run_id);
        let mut run = PipelineRun::new(run_id, &request.url);
        info!(run_id = %run.id, url = %request.url, "Pipeline run started");

        let result = self.drive(&mut run, request).await;

        let status = match &result {
            Ok(RunOutcome::Completed { .. }) => RunStatus::Completed,
            Ok(RunOutcome::Halted {
                stage: Stage::ExecuteCollector,
                ..
            }) => RunStatus::CollectionFailed,
            Ok(RunOutcome::Halted { .. }) => RunStatus::ProcessingFailed,
            Err(_) => RunStatus::Errored,
        };
        if status != RunStatus::Completed {
            run.skip_remaining();
        }
        run.finish(status);
        self.persist_json(&run.id, "run.json", &run).await;

        match result {
            Ok(outcome) => {
                info!(run_id = %run.id, status = status.as_str(), "Pipeline run finished");
                Ok(RunReport {
                    run,
                    run_folder,
                    outcome,
                })
            }
            Err(e) => {
                error!(run_id = %run.id, error = %e, "Pipeline run errored");
                Err(e)
            }
        }
    }

    async fn drive(
        &self,
        run: &mut PipelineRun,
        request: &RunRequest,
    ) -> Result<RunOutcome, PipelineError> {
        let c = &self.collaborators;
        let url = request.url.as_str();
        let run_id = run.id.clone();

        let html = timed(run, Stage::Render, c.renderer.render(url)).await?;
        self.persist_text(&run_id, "page.html", &html).await;

        let collector_script = timed(
            run,
            Stage::GenerateCollector,
            c.scripts.generate(&ScriptRequest::collector(url, &html)),
        )
        .await
        .map_err(|source| PipelineError::Generation {
            stage: Stage::GenerateCollector,
            source,
        })?;
        self.persist_text(
            &run_id,
            &self.script_artifact(Stage::GenerateCollector),
            &collector_script,
        )
        .await;

        let collected = self
            .execute(
                run,
                ScriptSubmission::new(Stage::ExecuteCollector, collector_script),
                None,
            )
            .await;
        if let Some(error) = collected.error() {
            match self.policy.action_for(Stage::ExecuteCollector) {
                FailureAction::Halt => {
                    warn!(run_id = %run_id, error = %error, "Collection failed, halting run");
                    return Ok(RunOutcome::Halted {
                        stage: Stage::ExecuteCollector,
                        error: error.clone(),
                    });
                }
                FailureAction::Degrade => {
                    warn!(run_id = %run_id, error = %error, "Collection failed, continuing without data");
                }
            }
        }

        let files = match collected.artifact_root() {
            Some(root) => self.collected_files(root).await,
            None => Vec::new(),
        };

        let processor_script = match timed(
            run,
            Stage::GenerateProcessor,
            c.scripts
                .generate(&ScriptRequest::processor(url, &html, &files)),
        )
        .await
        {
            Ok(script) => script,
            Err(source) => {
                release(collected).await;
                return Err(PipelineError::Generation {
                    stage: Stage::GenerateProcessor,
                    source,
                });
            }
        };
        self.persist_text(
            &run_id,
            &self.script_artifact(Stage::GenerateProcessor),
            &processor_script,
        )
        .await;

        let processed = self
            .execute(
                run,
                ScriptSubmission::new(Stage::ExecuteProcessor, processor_script),
                collected.artifact_root(),
            )
            .await;
        release(collected).await;

        if let Some(error) = processed.error() {
            match self.policy.action_for(Stage::ExecuteProcessor) {
                FailureAction::Halt => {
                    warn!(run_id = %run_id, error = %error, "Processing failed, halting run");
                    let error = error.clone();
                    release(processed).await;
                    return Ok(RunOutcome::Halted {
                        stage: Stage::ExecuteProcessor,
                        error,
                    });
                }
                FailureAction::Degrade => {
                    warn!(run_id = %run_id, error = %error, "Processing failed, continuing with captured output");
                }
            }
        }
        let processing_stdout = processed.stdout.clone();
        release(processed).await;

        let answer = timed(
            run,
            Stage::GenerateAnswer,
            c.answers.generate(&processing_stdout, &html, url),
        )
        .await
        .map_err(|source| PipelineError::Generation {
            stage: Stage::GenerateAnswer,
            source,
        })?;
        self.persist_json(&run_id, "answer.json", &answer).await;

        let started = Instant::now();
        let submission = c
            .submitter
            .submit(
                &answer.submit_url,
                &Submission {
                    email: &request.email,
                    secret: &request.secret,
                    url,
                    answer: &answer.answer,
                },
            )
            .await;
        match submission.status_code {
            Some(_) => run.record(Stage::Submit, StageOutcome::Ok, None, started.elapsed()),
            None => run.record(
                Stage::Submit,
                StageOutcome::Failed,
                Some(submission.response.clone()),
                started.elapsed(),
            ),
        }
        self.persist_json(&run_id, "submission.json", &submission)
            .await;

        Ok(RunOutcome::Completed { answer, submission })
    }

    /// Run one script and archive everything it produced.
    async fn execute(
        &self,
        run: &mut PipelineRun,
        submission: ScriptSubmission,
        inputs: Option<&Path>,
    ) -> ExecutionResult {
        let stage = submission.stage;
        let dir = stage.script_name();
        let started = Instant::now();

        let result = self
            .collaborators
            .executor
            .execute(&submission, inputs)
            .await;

        self.persist_text(&run.id, &format!("{dir}/stdout.txt"), &result.stdout)
            .await;
        self.persist_text(&run.id, &format!("{dir}/stderr.txt"), &result.stderr)
            .await;

        match (result.artifact_root(), result.error()) {
            (Some(root), _) => {
                self.persist_tree(&run.id, &format!("{dir}/output"), root)
                    .await;
                run.record(stage, StageOutcome::Ok, None, started.elapsed());
            }
            (None, error) => run.record(
                stage,
                StageOutcome::Failed,
                error.map(ToString::to_string),
                started.elapsed(),
            ),
        }
        result
    }

    /// Names produced by collection, without the collector's own entry file.
    async fn collected_files(&self, root: &Path) -> Vec<String> {
        let entry = self
            .collaborators
            .executor
            .entry_file_name(Stage::ExecuteCollector);
        match fs_util::list_names(root).await {
            Ok(names) => names.into_iter().filter(|n| *n != entry).collect(),
            Err(e) => {
                warn!(root = %root.display(), error = %e, "Failed to list collected files");
                Vec::new()
            }
        }
    }

    fn script_artifact(&self, stage: Stage) -> String {
        format!(
            "{}/script.{}",
            stage.script_name(),
            self.collaborators.executor.config().script_extension
        )
    }

    async fn persist_text(&self, run: &RunId, name: &str, contents: &str) {
        if let Err(e) = self.collaborators.store.put_text(run, name, contents).await {
            warn!(run_id = %run, artifact = name, error = %e, "Failed to persist artifact");
        }
    }

    async fn persist_json<T: Serialize + Sync>(&self, run: &RunId, name: &str, value: &T) {
        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(e) => {
                warn!(run_id = %run, artifact = name, error = %e, "Failed to serialize artifact");
                return;
            }
        };
        if let Err(e) = self.collaborators.store.put_json(run, name, &value).await {
            warn!(run_id = %run, artifact = name, error = %e, "Failed to persist artifact");
        }
    }

    async fn persist_tree(&self, run: &RunId, name: &str, source: &Path) {
        match self.collaborators.store.put_tree(run, name, source).await {
            Ok(files) => debug!(run_id = %run, artifact = name, files, "Archived workspace"),
            Err(e) => {
                warn!(run_id = %run, artifact = name, error = %e, "Failed to archive workspace")
            }
        }
    }
}

/// Await a stage's work and record its outcome on the run.
async fn timed<T, E, F>(run: &mut PipelineRun, stage: Stage, work: F) -> Result<T, E>
where
    E: std::fmt::Display,
    F: Future<Output = Result<T, E>>,
{
    let started = Instant::now();
    debug!(run_id = %run.id, stage = %stage, "Stage started");
    let result = work.await;
    match &result {
        Ok(_) => run.record(stage, StageOutcome::Ok, None, started.elapsed()),
        Err(e) => {
            warn!(run_id = %run.id, stage = %stage, error = %e, "Stage failed");
            run.record(stage, StageOutcome::Failed, Some(e.to_string()), started.elapsed());
        }
    }
    result
}

/// Hand an execution's workspace back to its retention policy.
async fn release(result: ExecutionResult) {
    if let Ok(workspace) = result.outcome {
        workspace.release().await;
    }
}
