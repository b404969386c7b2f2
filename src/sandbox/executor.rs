use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::denylist::{self, Verdict};
use super::workspace::Workspace;
use super::{ExecCommand, Sandbox, SandboxError};
use crate::config::SandboxConfig;
use crate::pipeline::{ScriptSubmission, Stage};

/// Fallback search path when the server itself has no `PATH`.
const DEFAULT_PATH: &str = "/usr/local/bin:/usr/bin:/bin";

/// Why an execution produced no artifact root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionError {
    #[error("unsafe script rejected (matched '{pattern}')")]
    Unsafe { pattern: String },

    #[error("script timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("script could not be launched: {message}")]
    Launch { message: String },

    #[error("workspace setup failed: {message}")]
    Workspace { message: String },
}

/// Captured output of one script execution.
///
/// `outcome` holds the workspace (the produced artifact root) on success and
/// the failure reason otherwise, never both. The exit status is captured for
/// logging only; a non-zero exit is still a success.
#[derive(Debug)]
pub struct ExecutionResult {
    pub stage: Stage,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub outcome: Result<Workspace, ExecutionError>,
}

impl ExecutionResult {
    fn failed(stage: Stage, error: ExecutionError) -> Self {
        Self {
            stage,
            stdout: String::new(),
            stderr: String::new(),
            exit_code: None,
            outcome: Err(error),
        }
    }

    pub fn artifact_root(&self) -> Option<&Path> {
        self.outcome.as_ref().ok().map(Workspace::path)
    }

    pub fn error(&self) -> Option<&ExecutionError> {
        self.outcome.as_ref().err()
    }
}

/// Runs generated scripts: denylist gate, fresh workspace, optional input
/// seeding, then one child process under the configured timeout.
pub struct SandboxedExecutor {
    sandbox: Arc<dyn Sandbox>,
    config: SandboxConfig,
    /// Bounds simultaneously running scripts across all pipeline runs.
    admission: Option<Arc<Semaphore>>,
}

impl SandboxedExecutor {
    pub fn new(sandbox: Arc<dyn Sandbox>, config: SandboxConfig) -> Self {
        let admission = config
            .max_concurrent_executions
            .map(|limit| Arc::new(Semaphore::new(limit.max(1))));
        Self {
            sandbox,
            config,
            admission,
        }
    }

    pub fn mode(&self) -> &'static str {
        self.sandbox.mode()
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Maximum concurrent executions, or `None` when unbounded.
    pub fn admission_limit(&self) -> Option<usize> {
        self.config.max_concurrent_executions.map(|n| n.max(1))
    }

    /// Name of the entry file written into the workspace for `stage`.
    pub fn entry_file_name(&self, stage: Stage) -> String {
        format!("{}.{}", stage.script_name(), self.config.script_extension)
    }

    /// Execute a script, optionally seeding its workspace from `inputs`.
    ///
    /// Never fails: every problem is reported through [`ExecutionResult::outcome`]
    /// so the caller can apply its own halt/degrade policy.
    pub async fn execute(
        &self,
        submission: &ScriptSubmission,
        inputs: Option<&Path>,
    ) -> ExecutionResult {
        let stage = submission.stage;

        if let Verdict::Unsafe { pattern } = denylist::validate(&submission.script) {
            warn!(stage = %stage, pattern, "Rejected unsafe script");
            return ExecutionResult::failed(
                stage,
                ExecutionError::Unsafe {
                    pattern: pattern.to_string(),
                },
            );
        }

        let _permit = match &self.admission {
            Some(semaphore) => match semaphore.acquire().await {
                Ok(permit) => Some(permit),
                Err(_) => {
                    return ExecutionResult::failed(
                        stage,
                        ExecutionError::Launch {
                            message: "executor is shutting down".to_string(),
                        },
                    );
                }
            },
            None => None,
        };

        let workspace = match Workspace::create(
            &self.config.workspace_root(),
            stage.script_name(),
            self.config.workspace_retention,
        )
        .await
        {
            Ok(ws) => ws,
            Err(e) => return workspace_failure(stage, &e),
        };
        if let Err(e) = self.prepare_workspace(&workspace, submission, inputs).await {
            workspace.release().await;
            return workspace_failure(stage, &e);
        }

        let command = self.command_for(stage, &workspace);
        debug!(stage = %stage, workspace = %workspace.path().display(), "Executing script");

        match self.sandbox.exec(&command).await {
            Ok(output) => {
                info!(
                    stage = %stage,
                    exit_code = output.exit_code,
                    stdout_bytes = output.stdout.len(),
                    stderr_bytes = output.stderr.len(),
                    "Script finished"
                );
                ExecutionResult {
                    stage,
                    stdout: output.stdout,
                    stderr: output.stderr,
                    exit_code: Some(output.exit_code),
                    outcome: Ok(workspace),
                }
            }
            Err(e) => {
                workspace.release().await;
                let error = match e {
                    SandboxError::Timeout(limit) => ExecutionError::Timeout {
                        timeout_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                    },
                    other => ExecutionError::Launch {
                        message: other.to_string(),
                    },
                };
                warn!(stage = %stage, error = %error, "Script execution failed");
                ExecutionResult::failed(stage, error)
            }
        }
    }

    /// Seed inputs and write the entry file into a freshly created workspace.
    async fn prepare_workspace(
        &self,
        workspace: &Workspace,
        submission: &ScriptSubmission,
        inputs: Option<&Path>,
    ) -> std::io::Result<()> {
        let stage = submission.stage;
        if let Some(source) = inputs {
            let copied = workspace.seed_from(source).await?;
            debug!(stage = %stage, files = copied, source = %source.display(), "Seeded workspace");
        }

        workspace
            .write_file(&self.entry_file_name(stage), &submission.script)
            .await?;
        Ok(())
    }

    fn command_for(&self, stage: Stage, workspace: &Workspace) -> ExecCommand {
        let entry = workspace.path().join(self.entry_file_name(stage));
        let mut args = self.config.interpreter_args.clone();
        args.push(entry.to_string_lossy().into_owned());

        ExecCommand {
            program: self.config.interpreter.clone(),
            args,
            cwd: workspace.path().to_path_buf(),
            env: self.child_env(workspace.path()),
            timeout: self.config.timeout(),
        }
    }

    /// Minimal child environment: search path, locale, home and temp pointed
    /// at the workspace, plus explicitly configured passthrough variables.
    fn child_env(&self, workspace: &Path) -> Vec<(String, String)> {
        let workspace = workspace.to_string_lossy().into_owned();
        let mut env = vec![
            (
                "PATH".to_string(),
                std::env::var("PATH").unwrap_or_else(|_| DEFAULT_PATH.to_string()),
            ),
            (
                "LANG".to_string(),
                std::env::var("LANG").unwrap_or_else(|_| "C.UTF-8".to_string()),
            ),
            ("HOME".to_string(), workspace.clone()),
            ("TMPDIR".to_string(), workspace),
        ];
        for name in &self.config.env_passthrough {
            if let Ok(value) = std::env::var(name) {
                env.push((name.clone(), value));
            }
        }
        env
    }
}

fn workspace_failure(stage: Stage, error: &std::io::Error) -> ExecutionResult {
    warn!(stage = %stage, error = %error, "Failed to prepare workspace");
    ExecutionResult::failed(
        stage,
        ExecutionError::Workspace {
            message: error.to_string(),
        },
    )
}
