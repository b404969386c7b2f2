//! Common test utilities: in-process fakes for every collaborator.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use tempfile::TempDir;

use pipewright::config::SandboxConfig;
use pipewright::generate::{
    Answer, AnswerGenerator, GenerationError, ScriptGenerator, ScriptKind, ScriptRequest,
};
use pipewright::pipeline::{Collaborators, FailurePolicy, PipelineOrchestrator};
use pipewright::render::{PageRenderer, RenderError};
use pipewright::sandbox::{ProcessSandbox, SandboxedExecutor, WorkspaceRetention};
use pipewright::server::{self, AppState};
use pipewright::store::FileArtifactStore;
use pipewright::submit::{Submission, SubmissionResult, Submitter};

pub const PAGE_URL: &str = "https://quiz.test/q1";
pub const SUBMIT_URL: &str = "https://quiz.test/submit";
pub const PAGE_HTML: &str = "<html><body>What is the sum?</body></html>";
pub const SECRET: &str = "s3cret";

// ============================================================================
// Renderer
// ============================================================================

pub struct StaticRenderer {
    pub fail: bool,
}

#[async_trait]
impl PageRenderer for StaticRenderer {
    async fn render(&self, _url: &str) -> Result<String, RenderError> {
        if self.fail {
            return Err(RenderError::Status { status: 502 });
        }
        Ok(PAGE_HTML.to_string())
    }
}

// ============================================================================
// Script generator
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptCall {
    Collector,
    Processor { files: Vec<String> },
}

/// Hands out fixed scripts and records every request.
pub struct FixedScripts {
    pub collector: String,
    pub processor: String,
    pub fail_collector: bool,
    pub calls: Mutex<Vec<ScriptCall>>,
}

impl FixedScripts {
    pub fn new(collector: &str, processor: &str) -> Self {
        Self {
            collector: collector.to_string(),
            processor: processor.to_string(),
            fail_collector: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<ScriptCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ScriptGenerator for FixedScripts {
    async fn generate(&self, request: &ScriptRequest<'_>) -> Result<String, GenerationError> {
        assert_eq!(request.html, PAGE_HTML);
        match request.kind {
            ScriptKind::Collector => {
                self.calls.lock().unwrap().push(ScriptCall::Collector);
                if self.fail_collector {
                    return Err(GenerationError::MissingField {
                        field: "data_collection_script",
                    });
                }
                Ok(self.collector.clone())
            }
            ScriptKind::Processor { files } => {
                self.calls.lock().unwrap().push(ScriptCall::Processor {
                    files: files.to_vec(),
                });
                Ok(self.processor.clone())
            }
        }
    }
}

// ============================================================================
// Answer generator
// ============================================================================

/// Uses the trimmed processing stdout as the answer.
#[derive(Default)]
pub struct EchoAnswers {
    pub seen_stdout: Mutex<Vec<String>>,
}

impl EchoAnswers {
    pub fn seen(&self) -> Vec<String> {
        self.seen_stdout.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnswerGenerator for EchoAnswers {
    async fn generate(
        &self,
        processing_stdout: &str,
        _html: &str,
        _url: &str,
    ) -> Result<Answer, GenerationError> {
        self.seen_stdout
            .lock()
            .unwrap()
            .push(processing_stdout.to_string());
        Ok(Answer {
            answer: serde_json::Value::String(processing_stdout.trim().to_string()),
            submit_url: SUBMIT_URL.to_string(),
        })
    }
}

// ============================================================================
// Submitter
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct SubmittedAnswer {
    pub destination: String,
    pub email: String,
    pub secret: String,
    pub url: String,
    pub answer: serde_json::Value,
}

#[derive(Default)]
pub struct RecordingSubmitter {
    pub submitted: Mutex<Vec<SubmittedAnswer>>,
}

impl RecordingSubmitter {
    pub fn submitted(&self) -> Vec<SubmittedAnswer> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl Submitter for RecordingSubmitter {
    async fn submit(&self, destination: &str, submission: &Submission<'_>) -> SubmissionResult {
        self.submitted.lock().unwrap().push(SubmittedAnswer {
            destination: destination.to_string(),
            email: submission.email.to_string(),
            secret: submission.secret.to_string(),
            url: submission.url.to_string(),
            answer: submission.answer.clone(),
        });
        SubmissionResult {
            status_code: Some(200),
            response: r#"{"correct": true}"#.to_string(),
        }
    }
}

// ============================================================================
// Harness
// ============================================================================

/// A pipeline wired with fakes, running real `sh` scripts in a temp dir.
pub struct Harness {
    pub tmp: TempDir,
    pub renderer: Arc<StaticRenderer>,
    pub scripts: Arc<FixedScripts>,
    pub answers: Arc<EchoAnswers>,
    pub submitter: Arc<RecordingSubmitter>,
    pub store: Arc<FileArtifactStore>,
    pub sandbox: SandboxConfig,
    pub policy: FailurePolicy,
}

impl Harness {
    pub fn new(collector: &str, processor: &str) -> Self {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(FileArtifactStore::new(tmp.path().join("runs")));
        let sandbox = SandboxConfig {
            interpreter: "sh".to_string(),
            script_extension: "sh".to_string(),
            timeout_seconds: 10,
            workspace_root: Some(tmp.path().join("workspaces")),
            ..Default::default()
        };
        Self {
            tmp,
            renderer: Arc::new(StaticRenderer { fail: false }),
            scripts: Arc::new(FixedScripts::new(collector, processor)),
            answers: Arc::new(EchoAnswers::default()),
            submitter: Arc::new(RecordingSubmitter::default()),
            store,
            sandbox,
            policy: FailurePolicy::default(),
        }
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.sandbox.timeout_seconds = seconds;
        self
    }

    pub fn with_retention(mut self, retention: WorkspaceRetention) -> Self {
        self.sandbox.workspace_retention = retention;
        self
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_failing_renderer(mut self) -> Self {
        self.renderer = Arc::new(StaticRenderer { fail: true });
        self
    }

    pub fn with_failing_collector_generation(mut self) -> Self {
        let mut scripts = FixedScripts::new("", "");
        scripts.fail_collector = true;
        self.scripts = Arc::new(scripts);
        self
    }

    pub fn orchestrator(&self) -> PipelineOrchestrator {
        let executor = SandboxedExecutor::new(
            Arc::new(ProcessSandbox::default()),
            self.sandbox.clone(),
        );
        PipelineOrchestrator::new(
            Collaborators {
                renderer: self.renderer.clone(),
                scripts: self.scripts.clone(),
                answers: self.answers.clone(),
                executor: Arc::new(executor),
                submitter: self.submitter.clone(),
                store: self.store.clone(),
            },
            self.policy,
        )
    }

    pub fn app(&self) -> Router {
        self.app_with_timeout(60)
    }

    pub fn app_with_timeout(&self, request_timeout_seconds: u64) -> Router {
        let state = AppState {
            orchestrator: Arc::new(self.orchestrator()),
            secret: Some(SECRET.to_string()),
            max_connections: 8,
        };
        server::build_app(state, request_timeout_seconds)
    }

    pub fn runs_dir(&self) -> PathBuf {
        self.store.runs_dir().to_path_buf()
    }

    pub fn workspaces_dir(&self) -> PathBuf {
        self.tmp.path().join("workspaces")
    }
}

/// Names of the entries directly under `dir`, sorted. Missing dir ⇒ empty.
pub fn entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|rd| {
            rd.filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

pub fn read_json(path: &Path) -> serde_json::Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}
