//! CLI command implementations.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use pipewright::config::{self, Config, RendererMode};
use pipewright::generate::{LlmAnswerGenerator, LlmScriptGenerator, LlmSettings};
use pipewright::llm::{LLMProvider, OpenAICompatibleProvider};
use pipewright::pipeline::{Collaborators, PipelineOrchestrator};
use pipewright::render::{ChromiumRenderer, HttpRenderer, PageRenderer};
use pipewright::sandbox::{ProcessSandbox, Sandbox, SandboxedExecutor};
use pipewright::store::FileArtifactStore;
use pipewright::submit::HttpSubmitter;

pub mod check_script;
pub mod run;
pub mod serve;

/// Wire the configured collaborators into an orchestrator.
///
/// Relative paths in the config are resolved against the config file. Also
/// returns the concrete artifact store so callers can run retention sweeps.
pub fn build_orchestrator(
    config: &Config,
    config_path: &Path,
) -> Result<(PipelineOrchestrator, Arc<FileArtifactStore>)> {
    let sandbox: Arc<dyn Sandbox> = Arc::new(ProcessSandbox::new(config.sandbox.limits.clone()));

    let mut sandbox_config = config.sandbox.clone();
    if let Some(root) = &sandbox_config.workspace_root {
        sandbox_config.workspace_root = Some(config::resolve_path(config_path, root));
    }
    let executor = Arc::new(SandboxedExecutor::new(sandbox.clone(), sandbox_config));

    let llm_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.llm.request_timeout_seconds))
        .build()
        .context("Failed to build LLM HTTP client")?;
    let api_key = config
        .llm
        .api_key
        .clone()
        .or_else(|| std::env::var("OPENAI_API_KEY").ok());
    let provider: Arc<dyn LLMProvider> = Arc::new(OpenAICompatibleProvider::new(
        llm_client,
        &config.llm.base_url,
        api_key,
    ));
    let settings = LlmSettings::from(&config.llm);

    let renderer: Arc<dyn PageRenderer> = match config.renderer.mode {
        RendererMode::Chromium => {
            Arc::new(ChromiumRenderer::new(sandbox, config.renderer.clone()))
        }
        RendererMode::Http => {
            let client = reqwest::Client::builder()
                .timeout(Duration::from_secs(config.renderer.timeout_seconds))
                .build()
                .context("Failed to build renderer HTTP client")?;
            Arc::new(HttpRenderer::new(client))
        }
    };

    let submit_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.submission.timeout_seconds))
        .build()
        .context("Failed to build submission HTTP client")?;

    let runs_dir = config
        .artifacts
        .runs_dir
        .as_deref()
        .unwrap_or(Path::new(config::DEFAULT_RUNS_DIR));
    let store = Arc::new(FileArtifactStore::new(config::resolve_path(
        config_path,
        runs_dir,
    )));

    info!(
        sandbox = executor.mode(),
        renderer = ?config.renderer.mode,
        model = %settings.model,
        runs_dir = %store.runs_dir().display(),
        "Pipeline configured"
    );

    let orchestrator = PipelineOrchestrator::new(
        Collaborators {
            renderer,
            scripts: Arc::new(LlmScriptGenerator::new(provider.clone(), settings.clone())),
            answers: Arc::new(LlmAnswerGenerator::new(provider, settings)),
            executor,
            submitter: Arc::new(HttpSubmitter::new(submit_client)),
            store: store.clone(),
        },
        config.pipeline.on_failure,
    );
    Ok((orchestrator, store))
}
