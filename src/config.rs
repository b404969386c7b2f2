use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tokio::fs;

use crate::pipeline::FailurePolicy;
use crate::sandbox::{ResourceLimits, WorkspaceRetention};

// ============================================================================
// Config (root)
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub renderer: RendererConfig,
    #[serde(default)]
    pub sandbox: SandboxConfig,
    #[serde(default)]
    pub artifacts: ArtifactsConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub submission: SubmissionConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Yaml(#[from] serde_saphyr::Error),

    #[error("environment variable '{0}' is not set")]
    MissingEnvVar(String),

    #[error("unclosed variable reference '${{' (missing '}}')")]
    UnclosedVarReference,

    #[error("{field} must be greater than zero")]
    ZeroTimeout { field: &'static str },
}

impl Config {
    /// Load the config file, falling back to defaults when it does not exist.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = match fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(ConfigError::Io(e)),
        };
        Self::parse(&contents)
    }

    /// Parse config text after environment variable expansion.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(contents)?;
        let config: Self = serde_saphyr::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }

    /// A zero timeout would fail every call it guards.
    fn validate(&self) -> Result<(), ConfigError> {
        let timeouts = [
            ("sandbox.timeout_seconds", self.sandbox.timeout_seconds),
            ("renderer.timeout_seconds", self.renderer.timeout_seconds),
            ("llm.request_timeout_seconds", self.llm.request_timeout_seconds),
            ("submission.timeout_seconds", self.submission.timeout_seconds),
        ];
        match timeouts.into_iter().find(|(_, secs)| *secs == 0) {
            Some((field, _)) => Err(ConfigError::ZeroTimeout { field }),
            None => Ok(()),
        }
    }
}

/// Resolve a path relative to the config file directory.
///
/// Absolute paths are returned unchanged.
pub fn resolve_path(config_path: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }

    let config_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
    config_dir.join(path)
}

// ============================================================================
// Defaults
// ============================================================================

/// Default config file name.
pub const DEFAULT_CONFIG_FILE: &str = "pipewright.yaml";
/// Default runs directory (relative to the config file).
pub const DEFAULT_RUNS_DIR: &str = "runs";

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    900
}

fn default_max_connections() -> usize {
    64
}

fn default_llm_base_url() -> String {
    crate::llm::defaults::OPENAI.to_string()
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_llm_timeout() -> u64 {
    180
}

fn default_renderer_command() -> String {
    "chromium".to_string()
}

fn default_settle_seconds() -> u64 {
    15
}

fn default_render_timeout() -> u64 {
    120
}

fn default_interpreter() -> String {
    "python3".to_string()
}

fn default_script_extension() -> String {
    "py".to_string()
}

fn default_exec_timeout() -> u64 {
    crate::sandbox::DEFAULT_EXEC_TIMEOUT.as_secs()
}

fn default_submission_timeout() -> u64 {
    30
}

// ============================================================================
// Environment Variable Expansion
// ============================================================================

/// Expand environment variables in a string.
///
/// Supports the following syntax (shell-compatible):
/// - `${VAR}` - Required variable, errors if not set
/// - `${VAR:-default}` - Optional variable with default value
/// - `${VAR:-}` - Optional variable, empty string if not set
/// - `$$` - Escaped `$` (only needed before `{` to prevent expansion)
///
/// Nested expansion such as `${VAR:-${DEFAULT}}` is not supported.
///
/// ```yaml
/// server:
///   secret: ${PIPEWRIGHT_SECRET}
/// llm:
///   api_key: ${OPENAI_API_KEY:-}
/// ```
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }
        match chars.peek() {
            Some('$') => {
                chars.next();
                result.push('$');
            }
            Some('{') => {
                chars.next();
                let expanded = parse_var_reference(&mut chars)?;
                result.push_str(&expanded);
            }
            _ => result.push('$'),
        }
    }

    Ok(result)
}

/// Parse a variable reference after seeing `${`.
fn parse_var_reference(
    chars: &mut std::iter::Peekable<std::str::Chars>,
) -> Result<String, ConfigError> {
    let mut var_name = String::new();
    let mut default_value: Option<String> = None;
    let mut found_closing_brace = false;

    while let Some(&c) = chars.peek() {
        chars.next();
        match c {
            '}' => {
                found_closing_brace = true;
                break;
            }
            ':' if default_value.is_none() => {
                if chars.peek() == Some(&'-') {
                    chars.next();
                    default_value = Some(String::new());
                } else {
                    var_name.push(':');
                }
            }
            _ => match default_value.as_mut() {
                Some(default) => default.push(c),
                None => var_name.push(c),
            },
        }
    }

    if !found_closing_brace {
        return Err(ConfigError::UnclosedVarReference);
    }

    match std::env::var(&var_name) {
        Ok(value) => Ok(value),
        Err(_) => default_value.ok_or(ConfigError::MissingEnvVar(var_name)),
    }
}

// ============================================================================
// ServerConfig
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Shared secret every inbound run request must carry.
    /// When unset, all run requests are rejected.
    #[serde(default)]
    pub secret: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_seconds: default_request_timeout(),
            max_connections: default_max_connections(),
            secret: None,
        }
    }
}

// ============================================================================
// LlmConfig
// ============================================================================

/// OpenAI-compatible chat completions endpoint used for script and answer generation.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_llm_timeout")]
    pub request_timeout_seconds: u64,
    #[serde(default)]
    pub temperature: Option<f32>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            api_key: None,
            request_timeout_seconds: default_llm_timeout(),
            temperature: None,
        }
    }
}

// ============================================================================
// RendererConfig
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RendererMode {
    /// Headless Chromium with a virtual-time settle budget.
    #[default]
    Chromium,
    /// Plain HTTP GET, no script execution.
    Http,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RendererConfig {
    #[serde(default)]
    pub mode: RendererMode,
    /// Chromium binary (name on PATH or absolute path).
    #[serde(default = "default_renderer_command")]
    pub command: String,
    #[serde(default = "default_settle_seconds")]
    pub settle_seconds: u64,
    #[serde(default = "default_render_timeout")]
    pub timeout_seconds: u64,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            mode: RendererMode::default(),
            command: default_renderer_command(),
            settle_seconds: default_settle_seconds(),
            timeout_seconds: default_render_timeout(),
        }
    }
}

// ============================================================================
// SandboxConfig
// ============================================================================

/// Script execution settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SandboxConfig {
    /// Program that runs the entry file (e.g. "python3").
    #[serde(default = "default_interpreter")]
    pub interpreter: String,
    /// Arguments placed before the entry file path.
    #[serde(default)]
    pub interpreter_args: Vec<String>,
    /// Extension of the entry file written into each workspace.
    #[serde(default = "default_script_extension")]
    pub script_extension: String,
    #[serde(default = "default_exec_timeout")]
    pub timeout_seconds: u64,
    /// Parent directory for workspaces. Defaults to the system temp dir.
    #[serde(default)]
    pub workspace_root: Option<PathBuf>,
    /// Extra environment variables copied from the parent process.
    #[serde(default)]
    pub env_passthrough: Vec<String>,
    #[serde(default)]
    pub limits: ResourceLimits,
    /// Upper bound on simultaneously running scripts. Unbounded when unset.
    #[serde(default)]
    pub max_concurrent_executions: Option<usize>,
    #[serde(default)]
    pub workspace_retention: WorkspaceRetention,
}

impl SandboxConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn workspace_root(&self) -> PathBuf {
        self.workspace_root
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
            interpreter_args: Vec::new(),
            script_extension: default_script_extension(),
            timeout_seconds: default_exec_timeout(),
            workspace_root: None,
            env_passthrough: Vec::new(),
            limits: ResourceLimits::default(),
            max_concurrent_executions: None,
            workspace_retention: WorkspaceRetention::default(),
        }
    }
}

// ============================================================================
// ArtifactsConfig
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArtifactsConfig {
    /// Where run directories are created (relative to the config file).
    #[serde(default)]
    pub runs_dir: Option<PathBuf>,
    /// Run directories older than this are swept. 0 keeps them forever.
    #[serde(default)]
    pub retention_hours: u64,
}

// ============================================================================
// PipelineConfig
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub on_failure: FailurePolicy,
}

// ============================================================================
// SubmissionConfig
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct SubmissionConfig {
    #[serde(default = "default_submission_timeout")]
    pub timeout_seconds: u64,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_submission_timeout(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;
    use crate::pipeline::FailureAction;

    #[tokio::test]
    async fn test_load_missing_file_uses_defaults() {
        let config = Config::load("/nonexistent/pipewright.yaml").await.unwrap();
        assert_eq!(config.server.port, 8080);
        assert!(config.server.secret.is_none());
        assert_eq!(config.sandbox.interpreter, "python3");
        assert_eq!(config.sandbox.timeout_seconds, 60);
        assert_eq!(config.renderer.mode, RendererMode::Chromium);
        assert_eq!(config.pipeline.on_failure.collector, FailureAction::Halt);
        assert_eq!(config.pipeline.on_failure.processor, FailureAction::Degrade);
    }

    #[test]
    fn test_zero_script_timeout_is_rejected() {
        let err = Config::parse("sandbox:\n  timeout_seconds: 0\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::ZeroTimeout {
                field: "sandbox.timeout_seconds"
            }
        ));
    }

    #[test]
    fn test_zero_submission_timeout_is_rejected() {
        let err = Config::parse("submission:\n  timeout_seconds: 0\n").unwrap_err();
        assert_eq!(
            err.to_string(),
            "submission.timeout_seconds must be greater than zero"
        );
    }

    #[tokio::test]
    async fn test_load_full_config() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
server:
  port: 9000
  secret: "s3cret"
llm:
  base_url: "http://localhost:11434/v1"
  model: "llama3"
renderer:
  mode: http
sandbox:
  interpreter: "sh"
  timeout_seconds: 5
  env_passthrough: ["HTTP_PROXY"]
  max_concurrent_executions: 2
  workspace_retention: delete_after_archival
  limits:
    cpu_seconds: 30
    max_open_files: 256
artifacts:
  runs_dir: "/var/lib/pipewright/runs"
  retention_hours: 24
pipeline:
  on_failure:
    processor: halt
"#
        )
        .unwrap();

        let config = Config::load(file.path()).await.unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.secret.as_deref(), Some("s3cret"));
        assert_eq!(config.llm.model, "llama3");
        assert_eq!(config.renderer.mode, RendererMode::Http);
        assert_eq!(config.sandbox.interpreter, "sh");
        assert_eq!(config.sandbox.timeout(), Duration::from_secs(5));
        assert_eq!(config.sandbox.env_passthrough, vec!["HTTP_PROXY"]);
        assert_eq!(config.sandbox.max_concurrent_executions, Some(2));
        assert_eq!(
            config.sandbox.workspace_retention,
            WorkspaceRetention::DeleteAfterArchival
        );
        assert_eq!(config.sandbox.limits.cpu_seconds, Some(30));
        assert_eq!(config.sandbox.limits.max_open_files, Some(256));
        assert!(config.sandbox.limits.memory_bytes.is_none());
        assert_eq!(config.artifacts.retention_hours, 24);
        assert_eq!(config.pipeline.on_failure.collector, FailureAction::Halt);
        assert_eq!(config.pipeline.on_failure.processor, FailureAction::Halt);
    }

    #[test]
    fn test_workspace_root_defaults_to_temp_dir() {
        let config = SandboxConfig::default();
        assert_eq!(config.workspace_root(), std::env::temp_dir());
    }

    #[test]
    fn test_resolve_path_absolute() {
        let result = resolve_path(Path::new("/etc/pipewright.yaml"), Path::new("/srv/runs"));
        assert_eq!(result, PathBuf::from("/srv/runs"));
    }

    #[test]
    fn test_resolve_path_relative() {
        let result = resolve_path(Path::new("/etc/pw/pipewright.yaml"), Path::new("runs"));
        assert_eq!(result, PathBuf::from("/etc/pw/runs"));
    }

    #[test]
    fn test_resolve_path_config_in_current_dir() {
        let result = resolve_path(Path::new("pipewright.yaml"), Path::new("runs"));
        assert_eq!(result, PathBuf::from("runs"));
    }

    // ========================================================================
    // Environment Variable Expansion Tests
    // ========================================================================

    #[test]
    fn test_expand_env_vars_no_vars() {
        let input = "plain string without variables";
        assert_eq!(expand_env_vars(input).unwrap(), input);
    }

    #[test]
    fn test_expand_env_vars_required_var() {
        // SAFETY: Single-threaded test
        unsafe { std::env::set_var("PW_TEST_VAR_REQUIRED", "test_value") };
        let result = expand_env_vars("prefix ${PW_TEST_VAR_REQUIRED} suffix").unwrap();
        assert_eq!(result, "prefix test_value suffix");
        unsafe { std::env::remove_var("PW_TEST_VAR_REQUIRED") };
    }

    #[test]
    fn test_expand_env_vars_missing_required_var() {
        // SAFETY: Single-threaded test
        unsafe { std::env::remove_var("PW_MISSING_VAR_12345") };
        match expand_env_vars("value: ${PW_MISSING_VAR_12345}") {
            Err(ConfigError::MissingEnvVar(name)) => assert_eq!(name, "PW_MISSING_VAR_12345"),
            other => panic!("expected MissingEnvVar error, got {other:?}"),
        }
    }

    #[test]
    fn test_expand_env_vars_with_default() {
        // SAFETY: Single-threaded test
        unsafe { std::env::remove_var("PW_UNSET_WITH_DEFAULT") };
        let result = expand_env_vars("value: ${PW_UNSET_WITH_DEFAULT:-fallback}").unwrap();
        assert_eq!(result, "value: fallback");
    }

    #[test]
    fn test_expand_env_vars_with_empty_default() {
        // SAFETY: Single-threaded test
        unsafe { std::env::remove_var("PW_UNSET_EMPTY_DEFAULT") };
        let result = expand_env_vars("value: ${PW_UNSET_EMPTY_DEFAULT:-}").unwrap();
        assert_eq!(result, "value: ");
    }

    #[test]
    fn test_expand_env_vars_escaped_dollar() {
        let result = expand_env_vars("price: $$100 and ${PW_TEST_ESCAPE:-value}").unwrap();
        assert_eq!(result, "price: $100 and value");
    }

    #[test]
    fn test_expand_env_vars_literal_dollar_without_brace() {
        assert_eq!(expand_env_vars("cost is $50").unwrap(), "cost is $50");
    }

    #[test]
    fn test_expand_env_vars_unclosed_brace() {
        assert!(matches!(
            expand_env_vars("value: ${UNCLOSED_VAR"),
            Err(ConfigError::UnclosedVarReference)
        ));
        assert!(matches!(
            expand_env_vars("value: ${VAR:-default"),
            Err(ConfigError::UnclosedVarReference)
        ));
    }

    #[tokio::test]
    async fn test_config_load_with_env_var() {
        // SAFETY: Single-threaded test
        unsafe { std::env::set_var("PW_TEST_CONFIG_SECRET", "env_secret") };

        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
server:
  secret: ${{PW_TEST_CONFIG_SECRET}}
"#
        )
        .unwrap();

        let config = Config::load(file.path()).await.unwrap();
        assert_eq!(config.server.secret.as_deref(), Some("env_secret"));

        unsafe { std::env::remove_var("PW_TEST_CONFIG_SECRET") };
    }
}
