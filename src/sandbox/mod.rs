//! Script execution: syntactic screening, isolated workspaces, and the
//! process sandbox that runs generated scripts under a hard timeout.

mod denylist;
mod error;
mod executor;
mod limits;
mod process;
mod workspace;

pub use denylist::{FORBIDDEN_PATTERNS, Verdict, validate};
pub use error::SandboxError;
pub use executor::{ExecutionError, ExecutionResult, SandboxedExecutor};
pub use limits::ResourceLimits;
pub use process::ProcessSandbox;
pub use workspace::{Workspace, WorkspaceRetention};

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;

/// Default wall-clock limit for a script execution (60 seconds).
pub const DEFAULT_EXEC_TIMEOUT: Duration = Duration::from_secs(60);

/// A fully specified child process invocation.
#[derive(Debug, Clone)]
pub struct ExecCommand {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    /// Complete child environment. Nothing else is inherited.
    pub env: Vec<(String, String)>,
    pub timeout: Duration,
}

/// Result of command execution.
#[derive(Debug, Clone)]
pub struct ExecResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Execution environment for script children.
#[async_trait]
pub trait Sandbox: Send + Sync {
    /// Run the command to completion or until its timeout fires.
    async fn exec(&self, command: &ExecCommand) -> Result<ExecResult, SandboxError>;

    /// Get the sandbox mode name.
    fn mode(&self) -> &'static str;
}
