use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use super::limits::{self, ResourceLimits};
use super::{ExecCommand, ExecResult, Sandbox, SandboxError};

/// Runs children as plain host processes with a cleared environment, closed
/// stdin, optional rlimits, and their own process group.
///
/// There is no filesystem or network namespace: the child can reach anything
/// the server user can.
#[derive(Debug, Default)]
pub struct ProcessSandbox {
    limits: ResourceLimits,
}

impl ProcessSandbox {
    pub fn new(limits: ResourceLimits) -> Self {
        Self { limits }
    }
}

#[async_trait]
impl Sandbox for ProcessSandbox {
    async fn exec(&self, cmd: &ExecCommand) -> Result<ExecResult, SandboxError> {
        let mut command = Command::new(&cmd.program);
        command
            .args(&cmd.args)
            .current_dir(&cmd.cwd)
            .env_clear()
            .envs(cmd.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        command.process_group(0);
        limits::install(&mut command, &self.limits);

        let child = command.spawn().map_err(|source| SandboxError::Spawn {
            program: cmd.program.clone(),
            source,
        })?;
        let pid = child.id();
        debug!(program = %cmd.program, pid = ?pid, cwd = %cmd.cwd.display(), "Spawned script process");

        let output = match tokio::time::timeout(cmd.timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                // The child itself is killed on drop; take down anything it forked too.
                #[cfg(unix)]
                if let Some(pid) = pid {
                    kill_process_group(pid);
                }
                warn!(program = %cmd.program, timeout = ?cmd.timeout, "Script process timed out");
                return Err(SandboxError::Timeout(cmd.timeout));
            }
        };

        Ok(ExecResult {
            // Returns -1 if killed by signal (SIGKILL, SIGXCPU, etc.)
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    fn mode(&self) -> &'static str {
        "process"
    }
}

#[cfg(unix)]
fn kill_process_group(pid: u32) {
    let Ok(pgid) = i32::try_from(pid) else {
        return;
    };
    // SAFETY: kill(2) with a negative pid signals the group created for the child.
    let rc = unsafe { libc::kill(-pgid, libc::SIGKILL) };
    if rc != 0 {
        debug!(pgid, error = %std::io::Error::last_os_error(), "Process group already gone");
    }
}
