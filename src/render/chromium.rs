use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{PageRenderer, RenderError};
use crate::config::RendererConfig;
use crate::sandbox::{ExecCommand, Sandbox};

/// Renders with headless Chromium and dumps the DOM once the virtual-time
/// budget has elapsed, so client-side scripts get to run first.
pub struct ChromiumRenderer {
    sandbox: Arc<dyn Sandbox>,
    config: RendererConfig,
}

impl ChromiumRenderer {
    pub fn new(sandbox: Arc<dyn Sandbox>, config: RendererConfig) -> Self {
        Self { sandbox, config }
    }

    fn args(&self, url: &str) -> Vec<String> {
        let budget_ms = self.config.settle_seconds.saturating_mul(1000);
        vec![
            "--headless".to_string(),
            "--disable-gpu".to_string(),
            "--no-first-run".to_string(),
            "--dump-dom".to_string(),
            format!("--virtual-time-budget={budget_ms}"),
            url.to_string(),
        ]
    }

    fn command(&self, url: &str) -> ExecCommand {
        let mut env = Vec::new();
        if let Ok(path) = std::env::var("PATH") {
            env.push(("PATH".to_string(), path));
        }
        env.push((
            "HOME".to_string(),
            std::env::temp_dir().to_string_lossy().into_owned(),
        ));

        ExecCommand {
            program: self.config.command.clone(),
            args: self.args(url),
            cwd: std::env::temp_dir(),
            env,
            timeout: Duration::from_secs(self.config.timeout_seconds),
        }
    }
}

#[async_trait]
impl PageRenderer for ChromiumRenderer {
    async fn render(&self, url: &str) -> Result<String, RenderError> {
        debug!(url, command = %self.config.command, "Rendering page");
        let output = self.sandbox.exec(&self.command(url)).await?;

        if output.exit_code != 0 {
            return Err(RenderError::Browser {
                exit_code: output.exit_code,
                stderr: output.stderr,
            });
        }
        if output.stdout.trim().is_empty() {
            return Err(RenderError::EmptyDocument);
        }
        Ok(output.stdout)
    }
}
