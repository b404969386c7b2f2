//! Page rendering collaborators.

mod chromium;
mod http;

use async_trait::async_trait;
use thiserror::Error;

use crate::sandbox::SandboxError;

pub use chromium::ChromiumRenderer;
pub use http::HttpRenderer;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("page returned status {status}")]
    Status { status: u16 },

    #[error("browser failed to start: {0}")]
    Launch(#[from] SandboxError),

    #[error("browser exited with status {exit_code}: {stderr}")]
    Browser { exit_code: i32, stderr: String },

    #[error("browser produced an empty document")]
    EmptyDocument,
}

/// Turns a URL into the HTML text of the rendered page.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render(&self, url: &str) -> Result<String, RenderError>;
}
