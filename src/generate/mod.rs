//! Script and answer generation collaborators.

mod error;
mod llm;
mod prompts;

use async_trait::async_trait;
use serde::Serialize;

pub use error::GenerationError;
pub use llm::{LlmAnswerGenerator, LlmScriptGenerator, LlmSettings};

/// Which script is being asked for, with the stage-specific context.
#[derive(Debug, Clone, Copy)]
pub enum ScriptKind<'a> {
    Collector,
    /// `files` lists the names produced by the collection stage.
    Processor { files: &'a [String] },
}

/// Context handed to a [`ScriptGenerator`].
#[derive(Debug, Clone, Copy)]
pub struct ScriptRequest<'a> {
    pub url: &'a str,
    pub html: &'a str,
    pub kind: ScriptKind<'a>,
}

impl<'a> ScriptRequest<'a> {
    pub fn collector(url: &'a str, html: &'a str) -> Self {
        Self {
            url,
            html,
            kind: ScriptKind::Collector,
        }
    }

    pub fn processor(url: &'a str, html: &'a str, files: &'a [String]) -> Self {
        Self {
            url,
            html,
            kind: ScriptKind::Processor { files },
        }
    }
}

/// Produces executable script text.
#[async_trait]
pub trait ScriptGenerator: Send + Sync {
    async fn generate(&self, request: &ScriptRequest<'_>) -> Result<String, GenerationError>;
}

/// The final answer plus where it must be delivered.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    /// A number, string, boolean or object.
    pub answer: serde_json::Value,
    pub submit_url: String,
}

/// Turns the processing output into a final answer.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate(
        &self,
        processing_stdout: &str,
        html: &str,
        url: &str,
    ) -> Result<Answer, GenerationError>;
}
