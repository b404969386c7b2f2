use thiserror::Error;

use super::stage::Stage;
use crate::generate::GenerationError;
use crate::render::RenderError;
use crate::store::StorageError;

/// A run-level failure. Execution failures are not errors; they go through
/// the failure policy instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("render failed: {0}")]
    Render(#[from] RenderError),

    #[error("{stage} failed: {source}")]
    Generation {
        stage: Stage,
        #[source]
        source: GenerationError,
    },

    #[error("could not allocate run folder: {0}")]
    Storage(#[from] StorageError),
}

impl PipelineError {
    /// Stage that failed, if the error is tied to one.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::Render(_) => Some(Stage::Render),
            PipelineError::Generation { stage, .. } => Some(*stage),
            PipelineError::Storage(_) => None,
        }
    }
}
