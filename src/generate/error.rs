use thiserror::Error;

use crate::llm::LLMError;

/// A generation collaborator failed or returned content that cannot be used.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Llm(#[from] LLMError),

    #[error("model returned no content")]
    EmptyResponse,

    #[error("model returned invalid JSON: {message}")]
    InvalidJson { message: String, raw: String },

    #[error("model response is missing field '{field}'")]
    MissingField { field: &'static str },

    #[error("invalid answer: {0}")]
    InvalidAnswer(String),
}
