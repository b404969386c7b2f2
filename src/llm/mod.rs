//! LLM provider client for structured chat completions.

mod error;
mod openai;
mod provider;
mod types;

pub use error::LLMError;
pub use openai::OpenAICompatibleProvider;
pub use provider::LLMProvider;
pub use types::{ChatRequest, ChatResponse, Choice, JsonSchemaFormat, Message, ResponseFormat, Role, Usage};

/// Default API endpoints.
pub mod defaults {
    pub const OPENAI: &str = "https://api.openai.com/v1";
}
