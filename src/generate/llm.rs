//! Generators backed by a chat-completions provider with structured output.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use super::prompts;
use super::{Answer, AnswerGenerator, GenerationError, ScriptGenerator, ScriptKind, ScriptRequest};
use crate::config::LlmConfig;
use crate::llm::{ChatRequest, LLMProvider, Message, Role};

/// Model parameters shared by every generation call.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub model: String,
    pub temperature: Option<f32>,
}

impl From<&LlmConfig> for LlmSettings {
    fn from(config: &LlmConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
        }
    }
}

/// Send one schema-constrained request and return the parsed JSON object.
async fn structured_call(
    provider: &dyn LLMProvider,
    settings: &LlmSettings,
    system: &str,
    prompt: String,
    schema_name: &str,
    schema: Value,
) -> Result<Map<String, Value>, GenerationError> {
    let request = ChatRequest::new(
        settings.model.clone(),
        vec![
            Message::text(Role::System, system),
            Message::text(Role::User, prompt),
        ],
        settings.temperature,
    )
    .with_json_schema(schema_name, schema);

    let response = provider.chat(request).await?;
    if let Some(usage) = &response.usage {
        debug!(
            schema = schema_name,
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            "Generation call completed"
        );
    }

    let content = response
        .first_content()
        .filter(|c| !c.trim().is_empty())
        .ok_or(GenerationError::EmptyResponse)?;

    match serde_json::from_str::<Value>(content) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(GenerationError::InvalidJson {
            message: "expected a JSON object".to_string(),
            raw: content.to_string(),
        }),
        Err(e) => Err(GenerationError::InvalidJson {
            message: e.to_string(),
            raw: content.to_string(),
        }),
    }
}

fn string_field(map: &mut Map<String, Value>, field: &'static str) -> Result<String, GenerationError> {
    match map.remove(field) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s),
        _ => Err(GenerationError::MissingField { field }),
    }
}

/// Writes collector and processor scripts.
pub struct LlmScriptGenerator {
    provider: Arc<dyn LLMProvider>,
    settings: LlmSettings,
}

impl LlmScriptGenerator {
    pub fn new(provider: Arc<dyn LLMProvider>, settings: LlmSettings) -> Self {
        Self { provider, settings }
    }
}

#[async_trait]
impl ScriptGenerator for LlmScriptGenerator {
    async fn generate(&self, request: &ScriptRequest<'_>) -> Result<String, GenerationError> {
        let (system, prompt, name, schema, field) = match request.kind {
            ScriptKind::Collector => (
                prompts::COLLECTOR_SYSTEM,
                prompts::collector_prompt(request.url, request.html),
                "collector_schema",
                prompts::collector_schema(),
                prompts::COLLECTOR_FIELD,
            ),
            ScriptKind::Processor { files } => (
                prompts::PROCESSOR_SYSTEM,
                prompts::processor_prompt(request.url, request.html, files),
                "processor_schema",
                prompts::processor_schema(),
                prompts::PROCESSOR_FIELD,
            ),
        };

        let mut out =
            structured_call(self.provider.as_ref(), &self.settings, system, prompt, name, schema)
                .await?;
        string_field(&mut out, field)
    }
}

/// Produces the final answer and its submission destination.
pub struct LlmAnswerGenerator {
    provider: Arc<dyn LLMProvider>,
    settings: LlmSettings,
}

impl LlmAnswerGenerator {
    pub fn new(provider: Arc<dyn LLMProvider>, settings: LlmSettings) -> Self {
        Self { provider, settings }
    }
}

#[async_trait]
impl AnswerGenerator for LlmAnswerGenerator {
    async fn generate(
        &self,
        processing_stdout: &str,
        html: &str,
        url: &str,
    ) -> Result<Answer, GenerationError> {
        let mut out = structured_call(
            self.provider.as_ref(),
            &self.settings,
            prompts::ANSWER_SYSTEM,
            prompts::answer_prompt(url, html, processing_stdout),
            "answer_schema",
            prompts::answer_schema(),
        )
        .await?;

        let answer = match out.remove("answer") {
            None => return Err(GenerationError::MissingField { field: "answer" }),
            Some(Value::Null) => {
                return Err(GenerationError::InvalidAnswer("answer is null".to_string()));
            }
            Some(Value::Array(_)) => {
                return Err(GenerationError::InvalidAnswer(
                    "answer must not be an array".to_string(),
                ));
            }
            Some(value) => value,
        };
        let submit_url = string_field(&mut out, "submit_url")?;

        Ok(Answer { answer, submit_url })
    }
}
