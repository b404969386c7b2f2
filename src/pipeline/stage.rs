use std::fmt;

use serde::Serialize;

/// One step of the fixed pipeline sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Render,
    GenerateCollector,
    ExecuteCollector,
    GenerateProcessor,
    ExecuteProcessor,
    GenerateAnswer,
    Submit,
}

impl Stage {
    /// Every stage, in execution order.
    pub const ALL: [Stage; 7] = [
        Stage::Render,
        Stage::GenerateCollector,
        Stage::ExecuteCollector,
        Stage::GenerateProcessor,
        Stage::ExecuteProcessor,
        Stage::GenerateAnswer,
        Stage::Submit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Render => "render",
            Stage::GenerateCollector => "generate_collector",
            Stage::ExecuteCollector => "execute_collector",
            Stage::GenerateProcessor => "generate_processor",
            Stage::ExecuteProcessor => "execute_processor",
            Stage::GenerateAnswer => "generate_answer",
            Stage::Submit => "submit",
        }
    }

    /// Short name of the script a stage produces or runs. Also used for
    /// workspace prefixes and artifact subdirectories.
    pub fn script_name(&self) -> &'static str {
        match self {
            Stage::GenerateCollector | Stage::ExecuteCollector => "collector",
            Stage::GenerateProcessor | Stage::ExecuteProcessor => "processor",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A generated script bound to the stage that will execute it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptSubmission {
    pub stage: Stage,
    pub script: String,
}

impl ScriptSubmission {
    pub fn new(stage: Stage, script: impl Into<String>) -> Self {
        Self {
            stage,
            script: script.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_names_pair_generate_and_execute() {
        assert_eq!(Stage::GenerateCollector.script_name(), "collector");
        assert_eq!(Stage::ExecuteCollector.script_name(), "collector");
        assert_eq!(Stage::GenerateProcessor.script_name(), "processor");
        assert_eq!(Stage::ExecuteProcessor.script_name(), "processor");
        assert_eq!(Stage::Submit.script_name(), "submit");
    }

    #[test]
    fn serializes_as_snake_case() {
        assert_eq!(
            serde_json::to_value(Stage::ExecuteProcessor).unwrap(),
            serde_json::json!("execute_processor")
        );
        assert_eq!(Stage::GenerateAnswer.to_string(), "generate_answer");
    }
}
