use serde::{Deserialize, Serialize};

use super::stage::Stage;

/// What the orchestrator does when an execution stage yields no artifact root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureAction {
    /// Stop the run and report a structured partial result.
    Halt,
    /// Continue with whatever output was captured (possibly none).
    Degrade,
}

/// Per-stage halt/degrade table for the two execution stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct FailurePolicy {
    #[serde(default = "default_collector")]
    pub collector: FailureAction,
    #[serde(default = "default_processor")]
    pub processor: FailureAction,
}

fn default_collector() -> FailureAction {
    FailureAction::Halt
}

fn default_processor() -> FailureAction {
    FailureAction::Degrade
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self {
            collector: default_collector(),
            processor: default_processor(),
        }
    }
}

impl FailurePolicy {
    /// Action for a failed execution at `stage`. Non-execution stages never
    /// reach the policy; their failures are run-level errors.
    pub fn action_for(&self, stage: Stage) -> FailureAction {
        match stage {
            Stage::ExecuteCollector => self.collector,
            Stage::ExecuteProcessor => self.processor,
            _ => FailureAction::Halt,
        }
    }
}
