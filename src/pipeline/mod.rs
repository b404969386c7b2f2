//! Pipeline orchestration: stage sequencing, failure policy and artifact
//! lineage for one run.

mod error;
mod orchestrator;
mod policy;
mod run;
mod stage;

pub use error::PipelineError;
pub use orchestrator::{Collaborators, PipelineOrchestrator, RunRequest};
pub use policy::{FailureAction, FailurePolicy};
pub use run::{PipelineRun, RunOutcome, RunReport, RunStatus, StageOutcome, StageRecord};
pub use stage::{ScriptSubmission, Stage};
