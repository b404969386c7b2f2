//! V1 API handlers.

mod runs;

pub use runs::{CreateRunRequest, RunResponse, create_run};
