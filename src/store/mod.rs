//! Per-run artifact persistence.
//!
//! Every pipeline run gets its own folder under the runs directory. Artifacts
//! are written once and never modified afterwards.

mod artifact;
mod error;
mod file;

pub use artifact::{ArtifactStore, RunId};
pub use error::{StorageError, StorageResult};
pub use file::FileArtifactStore;
