//! Artifact store trait and run identifiers.

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::error::{StorageError, StorageResult};

const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";
const TIMESTAMP_LEN: usize = 15;

/// Identifier of one pipeline run, also the name of its folder.
///
/// Format: `YYYYMMDD-HHMMSS-<uuid>` (UTC). The timestamp prefix keeps folders
/// ordered by start time; the random suffix keeps concurrent runs apart.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    pub fn generate() -> Self {
        Self::at(Utc::now())
    }

    pub fn at(started: DateTime<Utc>) -> Self {
        Self(format!(
            "{}-{}",
            started.format(TIMESTAMP_FORMAT),
            Uuid::new_v4()
        ))
    }

    /// Parse a folder name, returning `None` if it is not a run id.
    pub fn parse(name: &str) -> Option<Self> {
        let id = Self(name.to_string());
        id.started_at()?;
        let suffix = name.get(TIMESTAMP_LEN + 1..)?;
        Uuid::parse_str(suffix).ok()?;
        Some(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Start time encoded in the id.
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        let prefix = self.0.get(..TIMESTAMP_LEN)?;
        NaiveDateTime::parse_from_str(prefix, TIMESTAMP_FORMAT)
            .ok()
            .map(|naive| naive.and_utc())
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Storage interface for run artifacts.
///
/// Names are relative paths inside the run folder (e.g. `collector/stdout.txt`).
/// Every artifact can be written exactly once per run.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Allocate a new, empty run folder.
    async fn create_run(&self) -> StorageResult<RunId>;

    /// Location of the run folder.
    fn run_path(&self, run: &RunId) -> PathBuf;

    /// Write a text artifact.
    async fn put_text(&self, run: &RunId, name: &str, contents: &str) -> StorageResult<PathBuf>;

    /// Copy a directory tree into the run folder under `name`.
    ///
    /// Returns the number of files copied.
    async fn put_tree(&self, run: &RunId, name: &str, source: &Path) -> StorageResult<u64>;

    /// Write a JSON artifact (pretty-printed).
    async fn put_json(
        &self,
        run: &RunId,
        name: &str,
        value: &serde_json::Value,
    ) -> StorageResult<PathBuf> {
        let contents = serde_json::to_string_pretty(value)
            .map_err(|e| StorageError::serialization(e.to_string()))?;
        self.put_text(run, name, &contents).await
    }
}
