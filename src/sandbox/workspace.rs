use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::fs_util;

/// What happens to a workspace once the pipeline is done with it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceRetention {
    /// Leave the directory on disk for the OS temp sweep.
    #[default]
    Keep,
    /// Delete the directory once its contents have been archived.
    DeleteAfterArchival,
}

/// An isolated directory owned by exactly one script execution.
///
/// The directory name carries a random token, so concurrent executions never
/// share a workspace.
#[derive(Debug)]
pub struct Workspace {
    path: PathBuf,
    retention: WorkspaceRetention,
}

impl Workspace {
    /// Create a fresh `{prefix}_{uuid}` directory under `root`.
    ///
    /// Fails rather than reuse a directory that already exists.
    pub async fn create(
        root: &Path,
        prefix: &str,
        retention: WorkspaceRetention,
    ) -> io::Result<Self> {
        fs::create_dir_all(root).await?;
        let path = root.join(format!("{}_{}", prefix, Uuid::new_v4()));
        fs::create_dir(&path).await?;
        debug!(path = %path.display(), "Created workspace");
        Ok(Self { path, retention })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy every file and directory from `source` into the workspace,
    /// preserving relative structure and merging into existing directories.
    pub async fn seed_from(&self, source: &Path) -> io::Result<u64> {
        fs_util::copy_tree(source, &self.path).await
    }

    /// Write a file at `name` relative to the workspace root.
    pub async fn write_file(&self, name: &str, contents: &str) -> io::Result<PathBuf> {
        let path = self.path.join(name);
        fs::write(&path, contents).await?;
        Ok(path)
    }

    /// End the pipeline's use of this workspace, applying its retention policy.
    pub async fn release(self) {
        if self.retention == WorkspaceRetention::Keep {
            return;
        }
        match fs::remove_dir_all(&self.path).await {
            Ok(()) => debug!(path = %self.path.display(), "Removed workspace"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove workspace"),
        }
    }
}
