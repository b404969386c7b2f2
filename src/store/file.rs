//! File-based artifact store.
//!
//! Layout: `{runs_dir}/{run_id}/{artifact name}`.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::artifact::{ArtifactStore, RunId};
use super::error::{StorageError, StorageResult};
use crate::fs_util;

/// Stores artifacts as plain files, one folder per run.
#[derive(Debug, Clone)]
pub struct FileArtifactStore {
    runs_dir: PathBuf,
}

impl FileArtifactStore {
    pub fn new(runs_dir: impl Into<PathBuf>) -> Self {
        Self {
            runs_dir: runs_dir.into(),
        }
    }

    pub fn runs_dir(&self) -> &Path {
        &self.runs_dir
    }

    /// Resolve `name` inside the run folder, rejecting anything that could
    /// escape it.
    fn artifact_path(&self, run: &RunId, name: &str) -> StorageResult<PathBuf> {
        let relative = Path::new(name);
        let valid = !name.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !valid {
            return Err(StorageError::invalid_name(name));
        }
        Ok(self.run_path(run).join(relative))
    }

    async fn ensure_parent(path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::file_io(parent, e))?;
        }
        Ok(())
    }

    /// Delete run folders whose id timestamp is older than `ttl`.
    ///
    /// Entries that are not run folders are left alone. Returns the number of
    /// runs removed.
    pub async fn sweep_expired(&self, ttl: Duration) -> StorageResult<usize> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| StorageError::serialization(e.to_string()))?;
        let cutoff = Utc::now() - ttl;

        let mut entries = match fs::read_dir(&self.runs_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(StorageError::file_io(&self.runs_dir, e)),
        };

        let mut removed = 0;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::file_io(&self.runs_dir, e))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(started) = RunId::parse(&name).and_then(|id| id.started_at()) else {
                continue;
            };
            if started >= cutoff {
                continue;
            }
            match fs::remove_dir_all(entry.path()).await {
                Ok(()) => {
                    debug!(run_id = %name, "Removed expired run");
                    removed += 1;
                }
                Err(e) => warn!(run_id = %name, error = %e, "Failed to remove expired run"),
            }
        }

        if removed > 0 {
            info!(removed, "Swept expired runs");
        }
        Ok(removed)
    }
}

#[async_trait]
impl ArtifactStore for FileArtifactStore {
    async fn create_run(&self) -> StorageResult<RunId> {
        fs::create_dir_all(&self.runs_dir)
            .await
            .map_err(|e| StorageError::file_io(&self.runs_dir, e))?;

        let run = RunId::generate();
        let path = self.run_path(&run);
        fs::create_dir(&path)
            .await
            .map_err(|e| StorageError::file_io(&path, e))?;
        debug!(run_id = %run, "Created run folder");
        Ok(run)
    }

    fn run_path(&self, run: &RunId) -> PathBuf {
        self.runs_dir.join(run.as_str())
    }

    async fn put_text(&self, run: &RunId, name: &str, contents: &str) -> StorageResult<PathBuf> {
        let path = self.artifact_path(run, name)?;
        Self::ensure_parent(&path).await?;

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| StorageError::file_io(&path, e))?;
        file.write_all(contents.as_bytes())
            .await
            .map_err(|e| StorageError::file_io(&path, e))?;
        file.flush()
            .await
            .map_err(|e| StorageError::file_io(&path, e))?;

        Ok(path)
    }

    async fn put_tree(&self, run: &RunId, name: &str, source: &Path) -> StorageResult<u64> {
        let path = self.artifact_path(run, name)?;
        Self::ensure_parent(&path).await?;

        fs::create_dir(&path)
            .await
            .map_err(|e| StorageError::file_io(&path, e))?;
        fs_util::copy_tree(source, &path)
            .await
            .map_err(|e| StorageError::file_io(source, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn create_store(temp_dir: &TempDir) -> FileArtifactStore {
        FileArtifactStore::new(temp_dir.path().join("runs"))
    }

    #[tokio::test]
    async fn create_run_makes_distinct_folders() {
        let temp_dir = TempDir::new().unwrap();
        let store = create_store(&temp_dir);

        let a = store.create_run().await.unwrap();
        let b = store.create_run().await.unwrap();

        assert_ne!(a, b);
        assert!(store.run_path(&a).is_dir());
        assert!(store.run_path(&b).is_dir());
    }

    #[tokio::test]
    async fn put_text_writes_nested_artifact() {
        let temp_dir = TempDir::new().unwrap();
        let store = create_store(&temp_dir);
        let run = store.create_run().await.unwrap();

        let path = store
            .put_text(&run, "collector/stdout.txt", "hello")
            .await
            .unwrap();

        assert_eq!(path, store.run_path(&run).join("collector/stdout.txt"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "hello");
    }

    #[tokio::test]
    async fn artifacts_are_write_once() {
        let temp_dir = TempDir::new().unwrap();
        let store = create_store(&temp_dir);
        let run = store.create_run().await.unwrap();

        store.put_text(&run, "page.html", "first").await.unwrap();
        let err = store
            .put_text(&run, "page.html", "second")
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::AlreadyExists { .. }));
        assert_eq!(
            std::fs::read_to_string(store.run_path(&run).join("page.html")).unwrap(),
            "first"
        );
    }

    #[tokio::test]
    async fn put_json_pretty_prints() {
        let temp_dir = TempDir::new().unwrap();
        let store = create_store(&temp_dir);
        let run = store.create_run().await.unwrap();

        let path = store
            .put_json(&run, "answer.json", &serde_json::json!({"answer": 42}))
            .await
            .unwrap();

        let content = std::fs::read_to_string(path).unwrap();
        assert_eq!(content, "{\n  \"answer\": 42\n}");
    }

    #[tokio::test]
    async fn rejects_escaping_names() {
        let temp_dir = TempDir::new().unwrap();
        let store = create_store(&temp_dir);
        let run = store.create_run().await.unwrap();

        for name in ["", "../outside.txt", "/etc/passwd", "a/../../b", "./x"] {
            let err = store.put_text(&run, name, "x").await.unwrap_err();
            assert!(
                matches!(err, StorageError::InvalidName { .. }),
                "{name} should be rejected"
            );
        }
        assert!(!temp_dir.path().join("outside.txt").exists());
    }

    #[tokio::test]
    async fn put_tree_copies_directory() {
        let temp_dir = TempDir::new().unwrap();
        let store = create_store(&temp_dir);
        let run = store.create_run().await.unwrap();

        let source = temp_dir.path().join("ws");
        std::fs::create_dir_all(source.join("data")).unwrap();
        std::fs::write(source.join("out.csv"), "1").unwrap();
        std::fs::write(source.join("data/x.json"), "{}").unwrap();

        let copied = store
            .put_tree(&run, "collector/output", &source)
            .await
            .unwrap();

        assert_eq!(copied, 2);
        let root = store.run_path(&run).join("collector/output");
        assert!(root.join("out.csv").is_file());
        assert!(root.join("data/x.json").is_file());

        let again = store.put_tree(&run, "collector/output", &source).await;
        assert!(matches!(again, Err(StorageError::AlreadyExists { .. })));
    }

    #[tokio::test]
    async fn sweep_removes_only_expired_runs() {
        let temp_dir = TempDir::new().unwrap();
        let store = create_store(&temp_dir);

        let fresh = store.create_run().await.unwrap();
        let old = RunId::at(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap());
        std::fs::create_dir_all(store.run_path(&old)).unwrap();
        std::fs::create_dir_all(store.runs_dir().join("not-a-run")).unwrap();

        let removed = store
            .sweep_expired(Duration::from_secs(3600))
            .await
            .unwrap();

        assert_eq!(removed, 1);
        assert!(store.run_path(&fresh).is_dir());
        assert!(!store.run_path(&old).exists());
        assert!(store.runs_dir().join("not-a-run").is_dir());
    }

    #[tokio::test]
    async fn sweep_missing_dir_is_noop() {
        let temp_dir = TempDir::new().unwrap();
        let store = create_store(&temp_dir);
        assert_eq!(
            store.sweep_expired(Duration::from_secs(1)).await.unwrap(),
            0
        );
    }
}
