//! Filesystem helpers shared by workspaces and the artifact store.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use tokio::fs;
use tracing::debug;

/// Recursively copy the contents of `src` into `dst`, merging with whatever
/// already exists there.
///
/// Files at the same relative path are overwritten. Symlinks are skipped, not
/// followed. Returns the number of regular files copied.
pub async fn copy_tree(src: &Path, dst: &Path) -> io::Result<u64> {
    copy_dir(src.to_path_buf(), dst.to_path_buf()).await
}

fn copy_dir(src: PathBuf, dst: PathBuf) -> Pin<Box<dyn Future<Output = io::Result<u64>> + Send>> {
    Box::pin(async move {
        fs::create_dir_all(&dst).await?;

        let mut copied = 0;
        let mut entries = fs::read_dir(&src).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            let target = dst.join(entry.file_name());

            if file_type.is_dir() {
                copied += copy_dir(entry.path(), target).await?;
            } else if file_type.is_file() {
                fs::copy(entry.path(), &target).await?;
                copied += 1;
            } else {
                debug!(path = %entry.path().display(), "Skipping non-regular file");
            }
        }

        Ok(copied)
    })
}

/// List the entry names directly under `dir`, sorted.
pub async fn list_names(dir: &Path) -> io::Result<Vec<String>> {
    let mut names = Vec::new();
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names)
}
