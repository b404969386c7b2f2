//! Screen a script file against the denylist without running it.

use std::path::Path;

use anyhow::{Context, Result};

use pipewright::sandbox::{self, Verdict};

/// Print the verdict. Returns whether the script is safe.
pub async fn run(path: &Path) -> Result<bool> {
    let script = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let verdict = sandbox::validate(&script);
    match verdict {
        Verdict::Safe => println!("safe"),
        Verdict::Unsafe { pattern } => println!("unsafe (matched '{pattern}')"),
    }
    Ok(verdict.is_safe())
}
