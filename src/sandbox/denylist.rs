//! Syntactic pre-execution screening of generated scripts.
//!
//! This is a literal substring filter, not a security boundary: aliasing,
//! string concatenation or encoding all get past it. Process-level isolation
//! lives in [`super::ProcessSandbox`].

use serde::Serialize;

/// Patterns that cause a script to be rejected outright.
///
/// Matching is case-sensitive and applies to the whole script text.
pub const FORBIDDEN_PATTERNS: &[&str] = &[
    "subprocess",
    "os.remove(",
    "os.rmdir(",
    "rm -rf",
    "sudo ",
    "apt-get",
    "pip install",
];

/// Outcome of screening a script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    Safe,
    Unsafe { pattern: &'static str },
}

impl Verdict {
    pub fn is_safe(&self) -> bool {
        matches!(self, Verdict::Safe)
    }
}

/// Screen a script against [`FORBIDDEN_PATTERNS`].
///
/// Reports the first pattern (in list order) found in the script.
pub fn validate(script: &str) -> Verdict {
    FORBIDDEN_PATTERNS
        .iter()
        .find(|pattern| script.contains(*pattern))
        .map_or(Verdict::Safe, |pattern| Verdict::Unsafe { pattern: *pattern })
}
