//! Build metadata reported by `--version` and `GET /version`.

use serde::Serialize;

use crate::sandbox::FORBIDDEN_PATTERNS;

pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const COMMIT: &str = match option_env!("BUILD_COMMIT") {
    Some(c) => c,
    None => "unknown",
};
pub const BUILD_DATE: &str = match option_env!("BUILD_DATE") {
    Some(d) => d,
    None => "unknown",
};

/// What a running binary was built from, including the denylist it screens
/// scripts with so operators can tell deployments apart.
#[derive(Debug, Serialize)]
pub struct BuildInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub commit: &'static str,
    pub build_date: &'static str,
    pub forbidden_patterns: &'static [&'static str],
}

impl BuildInfo {
    #[must_use]
    pub fn current() -> Self {
        Self {
            name: NAME,
            version: VERSION,
            commit: COMMIT,
            build_date: BUILD_DATE,
            forbidden_patterns: FORBIDDEN_PATTERNS,
        }
    }
}
