//! Shared-secret check for inbound run requests.

use sha2::{Digest, Sha256};

/// Compare the supplied secret with the configured one.
///
/// Both sides are hashed first so the comparison time does not depend on
/// how many leading bytes match. No configured secret rejects everything.
pub fn secret_matches(expected: Option<&str>, provided: &str) -> bool {
    match expected {
        Some(expected) => {
            let a = Sha256::digest(provided.as_bytes());
            let b = Sha256::digest(expected.as_bytes());
            a == b
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_secret_is_accepted() {
        assert!(secret_matches(Some("s3cret"), "s3cret"));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        assert!(!secret_matches(Some("s3cret"), "s3cre"));
        assert!(!secret_matches(Some("s3cret"), ""));
    }

    #[test]
    fn unconfigured_secret_rejects_everything() {
        assert!(!secret_matches(None, ""));
        assert!(!secret_matches(None, "anything"));
    }
}
