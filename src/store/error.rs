//! Error types for artifact storage.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while persisting run artifacts.
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error during file operations.
    #[error("I/O error at {path}: {source}")]
    FileIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The artifact was already written for this run.
    #[error("artifact already exists: {path}")]
    AlreadyExists { path: PathBuf },

    /// Artifact names must be relative paths that stay inside the run folder.
    #[error("invalid artifact name: {name}")]
    InvalidName { name: String },

    /// Error serializing data.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StorageError {
    /// Create a file I/O error with path context.
    ///
    /// `AlreadyExists` I/O errors are promoted to [`StorageError::AlreadyExists`].
    pub fn file_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::AlreadyExists {
            return Self::AlreadyExists { path };
        }
        Self::FileIo { path, source }
    }

    pub fn invalid_name(name: impl Into<String>) -> Self {
        Self::InvalidName { name: name.into() }
    }

    /// Create a serialization error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization(message.into())
    }
}

/// Convenience type alias for storage results.
pub type StorageResult<T> = Result<T, StorageError>;
