use std::{io, path::PathBuf, result::Result as StdResult};
use thiserror::Error;

/// Custom Result type for drift operations.
pub type Result<T> = StdResult<T, DriftError>;

/// Drift-specific error types
#[derive(Error, Debug)]
pub enum DriftError {
    /// The given path is not inside a Git working tree.
    #[error("Not a repository: {path}")]
    NotARepository {
        /// Path that failed the working-tree probe.
        path: PathBuf,
    },

    /// A git command that was expected to succeed exited non-zero.
    #[error("Git error: {0}")]
    GitError(String),

    /// A requested revision could not be resolved or fetched.
    #[error("Revision error for '{revision}': {message}")]
    RevisionError {
        /// Revision identifier supplied by the caller.
        revision: String,
        /// Human-readable error description.
        message: String,
    },

    /// A high-level operation failed.
    #[error("Operation failed: {0}")]
    OperationError(String),

    /// Setting up or tearing down a filesystem watch failed.
    #[error("Watch error: {0}")]
    WatchError(String),

    /// An underlying I/O operation failed.
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

impl DriftError {
    /// Return the recommended process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NotARepository { .. } => 2,
            Self::RevisionError { .. } => 3,
            Self::GitError(_) => 4,
            Self::WatchError(_) => 5,
            _ => 1,
        }
    }
}
