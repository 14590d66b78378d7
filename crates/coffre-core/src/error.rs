//! Error taxonomy shared by every coffre crate.
//!
//! Batch processing cares about the *kind* of a failure, not its source:
//! fatal kinds abort a directory run, skippable kinds are recorded against
//! the offending path and the run continues.

use std::path::{Path, PathBuf};
use thiserror::Error;

pub type CoffreResult<T> = Result<T, CoffreError>;

#[derive(Debug, Error)]
pub enum CoffreError {
    #[error("access denied: {path}")]
    AccessDenied { path: PathBuf },

    #[error("source not found: {path}")]
    SourceNotFound { path: PathBuf },

    #[error("insufficient disk space while writing {path}")]
    InsufficientDiskSpace { path: PathBuf },

    #[error("invalid password or corrupted data: {path}")]
    InvalidPasswordOrCorrupted { path: PathBuf },

    #[error("key derivation failed: {reason}")]
    KeyDerivationFailed { reason: String },

    #[error("cipher operation failed on {path}: {reason}")]
    CipherOperationFailed { path: PathBuf, reason: String },

    #[error("crypto error: {0}")]
    Crypto(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("internal invariant violated: {0}")]
    Internal(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CoffreError {
    /// Map an I/O error to its taxonomy kind, keeping the offending path.
    pub fn from_io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        let path = path.into();
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => Self::AccessDenied { path },
            std::io::ErrorKind::NotFound => Self::SourceNotFound { path },
            std::io::ErrorKind::StorageFull => Self::InsufficientDiskSpace { path },
            _ => Self::Io { path, source: err },
        }
    }

    /// Whether this error should abort a whole batch.
    ///
    /// Fatal kinds indicate the operation cannot meaningfully continue for
    /// any remaining file (bad password, no space, no access). Everything
    /// else is recorded against the offending path and the batch proceeds.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::AccessDenied { .. }
                | Self::InsufficientDiskSpace { .. }
                | Self::InvalidPasswordOrCorrupted { .. }
                | Self::KeyDerivationFailed { .. }
                | Self::InvalidRequest(_)
                | Self::Internal(_)
        )
    }

    /// The path this error is attributed to, when it has one.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::AccessDenied { path }
            | Self::SourceNotFound { path }
            | Self::InsufficientDiskSpace { path }
            | Self::InvalidPasswordOrCorrupted { path }
            | Self::CipherOperationFailed { path, .. }
            | Self::Io { path, .. } => Some(path),
            _ => None,
        }
    }
}
