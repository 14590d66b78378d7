//! Batch progress snapshots and final results.
//!
//! Both types enforce their ordering invariants at construction and never
//! silently clamp: a snapshot claiming more processed files than total
//! files is a bug in the caller, not a value to repair.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{CoffreError, CoffreResult};

/// One progress snapshot, emitted after each completed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchStatus {
    processed_files: u64,
    total_files: u64,
    processed_bytes: u64,
    total_bytes: u64,
    elapsed: Duration,
}

impl BatchStatus {
    pub fn new(
        processed_files: u64,
        total_files: u64,
        processed_bytes: u64,
        total_bytes: u64,
        elapsed: Duration,
    ) -> CoffreResult<Self> {
        if processed_files > total_files {
            return Err(CoffreError::Internal(format!(
                "processed_files {processed_files} exceeds total_files {total_files}"
            )));
        }
        if processed_bytes > total_bytes {
            return Err(CoffreError::Internal(format!(
                "processed_bytes {processed_bytes} exceeds total_bytes {total_bytes}"
            )));
        }
        Ok(Self {
            processed_files,
            total_files,
            processed_bytes,
            total_bytes,
            elapsed,
        })
    }

    pub fn processed_files(&self) -> u64 {
        self.processed_files
    }

    pub fn total_files(&self) -> u64 {
        self.total_files
    }

    pub fn processed_bytes(&self) -> u64 {
        self.processed_bytes
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

/// A classified failure attributed to one path.
#[derive(Debug)]
pub struct BatchError {
    pub path: PathBuf,
    pub error: CoffreError,
}

impl BatchError {
    pub fn new(path: impl Into<PathBuf>, error: CoffreError) -> Self {
        Self {
            path: path.into(),
            error,
        }
    }
}

impl std::fmt::Display for BatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.error)
    }
}

/// Final outcome of one run: full success, partial success, or failure.
///
/// Created once at the end of a run; immutable thereafter.
#[derive(Debug)]
pub struct BatchResult {
    elapsed: Duration,
    processed_files: u64,
    total_files: u64,
    processed_bytes: u64,
    total_bytes: u64,
    errors: Vec<BatchError>,
    warnings: Vec<String>,
}

impl BatchResult {
    pub fn new(
        elapsed: Duration,
        processed_files: u64,
        total_files: u64,
        processed_bytes: u64,
        total_bytes: u64,
        errors: Vec<BatchError>,
        warnings: Vec<String>,
    ) -> CoffreResult<Self> {
        if processed_files > total_files {
            return Err(CoffreError::Internal(format!(
                "processed_files {processed_files} exceeds total_files {total_files}"
            )));
        }
        if processed_bytes > total_bytes {
            return Err(CoffreError::Internal(format!(
                "processed_bytes {processed_bytes} exceeds total_bytes {total_bytes}"
            )));
        }
        Ok(Self {
            elapsed,
            processed_files,
            total_files,
            processed_bytes,
            total_bytes,
            errors,
            warnings,
        })
    }

    /// A failure result carrying a single classified error and no progress.
    pub fn from_error(error: CoffreError) -> Self {
        Self::from_error_at(PathBuf::new(), error)
    }

    /// Like [`from_error`](Self::from_error), but pathless error kinds
    /// (invalid request, key derivation) are attributed to `fallback` so
    /// reports always name the path the request was about.
    pub fn from_error_at(fallback: impl Into<PathBuf>, error: CoffreError) -> Self {
        let path = error
            .path()
            .map(PathBuf::from)
            .unwrap_or_else(|| fallback.into());
        Self {
            elapsed: Duration::ZERO,
            processed_files: 0,
            total_files: 0,
            processed_bytes: 0,
            total_bytes: 0,
            errors: vec![BatchError::new(path, error)],
            warnings: Vec::new(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn processed_files(&self) -> u64 {
        self.processed_files
    }

    pub fn total_files(&self) -> u64 {
        self.total_files
    }

    pub fn processed_bytes(&self) -> u64 {
        self.processed_bytes
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn errors(&self) -> &[BatchError] {
        &self.errors
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Zero errors and every enumerated file processed.
    pub fn is_success(&self) -> bool {
        self.errors.is_empty() && self.processed_files == self.total_files
    }

    /// Some but not all files processed.
    pub fn is_partial_success(&self) -> bool {
        self.processed_files > 0 && self.processed_files < self.total_files
    }

    /// Fraction of files processed; 0 for an empty batch.
    pub fn success_rate(&self) -> f64 {
        if self.total_files == 0 {
            0.0
        } else {
            self.processed_files as f64 / self.total_files as f64
        }
    }

    pub fn bytes_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.processed_bytes as f64 / secs
        } else {
            0.0
        }
    }

    pub fn files_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.processed_files as f64 / secs
        } else {
            0.0
        }
    }
}
