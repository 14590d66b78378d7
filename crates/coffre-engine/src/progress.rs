//! Progress reporting at file granularity.

use std::time::Instant;

use coffre_core::{BatchStatus, CoffreResult};

/// Progress callback, invoked with a fresh snapshot after each completed
/// file (and once with a zero-progress snapshot before the first).
pub type ProgressFn = Box<dyn Fn(&BatchStatus) + Send + Sync>;

/// Running counters for one batch. Snapshots are taken from here; the
/// final [`BatchResult`](coffre_core::BatchResult) is built from the same
/// numbers.
pub(crate) struct ProgressTracker {
    start: Instant,
    total_files: u64,
    total_bytes: u64,
    processed_files: u64,
    processed_bytes: u64,
}

impl ProgressTracker {
    pub(crate) fn new(total_files: u64, total_bytes: u64) -> Self {
        Self {
            start: Instant::now(),
            total_files,
            total_bytes,
            processed_files: 0,
            processed_bytes: 0,
        }
    }

    pub(crate) fn file_done(&mut self, bytes: u64) {
        self.processed_files += 1;
        self.processed_bytes += bytes;
    }

    pub(crate) fn processed_files(&self) -> u64 {
        self.processed_files
    }

    pub(crate) fn processed_bytes(&self) -> u64 {
        self.processed_bytes
    }

    pub(crate) fn total_files(&self) -> u64 {
        self.total_files
    }

    pub(crate) fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub(crate) fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }

    pub(crate) fn snapshot(&self) -> CoffreResult<BatchStatus> {
        BatchStatus::new(
            self.processed_files,
            self.total_files,
            self.processed_bytes,
            self.total_bytes,
            self.elapsed(),
        )
    }

    /// Emit a snapshot to the sink, if one is attached.
    pub(crate) fn emit(&self, progress: Option<&ProgressFn>) -> CoffreResult<()> {
        if let Some(cb) = progress {
            cb(&self.snapshot()?);
        }
        Ok(())
    }
}
