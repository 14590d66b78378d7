//! Batch orchestration: turn a [`CryptoRequest`] into a [`BatchResult`].
//!
//! The engine validates and normalizes the request, enumerates the work,
//! and processes files strictly sequentially. Failures are classified per
//! path: fatal kinds abort the run, skippable kinds are recorded and the
//! run continues, so one unreadable file never sinks a thousand-file
//! batch.
//!
//! [`CryptoRequest`]: coffre_core::CryptoRequest
//! [`BatchResult`]: coffre_core::BatchResult

mod directory;
mod orchestrator;
mod progress;
mod single_file;

pub use orchestrator::CoffreEngine;
pub use progress::ProgressFn;
