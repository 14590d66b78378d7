//! coffre-core: types shared by every coffre crate
//!
//! Requests, algorithm selections, the error taxonomy with its
//! fatal-vs-skippable split, batch progress types, and cancellation.

pub mod batch;
pub mod cancel;
pub mod error;
pub mod request;
pub mod types;

pub use batch::{BatchError, BatchResult, BatchStatus};
pub use cancel::CancelToken;
pub use error::{CoffreError, CoffreResult};
pub use request::CryptoRequest;
pub use types::{CipherAlg, KdfAlg, KdfCost, ObfuscationMode, Operation};
