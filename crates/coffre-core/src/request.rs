//! The immutable request consumed by the orchestrator.

use std::path::PathBuf;

use secrecy::SecretString;

use crate::types::{CipherAlg, KdfAlg, KdfCost, ObfuscationMode, Operation};

/// Everything the engine needs to run one encrypt or decrypt pass.
///
/// Built by the caller, consumed read-only by the orchestrator. The
/// password travels as a [`SecretString`] so it is never Debug-printed
/// and is zeroized when the request is dropped.
#[derive(Debug)]
pub struct CryptoRequest {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub password: SecretString,
    pub operation: Operation,
    pub cipher: CipherAlg,
    pub kdf: KdfAlg,
    pub obfuscation: ObfuscationMode,
    /// Continue past non-fatal validation warnings (overwrite risk, short
    /// password).
    pub proceed_on_warnings: bool,
    /// Override the KDF's fixed production cost parameters. `None` means
    /// the per-algorithm defaults.
    pub kdf_cost: Option<KdfCost>,
}

impl CryptoRequest {
    pub fn new(
        source: impl Into<PathBuf>,
        destination: impl Into<PathBuf>,
        password: SecretString,
        operation: Operation,
    ) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            password,
            operation,
            cipher: CipherAlg::XChaCha20Poly1305,
            kdf: KdfAlg::Argon2id,
            obfuscation: ObfuscationMode::Identity,
            proceed_on_warnings: false,
            kdf_cost: None,
        }
    }

    pub fn with_cipher(mut self, cipher: CipherAlg) -> Self {
        self.cipher = cipher;
        self
    }

    pub fn with_kdf(mut self, kdf: KdfAlg) -> Self {
        self.kdf = kdf;
        self
    }

    pub fn with_obfuscation(mut self, mode: ObfuscationMode) -> Self {
        self.obfuscation = mode;
        self
    }

    pub fn with_kdf_cost(mut self, cost: KdfCost) -> Self {
        self.kdf_cost = Some(cost);
        self
    }

    pub fn proceed_on_warnings(mut self, yes: bool) -> Self {
        self.proceed_on_warnings = yes;
        self
    }

    /// Effective KDF cost: the explicit override or the algorithm default.
    pub fn effective_kdf_cost(&self) -> KdfCost {
        self.kdf_cost
            .unwrap_or_else(|| KdfCost::default_for(self.kdf))
    }
}
