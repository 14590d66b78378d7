//! Algorithm selections and their stable wire identifiers.
//!
//! Each family is a closed enum resolved from a wire id (`TryFrom<u8>`) or
//! a CLI spelling (`FromStr`). Unknown selections are configuration errors,
//! never silent fallbacks.

use std::fmt;
use std::str::FromStr;

use crate::error::CoffreError;

/// Direction of a crypto run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Encrypt,
    Decrypt,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Encrypt => write!(f, "encrypt"),
            Operation::Decrypt => write!(f, "decrypt"),
        }
    }
}

/// Supported AEAD ciphers. The discriminant is the container wire id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CipherAlg {
    /// AES-256 in Galois/Counter mode (128-bit block, 256-bit key).
    Aes256Gcm = 1,
    /// ChaCha20 stream cipher with Poly1305 MAC (RFC 8439).
    ChaCha20Poly1305 = 2,
    /// XChaCha20-Poly1305 (extended 192-bit nonce).
    XChaCha20Poly1305 = 3,
}

impl CipherAlg {
    pub fn wire_id(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CipherAlg::Aes256Gcm => "aes256-gcm",
            CipherAlg::ChaCha20Poly1305 => "chacha20-poly1305",
            CipherAlg::XChaCha20Poly1305 => "xchacha20-poly1305",
        }
    }

    /// Nonce length in bytes for this cipher.
    pub fn nonce_len(self) -> usize {
        match self {
            CipherAlg::Aes256Gcm | CipherAlg::ChaCha20Poly1305 => 12,
            CipherAlg::XChaCha20Poly1305 => 24,
        }
    }

    /// Key length in bits. All supported ciphers take 256-bit keys.
    pub fn key_size_bits(self) -> usize {
        256
    }
}

impl TryFrom<u8> for CipherAlg {
    type Error = CoffreError;

    fn try_from(id: u8) -> Result<Self, CoffreError> {
        match id {
            1 => Ok(CipherAlg::Aes256Gcm),
            2 => Ok(CipherAlg::ChaCha20Poly1305),
            3 => Ok(CipherAlg::XChaCha20Poly1305),
            other => Err(CoffreError::Crypto(format!("unknown cipher id {other}"))),
        }
    }
}

impl FromStr for CipherAlg {
    type Err = CoffreError;

    fn from_str(s: &str) -> Result<Self, CoffreError> {
        match s {
            "aes256-gcm" => Ok(CipherAlg::Aes256Gcm),
            "chacha20-poly1305" => Ok(CipherAlg::ChaCha20Poly1305),
            "xchacha20-poly1305" => Ok(CipherAlg::XChaCha20Poly1305),
            other => Err(CoffreError::InvalidRequest(format!(
                "unknown cipher {other:?} (expected aes256-gcm, chacha20-poly1305 or xchacha20-poly1305)"
            ))),
        }
    }
}

impl fmt::Display for CipherAlg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supported password KDFs. The discriminant is the container wire id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum KdfAlg {
    /// Memory-hard Argon2id.
    Argon2id = 1,
    /// Legacy PBKDF2-HMAC-SHA512 with a large iteration count.
    Pbkdf2Sha512 = 2,
}

impl KdfAlg {
    pub fn wire_id(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            KdfAlg::Argon2id => "argon2id",
            KdfAlg::Pbkdf2Sha512 => "pbkdf2-sha512",
        }
    }
}

impl TryFrom<u8> for KdfAlg {
    type Error = CoffreError;

    fn try_from(id: u8) -> Result<Self, CoffreError> {
        match id {
            1 => Ok(KdfAlg::Argon2id),
            2 => Ok(KdfAlg::Pbkdf2Sha512),
            other => Err(CoffreError::Crypto(format!("unknown KDF id {other}"))),
        }
    }
}

impl FromStr for KdfAlg {
    type Err = CoffreError;

    fn from_str(s: &str) -> Result<Self, CoffreError> {
        match s {
            "argon2id" => Ok(KdfAlg::Argon2id),
            "pbkdf2-sha512" => Ok(KdfAlg::Pbkdf2Sha512),
            other => Err(CoffreError::InvalidRequest(format!(
                "unknown KDF {other:?} (expected argon2id or pbkdf2-sha512)"
            ))),
        }
    }
}

impl fmt::Display for KdfAlg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// KDF cost parameters, persisted in the container header as three u32
/// fields. Interpretation is per-algorithm: Argon2id uses all three,
/// PBKDF2 only the iteration count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfCost {
    /// Memory cost in KiB (Argon2id only).
    pub memory_kib: u32,
    /// Iterations / time cost.
    pub iterations: u32,
    /// Lane count (Argon2id only).
    pub parallelism: u32,
}

impl KdfCost {
    /// Production defaults for an algorithm.
    pub fn default_for(alg: KdfAlg) -> Self {
        match alg {
            // 64 MiB, t=3, p=4
            KdfAlg::Argon2id => Self {
                memory_kib: 65536,
                iterations: 3,
                parallelism: 4,
            },
            KdfAlg::Pbkdf2Sha512 => Self {
                memory_kib: 0,
                iterations: 600_000,
                parallelism: 0,
            },
        }
    }
}

/// Filename transform applied to encrypted output files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObfuscationMode {
    /// Keep the original name.
    #[default]
    Identity,
    /// Fresh random identifier per file; irreversible without the manifest.
    RandomId,
    /// SHA-256 of the file content; identical content yields identical
    /// names, still irreversible without the manifest.
    ContentHash,
}

impl ObfuscationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ObfuscationMode::Identity => "none",
            ObfuscationMode::RandomId => "random",
            ObfuscationMode::ContentHash => "content-hash",
        }
    }
}

impl FromStr for ObfuscationMode {
    type Err = CoffreError;

    fn from_str(s: &str) -> Result<Self, CoffreError> {
        match s {
            "none" => Ok(ObfuscationMode::Identity),
            "random" => Ok(ObfuscationMode::RandomId),
            "content-hash" => Ok(ObfuscationMode::ContentHash),
            other => Err(CoffreError::InvalidRequest(format!(
                "unknown obfuscation mode {other:?} (expected none, random or content-hash)"
            ))),
        }
    }
}

impl fmt::Display for ObfuscationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_id_roundtrip() {
        for alg in [
            CipherAlg::Aes256Gcm,
            CipherAlg::ChaCha20Poly1305,
            CipherAlg::XChaCha20Poly1305,
        ] {
            assert_eq!(CipherAlg::try_from(alg.wire_id()).unwrap(), alg);
        }
        for alg in [KdfAlg::Argon2id, KdfAlg::Pbkdf2Sha512] {
            assert_eq!(KdfAlg::try_from(alg.wire_id()).unwrap(), alg);
        }
    }

    #[test]
    fn test_unknown_ids_rejected() {
        assert!(CipherAlg::try_from(0).is_err());
        assert!(CipherAlg::try_from(99).is_err());
        assert!(KdfAlg::try_from(0).is_err());
    }

    #[test]
    fn test_spelling_roundtrip() {
        assert_eq!(
            "xchacha20-poly1305".parse::<CipherAlg>().unwrap(),
            CipherAlg::XChaCha20Poly1305
        );
        assert_eq!(
            "content-hash".parse::<ObfuscationMode>().unwrap(),
            ObfuscationMode::ContentHash
        );
        assert!("3des".parse::<CipherAlg>().is_err());
        assert!("rot13".parse::<ObfuscationMode>().is_err());
    }

    #[test]
    fn test_nonce_lengths() {
        assert_eq!(CipherAlg::Aes256Gcm.nonce_len(), 12);
        assert_eq!(CipherAlg::XChaCha20Poly1305.nonce_len(), 24);
    }
}
