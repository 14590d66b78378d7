//! On-disk container header: encode, decode, validate.
//!
//! The header is written once at the start of every encrypted file and its
//! exact serialized bytes double as the AAD for the payload AEAD, so any
//! header tampering (including a KDF cost downgrade) changes the derived
//! expectations and fails tag verification.

use std::io::Read;

use rand::RngCore;

use coffre_core::{CipherAlg, CoffreError, CoffreResult, KdfAlg, KdfCost};

use crate::SALT_SIZE;

pub const MAGIC: &[u8; 6] = b"COFFRE";
pub const FORMAT_VERSION: u8 = 1;

// Sanity caps applied to cost fields read from untrusted containers; a
// forged header must not be able to pin gigabytes of RAM before tag
// verification ever runs.
const MAX_MEMORY_KIB: u32 = 4 * 1024 * 1024;
const MAX_ITERATIONS: u32 = 10_000_000;
const MAX_PARALLELISM: u32 = 255;

/// Parsed container header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub cipher: CipherAlg,
    pub kdf: KdfAlg,
    pub kdf_cost: KdfCost,
    pub salt: [u8; SALT_SIZE],
    pub nonce: Vec<u8>,
}

impl Header {
    /// Fresh header for an encryption: random salt and nonce, never reused.
    pub fn generate(cipher: CipherAlg, kdf: KdfAlg, kdf_cost: KdfCost) -> Self {
        let mut salt = [0u8; SALT_SIZE];
        rand::thread_rng().fill_bytes(&mut salt);
        let mut nonce = vec![0u8; cipher.nonce_len()];
        rand::thread_rng().fill_bytes(&mut nonce);
        Self {
            cipher,
            kdf,
            kdf_cost,
            salt,
            nonce,
        }
    }

    pub fn encoded_len(&self) -> usize {
        6 + 1 + 1 + 1 + 1 + SALT_SIZE + 12 + 1 + self.nonce.len()
    }

    /// Serialize to the exact on-disk byte layout (also the payload AAD).
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        out.extend_from_slice(MAGIC);
        out.push(FORMAT_VERSION);
        out.push(self.cipher.wire_id());
        out.push(self.kdf.wire_id());
        out.push(SALT_SIZE as u8);
        out.extend_from_slice(&self.salt);
        out.extend_from_slice(&self.kdf_cost.memory_kib.to_le_bytes());
        out.extend_from_slice(&self.kdf_cost.iterations.to_le_bytes());
        out.extend_from_slice(&self.kdf_cost.parallelism.to_le_bytes());
        out.push(self.nonce.len() as u8);
        out.extend_from_slice(&self.nonce);
        out
    }

    /// Parse and validate a header from the start of a container stream.
    pub fn decode(reader: &mut impl Read) -> CoffreResult<Self> {
        let mut fixed = [0u8; 39];
        read_exact(reader, &mut fixed)?;

        if &fixed[0..6] != MAGIC {
            return Err(CoffreError::Crypto(
                "not a coffre container (bad magic)".into(),
            ));
        }
        let version = fixed[6];
        if version != FORMAT_VERSION {
            return Err(CoffreError::Crypto(format!(
                "unsupported container version {version} (expected {FORMAT_VERSION})"
            )));
        }
        let cipher = CipherAlg::try_from(fixed[7])?;
        let kdf = KdfAlg::try_from(fixed[8])?;
        let salt_len = fixed[9] as usize;
        if salt_len != SALT_SIZE {
            return Err(CoffreError::Crypto(format!(
                "unsupported salt length {salt_len} (expected {SALT_SIZE})"
            )));
        }
        let mut salt = [0u8; SALT_SIZE];
        salt.copy_from_slice(&fixed[10..10 + SALT_SIZE]);

        let kdf_cost = KdfCost {
            memory_kib: u32::from_le_bytes(fixed[26..30].try_into().unwrap()),
            iterations: u32::from_le_bytes(fixed[30..34].try_into().unwrap()),
            parallelism: u32::from_le_bytes(fixed[34..38].try_into().unwrap()),
        };

        let nonce_len = fixed[38] as usize;
        if nonce_len != cipher.nonce_len() {
            return Err(CoffreError::Crypto(format!(
                "nonce length {nonce_len} does not match cipher {cipher}"
            )));
        }
        let mut nonce = vec![0u8; nonce_len];
        read_exact(reader, &mut nonce)?;

        let header = Self {
            cipher,
            kdf,
            kdf_cost,
            salt,
            nonce,
        };
        header.validate_cost()?;
        Ok(header)
    }

    fn validate_cost(&self) -> CoffreResult<()> {
        let cost = &self.kdf_cost;
        if cost.iterations == 0 || cost.iterations > MAX_ITERATIONS {
            return Err(CoffreError::Crypto(format!(
                "KDF iteration count {} outside accepted range",
                cost.iterations
            )));
        }
        if self.kdf == KdfAlg::Argon2id {
            if cost.memory_kib == 0 || cost.memory_kib > MAX_MEMORY_KIB {
                return Err(CoffreError::Crypto(format!(
                    "Argon2id memory cost {} KiB outside accepted range",
                    cost.memory_kib
                )));
            }
            if cost.parallelism == 0 || cost.parallelism > MAX_PARALLELISM {
                return Err(CoffreError::Crypto(format!(
                    "Argon2id parallelism {} outside accepted range",
                    cost.parallelism
                )));
            }
        }
        Ok(())
    }
}

fn read_exact(reader: &mut impl Read, buf: &mut [u8]) -> CoffreResult<()> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            CoffreError::Crypto("container header truncated".into())
        } else {
            CoffreError::Crypto(format!("container header unreadable: {e}"))
        }
    })
}
