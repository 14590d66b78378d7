//! Key derivation strategies: password + salt -> raw key bytes.
//!
//! Two families: Argon2id (memory-hard) and PBKDF2-HMAC-SHA512 (legacy,
//! iteration-hard). Both are deterministic for fixed inputs. Cost
//! parameters default to fixed production values and are persisted in the
//! container header so decryption reproduces the exact derivation.

use argon2::{Algorithm, Argon2, Params, Version};
use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroize;

use coffre_core::{CipherAlg, CoffreError, CoffreResult, KdfAlg, KdfCost};

/// Raw derived key bytes. Zeroized on drop, redacted in Debug output.
pub struct DerivedKey {
    bytes: Vec<u8>,
}

impl DerivedKey {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl Drop for DerivedKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// One key-derivation strategy: an algorithm plus its cost parameters.
#[derive(Debug, Clone, Copy)]
pub struct KdfStrategy {
    alg: KdfAlg,
    cost: KdfCost,
}

impl KdfStrategy {
    /// Strategy with the algorithm's fixed production cost parameters.
    pub fn new(alg: KdfAlg) -> Self {
        Self {
            alg,
            cost: KdfCost::default_for(alg),
        }
    }

    /// Strategy with explicit cost parameters (decryption from a header,
    /// or cheap parameters in tests).
    pub fn with_cost(alg: KdfAlg, cost: KdfCost) -> Self {
        Self { alg, cost }
    }

    pub fn alg(&self) -> KdfAlg {
        self.alg
    }

    pub fn cost(&self) -> KdfCost {
        self.cost
    }

    /// Derive `key_size_bits / 8` key bytes from the password and salt.
    ///
    /// Underlying derivation failures map to `KeyDerivationFailed` and the
    /// error text never carries the password or partial key material.
    pub fn derive_key(
        &self,
        password: &SecretString,
        salt: &[u8],
        key_size_bits: usize,
    ) -> CoffreResult<DerivedKey> {
        if key_size_bits == 0 || key_size_bits % 8 != 0 {
            return Err(CoffreError::KeyDerivationFailed {
                reason: format!("key size {key_size_bits} is not a positive multiple of 8 bits"),
            });
        }
        let mut out = vec![0u8; key_size_bits / 8];

        let result = match self.alg {
            KdfAlg::Argon2id => self.derive_argon2id(password, salt, &mut out),
            KdfAlg::Pbkdf2Sha512 => self.derive_pbkdf2(password, salt, &mut out),
        };

        if let Err(err) = result {
            out.zeroize();
            return Err(err);
        }
        Ok(DerivedKey { bytes: out })
    }

    /// Derive the key a cipher strategy needs: sized to the cipher's key
    /// length.
    pub fn derive_for_cipher(
        &self,
        password: &SecretString,
        salt: &[u8],
        cipher: CipherAlg,
    ) -> CoffreResult<DerivedKey> {
        self.derive_key(password, salt, cipher.key_size_bits())
    }

    fn derive_argon2id(
        &self,
        password: &SecretString,
        salt: &[u8],
        out: &mut [u8],
    ) -> CoffreResult<()> {
        let params = Params::new(
            self.cost.memory_kib,
            self.cost.iterations,
            self.cost.parallelism,
            Some(out.len()),
        )
        .map_err(|e| CoffreError::KeyDerivationFailed {
            reason: format!("invalid Argon2id parameters: {e}"),
        })?;

        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        argon2
            .hash_password_into(password.expose_secret().as_bytes(), salt, out)
            .map_err(|e| CoffreError::KeyDerivationFailed {
                reason: format!("Argon2id derivation failed: {e}"),
            })
    }

    fn derive_pbkdf2(
        &self,
        password: &SecretString,
        salt: &[u8],
        out: &mut [u8],
    ) -> CoffreResult<()> {
        if self.cost.iterations == 0 {
            return Err(CoffreError::KeyDerivationFailed {
                reason: "PBKDF2 iteration count must be non-zero".into(),
            });
        }
        pbkdf2::pbkdf2_hmac::<sha2::Sha512>(
            password.expose_secret().as_bytes(),
            salt,
            self.cost.iterations,
            out,
        );
        Ok(())
    }
}
