//! Cipher strategies: the streaming file engine and the one-shot byte
//! variant, both producing the same container format.
//!
//! Decryption is driven by the container header (cipher, KDF, costs, salt,
//! nonce are all self-described); the password is never compared directly
//! anywhere. A failed tag verification is the only signal of a wrong
//! password or a corrupted file.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use aes_gcm::aead::{Aead, Payload};
use aes_gcm::Aes256Gcm;
use chacha20poly1305::{ChaCha20Poly1305, XChaCha20Poly1305};
use cipher::KeyInit;
use secrecy::SecretString;
use tracing::{debug, warn};

use coffre_core::{CipherAlg, CoffreError, CoffreResult};

use crate::container::Header;
use crate::kdf::KdfStrategy;
use crate::stream::StreamAead;
use crate::{CHUNK_SIZE, TAG_SIZE};

/// One AEAD cipher selection, resolved from a [`CipherAlg`].
#[derive(Debug, Clone, Copy)]
pub struct CipherStrategy {
    alg: CipherAlg,
}

impl CipherStrategy {
    pub fn new(alg: CipherAlg) -> Self {
        Self { alg }
    }

    pub fn alg(&self) -> CipherAlg {
        self.alg
    }

    /// Encrypt `src` into a container at `dst`. Returns the plaintext byte
    /// count. On any failure the partially written destination is removed.
    pub fn encrypt_file(
        &self,
        src: &Path,
        dst: &Path,
        password: &SecretString,
        kdf: &KdfStrategy,
    ) -> CoffreResult<u64> {
        let result = self.encrypt_file_inner(src, dst, password, kdf);
        if result.is_err() {
            remove_invalid_output(dst);
        }
        result
    }

    fn encrypt_file_inner(
        &self,
        src: &Path,
        dst: &Path,
        password: &SecretString,
        kdf: &KdfStrategy,
    ) -> CoffreResult<u64> {
        let header = Header::generate(self.alg, kdf.alg(), kdf.cost());
        let header_bytes = header.encode();
        let key = kdf.derive_for_cipher(password, &header.salt, self.alg)?;
        let mut aead = StreamAead::new(self.alg, &key, &header.nonce, &header_bytes)?;

        let mut reader = BufReader::new(
            File::open(src).map_err(|e| CoffreError::from_io(src, e))?,
        );
        let mut writer = BufWriter::new(
            File::create(dst).map_err(|e| CoffreError::from_io(dst, e))?,
        );
        writer
            .write_all(&header_bytes)
            .map_err(|e| CoffreError::from_io(dst, e))?;

        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut plaintext_len: u64 = 0;
        loop {
            let n = reader
                .read(&mut buf)
                .map_err(|e| CoffreError::from_io(src, e))?;
            if n == 0 {
                break;
            }
            aead.encrypt_chunk(&mut buf[..n])?;
            writer
                .write_all(&buf[..n])
                .map_err(|e| CoffreError::from_io(dst, e))?;
            plaintext_len += n as u64;
        }

        let tag = aead.finalize();
        writer
            .write_all(&tag)
            .map_err(|e| CoffreError::from_io(dst, e))?;
        writer.flush().map_err(|e| CoffreError::from_io(dst, e))?;
        debug!(src = %src.display(), dst = %dst.display(), bytes = plaintext_len, "encrypted file");
        Ok(plaintext_len)
    }

    /// Decrypt a container at `src` into `dst`. Returns the plaintext byte
    /// count. The tag is verified only after the full stream has been read;
    /// on failure the destination is removed and
    /// `InvalidPasswordOrCorrupted` is returned.
    pub fn decrypt_file(
        &self,
        src: &Path,
        dst: &Path,
        password: &SecretString,
    ) -> CoffreResult<u64> {
        let result = self.decrypt_file_inner(src, dst, password);
        if result.is_err() {
            remove_invalid_output(dst);
        }
        result
    }

    fn decrypt_file_inner(
        &self,
        src: &Path,
        dst: &Path,
        password: &SecretString,
    ) -> CoffreResult<u64> {
        let file = File::open(src).map_err(|e| CoffreError::from_io(src, e))?;
        let file_len = file
            .metadata()
            .map_err(|e| CoffreError::from_io(src, e))?
            .len();
        let mut reader = BufReader::new(file);

        let header = Header::decode(&mut reader).map_err(|e| CoffreError::CipherOperationFailed {
            path: src.to_path_buf(),
            reason: e.to_string(),
        })?;
        if header.cipher != self.alg {
            debug!(
                src = %src.display(),
                requested = %self.alg,
                actual = %header.cipher,
                "container cipher differs from requested strategy; honoring the container"
            );
        }
        let header_bytes = header.encode();

        let payload_len = file_len
            .checked_sub(header_bytes.len() as u64 + TAG_SIZE as u64)
            .ok_or_else(|| CoffreError::CipherOperationFailed {
                path: src.to_path_buf(),
                reason: "container shorter than header and tag".into(),
            })?;

        let kdf = KdfStrategy::with_cost(header.kdf, header.kdf_cost);
        let key = kdf.derive_for_cipher(password, &header.salt, header.cipher)?;
        let mut aead = StreamAead::new(header.cipher, &key, &header.nonce, &header_bytes)?;

        let mut writer = BufWriter::new(
            File::create(dst).map_err(|e| CoffreError::from_io(dst, e))?,
        );

        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut remaining = payload_len;
        while remaining > 0 {
            let want = remaining.min(CHUNK_SIZE as u64) as usize;
            read_exact_payload(&mut reader, &mut buf[..want], src)?;
            aead.decrypt_chunk(&mut buf[..want])?;
            writer
                .write_all(&buf[..want])
                .map_err(|e| CoffreError::from_io(dst, e))?;
            remaining -= want as u64;
        }

        let mut tag = [0u8; TAG_SIZE];
        read_exact_payload(&mut reader, &mut tag, src)?;
        if !aead.verify(&tag) {
            return Err(CoffreError::InvalidPasswordOrCorrupted {
                path: src.to_path_buf(),
            });
        }
        writer.flush().map_err(|e| CoffreError::from_io(dst, e))?;
        debug!(src = %src.display(), dst = %dst.display(), bytes = payload_len, "decrypted file");
        Ok(payload_len)
    }

    /// One-shot container for a small in-memory artifact (the manifest).
    /// Bit-identical to what the streaming path would produce.
    pub fn encrypt_bytes(
        &self,
        plaintext: &[u8],
        password: &SecretString,
        kdf: &KdfStrategy,
    ) -> CoffreResult<Vec<u8>> {
        let header = Header::generate(self.alg, kdf.alg(), kdf.cost());
        let header_bytes = header.encode();
        let key = kdf.derive_for_cipher(password, &header.salt, self.alg)?;

        let payload = Payload {
            msg: plaintext,
            aad: &header_bytes,
        };
        let sealed = match self.alg {
            CipherAlg::Aes256Gcm => Aes256Gcm::new_from_slice(key.as_bytes())
                .map_err(|_| CoffreError::Crypto("AES key setup failed".into()))?
                .encrypt(aes_gcm::Nonce::from_slice(&header.nonce), payload),
            CipherAlg::ChaCha20Poly1305 => ChaCha20Poly1305::new_from_slice(key.as_bytes())
                .map_err(|_| CoffreError::Crypto("ChaCha20 key setup failed".into()))?
                .encrypt(chacha20poly1305::Nonce::from_slice(&header.nonce), payload),
            CipherAlg::XChaCha20Poly1305 => XChaCha20Poly1305::new_from_slice(key.as_bytes())
                .map_err(|_| CoffreError::Crypto("XChaCha20 key setup failed".into()))?
                .encrypt(chacha20poly1305::XNonce::from_slice(&header.nonce), payload),
        }
        .map_err(|_| CoffreError::Crypto("AEAD seal failed".into()))?;

        let mut out = header_bytes;
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    /// One-shot decryption of a container held in memory.
    pub fn decrypt_bytes(&self, container: &[u8], password: &SecretString) -> CoffreResult<Vec<u8>> {
        let mut cursor = container;
        let header = Header::decode(&mut cursor)?;
        let header_len = header.encoded_len();
        let header_bytes = header.encode();
        let sealed = &container[header_len..];
        if sealed.len() < TAG_SIZE {
            return Err(CoffreError::Crypto(
                "container shorter than header and tag".into(),
            ));
        }

        let kdf = KdfStrategy::with_cost(header.kdf, header.kdf_cost);
        let key = kdf.derive_for_cipher(password, &header.salt, header.cipher)?;

        let payload = Payload {
            msg: sealed,
            aad: &header_bytes,
        };
        match header.cipher {
            CipherAlg::Aes256Gcm => Aes256Gcm::new_from_slice(key.as_bytes())
                .map_err(|_| CoffreError::Crypto("AES key setup failed".into()))?
                .decrypt(aes_gcm::Nonce::from_slice(&header.nonce), payload),
            CipherAlg::ChaCha20Poly1305 => ChaCha20Poly1305::new_from_slice(key.as_bytes())
                .map_err(|_| CoffreError::Crypto("ChaCha20 key setup failed".into()))?
                .decrypt(chacha20poly1305::Nonce::from_slice(&header.nonce), payload),
            CipherAlg::XChaCha20Poly1305 => XChaCha20Poly1305::new_from_slice(key.as_bytes())
                .map_err(|_| CoffreError::Crypto("XChaCha20 key setup failed".into()))?
                .decrypt(chacha20poly1305::XNonce::from_slice(&header.nonce), payload),
        }
        .map_err(|_| CoffreError::InvalidPasswordOrCorrupted {
            path: "<buffer>".into(),
        })
    }
}

/// A destination touched by a failed pass is invalid output; remove it so
/// nothing downstream can mistake it for a valid container or plaintext.
fn remove_invalid_output(dst: &Path) {
    if dst.exists() {
        if let Err(e) = fs::remove_file(dst) {
            warn!(path = %dst.display(), error = %e, "failed to remove invalid output");
        }
    }
}

fn read_exact_payload(reader: &mut impl Read, buf: &mut [u8], src: &Path) -> CoffreResult<()> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            CoffreError::CipherOperationFailed {
                path: src.to_path_buf(),
                reason: "container payload truncated".into(),
            }
        } else {
            CoffreError::from_io(src, e)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use coffre_core::{KdfAlg, KdfCost};

    fn fast_kdf(alg: KdfAlg) -> KdfStrategy {
        let cost = match alg {
            KdfAlg::Argon2id => KdfCost {
                memory_kib: 1024,
                iterations: 1,
                parallelism: 1,
            },
            KdfAlg::Pbkdf2Sha512 => KdfCost {
                memory_kib: 0,
                iterations: 10,
                parallelism: 0,
            },
        };
        KdfStrategy::with_cost(alg, cost)
    }

    fn password() -> SecretString {
        SecretString::from("test-password")
    }

    fn write_temp(dir: &tempfile::TempDir, name: &str, content: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(content).unwrap();
        path
    }

    #[test]
    fn test_file_roundtrip_every_cipher_and_kdf() {
        let dir = tempfile::tempdir().unwrap();
        // Larger than one chunk so the streaming loop iterates, plus an
        // uneven tail.
        let plaintext: Vec<u8> = (0u32..(CHUNK_SIZE as u32 * 2 + 517))
            .map(|i| (i % 256) as u8)
            .collect();
        let src = write_temp(&dir, "plain.bin", &plaintext);

        for cipher_alg in [
            CipherAlg::Aes256Gcm,
            CipherAlg::ChaCha20Poly1305,
            CipherAlg::XChaCha20Poly1305,
        ] {
            for kdf_alg in [KdfAlg::Argon2id, KdfAlg::Pbkdf2Sha512] {
                let strategy = CipherStrategy::new(cipher_alg);
                let enc = dir.path().join(format!("{cipher_alg}-{kdf_alg}.cfr"));
                let dec = dir.path().join(format!("{cipher_alg}-{kdf_alg}.out"));

                let written = strategy
                    .encrypt_file(&src, &enc, &password(), &fast_kdf(kdf_alg))
                    .unwrap();
                assert_eq!(written, plaintext.len() as u64);

                let read = strategy.decrypt_file(&enc, &dec, &password()).unwrap();
                assert_eq!(read, plaintext.len() as u64);
                assert_eq!(fs::read(&dec).unwrap(), plaintext);
            }
        }
    }

    #[test]
    fn test_wrong_password_fails_and_leaves_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let src = write_temp(&dir, "plain.txt", b"attack at dawn");
        let enc = dir.path().join("plain.cfr");
        let dec = dir.path().join("plain.out");

        let strategy = CipherStrategy::new(CipherAlg::XChaCha20Poly1305);
        strategy
            .encrypt_file(&src, &enc, &password(), &fast_kdf(KdfAlg::Pbkdf2Sha512))
            .unwrap();

        let err = strategy
            .decrypt_file(&enc, &dec, &SecretString::from("wrong-password"))
            .unwrap_err();
        assert!(matches!(
            err,
            CoffreError::InvalidPasswordOrCorrupted { .. }
        ));
        assert!(!dec.exists(), "invalid output must be removed");
    }

    #[test]
    fn test_flipped_ciphertext_byte_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let src = write_temp(&dir, "plain.txt", b"integrity matters");
        let enc = dir.path().join("plain.cfr");
        let dec = dir.path().join("plain.out");

        let strategy = CipherStrategy::new(CipherAlg::Aes256Gcm);
        strategy
            .encrypt_file(&src, &enc, &password(), &fast_kdf(KdfAlg::Pbkdf2Sha512))
            .unwrap();

        let mut container = fs::read(&enc).unwrap();
        let last = container.len() - 1;
        container[last] ^= 0x80;
        fs::write(&enc, &container).unwrap();

        let err = strategy.decrypt_file(&enc, &dec, &password()).unwrap_err();
        assert!(matches!(
            err,
            CoffreError::InvalidPasswordOrCorrupted { .. }
        ));
    }

    #[test]
    fn test_truncated_container_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let src = write_temp(&dir, "plain.bin", &vec![0xA5u8; 4096]);
        let enc = dir.path().join("plain.cfr");
        let dec = dir.path().join("plain.out");

        let strategy = CipherStrategy::new(CipherAlg::ChaCha20Poly1305);
        strategy
            .encrypt_file(&src, &enc, &password(), &fast_kdf(KdfAlg::Pbkdf2Sha512))
            .unwrap();

        let container = fs::read(&enc).unwrap();
        fs::write(&enc, &container[..container.len() - 100]).unwrap();

        let err = strategy.decrypt_file(&enc, &dec, &password()).unwrap_err();
        // Truncation strips tag bytes, so the stream ends in the wrong
        // place and verification must fail one way or the other.
        assert!(matches!(
            err,
            CoffreError::InvalidPasswordOrCorrupted { .. }
                | CoffreError::CipherOperationFailed { .. }
        ));
        assert!(!dec.exists());
    }

    #[test]
    fn test_streaming_and_one_shot_interoperate() {
        let dir = tempfile::tempdir().unwrap();
        let plaintext = b"small artifact, both paths, same format".to_vec();
        let kdf = fast_kdf(KdfAlg::Argon2id);

        for alg in [
            CipherAlg::Aes256Gcm,
            CipherAlg::ChaCha20Poly1305,
            CipherAlg::XChaCha20Poly1305,
        ] {
            let strategy = CipherStrategy::new(alg);

            // One-shot seal, streaming open.
            let container = strategy.encrypt_bytes(&plaintext, &password(), &kdf).unwrap();
            let enc = dir.path().join(format!("oneshot-{alg}.cfr"));
            fs::write(&enc, &container).unwrap();
            let dec = dir.path().join(format!("oneshot-{alg}.out"));
            strategy.decrypt_file(&enc, &dec, &password()).unwrap();
            assert_eq!(fs::read(&dec).unwrap(), plaintext);

            // Streaming seal, one-shot open.
            let src = write_temp(&dir, &format!("stream-{alg}.txt"), &plaintext);
            let enc2 = dir.path().join(format!("stream-{alg}.cfr"));
            strategy.encrypt_file(&src, &enc2, &password(), &kdf).unwrap();
            let recovered = strategy
                .decrypt_bytes(&fs::read(&enc2).unwrap(), &password())
                .unwrap();
            assert_eq!(recovered, plaintext);
        }
    }

    #[test]
    fn test_decrypt_honors_container_cipher() {
        let dir = tempfile::tempdir().unwrap();
        let src = write_temp(&dir, "plain.txt", b"self-describing container");
        let enc = dir.path().join("plain.cfr");
        let dec = dir.path().join("plain.out");

        CipherStrategy::new(CipherAlg::XChaCha20Poly1305)
            .encrypt_file(&src, &enc, &password(), &fast_kdf(KdfAlg::Pbkdf2Sha512))
            .unwrap();

        // A strategy constructed for a different cipher still decrypts: the
        // container header is authoritative.
        CipherStrategy::new(CipherAlg::Aes256Gcm)
            .decrypt_file(&enc, &dec, &password())
            .unwrap();
        assert_eq!(fs::read(&dec).unwrap(), b"self-describing container");
    }

    proptest::proptest! {
        #![proptest_config(proptest::prelude::ProptestConfig::with_cases(16))]

        #[test]
        fn prop_bytes_roundtrip(plaintext in proptest::collection::vec(proptest::prelude::any::<u8>(), 0..2048)) {
            let strategy = CipherStrategy::new(CipherAlg::ChaCha20Poly1305);
            let container = strategy
                .encrypt_bytes(&plaintext, &password(), &fast_kdf(KdfAlg::Pbkdf2Sha512))
                .unwrap();
            let recovered = strategy.decrypt_bytes(&container, &password()).unwrap();
            proptest::prop_assert_eq!(recovered, plaintext);
        }
    }

    #[test]
    fn test_fresh_nonce_per_encryption() {
        let dir = tempfile::tempdir().unwrap();
        let src = write_temp(&dir, "plain.txt", b"same input twice");
        let enc1 = dir.path().join("one.cfr");
        let enc2 = dir.path().join("two.cfr");

        let strategy = CipherStrategy::new(CipherAlg::Aes256Gcm);
        let kdf = fast_kdf(KdfAlg::Pbkdf2Sha512);
        strategy.encrypt_file(&src, &enc1, &password(), &kdf).unwrap();
        strategy.encrypt_file(&src, &enc2, &password(), &kdf).unwrap();

        assert_ne!(
            fs::read(&enc1).unwrap(),
            fs::read(&enc2).unwrap(),
            "fresh salt and nonce must make repeated encryptions differ"
        );
    }
}
