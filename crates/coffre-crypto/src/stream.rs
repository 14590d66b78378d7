//! Streaming AEAD: one cipher instance, one tag over the whole payload.
//!
//! The one-shot `Aead` API cannot produce a single authentication tag over
//! a stream larger than memory, so this module composes the same RustCrypto
//! primitives the one-shot crates are built from: AES-256-CTR + GHASH for
//! AES-256-GCM, and (X)ChaCha20 + Poly1305 for RFC 8439. Output is
//! bit-identical to the one-shot crates, which the tests cross-check.
//!
//! A state value is created, driven, and finalized within one file's
//! processing; it is never reused across files.

use aes::Aes256;
use cipher::{BlockEncrypt, KeyInit, KeyIvInit, StreamCipher};
use chacha20::{ChaCha20, XChaCha20};
use ghash::GHash;
use poly1305::Poly1305;
use subtle::ConstantTimeEq;
use universal_hash::{Block, UniversalHash};
use zeroize::Zeroize;

use coffre_core::{CipherAlg, CoffreError, CoffreResult};

use crate::{KEY_SIZE, TAG_SIZE};
use crate::kdf::DerivedKey;

type Aes256Ctr32 = ctr::Ctr32BE<Aes256>;

/// GCM's hard limit: (2^32 - 2) blocks of 16 bytes. Applied uniformly so
/// no supported cipher ever wraps its 32-bit block counter.
const MAX_PAYLOAD: u64 = (1 << 36) - 32;

/// Feeds arbitrary-length byte runs into a 16-byte-block universal hash,
/// carrying partial blocks across calls.
struct MacLane<M: UniversalHash> {
    mac: M,
    pending: Block<M>,
    pending_len: usize,
}

impl<M: UniversalHash> MacLane<M> {
    fn new(mac: M) -> Self {
        Self {
            mac,
            pending: Default::default(),
            pending_len: 0,
        }
    }

    fn update(&mut self, mut data: &[u8]) {
        let bs = self.pending.len();
        if self.pending_len > 0 {
            let take = (bs - self.pending_len).min(data.len());
            self.pending[self.pending_len..self.pending_len + take]
                .copy_from_slice(&data[..take]);
            self.pending_len += take;
            data = &data[take..];
            if self.pending_len == bs {
                let block = self.pending.clone();
                self.mac.update(core::slice::from_ref(&block));
                self.pending_len = 0;
            }
        }
        let full = data.len() - data.len() % bs;
        for chunk in data[..full].chunks_exact(bs) {
            self.mac
                .update(core::slice::from_ref(Block::<M>::from_slice(chunk)));
        }
        if full < data.len() {
            let rest = &data[full..];
            self.pending[..rest.len()].copy_from_slice(rest);
            self.pending_len = rest.len();
        }
    }

    /// Zero-pad and absorb any buffered partial block (the AAD/ciphertext
    /// boundary padding both GCM and RFC 8439 require).
    fn pad_boundary(&mut self) {
        if self.pending_len > 0 {
            for b in self.pending[self.pending_len..].iter_mut() {
                *b = 0;
            }
            let block = self.pending.clone();
            self.mac.update(core::slice::from_ref(&block));
            self.pending_len = 0;
        }
    }

    fn finalize(self) -> Block<M> {
        debug_assert_eq!(self.pending_len, 0, "finalize on an unpadded boundary");
        self.mac.finalize()
    }
}

enum Keystream {
    Aes(Box<Aes256Ctr32>),
    ChaCha(Box<ChaCha20>),
    XChaCha(Box<XChaCha20>),
}

impl Keystream {
    fn apply(&mut self, buf: &mut [u8]) {
        match self {
            Keystream::Aes(c) => c.apply_keystream(buf),
            Keystream::ChaCha(c) => c.apply_keystream(buf),
            Keystream::XChaCha(c) => c.apply_keystream(buf),
        }
    }
}

enum MacState {
    Gcm { lane: MacLane<GHash>, ek_j0: [u8; 16] },
    Poly { lane: MacLane<Poly1305> },
}

/// One streaming AEAD pass over a single payload.
pub struct StreamAead {
    keystream: Keystream,
    mac: MacState,
    aad_len: u64,
    ct_len: u64,
}

impl StreamAead {
    /// Initialize for one payload. The key/nonce pair must be fresh; the
    /// AAD (the container header bytes) is absorbed up front.
    pub fn new(
        alg: CipherAlg,
        key: &DerivedKey,
        nonce: &[u8],
        aad: &[u8],
    ) -> CoffreResult<Self> {
        if key.len() != KEY_SIZE {
            return Err(CoffreError::Crypto(format!(
                "cipher {alg} requires a {KEY_SIZE}-byte key, got {}",
                key.len()
            )));
        }
        if nonce.len() != alg.nonce_len() {
            return Err(CoffreError::Crypto(format!(
                "cipher {alg} requires a {}-byte nonce, got {}",
                alg.nonce_len(),
                nonce.len()
            )));
        }

        let (keystream, mac) = match alg {
            CipherAlg::Aes256Gcm => {
                let block_cipher = Aes256::new_from_slice(key.as_bytes())
                    .map_err(|_| CoffreError::Crypto("AES key setup failed".into()))?;
                // H = E_K(0^128)
                let mut h = aes::Block::default();
                block_cipher.encrypt_block(&mut h);
                let ghash = GHash::new_from_slice(h.as_slice())
                    .map_err(|_| CoffreError::Crypto("GHASH key setup failed".into()))?;
                h.as_mut_slice().zeroize();

                // J0 = nonce || 0^31 || 1 for a 96-bit nonce; the counter
                // stream starts at J0, whose first block E_K(J0) masks the
                // tag and is consumed here before any payload bytes.
                let mut j0 = [0u8; 16];
                j0[..12].copy_from_slice(nonce);
                j0[15] = 1;
                let mut ctr = Aes256Ctr32::new_from_slices(key.as_bytes(), &j0)
                    .map_err(|_| CoffreError::Crypto("AES-CTR setup failed".into()))?;
                let mut ek_j0 = [0u8; 16];
                ctr.apply_keystream(&mut ek_j0);

                (
                    Keystream::Aes(Box::new(ctr)),
                    MacState::Gcm {
                        lane: MacLane::new(ghash),
                        ek_j0,
                    },
                )
            }
            CipherAlg::ChaCha20Poly1305 => {
                let mut cipher = ChaCha20::new_from_slices(key.as_bytes(), nonce)
                    .map_err(|_| CoffreError::Crypto("ChaCha20 setup failed".into()))?;
                let lane = poly_lane_from_block0(&mut cipher)?;
                (Keystream::ChaCha(Box::new(cipher)), MacState::Poly { lane })
            }
            CipherAlg::XChaCha20Poly1305 => {
                let mut cipher = XChaCha20::new_from_slices(key.as_bytes(), nonce)
                    .map_err(|_| CoffreError::Crypto("XChaCha20 setup failed".into()))?;
                let lane = poly_lane_from_block0(&mut cipher)?;
                (
                    Keystream::XChaCha(Box::new(cipher)),
                    MacState::Poly { lane },
                )
            }
        };

        let mut state = Self {
            keystream,
            mac,
            aad_len: aad.len() as u64,
            ct_len: 0,
        };
        state.mac_lane_update(aad);
        state.mac_lane_pad();
        Ok(state)
    }

    /// Encrypt one plaintext chunk in place and absorb the ciphertext.
    pub fn encrypt_chunk(&mut self, buf: &mut [u8]) -> CoffreResult<()> {
        self.grow_payload(buf.len())?;
        self.keystream.apply(buf);
        self.mac_lane_update(buf);
        Ok(())
    }

    /// Absorb one ciphertext chunk and decrypt it in place.
    pub fn decrypt_chunk(&mut self, buf: &mut [u8]) -> CoffreResult<()> {
        self.grow_payload(buf.len())?;
        self.mac_lane_update(buf);
        self.keystream.apply(buf);
        Ok(())
    }

    /// Finish the pass and produce the authentication tag.
    pub fn finalize(self) -> [u8; TAG_SIZE] {
        let StreamAead {
            mac,
            aad_len,
            ct_len,
            ..
        } = self;
        match mac {
            MacState::Gcm { mut lane, ek_j0 } => {
                lane.pad_boundary();
                // len(A) || len(C), in bits, big-endian
                let mut len_block = [0u8; 16];
                len_block[..8].copy_from_slice(&(aad_len * 8).to_be_bytes());
                len_block[8..].copy_from_slice(&(ct_len * 8).to_be_bytes());
                lane.update(&len_block);
                let mut tag: [u8; TAG_SIZE] = lane.finalize().into();
                for (t, k) in tag.iter_mut().zip(ek_j0) {
                    *t ^= k;
                }
                tag
            }
            MacState::Poly { mut lane } => {
                lane.pad_boundary();
                // len(A) || len(C), in bytes, little-endian
                let mut len_block = [0u8; 16];
                len_block[..8].copy_from_slice(&aad_len.to_le_bytes());
                len_block[8..].copy_from_slice(&ct_len.to_le_bytes());
                lane.update(&len_block);
                lane.finalize().into()
            }
        }
    }

    /// Finish the pass and verify the expected tag in constant time.
    pub fn verify(self, expected: &[u8]) -> bool {
        if expected.len() != TAG_SIZE {
            return false;
        }
        let tag = self.finalize();
        tag.as_slice().ct_eq(expected).into()
    }

    fn grow_payload(&mut self, len: usize) -> CoffreResult<()> {
        self.ct_len = self
            .ct_len
            .checked_add(len as u64)
            .filter(|&total| total <= MAX_PAYLOAD)
            .ok_or_else(|| {
                CoffreError::Crypto(format!("payload exceeds AEAD limit of {MAX_PAYLOAD} bytes"))
            })?;
        Ok(())
    }

    fn mac_lane_update(&mut self, data: &[u8]) {
        match &mut self.mac {
            MacState::Gcm { lane, .. } => lane.update(data),
            MacState::Poly { lane } => lane.update(data),
        }
    }

    fn mac_lane_pad(&mut self) {
        match &mut self.mac {
            MacState::Gcm { lane, .. } => lane.pad_boundary(),
            MacState::Poly { lane } => lane.pad_boundary(),
        }
    }
}

/// RFC 8439 one-time Poly1305 key: the first 32 bytes of keystream block 0.
/// Consuming the whole 64-byte block leaves the cipher at block 1, where
/// payload encryption starts.
fn poly_lane_from_block0(cipher: &mut impl StreamCipher) -> CoffreResult<MacLane<Poly1305>> {
    let mut block0 = [0u8; 64];
    cipher.apply_keystream(&mut block0);
    let result = Poly1305::new_from_slice(&block0[..32])
        .map(MacLane::new)
        .map_err(|_| CoffreError::Crypto("Poly1305 key setup failed".into()));
    block0.zeroize();
    result
}
