//! coffre-crypto: password-based authenticated encryption for files
//!
//! Container layout (one per encrypted file):
//! ```text
//! [magic "COFFRE"][version u8][cipher u8][kdf u8]
//! [salt_len u8][salt 16][kdf cost 3 x u32 LE][nonce_len u8][nonce 12|24]
//! [ciphertext || 16-byte tag]
//! ```
//!
//! The serialized header is the AAD for the payload, and the tag covers the
//! whole payload as a single authenticated unit: a truncated or tampered
//! file fails verification, it never silently yields partial plaintext.
//!
//! Files of any size stream through one AEAD instance in 64 KiB chunks; the
//! same format is produced one-shot for small artifacts like the manifest.

pub mod cipher;
pub mod container;
pub mod kdf;
pub mod manifest;
pub mod names;
pub mod stream;

pub use cipher::CipherStrategy;
pub use container::Header;
pub use kdf::{DerivedKey, KdfStrategy};
pub use manifest::{Manifest, MANIFEST_FILE_NAME};
pub use names::NameObfuscator;

/// Key size in bytes shared by every supported cipher (256-bit).
pub const KEY_SIZE: usize = 32;

/// Per-container KDF salt size in bytes.
pub const SALT_SIZE: usize = 16;

/// AEAD authentication tag size in bytes.
pub const TAG_SIZE: usize = 16;

/// Plaintext chunk size for the streaming engine.
pub const CHUNK_SIZE: usize = 64 * 1024;
