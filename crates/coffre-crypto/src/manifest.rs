//! The name manifest: the reversible record of filename obfuscation.
//!
//! The manifest maps obfuscated relative paths back to their originals and
//! is written into the destination root as an encrypted container under a
//! reserved name. Keys are stored lowercased with `/` separators so lookups
//! survive case-insensitive filesystems.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use coffre_core::{CoffreError, CoffreResult};

use crate::cipher::CipherStrategy;
use crate::kdf::KdfStrategy;

/// Reserved file name for the encrypted manifest at the destination root.
pub const MANIFEST_FILE_NAME: &str = ".coffre.manifest";

const MANIFEST_VERSION: u32 = 1;

/// Obfuscated-to-original path mapping for one encrypted tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    version: u32,
    entries: BTreeMap<String, String>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self::new()
    }
}

impl Manifest {
    pub fn new() -> Self {
        Self {
            version: MANIFEST_VERSION,
            entries: BTreeMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Record that `obfuscated` (a destination-relative path) stands for
    /// `original`. Re-recording the same pair is a no-op; the same key with
    /// a different original is a collision and fails.
    pub fn insert(&mut self, obfuscated: &Path, original: &Path) -> CoffreResult<()> {
        let key = normalize_rel_path(obfuscated);
        let value = rel_path_string(original);
        match self.entries.get(&key) {
            None => {
                self.entries.insert(key, value);
                Ok(())
            }
            Some(existing) if *existing == value => Ok(()),
            Some(existing) => Err(CoffreError::CipherOperationFailed {
                path: obfuscated.to_path_buf(),
                reason: format!(
                    "name collision: already maps to '{existing}', refusing to overwrite with '{value}'"
                ),
            }),
        }
    }

    /// Look up the original relative path for an obfuscated one. Matching
    /// is case-insensitive on the obfuscated side.
    pub fn resolve(&self, obfuscated: &Path) -> Option<PathBuf> {
        self.entries
            .get(&normalize_rel_path(obfuscated))
            .map(PathBuf::from)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Encrypt and write the manifest into `dest_root`. An empty manifest
    /// is skipped entirely.
    pub fn try_save(
        &self,
        dest_root: &Path,
        password: &SecretString,
        cipher: &CipherStrategy,
        kdf: &KdfStrategy,
    ) -> CoffreResult<()> {
        if self.is_empty() {
            return Ok(());
        }
        let json = serde_json::to_vec(self)
            .map_err(|e| CoffreError::Internal(format!("manifest serialization failed: {e}")))?;
        let container = cipher.encrypt_bytes(&json, password, kdf)?;
        let path = dest_root.join(MANIFEST_FILE_NAME);
        fs::write(&path, container).map_err(|e| CoffreError::from_io(&path, e))?;
        debug!(path = %path.display(), entries = self.len(), "wrote manifest");
        Ok(())
    }

    /// Read and decrypt the manifest from `source_root`, if one exists. An
    /// absent or undecryptable manifest is not fatal; decryption then
    /// proceeds with names as-is.
    pub fn try_read(
        source_root: &Path,
        password: &SecretString,
        cipher: &CipherStrategy,
    ) -> Option<Self> {
        let path = source_root.join(MANIFEST_FILE_NAME);
        let container = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not read manifest");
                return None;
            }
        };
        let json = match cipher.decrypt_bytes(&container, password) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not decrypt manifest; original names unavailable");
                return None;
            }
        };
        match serde_json::from_slice::<Self>(&json) {
            Ok(manifest) => {
                debug!(path = %path.display(), entries = manifest.len(), "loaded manifest");
                Some(manifest)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "manifest is not valid JSON");
                None
            }
        }
    }
}

/// Lookup key: lowercased, `/`-separated.
fn normalize_rel_path(path: &Path) -> String {
    rel_path_string(path).to_lowercase()
}

/// Stored value: `/`-separated but case-preserving.
fn rel_path_string(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
