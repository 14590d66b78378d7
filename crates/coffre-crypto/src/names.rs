//! Filename obfuscation strategies.
//!
//! Obfuscation applies to file stems only; the extension is preserved so
//! encrypted trees stay navigable by type. Reversal never derives anything
//! from the obfuscated name itself, it goes through the manifest.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use sha2::{Digest, Sha256};
use uuid::Uuid;

use coffre_core::{CoffreError, CoffreResult, ObfuscationMode};

/// Produces destination file names for one batch, according to the
/// configured [`ObfuscationMode`].
#[derive(Debug, Clone, Copy)]
pub struct NameObfuscator {
    mode: ObfuscationMode,
}

impl NameObfuscator {
    pub fn new(mode: ObfuscationMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> ObfuscationMode {
        self.mode
    }

    /// Whether reversing this mode requires a manifest.
    pub fn needs_manifest(&self) -> bool {
        !matches!(self.mode, ObfuscationMode::Identity)
    }

    /// Compute the output file name for `src`. Identity passes the name
    /// through unchanged; the other modes replace the stem and keep the
    /// extension.
    pub fn obfuscated_name(&self, src: &Path) -> CoffreResult<String> {
        let file_name = src
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                CoffreError::InvalidRequest(format!(
                    "source has no usable file name: {}",
                    src.display()
                ))
            })?;

        let stem = match self.mode {
            ObfuscationMode::Identity => return Ok(file_name.to_string()),
            ObfuscationMode::RandomId => Uuid::new_v4().simple().to_string(),
            ObfuscationMode::ContentHash => hash_file_contents(src)?,
        };

        match src.extension().and_then(|e| e.to_str()) {
            Some(ext) => Ok(format!("{stem}.{ext}")),
            None => Ok(stem),
        }
    }
}

/// SHA-256 of the file contents, streamed, hex-encoded.
fn hash_file_contents(path: &Path) -> CoffreResult<String> {
    let mut reader = BufReader::new(
        File::open(path).map_err(|e| CoffreError::from_io(path, e))?,
    );
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; crate::CHUNK_SIZE];
    loop {
        let n = reader
            .read(&mut buf)
            .map_err(|e| CoffreError::from_io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}
