//! Single-file runner: a batch of exactly one.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::info;

use coffre_core::{
    BatchError, BatchResult, CancelToken, CoffreError, CoffreResult, CryptoRequest, Operation,
};
use coffre_crypto::{CipherStrategy, KdfStrategy, Manifest, NameObfuscator, MANIFEST_FILE_NAME};

use crate::progress::{ProgressFn, ProgressTracker};

pub(crate) fn run(
    request: &CryptoRequest,
    source: &Path,
    destination: &Path,
    mut warnings: Vec<String>,
    progress: Option<&ProgressFn>,
    cancel: &CancelToken,
) -> CoffreResult<BatchResult> {
    let file_name = source.file_name().and_then(|n| n.to_str()).ok_or_else(|| {
        CoffreError::InvalidRequest(format!("source has no usable file name: {}", source.display()))
    })?;
    // The manifest is metadata, consumed while decrypting a directory. A
    // request pointing straight at it is a no-op, not a failure.
    if request.operation == Operation::Decrypt && file_name == MANIFEST_FILE_NAME {
        info!(source = %source.display(), "manifest is metadata; nothing to decrypt");
        warnings.push(format!(
            "skipped {}: the manifest is restored as part of a directory run",
            source.display()
        ));
        return BatchResult::new(Duration::ZERO, 0, 0, 0, 0, Vec::new(), warnings);
    }

    let size = std::fs::metadata(source)
        .map_err(|e| CoffreError::from_io(source, e))?
        .len();
    if size == 0 {
        return Err(CoffreError::InvalidRequest(format!(
            "source file is empty: {}",
            source.display()
        )));
    }

    let cipher = CipherStrategy::new(request.cipher);
    let kdf = KdfStrategy::with_cost(request.kdf, request.effective_kdf_cost());

    let mut tracker = ProgressTracker::new(1, size);
    tracker.emit(progress)?;

    if cancel.is_cancelled() {
        warnings.push("operation cancelled before completion".to_string());
        return BatchResult::new(tracker.elapsed(), 0, 1, 0, size, Vec::new(), warnings);
    }

    let outcome = match request.operation {
        Operation::Encrypt => encrypt(request, source, file_name, destination, &cipher, &kdf),
        Operation::Decrypt => decrypt(request, source, file_name, destination, &cipher),
    };

    let errors = match outcome {
        Ok(dst) => {
            tracker.file_done(size);
            tracker.emit(progress)?;
            info!(
                source = %source.display(),
                destination = %dst.display(),
                operation = %request.operation,
                "file processed"
            );
            Vec::new()
        }
        Err(err) => vec![BatchError::new(source.to_path_buf(), err)],
    };

    BatchResult::new(
        tracker.elapsed(),
        tracker.processed_files(),
        tracker.total_files(),
        tracker.processed_bytes(),
        tracker.total_bytes(),
        errors,
        warnings,
    )
}

fn encrypt(
    request: &CryptoRequest,
    source: &Path,
    file_name: &str,
    destination: &Path,
    cipher: &CipherStrategy,
    kdf: &KdfStrategy,
) -> CoffreResult<PathBuf> {
    let obfuscator = NameObfuscator::new(request.obfuscation);
    let out_name = obfuscator.obfuscated_name(source)?;
    let dst = destination.join(&out_name);
    cipher.encrypt_file(source, &dst, &request.password, kdf)?;
    if obfuscator.needs_manifest() {
        let mut manifest = Manifest::new();
        manifest.insert(Path::new(&out_name), Path::new(file_name))?;
        manifest.try_save(destination, &request.password, cipher, kdf)?;
    }
    Ok(dst)
}

fn decrypt(
    request: &CryptoRequest,
    source: &Path,
    file_name: &str,
    destination: &Path,
    cipher: &CipherStrategy,
) -> CoffreResult<PathBuf> {
    // The manifest, if any, lives next to the encrypted file.
    let out_name = source
        .parent()
        .and_then(|dir| Manifest::try_read(dir, &request.password, cipher))
        .and_then(|m| m.resolve(Path::new(file_name)))
        .unwrap_or_else(|| PathBuf::from(file_name));
    let dst = destination.join(out_name);
    cipher.decrypt_file(source, &dst, &request.password)?;
    Ok(dst)
}
