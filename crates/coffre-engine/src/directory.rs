//! Directory batch runner: enumerate, process sequentially, classify
//! failures, record the manifest.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use coffre_core::{
    BatchError, BatchResult, CancelToken, CoffreError, CoffreResult, CryptoRequest, Operation,
};
use coffre_crypto::{CipherStrategy, KdfStrategy, Manifest, NameObfuscator, MANIFEST_FILE_NAME};

use crate::progress::{ProgressFn, ProgressTracker};

/// One file scheduled for processing.
struct WorkItem {
    src: PathBuf,
    /// Path relative to the source root; mirrored at the destination.
    rel: PathBuf,
    size: u64,
}

pub(crate) fn run(
    request: &CryptoRequest,
    source: &Path,
    destination: &Path,
    mut warnings: Vec<String>,
    progress: Option<&ProgressFn>,
    cancel: &CancelToken,
) -> CoffreResult<BatchResult> {
    let mut errors: Vec<BatchError> = Vec::new();
    let items = enumerate(source, request.operation, &mut warnings, &mut errors)?;

    let total_files = items.len() as u64;
    let total_bytes: u64 = items.iter().map(|i| i.size).sum();
    info!(
        source = %source.display(),
        files = total_files,
        bytes = total_bytes,
        operation = %request.operation,
        "starting directory batch"
    );

    let cipher = CipherStrategy::new(request.cipher);
    let kdf = KdfStrategy::with_cost(request.kdf, request.effective_kdf_cost());
    let obfuscator = NameObfuscator::new(request.obfuscation);
    let read_manifest = match request.operation {
        Operation::Decrypt => Manifest::try_read(source, &request.password, &cipher),
        Operation::Encrypt => None,
    };
    let mut write_manifest = Manifest::new();

    let mut tracker = ProgressTracker::new(total_files, total_bytes);
    tracker.emit(progress)?;

    let mut cancelled = false;
    for item in &items {
        if cancel.is_cancelled() {
            warnings.push("operation cancelled before completion".to_string());
            cancelled = true;
            break;
        }

        let outcome = match request.operation {
            Operation::Encrypt => encrypt_item(
                item,
                destination,
                request,
                &cipher,
                &kdf,
                &obfuscator,
                &mut write_manifest,
            ),
            Operation::Decrypt => {
                decrypt_item(item, destination, request, &cipher, read_manifest.as_ref())
            }
        };

        match outcome {
            Ok(()) => {
                tracker.file_done(item.size);
                tracker.emit(progress)?;
            }
            Err(err) => {
                // A failed tag after at least one good file means this one
                // container is damaged, not that the password is wrong.
                let fatal = err.is_fatal()
                    && !(matches!(err, CoffreError::InvalidPasswordOrCorrupted { .. })
                        && tracker.processed_files() > 0);
                warn!(path = %item.src.display(), error = %err, fatal, "file failed");
                errors.push(BatchError::new(item.src.clone(), err));
                if fatal {
                    break;
                }
            }
        }
    }

    if request.operation == Operation::Encrypt {
        if let Err(err) = write_manifest.try_save(destination, &request.password, &cipher, &kdf) {
            errors.push(BatchError::new(destination.join(MANIFEST_FILE_NAME), err));
        }
    }

    // A cancelled run reports zero progress for the whole call, whatever
    // was completed before the flag was observed. Files already written
    // (and their manifest entries) stay on disk either way.
    if cancelled {
        return BatchResult::new(
            tracker.elapsed(),
            0,
            tracker.total_files(),
            0,
            tracker.total_bytes(),
            errors,
            warnings,
        );
    }

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

/// Walk the source tree and collect the files to process, in a
/// deterministic order. Empty files and the reserved manifest name are
/// excluded up front so totals reflect real work.
fn enumerate(
    source: &Path,
    operation: Operation,
    warnings: &mut Vec<String>,
    errors: &mut Vec<BatchError>,
) -> CoffreResult<Vec<WorkItem>> {
    let mut items = Vec::new();
    for entry in WalkDir::new(source).sort_by_file_name() {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                errors.push(BatchError::new(
                    path.clone(),
                    CoffreError::from_io(path, e.into()),
                ));
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if entry.file_name() == MANIFEST_FILE_NAME {
            match operation {
                Operation::Decrypt => debug!(path = %path.display(), "manifest handled separately"),
                Operation::Encrypt => {
                    warnings.push(format!("skipping reserved name: {}", path.display()))
                }
            }
            continue;
        }
        let size = match entry.metadata() {
            Ok(m) => m.len(),
            Err(e) => {
                errors.push(BatchError::new(
                    path.to_path_buf(),
                    CoffreError::from_io(path, e.into()),
                ));
                continue;
            }
        };
        if size == 0 {
            warnings.push(format!("skipping empty file: {}", path.display()));
            continue;
        }
        let rel = path
            .strip_prefix(source)
            .map_err(|_| {
                CoffreError::Internal(format!(
                    "walked path {} escapes source root {}",
                    path.display(),
                    source.display()
                ))
            })?
            .to_path_buf();
        items.push(WorkItem {
            src: path.to_path_buf(),
            rel,
            size,
        });
    }
    Ok(items)
}

fn encrypt_item(
    item: &WorkItem,
    destination: &Path,
    request: &CryptoRequest,
    cipher: &CipherStrategy,
    kdf: &KdfStrategy,
    obfuscator: &NameObfuscator,
    manifest: &mut Manifest,
) -> CoffreResult<()> {
    let out_name = obfuscator.obfuscated_name(&item.src)?;
    let out_rel = match item.rel.parent() {
        Some(parent) if parent != Path::new("") => parent.join(&out_name),
        _ => PathBuf::from(&out_name),
    };
    if obfuscator.needs_manifest() {
        manifest.insert(&out_rel, &item.rel)?;
    }
    let dst = destination.join(&out_rel);
    ensure_parent(&dst)?;
    cipher.encrypt_file(&item.src, &dst, &request.password, kdf)?;
    Ok(())
}

fn decrypt_item(
    item: &WorkItem,
    destination: &Path,
    request: &CryptoRequest,
    cipher: &CipherStrategy,
    manifest: Option<&Manifest>,
) -> CoffreResult<()> {
    let out_rel = manifest
        .and_then(|m| m.resolve(&item.rel))
        .unwrap_or_else(|| item.rel.clone());
    let dst = destination.join(&out_rel);
    ensure_parent(&dst)?;
    cipher.decrypt_file(&item.src, &dst, &request.password)?;
    Ok(())
}

fn ensure_parent(dst: &Path) -> CoffreResult<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).map_err(|e| CoffreError::from_io(parent, e))?;
    }
    Ok(())
}
