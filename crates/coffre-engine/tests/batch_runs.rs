//! End-to-end runs through the engine: directory and single-file passes,
//! partial success, warning gates, and cancellation.

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use secrecy::SecretString;

use coffre_core::{
    CancelToken, CipherAlg, CoffreError, CryptoRequest, KdfAlg, KdfCost, ObfuscationMode,
    Operation,
};
use coffre_engine::{CoffreEngine, ProgressFn};

const PASSWORD: &str = "a long enough password";

fn fast_cost() -> KdfCost {
    KdfCost {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    }
}

fn request(src: &Path, dst: &Path, operation: Operation) -> CryptoRequest {
    CryptoRequest::new(src, dst, SecretString::from(PASSWORD), operation)
        .with_kdf(KdfAlg::Argon2id)
        .with_kdf_cost(fast_cost())
        .proceed_on_warnings(true)
}

fn write(dir: &Path, rel: &str, content: &[u8]) {
    let path = dir.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

#[test]
fn test_directory_roundtrip_with_content_hash_obfuscation() {
    let root = tempfile::tempdir().unwrap();
    let plain = root.path().join("plain");
    let vault = root.path().join("vault");
    let restored = root.path().join("restored");

    write(&plain, "notes.txt", b"ten bytes!");
    write(&plain, "empty.dat", b"");
    let big: Vec<u8> = (0..1024 * 1024u32).map(|i| (i % 251) as u8).collect();
    write(&plain, "sub/archive.bin", &big);

    let engine = CoffreEngine::new();
    let enc = engine.execute(
        &request(&plain, &vault, Operation::Encrypt)
            .with_obfuscation(ObfuscationMode::ContentHash),
        None,
        &CancelToken::new(),
    );

    // The empty file is excluded up front, with a warning.
    assert!(enc.is_success(), "errors: {:?}", enc.errors());
    assert_eq!(enc.total_files(), 2);
    assert_eq!(enc.processed_files(), 2);
    assert_eq!(enc.processed_bytes(), 10 + big.len() as u64);
    assert!(enc.warnings().iter().any(|w| w.contains("empty.dat")));

    // No original name appears at the destination; the manifest does.
    let vault_names: Vec<String> = walk_file_names(&vault);
    assert!(vault_names.contains(&".coffre.manifest".to_string()));
    assert!(!vault_names.contains(&"notes.txt".to_string()));
    assert!(!vault_names.contains(&"archive.bin".to_string()));

    let dec = engine.execute(
        &request(&vault, &restored, Operation::Decrypt),
        None,
        &CancelToken::new(),
    );
    assert!(dec.is_success(), "errors: {:?}", dec.errors());
    assert_eq!(dec.processed_files(), 2);

    assert_eq!(fs::read(restored.join("notes.txt")).unwrap(), b"ten bytes!");
    assert_eq!(fs::read(restored.join("sub/archive.bin")).unwrap(), big);
}

#[test]
fn test_truncated_file_mid_batch_is_skipped_after_first_success() {
    let root = tempfile::tempdir().unwrap();
    let plain = root.path().join("plain");
    let vault = root.path().join("vault");
    let restored = root.path().join("restored");

    for name in ["a.bin", "b.bin", "c.bin", "d.bin", "e.bin"] {
        write(&plain, name, &vec![0x42u8; 512]);
    }

    let engine = CoffreEngine::new();
    let enc = engine.execute(
        &request(&plain, &vault, Operation::Encrypt),
        None,
        &CancelToken::new(),
    );
    assert!(enc.is_success());
    assert_eq!(enc.processed_files(), 5);

    // Damage the third container (files are processed in name order).
    let damaged = vault.join("c.bin");
    let bytes = fs::read(&damaged).unwrap();
    fs::write(&damaged, &bytes[..bytes.len() - 100]).unwrap();

    let dec = engine.execute(
        &request(&vault, &restored, Operation::Decrypt),
        None,
        &CancelToken::new(),
    );
    assert!(!dec.is_success());
    assert!(dec.is_partial_success());
    assert_eq!(dec.total_files(), 5);
    assert_eq!(dec.processed_files(), 4, "only the damaged file is lost");
    assert_eq!(dec.errors().len(), 1);
    assert!(dec.errors()[0].path.ends_with("c.bin"));
    assert!(restored.join("e.bin").exists());
    assert!(!restored.join("c.bin").exists());
}

#[test]
fn test_wrong_password_aborts_directory_decrypt_immediately() {
    let root = tempfile::tempdir().unwrap();
    let plain = root.path().join("plain");
    let vault = root.path().join("vault");
    let restored = root.path().join("restored");

    write(&plain, "one.txt", b"first");
    write(&plain, "two.txt", b"second");

    let engine = CoffreEngine::new();
    assert!(engine
        .execute(
            &request(&plain, &vault, Operation::Encrypt),
            None,
            &CancelToken::new()
        )
        .is_success());

    let mut bad = request(&vault, &restored, Operation::Decrypt);
    bad.password = SecretString::from("wrong password here");
    let dec = engine.execute(&bad, None, &CancelToken::new());

    assert_eq!(dec.processed_files(), 0, "nothing decrypts under a wrong password");
    assert!(!dec.is_success());
    assert!(dec
        .errors()
        .iter()
        .any(|e| matches!(e.error, CoffreError::InvalidPasswordOrCorrupted { .. })));
    // The run aborted at the first tag failure instead of grinding through
    // every file.
    assert_eq!(dec.errors().len(), 1);
}

#[test]
fn test_single_file_roundtrip_with_random_id() {
    let root = tempfile::tempdir().unwrap();
    let src = root.path().join("secret.pdf");
    fs::write(&src, b"pdf bytes").unwrap();
    let vault = root.path().join("vault");
    let restored = root.path().join("restored");

    let engine = CoffreEngine::new();
    let enc = engine.execute(
        &request(&src, &vault, Operation::Encrypt)
            .with_cipher(CipherAlg::Aes256Gcm)
            .with_obfuscation(ObfuscationMode::RandomId),
        None,
        &CancelToken::new(),
    );
    assert!(enc.is_success(), "errors: {:?}", enc.errors());
    assert_eq!(enc.total_files(), 1);

    let names = walk_file_names(&vault);
    assert!(!names.contains(&"secret.pdf".to_string()));
    let container = names
        .iter()
        .find(|n| n.ends_with(".pdf") && *n != "secret.pdf")
        .expect("obfuscated container present");

    let dec = engine.execute(
        &request(&vault.join(container), &restored, Operation::Decrypt),
        None,
        &CancelToken::new(),
    );
    assert!(dec.is_success(), "errors: {:?}", dec.errors());
    assert_eq!(
        fs::read(restored.join("secret.pdf")).unwrap(),
        b"pdf bytes",
        "the manifest restores the original name"
    );
}

#[test]
fn test_progress_snapshots_are_monotonic_and_complete() {
    let root = tempfile::tempdir().unwrap();
    let plain = root.path().join("plain");
    let vault = root.path().join("vault");
    for i in 0..4 {
        write(&plain, &format!("f{i}.bin"), &vec![i as u8 + 1; 256]);
    }

    let snapshots = Arc::new(Mutex::new(Vec::new()));
    let sink_snaps = snapshots.clone();
    let sink: ProgressFn = Box::new(move |s| {
        sink_snaps
            .lock()
            .unwrap()
            .push((s.processed_files(), s.processed_bytes()));
    });

    let result = CoffreEngine::new().execute(
        &request(&plain, &vault, Operation::Encrypt),
        Some(&sink),
        &CancelToken::new(),
    );
    assert!(result.is_success());

    let snaps = snapshots.lock().unwrap();
    // One initial snapshot plus one per file.
    assert_eq!(snaps.len(), 5);
    assert_eq!(snaps[0], (0, 0));
    assert_eq!(snaps[4], (4, 4 * 256));
    assert!(snaps.windows(2).all(|w| w[0] <= w[1]), "progress never regresses");
}

#[test]
fn test_cancellation_before_start_processes_nothing() {
    let root = tempfile::tempdir().unwrap();
    let plain = root.path().join("plain");
    let vault = root.path().join("vault");
    write(&plain, "a.txt", b"contents");

    let cancel = CancelToken::new();
    cancel.cancel();
    let result = CoffreEngine::new().execute(
        &request(&plain, &vault, Operation::Encrypt),
        None,
        &cancel,
    );

    assert_eq!(result.processed_files(), 0);
    assert!(!result.is_success());
    assert!(result.warnings().iter().any(|w| w.contains("cancelled")));
    assert!(!vault.join("a.txt").exists());
}

#[test]
fn test_decrypting_the_manifest_itself_is_a_skip_not_a_failure() {
    let root = tempfile::tempdir().unwrap();
    let plain = root.path().join("plain");
    let vault = root.path().join("vault");
    let restored = root.path().join("restored");

    write(&plain, "doc.txt", b"contents");
    let engine = CoffreEngine::new();
    assert!(engine
        .execute(
            &request(&plain, &vault, Operation::Encrypt)
                .with_obfuscation(ObfuscationMode::RandomId),
            None,
            &CancelToken::new()
        )
        .is_success());
    assert!(vault.join(".coffre.manifest").exists());

    let result = engine.execute(
        &request(&vault.join(".coffre.manifest"), &restored, Operation::Decrypt),
        None,
        &CancelToken::new(),
    );
    assert!(result.errors().is_empty(), "errors: {:?}", result.errors());
    assert!(result.is_success(), "a skipped manifest is not a failure");
    assert_eq!(result.total_files(), 0);
    assert!(result.warnings().iter().any(|w| w.contains("manifest")));
}

#[test]
fn test_mid_batch_cancellation_reports_zero_progress() {
    let root = tempfile::tempdir().unwrap();
    let plain = root.path().join("plain");
    let vault = root.path().join("vault");
    for name in ["a.bin", "b.bin", "c.bin"] {
        write(&plain, name, &vec![0x5au8; 128]);
    }

    // Cancel from the sink as soon as the first file completes.
    let cancel = CancelToken::new();
    let sink_cancel = cancel.clone();
    let sink: ProgressFn = Box::new(move |status| {
        if status.processed_files() == 1 {
            sink_cancel.cancel();
        }
    });

    let result = CoffreEngine::new().execute(
        &request(&plain, &vault, Operation::Encrypt),
        Some(&sink),
        &cancel,
    );

    assert_eq!(result.processed_files(), 0, "a cancelled call reports zero progress");
    assert_eq!(result.processed_bytes(), 0);
    assert_eq!(result.total_files(), 3);
    assert!(!result.is_success());
    assert!(result.warnings().iter().any(|w| w.contains("cancelled")));
    // The file finished before the flag was observed stays on disk.
    assert!(vault.join("a.bin").exists());
    assert!(!vault.join("c.bin").exists());
}

#[test]
fn test_short_password_is_refused_unless_acknowledged() {
    let root = tempfile::tempdir().unwrap();
    let src = root.path().join("f.txt");
    fs::write(&src, b"data").unwrap();
    let vault = root.path().join("vault");

    let mut req = request(&src, &vault, Operation::Encrypt);
    req.password = SecretString::from("short");
    req.proceed_on_warnings = false;
    let result = CoffreEngine::new().execute(&req, None, &CancelToken::new());

    assert!(!result.is_success());
    assert!(matches!(
        result.errors()[0].error,
        CoffreError::InvalidRequest(_)
    ));
    assert_eq!(
        result.errors()[0].path, src,
        "pathless validation errors are attributed to the source"
    );
}

#[test]
fn test_missing_source_is_reported_not_panicked() {
    let root = tempfile::tempdir().unwrap();
    let result = CoffreEngine::new().execute(
        &request(
            &root.path().join("no-such-thing"),
            &root.path().join("out"),
            Operation::Encrypt,
        ),
        None,
        &CancelToken::new(),
    );
    assert!(!result.is_success());
    assert!(matches!(
        result.errors()[0].error,
        CoffreError::SourceNotFound { .. }
    ));
}

#[test]
fn test_destination_inside_source_is_rejected() {
    let root = tempfile::tempdir().unwrap();
    let plain = root.path().join("plain");
    write(&plain, "a.txt", b"data");

    let result = CoffreEngine::new().execute(
        &request(&plain, &plain.join("vault"), Operation::Encrypt),
        None,
        &CancelToken::new(),
    );
    assert!(matches!(
        result.errors()[0].error,
        CoffreError::InvalidRequest(_)
    ));
}

#[test]
fn test_identity_mode_writes_no_manifest() {
    let root = tempfile::tempdir().unwrap();
    let plain = root.path().join("plain");
    let vault = root.path().join("vault");
    write(&plain, "kept-name.txt", b"visible name");

    let result = CoffreEngine::new().execute(
        &request(&plain, &vault, Operation::Encrypt),
        None,
        &CancelToken::new(),
    );
    assert!(result.is_success());
    assert!(vault.join("kept-name.txt").exists());
    assert!(!vault.join(".coffre.manifest").exists());
}

fn walk_file_names(dir: &Path) -> Vec<String> {
    walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect()
}
