//! Request validation, path normalization, and dispatch.

use std::fs;
use std::path::{Path, PathBuf};

use secrecy::ExposeSecret;
use tracing::{error, info};

use coffre_core::{BatchResult, CancelToken, CoffreError, CoffreResult, CryptoRequest};

use crate::progress::ProgressFn;
use crate::{directory, single_file};

const SHORT_PASSWORD_CHARS: usize = 8;

/// The entry point: validates a request, then runs it sequentially.
#[derive(Debug, Default)]
pub struct CoffreEngine;

impl CoffreEngine {
    pub fn new() -> Self {
        Self
    }

    /// Run one request to completion. Never panics and never returns an
    /// error directly: every failure ends up classified inside the
    /// [`BatchResult`].
    pub fn execute(
        &self,
        request: &CryptoRequest,
        progress: Option<&ProgressFn>,
        cancel: &CancelToken,
    ) -> BatchResult {
        match self.execute_inner(request, progress, cancel) {
            Ok(result) => result,
            Err(err) => {
                error!(error = %err, "request failed before processing");
                BatchResult::from_error_at(request.source.clone(), err)
            }
        }
    }

    fn execute_inner(
        &self,
        request: &CryptoRequest,
        progress: Option<&ProgressFn>,
        cancel: &CancelToken,
    ) -> CoffreResult<BatchResult> {
        if request.password.expose_secret().is_empty() {
            return Err(CoffreError::InvalidRequest(
                "password must not be empty".to_string(),
            ));
        }

        let source = normalize_path(&request.source)?;
        let destination = normalize_path(&request.destination)?;

        let source_meta =
            fs::metadata(&source).map_err(|e| CoffreError::from_io(&source, e))?;
        if source == destination {
            return Err(CoffreError::InvalidRequest(format!(
                "source and destination are the same path: {}",
                source.display()
            )));
        }
        if source_meta.is_dir() && destination.starts_with(&source) {
            return Err(CoffreError::InvalidRequest(format!(
                "destination {} lies inside the source directory",
                destination.display()
            )));
        }
        if destination.exists() && !destination.is_dir() {
            return Err(CoffreError::InvalidRequest(format!(
                "destination exists and is not a directory: {}",
                destination.display()
            )));
        }

        let warnings = collect_warnings(request, &destination)?;
        if !warnings.is_empty() && !request.proceed_on_warnings {
            return Err(CoffreError::InvalidRequest(format!(
                "refusing to proceed: {}",
                warnings.join("; ")
            )));
        }

        fs::create_dir_all(&destination).map_err(|e| CoffreError::from_io(&destination, e))?;

        info!(
            source = %source.display(),
            destination = %destination.display(),
            operation = %request.operation,
            cipher = %request.cipher,
            kdf = %request.kdf,
            obfuscation = %request.obfuscation,
            "request validated"
        );

        if source_meta.is_dir() {
            directory::run(request, &source, &destination, warnings, progress, cancel)
        } else {
            single_file::run(request, &source, &destination, warnings, progress, cancel)
        }
    }
}

/// Non-fatal conditions the caller should see before work starts. The run
/// proceeds past them only when the request says so.
fn collect_warnings(request: &CryptoRequest, destination: &Path) -> CoffreResult<Vec<String>> {
    let mut warnings = Vec::new();
    if request.password.expose_secret().chars().count() < SHORT_PASSWORD_CHARS {
        warnings.push(format!(
            "password is shorter than {SHORT_PASSWORD_CHARS} characters"
        ));
    }
    if destination.is_dir() {
        let mut entries = fs::read_dir(destination)
            .map_err(|e| CoffreError::from_io(destination, e))?;
        if entries.next().is_some() {
            warnings.push(format!(
                "destination {} is not empty; existing files may be overwritten",
                destination.display()
            ));
        }
    }
    Ok(warnings)
}

/// Expand `~` and environment variables, then absolutize. Unknown
/// variables are left in place rather than silently erased.
fn normalize_path(path: &Path) -> CoffreResult<PathBuf> {
    let raw = path.to_string_lossy();
    if raw.trim().is_empty() {
        return Err(CoffreError::InvalidRequest("path is empty".to_string()));
    }
    let expanded = expand_env(&expand_tilde(&raw));
    std::path::absolute(Path::new(&expanded)).map_err(|e| CoffreError::from_io(path, e))
}

fn expand_tilde(raw: &str) -> String {
    if raw == "~" || raw.starts_with("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return format!("{home}{}", &raw[1..]);
        }
    }
    raw.to_string()
}

fn expand_env(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        let rest = &raw[i + 1..];
        let (name, consumed) = if let Some(inner) = rest.strip_prefix('{') {
            match inner.find('}') {
                Some(end) => (&inner[..end], end + 2),
                None => {
                    out.push(c);
                    continue;
                }
            }
        } else {
            let end = rest
                .find(|ch: char| !ch.is_ascii_alphanumeric() && ch != '_')
                .unwrap_or(rest.len());
            (&rest[..end], end)
        };
        if name.is_empty() {
            out.push(c);
            continue;
        }
        match std::env::var(name) {
            Ok(value) => out.push_str(&value),
            Err(_) => {
                out.push(c);
                out.push_str(&rest[..consumed]);
            }
        }
        for _ in 0..consumed {
            chars.next();
        }
    }
    out
}
