//! coffre: encrypt and decrypt files or directory trees
//!
//! Commands:
//!   encrypt <source> <destination>  - encrypt a file or tree into containers
//!   decrypt <source> <destination>  - decrypt containers back to plaintext
//!
//! The password comes from COFFRE_PASSWORD or an interactive prompt. Every
//! container is self-describing, so `decrypt` needs no cipher or KDF flags.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use secrecy::{ExposeSecret, SecretString};
use tracing_subscriber::EnvFilter;

use coffre_core::{CancelToken, CipherAlg, CryptoRequest, KdfAlg, ObfuscationMode, Operation};
use coffre_engine::{CoffreEngine, ProgressFn};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "coffre",
    version,
    about = "Password-based file and directory encryption",
    long_about = "coffre: encrypt files or whole directory trees into \
                  authenticated containers, with optional filename obfuscation"
)]
struct Cli {
    /// Increase log verbosity (-v: info, -vv: debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encrypt a file or directory tree
    Encrypt {
        /// Plaintext file or directory
        source: PathBuf,
        /// Output directory (created if missing)
        destination: PathBuf,
        /// AEAD cipher: aes256-gcm, chacha20-poly1305, xchacha20-poly1305
        #[arg(long, default_value = "xchacha20-poly1305")]
        cipher: CipherAlg,
        /// Key derivation: argon2id, pbkdf2-sha512
        #[arg(long, default_value = "argon2id")]
        kdf: KdfAlg,
        /// Filename obfuscation: none, random, content-hash
        #[arg(long, default_value = "none")]
        obfuscate: ObfuscationMode,
        /// Proceed past warnings (non-empty destination, short password)
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// Decrypt a container file or an encrypted directory tree
    Decrypt {
        /// Encrypted file or directory
        source: PathBuf,
        /// Output directory (created if missing)
        destination: PathBuf,
        /// Proceed past warnings (non-empty destination)
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Encrypt {
            source,
            destination,
            cipher,
            kdf,
            obfuscate,
            yes,
        } => {
            let password = read_password(true)?;
            let request = CryptoRequest::new(source, destination, password, Operation::Encrypt)
                .with_cipher(cipher)
                .with_kdf(kdf)
                .with_obfuscation(obfuscate)
                .proceed_on_warnings(yes);
            run(request)
        }
        Commands::Decrypt {
            source,
            destination,
            yes,
        } => {
            let password = read_password(false)?;
            let request = CryptoRequest::new(source, destination, password, Operation::Decrypt)
                .proceed_on_warnings(yes);
            run(request)
        }
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

// ── Password input ────────────────────────────────────────────────────────────

/// COFFRE_PASSWORD wins; otherwise prompt. Encryption asks twice because a
/// typo here costs the data.
fn read_password(confirm: bool) -> Result<SecretString> {
    if let Ok(env) = std::env::var("COFFRE_PASSWORD") {
        return Ok(SecretString::from(env));
    }
    let first = SecretString::from(rpassword::prompt_password("Password: ")?);
    if confirm {
        let second = SecretString::from(rpassword::prompt_password("Confirm password: ")?);
        if first.expose_secret() != second.expose_secret() {
            bail!("passwords do not match");
        }
    }
    Ok(first)
}

// ── Run and report ────────────────────────────────────────────────────────────

fn run(request: CryptoRequest) -> Result<()> {
    let verb = match request.operation {
        Operation::Encrypt => "encrypt",
        Operation::Decrypt => "decrypt",
    };

    let pb = make_progress_bar(verb);
    let pb_clone = pb.clone();
    let progress: ProgressFn = Box::new(move |status| {
        pb_clone.set_length(status.total_bytes().max(1));
        pb_clone.set_position(status.processed_bytes());
        pb_clone.set_message(format!(
            "{}/{} files",
            status.processed_files(),
            status.total_files()
        ));
    });

    let cancel = CancelToken::new();
    let result = CoffreEngine::new().execute(&request, Some(&progress), &cancel);
    pb.finish_and_clear();

    for warning in result.warnings() {
        eprintln!("warning: {warning}");
    }
    for error in result.errors() {
        eprintln!("error: {error}");
    }

    println!(
        "{verb}: {}/{} files, {} in {:.1}s",
        result.processed_files(),
        result.total_files(),
        fmt_bytes(result.processed_bytes()),
        result.elapsed().as_secs_f64()
    );

    if result.is_success() {
        Ok(())
    } else if result.is_partial_success() {
        bail!(
            "partial success: {} of {} files failed",
            result.errors().len(),
            result.total_files()
        )
    } else {
        bail!("operation failed")
    }
}

fn make_progress_bar(prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new(1);
    pb.set_style(
        ProgressStyle::with_template(
            "{prefix:.bold} [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}",
        )
        .unwrap()
        .progress_chars("=>-"),
    );
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn fmt_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}
