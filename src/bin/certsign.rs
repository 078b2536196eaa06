//! Sign and verify PDF documents
//!
//! Usage:
//!   certsign sign --cert cert.pem --key key.pem report.pdf other.pdf
//!   certsign verify report_signed.pdf
//!
//! The key passphrase is prompted for once per batch, or read from
//! `CERTIGO_KEY_PASSPHRASE`. A document that fails to sign is logged and
//! skipped; the exit status is non-zero if any document failed.

use anyhow::{anyhow, bail, Context, Result};
use certigo::signatures::{sign, PdfSigner, SignOptions, SignatureVerifier};
use certigo::ErrorKind;
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;
use zeroize::Zeroizing;

/// Passphrase attempts before giving up on an interactive batch.
const PASSPHRASE_ATTEMPTS: usize = 3;

/// Sign PDF documents with a certigo identity and verify signed documents.
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct CliArgs {
    #[command(subcommand)]
    command: Commands,

    /// Use verbose output (-vv very verbose output).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Sign documents, writing <name>_signed.pdf next to each.
    Sign(SignArgs),
    /// Verify the signatures in documents.
    Verify(VerifyArgs),
}

#[derive(Debug, Args)]
struct SignArgs {
    /// Signer certificate (PEM).
    #[arg(long, default_value = "cert.pem")]
    cert: PathBuf,

    /// Encrypted private key (PEM).
    #[arg(long, default_value = "key.pem")]
    key: PathBuf,

    /// Reason for signing.
    #[arg(long)]
    reason: Option<String>,

    /// Signing location.
    #[arg(long)]
    location: Option<String>,

    /// Contact information of the signer.
    #[arg(long)]
    contact: Option<String>,

    /// Signer name shown by viewers.
    #[arg(long)]
    name: Option<String>,

    /// Key passphrase for non-interactive use.
    #[arg(long, env = "CERTIGO_KEY_PASSPHRASE", hide = true, hide_env_values = true)]
    passphrase: Option<String>,

    /// Documents to sign.
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

#[derive(Debug, Args)]
struct VerifyArgs {
    /// Certificate (PEM) to treat as trusted; may be repeated.
    #[arg(long)]
    trust: Vec<PathBuf>,

    /// Documents to verify.
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

/// Load the signer, re-prompting while the passphrase is wrong.
fn load_signer(args: &SignArgs) -> Result<PdfSigner> {
    let options = SignOptions {
        reason: args.reason.clone(),
        location: args.location.clone(),
        contact_info: args.contact.clone(),
        name: args.name.clone(),
        ..SignOptions::default()
    };

    if let Some(passphrase) = &args.passphrase {
        let signer = PdfSigner::load(&args.cert, &args.key, passphrase)?;
        return Ok(signer.with_options(options));
    }

    for _ in 0..PASSPHRASE_ATTEMPTS {
        let passphrase = Zeroizing::new(rpassword::prompt_password("Key passphrase: ")?);
        match PdfSigner::load(&args.cert, &args.key, &passphrase) {
            Ok(signer) => return Ok(signer.with_options(options)),
            Err(e) if e.kind() == ErrorKind::Authentication => eprintln!("{}", e),
            Err(e) => return Err(e.into()),
        }
    }
    bail!("no valid passphrase after {} attempts", PASSPHRASE_ATTEMPTS)
}

fn run_sign(args: SignArgs) -> Result<()> {
    let signer = load_signer(&args)?;

    let mut failed = 0;
    for file in &args.files {
        match sign(&signer, file) {
            Ok(output) => println!("{} -> {}", file.display(), output.display()),
            Err(e) => {
                log::error!("{}: {} ({})", file.display(), e, e.kind());
                failed += 1;
            },
        }
    }

    if failed > 0 {
        bail!("{} of {} documents failed to sign", failed, args.files.len());
    }
    Ok(())
}

fn run_verify(args: VerifyArgs) -> Result<()> {
    let mut verifier = SignatureVerifier::new();
    for path in &args.trust {
        let pem = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read trust anchor {}", path.display()))?;
        let (_, der) = der::pem::decode_vec(pem.as_bytes())
            .map_err(|e| anyhow!("{} is not PEM: {}", path.display(), e))?;
        verifier.add_trusted_root(der);
    }

    let mut failed = 0;
    for file in &args.files {
        let data =
            std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
        let results = match verifier.verify_document(&data) {
            Ok(results) => results,
            Err(e) => {
                log::error!("{}: {}", file.display(), e);
                failed += 1;
                continue;
            },
        };

        if results.is_empty() {
            println!("{}: no signatures", file.display());
            failed += 1;
        }
        for result in results {
            let info = &result.signature_info;
            println!(
                "{} [{}]: {} (signer: {}, whole document: {})",
                file.display(),
                info.field_name,
                result.status,
                info.certificate_cn.as_deref().unwrap_or("unknown"),
                info.covers_whole_document
            );
            for message in &result.messages {
                println!("    {}", message);
            }
            if !result.status.is_ok() {
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{} signature checks failed", failed);
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_logging(args.verbose);

    match args.command {
        Commands::Sign(sign_args) => run_sign(sign_args),
        Commands::Verify(verify_args) => run_verify(verify_args),
    }
}
