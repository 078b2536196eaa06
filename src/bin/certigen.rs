//! Issue a signing identity
//!
//! Prompts for the certificate subject, a validity period and a key
//! passphrase (entered twice), then writes `key.pem` and `cert.pem`.
//! Any subject field given on the command line is not prompted for.
//!
//! Usage:
//!   certigen
//!   certigen --out-dir identity --common-name "Alice Corp" --country US --days 30

use anyhow::{bail, Context, Result};
use certigo::config::IssuerConfig;
use certigo::identity::{
    issue_and_persist, parse_validity_days, passwords_match, IssuanceRequest, SubjectDetails,
};
use clap::{ArgAction, Parser};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use zeroize::Zeroizing;

/// Issue a self-signed certificate and encrypted private key for PDF signing.
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct CliArgs {
    /// Directory that receives key.pem and cert.pem.
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Common name (CN) of the certificate subject.
    #[arg(long)]
    common_name: Option<String>,

    /// Email address of the subject.
    #[arg(long)]
    email: Option<String>,

    /// Two-letter country code.
    #[arg(long)]
    country: Option<String>,

    /// State or province.
    #[arg(long)]
    state: Option<String>,

    /// City or locality.
    #[arg(long)]
    city: Option<String>,

    /// Organization.
    #[arg(long)]
    organization: Option<String>,

    /// Validity of the certificate in days.
    #[arg(long)]
    days: Option<u32>,

    /// RSA modulus length in bits.
    #[arg(long, default_value_t = 4096)]
    key_bits: usize,

    /// Key passphrase for non-interactive use.
    #[arg(long, env = "CERTIGO_KEY_PASSPHRASE", hide = true, hide_env_values = true)]
    passphrase: Option<String>,

    /// Use verbose output (-vv very verbose output).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

/// Read one trimmed line, or use the value given on the command line.
fn ask(input: &mut impl BufRead, label: &str, preset: Option<String>) -> Result<String> {
    if let Some(value) = preset {
        return Ok(value);
    }
    print!("{}: ", label);
    io::stdout().flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        bail!("input ended while reading {}", label);
    }
    Ok(line.trim().to_string())
}

fn ask_days(input: &mut impl BufRead, config: &IssuerConfig, preset: Option<u32>) -> Result<u32> {
    if let Some(days) = preset {
        return Ok(days);
    }
    loop {
        let label = format!("Validity in days [{}]", config.default_validity_days);
        let answer = ask(input, &label, None)?;
        match parse_validity_days(&answer, config.default_validity_days) {
            Ok(days) => return Ok(days),
            Err(e) => eprintln!("{}", e),
        }
    }
}

fn ask_passphrase(preset: Option<String>) -> Result<Zeroizing<String>> {
    if let Some(passphrase) = preset {
        return Ok(Zeroizing::new(passphrase));
    }
    loop {
        let first = Zeroizing::new(rpassword::prompt_password("Key passphrase: ")?);
        if first.is_empty() {
            eprintln!("The passphrase must not be empty.");
            continue;
        }
        let second = Zeroizing::new(rpassword::prompt_password("Repeat passphrase: ")?);
        if passwords_match(&first, &second) {
            return Ok(first);
        }
        eprintln!("Passphrases do not match, try again.");
    }
}

fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_logging(args.verbose);

    let config = IssuerConfig::new()
        .with_key_bits(args.key_bits)
        .with_output_dir(&args.out_dir);

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let subject = SubjectDetails::new(ask(&mut input, "Common name", args.common_name)?)
        .email(ask(&mut input, "Email", args.email)?)
        .country(ask(&mut input, "Country (2 letters)", args.country)?)
        .state(ask(&mut input, "State or province", args.state)?)
        .locality(ask(&mut input, "City", args.city)?)
        .organization(ask(&mut input, "Organization", args.organization)?);
    let subject = subject.validate().context("invalid certificate subject")?;
    let days = ask_days(&mut input, &config, args.days)?;
    let passphrase = ask_passphrase(args.passphrase)?;

    println!("Generating a {}-bit key, this may take a while...", config.key_bits);
    let request = IssuanceRequest::new(subject, days, passphrase.as_str());
    let (identity, paths) = issue_and_persist(&request, &config).context("issuance failed")?;

    println!("Subject: {}", identity.summary.subject);
    println!("Serial:  {}", identity.summary.serial);
    println!("Key:     {}", paths.key_path.display());
    println!("Cert:    {}", paths.cert_path.display());
    Ok(())
}
