//! Self-signed certificate issuance.

use super::key_material::EncryptedPrivateKey;
use super::subject::SubjectDetails;
use crate::certificate::CertificateSummary;
use crate::config::{IssuerConfig, MIN_KEY_BITS};
use crate::error::{Error, Result};
use crate::storage::{write_pair_atomic, FileMode, PendingFile};
use der::asn1::{GeneralizedTime, UtcTime};
use der::{Decode, Encode, EncodePem};
use pkcs8::LineEnding;
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::pkcs1v15::{Signature, SigningKey};
use rsa::pkcs8::EncodePublicKey;
use rsa::RsaPrivateKey;
use sha2::Sha512;
use spki::SubjectPublicKeyInfoOwned;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use x509_cert::builder::{Builder, CertificateBuilder, Profile};
use x509_cert::serial_number::SerialNumber;
use x509_cert::time::{Time, Validity};
use x509_cert::Certificate;
use zeroize::Zeroizing;

const SECONDS_PER_DAY: u64 = 86_400;

/// 2050-01-01T00:00:00Z, the first instant X.509 encodes as GeneralizedTime.
const UTC_TIME_LIMIT: u64 = 2_524_608_000;

/// Everything needed to issue one identity.
pub struct IssuanceRequest {
    /// Subject (and issuer) of the certificate
    pub subject: SubjectDetails,
    /// Length of the validity window in days
    pub validity_days: u32,
    passphrase: Zeroizing<String>,
}

impl std::fmt::Debug for IssuanceRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuanceRequest")
            .field("subject", &self.subject)
            .field("validity_days", &self.validity_days)
            .field("passphrase", &"[REDACTED]")
            .finish()
    }
}

impl IssuanceRequest {
    /// Bundle a subject, validity and key passphrase.
    pub fn new(subject: SubjectDetails, validity_days: u32, passphrase: impl Into<String>) -> Self {
        Self {
            subject,
            validity_days,
            passphrase: Zeroizing::new(passphrase.into()),
        }
    }
}

/// A freshly issued certificate and its encrypted key.
#[derive(Debug, Clone)]
pub struct IssuedIdentity {
    /// The self-signed certificate
    pub certificate: Certificate,
    /// The private key, encrypted under the request passphrase
    pub key: EncryptedPrivateKey,
    /// Parsed view of the certificate
    pub summary: CertificateSummary,
}

/// Where [`IssuedIdentity::persist`] put the files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityPaths {
    /// Encrypted private key
    pub key_path: PathBuf,
    /// Certificate
    pub cert_path: PathBuf,
}

impl IssuedIdentity {
    /// Certificate as PEM.
    pub fn certificate_pem(&self) -> Result<String> {
        self.certificate
            .to_pem(LineEnding::LF)
            .map_err(|e| Error::crypto("certificate PEM encoding", e))
    }

    /// Encrypted private key as PEM.
    pub fn key_pem(&self) -> Result<String> {
        self.key.to_pem()
    }

    /// Write the key and certificate files named by `config`.
    ///
    /// Existing files are replaced. Both files are written or neither is.
    pub fn persist(&self, config: &IssuerConfig) -> Result<IdentityPaths> {
        let key_pem = self.key_pem()?;
        let cert_pem = self.certificate_pem()?;
        let paths = IdentityPaths {
            key_path: config.key_path(),
            cert_path: config.cert_path(),
        };

        write_pair_atomic(
            PendingFile {
                path: &paths.key_path,
                contents: key_pem.as_bytes(),
                mode: FileMode::Private,
            },
            PendingFile {
                path: &paths.cert_path,
                contents: cert_pem.as_bytes(),
                mode: FileMode::Public,
            },
        )?;

        log::info!(
            "Wrote {} and {}",
            paths.key_path.display(),
            paths.cert_path.display()
        );
        Ok(paths)
    }
}

/// Generate a key pair and a self-signed certificate for `request`.
///
/// Nothing is written to disk; see [`IssuedIdentity::persist`].
pub fn issue(request: &IssuanceRequest, config: &IssuerConfig) -> Result<IssuedIdentity> {
    let subject = request.subject.validate()?;
    if request.validity_days == 0 {
        return Err(Error::InvalidSubject("validity must be at least one day".to_string()));
    }
    if config.key_bits < MIN_KEY_BITS {
        return Err(Error::Crypto(format!(
            "RSA keys must be at least {} bits, got {}",
            MIN_KEY_BITS, config.key_bits
        )));
    }

    log::info!(
        "Generating {}-bit RSA key for '{}'",
        config.key_bits,
        subject.common_name
    );
    let key = RsaPrivateKey::new(&mut OsRng, config.key_bits)
        .map_err(|e| Error::crypto("RSA key generation", e))?;

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| Error::crypto("system clock", e))?
        .as_secs();
    let certificate = self_signed_certificate(&subject, request.validity_days, &key, now)?;
    let der = certificate
        .to_der()
        .map_err(|e| Error::crypto("certificate encoding", e))?;
    let summary = CertificateSummary::from_der(&der)?;

    let encrypted =
        EncryptedPrivateKey::encrypt(&key, &request.passphrase, config.pbkdf2_iterations)?;

    log::info!(
        "Issued certificate serial {} for '{}', valid {} days",
        summary.serial,
        subject.common_name,
        request.validity_days
    );
    Ok(IssuedIdentity {
        certificate,
        key: encrypted,
        summary,
    })
}

/// Issue an identity and write it to the files named by `config`.
pub fn issue_and_persist(
    request: &IssuanceRequest,
    config: &IssuerConfig,
) -> Result<(IssuedIdentity, IdentityPaths)> {
    let identity = issue(request, config)?;
    let paths = identity.persist(config)?;
    Ok((identity, paths))
}

fn self_signed_certificate(
    subject: &SubjectDetails,
    validity_days: u32,
    key: &RsaPrivateKey,
    now: u64,
) -> Result<Certificate> {
    let name = subject.to_name()?;
    let serial_number = serial_number(now, OsRng.next_u32())?;
    let validity = validity_window(now, validity_days)?;

    let public_key = key
        .to_public_key()
        .to_public_key_der()
        .map_err(|e| Error::crypto("public key encoding", e))?;
    let spki = SubjectPublicKeyInfoOwned::from_der(public_key.as_bytes())
        .map_err(|e| Error::crypto("public key encoding", e))?;

    let signer = SigningKey::<Sha512>::new(key.clone());
    let profile = Profile::Leaf {
        issuer: name.clone(),
        enable_key_agreement: false,
        enable_key_encipherment: false,
    };
    let builder = CertificateBuilder::new(profile, serial_number, validity, name, spki, &signer)
        .map_err(|e| Error::crypto("certificate builder", e))?;
    builder
        .build::<Signature>()
        .map_err(|e| Error::crypto("certificate signing", e))
}

/// Issuance time in the upper 32 bits, randomness in the lower 32.
///
/// Encoded as a minimal positive INTEGER.
fn serial_number(now: u64, random: u32) -> Result<SerialNumber> {
    let value = (now << 32) | u64::from(random) | 1;
    let bytes = value.to_be_bytes();
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len() - 1);
    let mut encoded = Vec::with_capacity(9);
    if bytes[start] & 0x80 != 0 {
        encoded.push(0);
    }
    encoded.extend_from_slice(&bytes[start..]);
    SerialNumber::new(&encoded).map_err(|e| Error::crypto("serial number", e))
}

fn validity_window(now: u64, days: u32) -> Result<Validity> {
    let not_after = now
        .checked_add(u64::from(days) * SECONDS_PER_DAY)
        .ok_or_else(|| Error::InvalidSubject(format!("validity of {} days overflows", days)))?;
    Ok(Validity {
        not_before: x509_time(now)?,
        not_after: x509_time(not_after)?,
    })
}

fn x509_time(unix_secs: u64) -> Result<Time> {
    let at = Duration::from_secs(unix_secs);
    let time = if unix_secs < UTC_TIME_LIMIT {
        UtcTime::from_unix_duration(at).map(Time::UtcTime)
    } else {
        GeneralizedTime::from_unix_duration(at).map(Time::GeneralTime)
    };
    time.map_err(|e| Error::InvalidSubject(format!("validity end out of range: {}", e)))
}
