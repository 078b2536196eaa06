//! Certificate and private key used to sign documents.

use crate::certificate::CertificateSummary;
use crate::error::{Error, Result};
use crate::identity::EncryptedPrivateKey;
use der::{DecodePem, Encode};
use rsa::pkcs8::DecodePublicKey;
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::path::Path;
use x509_cert::Certificate;

/// A certificate together with the decrypted private key it certifies.
///
/// Immutable once loaded; one value can sign any number of documents from
/// any number of threads.
#[derive(Clone)]
pub struct SigningCredentials {
    certificate: Certificate,
    certificate_der: Vec<u8>,
    key: RsaPrivateKey,
    summary: CertificateSummary,
}

impl std::fmt::Debug for SigningCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningCredentials")
            .field("subject", &self.summary.subject)
            .field("serial", &self.summary.serial)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl SigningCredentials {
    /// Load `cert.pem` and the encrypted `key.pem`, decrypting the key with
    /// `passphrase`.
    ///
    /// Missing or malformed files are input errors. A passphrase that does
    /// not decrypt the key is an authentication error.
    pub fn from_pem_files(
        cert_path: impl AsRef<Path>,
        key_path: impl AsRef<Path>,
        passphrase: &str,
    ) -> Result<Self> {
        let cert_pem = read_text(cert_path.as_ref())?;
        let key_pem = read_text(key_path.as_ref())?;
        Self::from_pem(&cert_pem, &key_pem, passphrase)
    }

    /// Same as [`from_pem_files`](Self::from_pem_files) for PEM text in memory.
    pub fn from_pem(cert_pem: &str, key_pem: &str, passphrase: &str) -> Result<Self> {
        let certificate = Certificate::from_pem(cert_pem)
            .map_err(|e| Error::credentials("malformed certificate", e))?;
        let key = EncryptedPrivateKey::from_pem(key_pem)?.decrypt(passphrase)?;
        Self::new(certificate, key)
    }

    /// Pair a certificate with a private key.
    ///
    /// Fails with [`Error::KeyMismatch`] unless the certificate's public key
    /// is the public half of `key`.
    pub fn new(certificate: Certificate, key: RsaPrivateKey) -> Result<Self> {
        let certificate_der = certificate
            .to_der()
            .map_err(|e| Error::credentials("malformed certificate", e))?;
        let summary = CertificateSummary::from_der(&certificate_der)?;

        let spki = certificate
            .tbs_certificate
            .subject_public_key_info
            .to_der()
            .map_err(|e| Error::credentials("malformed certificate key", e))?;
        let certified = RsaPublicKey::from_public_key_der(&spki).map_err(|_| Error::KeyMismatch)?;
        if certified != key.to_public_key() {
            return Err(Error::KeyMismatch);
        }

        log::debug!("Loaded signing credentials for {}", summary.subject);
        Ok(Self {
            certificate,
            certificate_der,
            key,
            summary,
        })
    }

    /// The signer certificate.
    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    /// DER encoding of the signer certificate.
    pub fn certificate_der(&self) -> &[u8] {
        &self.certificate_der
    }

    /// Parsed subject, issuer and validity of the certificate.
    pub fn summary(&self) -> &CertificateSummary {
        &self.summary
    }

    pub(crate) fn private_key(&self) -> &RsaPrivateKey {
        &self.key
    }
}

fn read_text(path: &Path) -> Result<String> {
    let bytes = Error::read_input(path)?;
    String::from_utf8(bytes).map_err(|_| {
        Error::InvalidCredentials(format!("{} is not a PEM text file", path.display()))
    })
}
