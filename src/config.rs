//! Configuration for identity issuance.

use std::path::{Path, PathBuf};

/// Smallest RSA modulus accepted for a signing identity.
pub const MIN_KEY_BITS: usize = 2048;

/// Identity issuance configuration.
///
/// Every operation takes its configuration explicitly; nothing is read from
/// process-wide state.
#[derive(Debug, Clone)]
pub struct IssuerConfig {
    /// RSA modulus length in bits.
    pub key_bits: usize,

    /// Validity used when the operator leaves the day count blank.
    pub default_validity_days: u32,

    /// PBKDF2 iteration count for the encrypted private key.
    pub pbkdf2_iterations: u32,

    /// Directory that receives the key and certificate files.
    pub output_dir: PathBuf,

    /// File name of the encrypted private key.
    pub key_file: String,

    /// File name of the certificate.
    pub cert_file: String,
}

impl Default for IssuerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl IssuerConfig {
    /// Create new configuration with defaults.
    pub fn new() -> Self {
        Self {
            key_bits: 4096,
            default_validity_days: 365,
            pbkdf2_iterations: 600_000,
            output_dir: PathBuf::from("."),
            key_file: "key.pem".to_string(),
            cert_file: "cert.pem".to_string(),
        }
    }

    /// Set the RSA modulus length.
    pub fn with_key_bits(mut self, bits: usize) -> Self {
        self.key_bits = bits;
        self
    }

    /// Set the default validity in days.
    pub fn with_default_validity_days(mut self, days: u32) -> Self {
        self.default_validity_days = days;
        self
    }

    /// Set the PBKDF2 iteration count.
    pub fn with_pbkdf2_iterations(mut self, iterations: u32) -> Self {
        self.pbkdf2_iterations = iterations;
        self
    }

    /// Set the output directory.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Full path of the key file.
    pub fn key_path(&self) -> PathBuf {
        self.output_dir.join(&self.key_file)
    }

    /// Full path of the certificate file.
    pub fn cert_path(&self) -> PathBuf {
        self.output_dir.join(&self.cert_file)
    }

    /// Output directory.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = IssuerConfig::default();
        assert_eq!(config.key_bits, 4096);
        assert_eq!(config.default_validity_days, 365);
        assert_eq!(config.key_path(), PathBuf::from("./key.pem"));
        assert_eq!(config.cert_path(), PathBuf::from("./cert.pem"));
    }

    #[test]
    fn test_builder() {
        let config = IssuerConfig::new()
            .with_key_bits(2048)
            .with_pbkdf2_iterations(1_000)
            .with_output_dir("/tmp/identity");
        assert_eq!(config.key_bits, 2048);
        assert_eq!(config.pbkdf2_iterations, 1_000);
        assert_eq!(config.key_path(), PathBuf::from("/tmp/identity/key.pem"));
    }
}
