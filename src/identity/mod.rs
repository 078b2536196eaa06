//! Signing identity issuance.
//!
//! An identity is an RSA key pair plus a self-signed X.509 certificate for
//! it. [`issue`] creates one in memory; [`IssuedIdentity::persist`] writes the
//! passphrase-encrypted key and the certificate as PEM files, both or
//! neither.
//!
//! Nothing here prompts. Front ends collect the subject and passphrase, use
//! [`passwords_match`] and [`parse_validity_days`] to check what the operator
//! typed, and hand the result to [`issue`].

mod issuer;
mod key_material;
mod subject;

pub use issuer::{issue, issue_and_persist, IdentityPaths, IssuanceRequest, IssuedIdentity};
pub use key_material::{EncryptedPrivateKey, ENCRYPTED_KEY_LABEL};
pub use subject::SubjectDetails;

use crate::error::{Error, Result};

/// Whether the passphrase and its confirmation are identical.
///
/// The comparison does not stop at the first differing byte.
pub fn passwords_match(first: &str, second: &str) -> bool {
    let (a, b) = (first.as_bytes(), second.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Parse an operator-supplied validity in days.
///
/// Blank input selects `default`. Zero, negative and non-numeric values are
/// rejected.
pub fn parse_validity_days(input: &str, default: u32) -> Result<u32> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(default);
    }
    match trimmed.parse::<u32>() {
        Ok(0) => Err(Error::InvalidSubject("validity must be at least one day".to_string())),
        Ok(days) => Ok(days),
        Err(_) => Err(Error::InvalidSubject(format!(
            "validity must be a positive number of days, got {:?}",
            trimmed
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passwords_match() {
        assert!(passwords_match("p@ss", "p@ss"));
        assert!(passwords_match("", ""));
        assert!(!passwords_match("p@ss", "p@sS"));
        assert!(!passwords_match("p@ss", "p@ss "));
        assert!(!passwords_match("", "x"));
    }

    #[test]
    fn test_parse_validity_days() {
        assert_eq!(parse_validity_days("", 365).unwrap(), 365);
        assert_eq!(parse_validity_days("   ", 365).unwrap(), 365);
        assert_eq!(parse_validity_days(" 30 ", 365).unwrap(), 30);
        for bad in ["0", "-5", "thirty", "1.5"] {
            let err = parse_validity_days(bad, 365).unwrap_err();
            assert_eq!(err.kind(), crate::ErrorKind::Input, "input {:?}", bad);
        }
    }
}
