//! Error types for certificate issuance and PDF signing.
//!
//! Every failure the crate can produce is a variant of [`Error`]. Callers that
//! only need to decide *what to do next* (re-select a file, re-enter a
//! passphrase, give up on one document, check the disk) should branch on
//! [`Error::kind`] instead of matching individual variants.

/// Result type alias for certigo operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`].
///
/// Each variant of [`Error`] maps onto exactly one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed or missing certificate, key or PDF input.
    Input,
    /// The passphrase does not decrypt the private key.
    Authentication,
    /// Key generation, certificate signing or document signing failed.
    Crypto,
    /// Filesystem read or write failure.
    Io,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Input => "input error",
            ErrorKind::Authentication => "authentication error",
            ErrorKind::Crypto => "crypto failure",
            ErrorKind::Io => "I/O failure",
        };
        f.write_str(name)
    }
}

/// Error types that can occur while issuing identities or signing documents.
#[derive(Debug, thiserror::Error)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    /// Invalid PDF header (expected '%PDF-')
    #[error("Invalid PDF header: expected '%PDF-', found '{0}'")]
    InvalidHeader(String),

    /// Parse error at specific byte offset
    #[error("Failed to parse object at byte {offset}: {reason}")]
    ParseError {
        /// Byte offset where error occurred
        offset: usize,
        /// Reason for parse failure
        reason: String,
    },

    /// Invalid cross-reference table
    #[error("Invalid cross-reference table")]
    InvalidXref,

    /// Referenced object not found in cross-reference table
    #[error("Object not found: {0} {1} R")]
    ObjectNotFound(u32, u16),

    /// Object has wrong type
    #[error("Invalid object type: expected {expected}, found {found}")]
    InvalidObjectType {
        /// Expected object type
        expected: String,
        /// Actual object type found
        found: String,
    },

    /// Invalid PDF structure (generic)
    #[error("Invalid PDF: {0}")]
    InvalidPdf(String),

    /// Stream decoding error
    #[error("Stream decoding error: {0}")]
    Decode(String),

    /// Circular reference detected in object graph
    #[error("Circular reference detected: object {0}")]
    CircularReference(crate::object::ObjectRef),

    /// Certificate or key file is missing its PEM envelope or is not parseable
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Subject attributes rejected before issuance
    #[error("Invalid subject: {0}")]
    InvalidSubject(String),

    /// Passphrase did not decrypt the private key
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Key generation, certificate building or signature computation failed
    #[error("Cryptographic operation failed: {0}")]
    Crypto(String),

    /// Certificate public key does not belong to the private key
    #[error("Certificate does not match private key")]
    KeyMismatch,

    /// Encoded signature does not fit in the reserved /Contents placeholder
    #[error("Signature ({needed} bytes) exceeds placeholder size ({available} bytes)")]
    SignatureTooLarge {
        /// Bytes needed for the hex-encoded value including delimiters
        needed: usize,
        /// Bytes reserved in the document
        available: usize,
    },

    /// An input file could not be read
    #[error("Cannot read {}: {source}", path.display())]
    Unreadable {
        /// Path of the input file
        path: std::path::PathBuf,
        /// Underlying read failure
        source: std::io::Error,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Classify this error for caller-side recovery decisions.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidHeader(_)
            | Error::ParseError { .. }
            | Error::InvalidXref
            | Error::ObjectNotFound(..)
            | Error::InvalidObjectType { .. }
            | Error::InvalidPdf(_)
            | Error::Decode(_)
            | Error::CircularReference(_)
            | Error::InvalidCredentials(_)
            | Error::InvalidSubject(_)
            | Error::Unreadable { .. } => ErrorKind::Input,
            Error::Authentication(_) => ErrorKind::Authentication,
            Error::Crypto(_) | Error::KeyMismatch | Error::SignatureTooLarge { .. } => {
                ErrorKind::Crypto
            },
            Error::Io(_) => ErrorKind::Io,
        }
    }

    /// Wrap a lower-level cryptographic library failure.
    pub(crate) fn crypto(context: &str, err: impl std::fmt::Debug) -> Self {
        Error::Crypto(format!("{}: {:?}", context, err))
    }

    /// Read an input file, reporting failures as input errors rather than I/O failures.
    pub(crate) fn read_input(path: &std::path::Path) -> Result<Vec<u8>> {
        std::fs::read(path).map_err(|source| Error::Unreadable {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Wrap a credential decoding failure.
    pub(crate) fn credentials(context: &str, err: impl std::fmt::Display) -> Self {
        Error::InvalidCredentials(format!("{}: {}", context, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_header_error() {
        let err = Error::InvalidHeader("NotAPDF".to_string());
        let msg = format!("{}", err);
        assert!(msg.contains("Invalid PDF header"));
        assert!(msg.contains("NotAPDF"));
        assert_eq!(err.kind(), ErrorKind::Input);
    }

    #[test]
    fn test_parse_error() {
        let err = Error::ParseError {
            offset: 1234,
            reason: "invalid token".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("1234"));
        assert!(msg.contains("invalid token"));
    }

    #[test]
    fn test_object_not_found_error() {
        let err = Error::ObjectNotFound(10, 0);
        assert!(format!("{}", err).contains("10 0 R"));
    }

    #[test]
    fn test_authentication_is_its_own_kind() {
        let err = Error::Authentication("bad passphrase".to_string());
        assert_eq!(err.kind(), ErrorKind::Authentication);
        assert_ne!(err.kind(), Error::InvalidCredentials("x".into()).kind());
    }

    #[test]
    fn test_crypto_kinds() {
        assert_eq!(Error::KeyMismatch.kind(), ErrorKind::Crypto);
        assert_eq!(
            Error::SignatureTooLarge {
                needed: 10,
                available: 4
            }
            .kind(),
            ErrorKind::Crypto
        );
        assert_eq!(Error::crypto("rsa", "boom").kind(), ErrorKind::Crypto);
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(format!("{}", err).contains("IO error"));
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_missing_input_is_input_kind() {
        let err = Error::read_input(std::path::Path::new("/definitely/not/here.pdf")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Input);
        assert!(err.to_string().contains("here.pdf"));
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ErrorKind::Authentication.to_string(), "authentication error");
    }
}
