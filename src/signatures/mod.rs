//! PDF digital signatures.
//!
//! Signing and verification of detached CMS (PKCS#7) signatures embedded
//! in an incremental update, following ISO 32000-1 section 12.8.
//!
//! ## Features
//!
//! - **Credentials**: a PEM certificate plus its passphrase-encrypted key,
//!   checked to belong together before anything is signed
//! - **Signature Creation**: `adbe.pkcs7.detached` signatures with the signer
//!   certificate embedded, appended without touching existing bytes
//! - **Signature Verification**: byte range, message digest and RSA checks
//!   against the embedded certificate
//! - **ByteRange Calculation**: fixed-width placeholders patched in place
//!
//! ## Example
//!
//! ```no_run
//! use certigo::signatures::{load_signer, sign};
//!
//! let signer = load_signer("cert.pem", "key.pem", "p@ss")?;
//! let signed = sign(&signer, "report.pdf")?;
//! assert!(signed.ends_with("report_signed.pdf"));
//! # Ok::<(), certigo::Error>(())
//! ```

mod byterange;
mod credentials;
mod signer;
mod types;
mod verifier;

pub use byterange::{ByteRangeCalculator, BYTE_RANGE_PLACEHOLDER};
pub use credentials::SigningCredentials;
pub use signer::{load_signer, sign, signed_output_path, PdfSigner, Signer};
pub use types::{
    DigestAlgorithm, SignOptions, SignatureInfo, SignatureSubFilter, VerificationResult,
    VerificationStatus,
};
pub use verifier::SignatureVerifier;
