// Allow some clippy lints that are too pedantic for this project
#![allow(clippy::type_complexity)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::enum_variant_names)]
#![allow(clippy::should_implement_trait)]
// Allow unused for tests
#![cfg_attr(test, allow(dead_code))]
#![cfg_attr(test, allow(unused_variables))]

//! # certigo
//!
//! Self-signed signing identities and append-only digital signatures for
//! generated PDF certificates.
//!
//! ## Core Features
//!
//! ### Identity Issuance
//! - **Key Generation**: RSA-4096 key pairs from the operating system RNG
//! - **Certificates**: self-signed X.509 v3, sha512WithRSAEncryption
//! - **Key Storage**: PKCS#8 encrypted with PBES2 (PBKDF2-SHA256, AES-256-CBC)
//! - **Atomic Output**: `key.pem` and `cert.pem` are written together or not at all
//!
//! ### Document Signing
//! - **Incremental Updates**: the original bytes are never rewritten
//! - **CMS Signatures**: `adbe.pkcs7.detached` with the signer certificate embedded
//! - **Xref Support**: classic tables and cross-reference streams, `/Prev` chains
//! - **Verification**: byte range, digest and RSA checks for signed output
//!
//! ## Quick Start
//!
//! ```no_run
//! use certigo::config::IssuerConfig;
//! use certigo::identity::{issue_and_persist, IssuanceRequest, SubjectDetails};
//! use certigo::signatures::{load_signer, sign};
//!
//! # fn main() -> certigo::Result<()> {
//! let subject = SubjectDetails::new("Alice Corp").email("a@x.com").country("US");
//! let request = IssuanceRequest::new(subject, 30, "p@ss");
//! issue_and_persist(&request, &IssuerConfig::default())?;
//!
//! let signer = load_signer("cert.pem", "key.pem", "p@ss")?;
//! let signed = sign(&signer, "report.pdf")?;
//! println!("{}", signed.display());
//! # Ok(())
//! # }
//! ```
//!
//! ## Errors
//!
//! Every fallible operation returns [`Result`]. [`Error::kind`] sorts each
//! failure into one of four [`ErrorKind`]s so callers can decide whether to
//! re-select a file, re-enter a passphrase, skip a document or check the disk.

#![warn(missing_docs)]

// Error handling
pub mod error;

// Configuration
pub mod config;

// Core PDF parsing
pub mod document;
pub mod lexer;
pub mod object;
pub mod objstm;
pub mod parser;
pub mod xref;

// Stream decoders
pub mod decoders;

// Incremental PDF writing
pub mod writer;

// Digital signatures
pub mod signatures;

// Identity issuance
pub mod certificate;
pub mod identity;

// Atomic file output
pub mod storage;

pub use certificate::CertificateSummary;
pub use config::IssuerConfig;
pub use document::PdfDocument;
pub use error::{Error, ErrorKind, Result};
pub use identity::{issue, passwords_match, IssuanceRequest, IssuedIdentity, SubjectDetails};
pub use signatures::{load_signer, sign, PdfSigner, SignOptions, Signer, SigningCredentials};

// Version info
/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
