//! PDF signing implementation.
//!
//! Signing appends one revision to the document:
//!
//! 1. a signature dictionary whose `/ByteRange` and `/Contents` are fixed-width
//!    placeholders,
//! 2. an invisible widget that is also the signature field,
//! 3. the catalog, `/AcroForm` and first page objects that now reference it,
//! 4. a cross-reference section chaining to the previous one.
//!
//! Once the revision is laid out the byte range is patched in, the covered
//! bytes are hashed, and the hex-encoded CMS SignedData replaces the
//! `/Contents` placeholder. Nothing is written until the assembled bytes
//! verify.

use super::byterange::{ByteRangeCalculator, BYTE_RANGE_PLACEHOLDER};
use super::credentials::SigningCredentials;
use super::types::{DigestAlgorithm, SignOptions, SignatureSubFilter};
use super::verifier::SignatureVerifier;
use crate::document::{FormField, PdfDocument};
use crate::error::{Error, Result};
use crate::object::{Dict, Object, ObjectRef};
use crate::storage::{write_atomic, FileMode};
use crate::writer::{find, hex_upper, AcroFormUpdate, IncrementalUpdate, ObjectSerializer};
use cms::builder::{SignedDataBuilder, SignerInfoBuilder};
use cms::cert::{CertificateChoices, IssuerAndSerialNumber};
use cms::signed_data::{EncapsulatedContentInfo, SignerIdentifier};
use const_oid::ObjectIdentifier;
use der::Encode;
use rsa::pkcs1v15::{Signature, SigningKey};
use signature::Keypair;
use spki::{AlgorithmIdentifierOwned, DynSignatureAlgorithmIdentifier, EncodePublicKey};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// id-data: the detached content is plain data.
const ID_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.1");

/// Annotation flags: Print | Locked.
const WIDGET_FLAGS: i64 = 4 | 128;

/// PDF signer that creates digital signatures.
pub struct PdfSigner {
    credentials: SigningCredentials,
    options: SignOptions,
    byte_range_calc: ByteRangeCalculator,
}

/// The signer handed to batch drivers.
pub type Signer = PdfSigner;

impl std::fmt::Debug for PdfSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfSigner")
            .field("credentials", &self.credentials)
            .field("options", &self.options)
            .finish()
    }
}

/// Load a signer from PEM files with default [`SignOptions`].
pub fn load_signer(
    cert_path: impl AsRef<Path>,
    key_path: impl AsRef<Path>,
    passphrase: &str,
) -> Result<PdfSigner> {
    PdfSigner::load(cert_path, key_path, passphrase)
}

/// Sign `input` and return the path of the signed copy.
pub fn sign(signer: &PdfSigner, input: impl AsRef<Path>) -> Result<PathBuf> {
    signer.sign_file(input)
}

/// `dir/report.pdf` becomes `dir/report_signed.pdf`.
///
/// ```
/// use std::path::Path;
/// use certigo::signatures::signed_output_path;
///
/// assert_eq!(
///     signed_output_path(Path::new("out/report.pdf")),
///     Path::new("out/report_signed.pdf")
/// );
/// ```
pub fn signed_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    let name = match input.extension() {
        Some(ext) => format!("{}_signed.{}", stem, ext.to_string_lossy()),
        None => format!("{}_signed", stem),
    };
    input.with_file_name(name)
}

impl PdfSigner {
    /// Create a new PDF signer with the given credentials and options.
    pub fn new(credentials: SigningCredentials, options: SignOptions) -> Self {
        let byte_range_calc = ByteRangeCalculator::new(options.estimated_size);
        Self {
            credentials,
            options,
            byte_range_calc,
        }
    }

    /// Load credentials from PEM files and use default options.
    pub fn load(
        cert_path: impl AsRef<Path>,
        key_path: impl AsRef<Path>,
        passphrase: &str,
    ) -> Result<Self> {
        let credentials = SigningCredentials::from_pem_files(cert_path, key_path, passphrase)?;
        Ok(Self::new(credentials, SignOptions::default()))
    }

    /// Replace the signing options.
    pub fn with_options(self, options: SignOptions) -> Self {
        Self::new(self.credentials, options)
    }

    /// Get the signing options.
    pub fn options(&self) -> &SignOptions {
        &self.options
    }

    /// Get the signing credentials.
    pub fn credentials(&self) -> &SigningCredentials {
        &self.credentials
    }

    /// Get the placeholder size for the signature.
    pub fn placeholder_size(&self) -> usize {
        self.byte_range_calc.placeholder_size()
    }

    /// Sign the PDF at `input` and write `<stem>_signed.pdf` beside it.
    ///
    /// The input file is never modified. On error no output file is left
    /// behind.
    pub fn sign_file(&self, input: impl AsRef<Path>) -> Result<PathBuf> {
        let input = input.as_ref();
        let original = Error::read_input(input)?;
        let signed = self.sign_bytes(&original)?;

        let output = signed_output_path(input);
        write_atomic(&output, &signed, FileMode::Public)?;
        log::info!(
            "Signed {} -> {} ({} bytes appended)",
            input.display(),
            output.display(),
            signed.len() - original.len()
        );
        Ok(output)
    }

    /// Sign a PDF held in memory.
    ///
    /// The result starts with `pdf` byte for byte; the signature lives in
    /// an appended revision.
    pub fn sign_bytes(&self, pdf: &[u8]) -> Result<Vec<u8>> {
        if self.options.sub_filter != SignatureSubFilter::Pkcs7Detached {
            return Err(Error::Crypto(format!(
                "cannot produce /{} signatures",
                self.options.sub_filter.as_pdf_name()
            )));
        }

        let mut doc = PdfDocument::from_bytes(pdf.to_vec())?;
        let field_name = unique_field_name(&self.options.field_name, &doc.form_fields()?);
        let mut update = IncrementalUpdate::new(&doc);
        let sig_ref = update.allocate();
        let field_ref = update.allocate();

        attach_field(&mut doc, &mut update, field_ref)?;

        let page_ref = doc.page_ref(0)?;
        let mut page = doc.resolve_dict(&Object::Reference(page_ref))?;
        let mut annots = match page.get("Annots") {
            Some(annots) => doc.resolve(annots)?.as_array().cloned().unwrap_or_default(),
            None => Vec::new(),
        };
        annots.push(Object::Reference(field_ref));
        page.insert("Annots".to_string(), Object::Array(annots));
        update.put(page_ref, &Object::Dictionary(page));

        update.put(
            field_ref,
            &Object::Dictionary(widget_dictionary(&field_name, sig_ref, page_ref)),
        );
        update.put_raw(sig_ref, self.signature_dictionary());

        let output = update.write(doc.data())?;
        let span = output
            .object_span(sig_ref)
            .ok_or_else(|| {
                Error::InvalidPdf("signature dictionary missing from update".to_string())
            })?;
        let mut bytes = output.bytes;

        let byte_range_offset = find(&bytes[span.clone()], BYTE_RANGE_PLACEHOLDER.as_bytes())
            .map(|pos| span.start + pos)
            .ok_or_else(|| Error::InvalidPdf("ByteRange placeholder not written".to_string()))?;
        let contents_offset = find(&bytes[span.clone()], b"/Contents <")
            .map(|pos| span.start + pos + b"/Contents ".len())
            .ok_or_else(|| Error::InvalidPdf("Contents placeholder not written".to_string()))?;

        let byte_range = self
            .byte_range_calc
            .calculate_byte_range(bytes.len(), contents_offset);
        ByteRangeCalculator::patch_byte_range(&mut bytes, byte_range_offset, &byte_range)?;
        log::debug!("Signature field '{}' covers ByteRange {:?}", field_name, byte_range);

        let covered = ByteRangeCalculator::extract_signed_bytes(&bytes, &byte_range)?;
        let digest = self.options.digest_algorithm.digest(&covered);
        let cms = self.signed_data(&digest)?;
        self.byte_range_calc
            .insert_signature(&mut bytes, contents_offset, &hex_upper(&cms))?;

        self.check_signature(&bytes, &field_name)?;
        Ok(bytes)
    }

    /// Detached CMS SignedData over a precomputed document digest.
    pub fn signed_data(&self, document_digest: &[u8]) -> Result<Vec<u8>> {
        let key = self.credentials.private_key().clone();
        let certificate = self.credentials.certificate();
        let algorithm = self.options.digest_algorithm;
        match algorithm {
            DigestAlgorithm::Sha256 => build_signed_data(
                &SigningKey::<sha2::Sha256>::new(key),
                certificate,
                algorithm,
                document_digest,
            ),
            DigestAlgorithm::Sha384 => build_signed_data(
                &SigningKey::<sha2::Sha384>::new(key),
                certificate,
                algorithm,
                document_digest,
            ),
            DigestAlgorithm::Sha512 => build_signed_data(
                &SigningKey::<sha2::Sha512>::new(key),
                certificate,
                algorithm,
                document_digest,
            ),
        }
    }

    /// Body of the signature dictionary with both placeholders first.
    fn signature_dictionary(&self) -> Vec<u8> {
        let serializer = ObjectSerializer::compact();
        let mut body = format!(
            "<< /ByteRange {} /Contents {} /Type /Sig /Filter /Adobe.PPKLite /SubFilter /{} /M ",
            BYTE_RANGE_PLACEHOLDER,
            self.byte_range_calc.generate_placeholder(),
            self.options.sub_filter.as_pdf_name()
        )
        .into_bytes();
        let signing_time = pdf_date(chrono::Local::now()).into_bytes();
        serializer.write_object(&mut body, &Object::String(signing_time));

        for (key, value) in [
            ("Name", &self.options.name),
            ("Reason", &self.options.reason),
            ("Location", &self.options.location),
            ("ContactInfo", &self.options.contact_info),
        ] {
            if let Some(value) = value {
                body.extend_from_slice(format!(" /{} ", key).as_bytes());
                serializer.write_object(&mut body, &Object::String(text_string(value)));
            }
        }
        body.extend_from_slice(b" >>");
        body
    }

    /// Refuse to hand out bytes whose signature does not verify.
    fn check_signature(&self, bytes: &[u8], field_name: &str) -> Result<()> {
        let results = SignatureVerifier::new().verify_document(bytes)?;
        let result = results
            .iter()
            .find(|r| r.signature_info.field_name == field_name)
            .ok_or_else(|| {
                Error::Crypto(format!("signature field '{}' not found after signing", field_name))
            })?;
        if !result.status.is_ok() {
            return Err(Error::Crypto(format!(
                "signed document does not verify: {}",
                result.messages.join("; ")
            )));
        }
        if result.certificate_expired {
            log::warn!("Signing certificate is outside its validity period");
        }
        Ok(())
    }
}

/// Add `field_ref` to the interactive form, creating the form if needed.
fn attach_field(
    doc: &mut PdfDocument,
    update: &mut IncrementalUpdate,
    field_ref: ObjectRef,
) -> Result<()> {
    let catalog_ref = doc.catalog_ref()?;
    let mut catalog = doc.catalog()?;

    let (form_ref, form) = match catalog.get("AcroForm").cloned() {
        Some(Object::Reference(form_ref)) => {
            let form = doc.resolve_dict(&Object::Reference(form_ref))?;
            (Some(form_ref), form)
        },
        Some(inline) => (None, doc.resolve_dict(&inline)?),
        None => (None, Dict::new()),
    };
    let fields = match form.get("Fields") {
        Some(fields) => doc.resolve(fields)?.as_array().cloned().unwrap_or_default(),
        None => Vec::new(),
    };
    let form = AcroFormUpdate::from_existing(form, fields)
        .add_field(field_ref)
        .signatures_exist()
        .append_only()
        .build();

    match form_ref {
        Some(form_ref) => update.put(form_ref, &Object::Dictionary(form)),
        None => {
            let form_ref = update.allocate();
            update.put(form_ref, &Object::Dictionary(form));
            catalog.insert("AcroForm".to_string(), Object::Reference(form_ref));
            update.put(catalog_ref, &Object::Dictionary(catalog));
        },
    }
    Ok(())
}

fn widget_dictionary(field_name: &str, sig_ref: ObjectRef, page_ref: ObjectRef) -> Dict {
    let mut dict = Dict::new();
    dict.insert("Type".to_string(), Object::name("Annot"));
    dict.insert("Subtype".to_string(), Object::name("Widget"));
    dict.insert("FT".to_string(), Object::name("Sig"));
    dict.insert("T".to_string(), Object::String(text_string(field_name)));
    dict.insert("V".to_string(), Object::Reference(sig_ref));
    dict.insert("F".to_string(), Object::Integer(WIDGET_FLAGS));
    dict.insert("Rect".to_string(), Object::Array(vec![Object::Integer(0); 4]));
    dict.insert("P".to_string(), Object::Reference(page_ref));
    dict
}

/// `preferred` if free, otherwise the same stem with the next free number.
fn unique_field_name(preferred: &str, existing: &[FormField]) -> String {
    let taken: HashSet<&str> = existing.iter().map(|f| f.name.as_str()).collect();
    if !taken.contains(preferred) {
        return preferred.to_string();
    }
    let stem = preferred.trim_end_matches(|c: char| c.is_ascii_digit());
    (2u32..)
        .map(|n| format!("{}{}", stem, n))
        .find(|name| !taken.contains(name.as_str()))
        .unwrap_or_else(|| format!("{}_", preferred))
}

/// PDF text string: bytes as-is for ASCII, UTF-16BE with a byte order mark otherwise.
fn text_string(value: &str) -> Vec<u8> {
    if value.is_ascii() {
        return value.as_bytes().to_vec();
    }
    let mut out = vec![0xFE, 0xFF];
    for unit in value.encode_utf16() {
        out.extend_from_slice(&unit.to_be_bytes());
    }
    out
}

/// PDF date string, e.g. `D:20240315143000+01'00'`.
fn pdf_date<Tz>(now: chrono::DateTime<Tz>) -> String
where
    Tz: chrono::TimeZone,
    Tz::Offset: std::fmt::Display,
{
    use chrono::Offset;
    let offset = now.offset().fix().local_minus_utc();
    let sign = if offset < 0 { '-' } else { '+' };
    let minutes = offset.abs() / 60;
    format!(
        "D:{}{}{:02}'{:02}'",
        now.format("%Y%m%d%H%M%S"),
        sign,
        minutes / 60,
        minutes % 60
    )
}

fn build_signed_data<S>(
    signer: &S,
    certificate: &x509_cert::Certificate,
    algorithm: DigestAlgorithm,
    document_digest: &[u8],
) -> Result<Vec<u8>>
where
    S: Keypair + DynSignatureAlgorithmIdentifier + signature::Signer<Signature>,
    S::VerifyingKey: EncodePublicKey,
{
    let content = EncapsulatedContentInfo {
        econtent_type: ID_DATA,
        econtent: None,
    };
    let digest_algorithm = AlgorithmIdentifierOwned {
        oid: algorithm.oid(),
        parameters: None,
    };
    let sid = SignerIdentifier::IssuerAndSerialNumber(IssuerAndSerialNumber {
        issuer: certificate.tbs_certificate.issuer.clone(),
        serial_number: certificate.tbs_certificate.serial_number.clone(),
    });

    let signer_info = SignerInfoBuilder::new(
        signer,
        sid,
        digest_algorithm.clone(),
        &content,
        Some(document_digest),
    )
    .map_err(|e| Error::crypto("CMS signer info", e))?;

    let content_info = SignedDataBuilder::new(&content)
        .add_digest_algorithm(digest_algorithm)
        .map_err(|e| Error::crypto("CMS digest algorithm", e))?
        .add_certificate(CertificateChoices::Certificate(certificate.clone()))
        .map_err(|e| Error::crypto("CMS certificate", e))?
        .add_signer_info::<S, Signature>(signer_info)
        .map_err(|e| Error::crypto("CMS signature", e))?
        .build()
        .map_err(|e| Error::crypto("CMS SignedData", e))?;

    content_info
        .to_der()
        .map_err(|e| Error::crypto("CMS encoding", e))
}
