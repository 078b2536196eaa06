//! PDF signature verification.
//!
//! This module handles verification of existing digital signatures in PDF documents.

use super::byterange::ByteRangeCalculator;
use super::types::{
    DigestAlgorithm, SignatureInfo, SignatureSubFilter, VerificationResult, VerificationStatus,
};
use crate::certificate::{format_timestamp, CertificateSummary};
use crate::document::PdfDocument;
use crate::error::{Error, Result};
use crate::object::{Dict, Object};
use cms::cert::CertificateChoices;
use cms::content_info::ContentInfo;
use cms::signed_data::{SignedData, SignerIdentifier, SignerInfo};
use const_oid::ObjectIdentifier;
use der::asn1::OctetString;
use der::{Decode, Encode, SliceReader};
use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::pkcs8::DecodePublicKey;
use rsa::RsaPublicKey;
use signature::Verifier;
use x509_cert::Certificate;

const ID_SIGNED_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.2");
const ID_MESSAGE_DIGEST: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.4");

/// Verifier for PDF digital signatures.
#[derive(Debug, Clone, Default)]
pub struct SignatureVerifier {
    /// Trusted root certificates (DER-encoded)
    trusted_roots: Vec<Vec<u8>>,
}

/// Signer details recovered from a CMS structure whose signature checked out.
struct VerifiedSigner {
    summary: CertificateSummary,
    cert_der: Vec<u8>,
    digest_algorithm: DigestAlgorithm,
}

impl SignatureVerifier {
    /// Create a new signature verifier.
    pub fn new() -> Self {
        Self {
            trusted_roots: Vec::new(),
        }
    }

    /// Add a trusted root certificate.
    pub fn add_trusted_root(&mut self, cert_der: Vec<u8>) {
        self.trusted_roots.push(cert_der);
    }

    /// Add multiple trusted root certificates.
    pub fn add_trusted_roots(&mut self, certs: Vec<Vec<u8>>) {
        self.trusted_roots.extend(certs);
    }

    /// Verify every signed signature field of a document.
    ///
    /// Unsigned signature fields are skipped. A malformed document is an
    /// error; a bad signature is reported in its [`VerificationResult`].
    pub fn verify_document(&self, pdf_data: &[u8]) -> Result<Vec<VerificationResult>> {
        let mut doc = PdfDocument::from_bytes(pdf_data.to_vec())?;
        let mut results = Vec::new();

        for field in doc.form_fields()? {
            if field.field_type() != Some("Sig") {
                continue;
            }
            let Some(value) = field.dict.get("V") else {
                continue;
            };
            let sig_dict = doc.resolve_dict(value)?;
            let mut result = self.verify(pdf_data, &sig_dict);
            result.signature_info.field_name = field.name.clone();
            log::debug!("Signature '{}': {}", field.name, result.status);
            results.push(result);
        }
        Ok(results)
    }

    /// Extract signature information from a signature dictionary.
    pub fn extract_signature_info(&self, sig_dict: &Object) -> Result<SignatureInfo> {
        let dict = match sig_dict {
            Object::Dictionary(d) => d,
            _ => return Err(Error::InvalidPdf("Signature must be a dictionary".to_string())),
        };

        let text = |key: &str| dict.get(key).and_then(|o| o.as_string()).map(decode_text);

        let byte_range: Vec<i64> = dict
            .get("ByteRange")
            .and_then(|o| o.as_array())
            .map(|arr| arr.iter().filter_map(|o| o.as_integer()).collect())
            .unwrap_or_default();

        Ok(SignatureInfo {
            signer_name: text("Name"),
            signing_time: text("M"),
            reason: text("Reason"),
            location: text("Location"),
            contact_info: text("ContactInfo"),
            sub_filter: dict
                .get("SubFilter")
                .and_then(|o| o.as_name())
                .and_then(SignatureSubFilter::from_pdf_name),
            byte_range,
            ..SignatureInfo::default()
        })
    }

    /// Verify one signature dictionary against the complete file bytes.
    pub fn verify(&self, pdf_data: &[u8], sig_dict: &Dict) -> VerificationResult {
        let info = match self.extract_signature_info(&Object::Dictionary(sig_dict.clone())) {
            Ok(info) => info,
            Err(e) => return VerificationResult::default().invalid(e.to_string()),
        };
        let mut result = VerificationResult {
            signature_info: info,
            ..VerificationResult::default()
        };

        match result.signature_info.sub_filter {
            Some(sub_filter) if sub_filter.is_detached_cms() => {},
            other => {
                result
                    .messages
                    .push(format!("Unsupported signature format: {:?}", other));
                return result;
            },
        }

        let byte_range: [i64; 4] = match result.signature_info.byte_range.as_slice().try_into() {
            Ok(br) => br,
            Err(_) => return result.invalid("Invalid ByteRange: expected 4 elements"),
        };

        // The signed revision ends where the second range ends.
        let revision_end = byte_range[2].checked_add(byte_range[3]);
        let revision = match revision_end {
            Some(end) if end > 0 && end as u64 <= pdf_data.len() as u64 => {
                &pdf_data[..end as usize]
            },
            _ => return result.invalid("ByteRange extends past the end of the file"),
        };
        result.signature_info.covers_whole_document = revision.len() == pdf_data.len();

        if let Err(e) = ByteRangeCalculator::validate_byte_range(revision, &byte_range) {
            result.document_modified = true;
            return result.invalid(format!("ByteRange validation failed: {}", e));
        }

        let Some(contents) = sig_dict.get("Contents").and_then(|o| o.as_string()) else {
            return result.invalid("Signature dictionary has no /Contents");
        };

        let signed_bytes = match ByteRangeCalculator::extract_signed_bytes(revision, &byte_range) {
            Ok(bytes) => bytes,
            Err(e) => return result.invalid(e.to_string()),
        };

        let signer = match verify_pkcs7(contents, &signed_bytes) {
            Ok(signer) => signer,
            Err(e) => {
                result.document_modified = true;
                return result.invalid(format!("Signature verification failed: {}", e));
            },
        };

        let info = &mut result.signature_info;
        info.digest_algorithm = Some(signer.digest_algorithm);
        info.certificate_cn = signer.summary.common_name.clone();
        info.certificate_issuer = Some(signer.summary.issuer.clone());
        info.valid_from = Some(format_timestamp(signer.summary.not_before));
        info.valid_to = Some(format_timestamp(signer.summary.not_after));

        result.status = VerificationStatus::Valid;
        result.certificate_trusted = self.is_certificate_trusted(&signer.cert_der);
        if !self.trusted_roots.is_empty() && !result.certificate_trusted {
            result.status = VerificationStatus::ValidWithWarnings;
            result
                .messages
                .push("Certificate is not a trusted root".to_string());
        }

        result.certificate_expired = !signer.summary.is_valid_at(chrono::Utc::now().timestamp());
        if result.certificate_expired {
            result.status = VerificationStatus::ValidWithWarnings;
            result
                .messages
                .push("Certificate is outside its validity period".to_string());
        }

        if !result.signature_info.covers_whole_document {
            result
                .messages
                .push("Document was updated after this signature".to_string());
        }

        result
    }

    /// Check if a certificate is in the trusted roots.
    fn is_certificate_trusted(&self, cert_der: &[u8]) -> bool {
        self.trusted_roots.iter().any(|root| root == cert_der)
    }
}

/// Check a detached CMS SignedData against the bytes it claims to cover.
///
/// `contents` may carry trailing zero padding from the placeholder.
fn verify_pkcs7(contents: &[u8], signed_bytes: &[u8]) -> Result<VerifiedSigner> {
    let mut reader = SliceReader::new(contents).map_err(|e| Error::crypto("CMS", e))?;
    let content_info =
        ContentInfo::decode(&mut reader).map_err(|e| Error::crypto("malformed CMS", e))?;
    if content_info.content_type != ID_SIGNED_DATA {
        return Err(Error::Crypto(format!(
            "CMS content is {}, not SignedData",
            content_info.content_type
        )));
    }
    let signed_data: SignedData = content_info
        .content
        .decode_as()
        .map_err(|e| Error::crypto("malformed SignedData", e))?;
    if signed_data.encap_content_info.econtent.is_some() {
        return Err(Error::Crypto("SignedData is not detached".to_string()));
    }

    let signer_info = signed_data
        .signer_infos
        .0
        .iter()
        .next()
        .ok_or_else(|| Error::Crypto("SignedData has no signer".to_string()))?;
    let digest_algorithm = DigestAlgorithm::from_oid(&signer_info.digest_alg.oid)
        .ok_or_else(|| {
            Error::Crypto(format!("unsupported digest {}", signer_info.digest_alg.oid))
        })?;
    let certificate = signer_certificate(&signed_data, signer_info)
        .ok_or_else(|| Error::Crypto("signer certificate is not embedded".to_string()))?;

    let signed_attrs = signer_info
        .signed_attrs
        .as_ref()
        .ok_or_else(|| Error::Crypto("SignerInfo has no signed attributes".to_string()))?;
    let message_digest = signed_attrs
        .iter()
        .find(|attr| attr.oid == ID_MESSAGE_DIGEST)
        .and_then(|attr| attr.values.iter().next())
        .ok_or_else(|| Error::Crypto("messageDigest attribute missing".to_string()))?
        .decode_as::<OctetString>()
        .map_err(|e| Error::crypto("messageDigest attribute", e))?;
    if message_digest.as_bytes() != digest_algorithm.digest(signed_bytes).as_slice() {
        return Err(Error::Crypto("document digest does not match the signed digest".to_string()));
    }

    let spki = certificate
        .tbs_certificate
        .subject_public_key_info
        .to_der()
        .map_err(|e| Error::crypto("signer public key", e))?;
    let public_key = RsaPublicKey::from_public_key_der(&spki)
        .map_err(|e| Error::crypto("signer public key is not RSA", e))?;
    let attrs_der = signed_attrs
        .to_der()
        .map_err(|e| Error::crypto("signed attributes", e))?;
    let signature = Signature::try_from(signer_info.signature.as_bytes())
        .map_err(|e| Error::crypto("signature value", e))?;

    let verified = match digest_algorithm {
        DigestAlgorithm::Sha256 => {
            VerifyingKey::<sha2::Sha256>::new(public_key).verify(&attrs_der, &signature)
        },
        DigestAlgorithm::Sha384 => {
            VerifyingKey::<sha2::Sha384>::new(public_key).verify(&attrs_der, &signature)
        },
        DigestAlgorithm::Sha512 => {
            VerifyingKey::<sha2::Sha512>::new(public_key).verify(&attrs_der, &signature)
        },
    };
    verified.map_err(|_| Error::Crypto("RSA signature does not match".to_string()))?;

    let cert_der = certificate
        .to_der()
        .map_err(|e| Error::crypto("signer certificate", e))?;
    Ok(VerifiedSigner {
        summary: CertificateSummary::from_der(&cert_der)?,
        cert_der,
        digest_algorithm,
    })
}

/// The embedded certificate named by the signer identifier, or the only one.
fn signer_certificate<'a>(
    signed_data: &'a SignedData,
    signer_info: &SignerInfo,
) -> Option<&'a Certificate> {
    let certs: Vec<&Certificate> = signed_data
        .certificates
        .as_ref()?
        .0
        .iter()
        .filter_map(|choice| match choice {
            CertificateChoices::Certificate(cert) => Some(cert),
            _ => None,
        })
        .collect();

    let named = match &signer_info.sid {
        SignerIdentifier::IssuerAndSerialNumber(id) => certs.iter().copied().find(|cert| {
            cert.tbs_certificate.issuer == id.issuer
                && cert.tbs_certificate.serial_number == id.serial_number
        }),
        SignerIdentifier::SubjectKeyIdentifier(_) => None,
    };
    match (named, certs.as_slice()) {
        (Some(cert), _) => Some(cert),
        (None, [only]) => Some(*only),
        _ => None,
    }
}

/// Decode a PDF text string (UTF-16BE with BOM, otherwise byte-per-char).
fn decode_text(bytes: &[u8]) -> String {
    match bytes {
        [0xFE, 0xFF, rest @ ..] => {
            let units: Vec<u16> = rest
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        },
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn make_sig_dict() -> Object {
        let mut dict = HashMap::new();
        dict.insert("Type".to_string(), Object::Name("Sig".to_string()));
        dict.insert("Filter".to_string(), Object::Name("Adobe.PPKLite".to_string()));
        dict.insert("SubFilter".to_string(), Object::Name("adbe.pkcs7.detached".to_string()));
        dict.insert("Name".to_string(), Object::String(b"Test Signer".to_vec()));
        dict.insert("Reason".to_string(), Object::String(b"Testing".to_vec()));
        dict.insert(
            "Location".to_string(),
            Object::String(vec![0xFE, 0xFF, 0, b'Z', 0, 0xFC, 0, b'r', 0, b'i', 0, b'c', 0, b'h']),
        );
        dict.insert("M".to_string(), Object::String(b"D:20240101120000+00'00'".to_vec()));
        dict.insert(
            "ByteRange".to_string(),
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(100),
                Object::Integer(200),
                Object::Integer(50),
            ]),
        );
        Object::Dictionary(dict)
    }

    #[test]
    fn test_extract_signature_info() {
        let verifier = SignatureVerifier::new();
        let sig_dict = make_sig_dict();

        let info = verifier.extract_signature_info(&sig_dict).unwrap();

        assert_eq!(info.signer_name, Some("Test Signer".to_string()));
        assert_eq!(info.reason, Some("Testing".to_string()));
        assert_eq!(info.location, Some("Zürich".to_string()));
        assert_eq!(info.sub_filter, Some(SignatureSubFilter::Pkcs7Detached));
        assert_eq!(info.byte_range, vec![0, 100, 200, 50]);
    }

    #[test]
    fn test_extract_signature_info_rejects_non_dict() {
        let verifier = SignatureVerifier::new();
        assert!(verifier.extract_signature_info(&Object::Integer(1)).is_err());
    }

    #[test]
    fn test_verify_rejects_byte_range_past_eof() {
        let verifier = SignatureVerifier::new();
        let dict = make_sig_dict().into_dict().unwrap();
        let result = verifier.verify(&[b'x'; 120], &dict);
        assert_eq!(result.status, VerificationStatus::Invalid);
    }

    #[test]
    fn test_verify_rejects_garbage_contents() {
        let verifier = SignatureVerifier::new();
        let data = b"AAA<0F>BB".to_vec();
        let mut dict = make_sig_dict().into_dict().unwrap();
        dict.insert(
            "ByteRange".to_string(),
            Object::Array([0, 3, 7, 2].iter().map(|&v| Object::Integer(v)).collect()),
        );
        dict.insert("Contents".to_string(), Object::String(vec![0x0F]));

        let result = verifier.verify(&data, &dict);
        assert_eq!(result.status, VerificationStatus::Invalid);
        assert!(result.signature_info.covers_whole_document);
        assert!(result.messages[0].contains("Signature verification failed"));
    }

    #[test]
    fn test_unknown_format_is_not_invalid() {
        let verifier = SignatureVerifier::new();
        let mut dict = make_sig_dict().into_dict().unwrap();
        dict.insert("SubFilter".to_string(), Object::name("ETSI.RFC3161"));
        let result = verifier.verify(b"", &dict);
        assert_eq!(result.status, VerificationStatus::Unknown);
    }

    #[test]
    fn test_trusted_roots() {
        let mut verifier = SignatureVerifier::new();
        let test_cert = vec![1, 2, 3, 4];

        assert!(!verifier.is_certificate_trusted(&test_cert));

        verifier.add_trusted_root(test_cert.clone());
        assert!(verifier.is_certificate_trusted(&test_cert));
    }

    #[test]
    fn test_decode_text() {
        assert_eq!(decode_text(b"plain"), "plain");
        assert_eq!(decode_text(&[0xFE, 0xFF, 0, b'A']), "A");
    }
}
