//! End-to-end signing of generated PDFs and verification of the output.

mod common;

use certigo::document::PdfDocument;
use certigo::identity::{issue_and_persist, IssuanceRequest, SubjectDetails};
use certigo::signatures::{
    load_signer, sign, PdfSigner, SignOptions, SignatureVerifier, VerificationStatus,
};
use certigo::xref::XRefKind;
use certigo::ErrorKind;
use common::{classic_pdf, fast_config, xref_stream_pdf, Workspace, PASSPHRASE};

fn signer(ws: &Workspace) -> PdfSigner {
    load_signer(&ws.paths.cert_path, &ws.paths.key_path, PASSPHRASE).unwrap()
}

fn find(haystack: &[u8], needle: &[u8]) -> usize {
    haystack
        .windows(needle.len())
        .position(|w| w == needle)
        .unwrap()
}

#[test]
fn test_fixture_is_exactly_ten_thousand_bytes() {
    let pdf = classic_pdf(10_000);
    assert_eq!(pdf.len(), 10_000);
    let mut doc = PdfDocument::from_bytes(pdf).unwrap();
    assert_eq!(doc.xref_kind(), XRefKind::Table);
    doc.page_ref(0).unwrap();
}

#[test]
fn test_sign_report_appends_signature() {
    let ws = Workspace::new();
    let original = classic_pdf(10_000);
    let input = ws.write("report.pdf", &original);

    let output = sign(&signer(&ws), &input).unwrap();
    assert_eq!(output, ws.path("report_signed.pdf"));

    let signed = std::fs::read(&output).unwrap();
    assert!(signed.len() > original.len());
    assert_eq!(&signed[..original.len()], &original[..]);
    assert_eq!(std::fs::read(&input).unwrap(), original);

    let mut doc = PdfDocument::from_bytes(signed.clone()).unwrap();
    let fields = doc.form_fields().unwrap();
    assert_eq!(fields.len(), 1);
    assert_eq!(fields[0].name, "Signature1");
    assert_eq!(fields[0].field_type(), Some("Sig"));
    assert!(doc.xref_offset() as usize > original.len());
}

#[test]
fn test_signed_report_verifies() {
    let ws = Workspace::new();
    let input = ws.write("report.pdf", &classic_pdf(10_000));
    let signed = std::fs::read(sign(&signer(&ws), &input).unwrap()).unwrap();

    let results = SignatureVerifier::new().verify_document(&signed).unwrap();
    assert_eq!(results.len(), 1);

    let result = &results[0];
    assert_eq!(result.status, VerificationStatus::Valid, "{:?}", result.messages);
    assert!(!result.document_modified);
    assert!(!result.certificate_expired);

    let info = &result.signature_info;
    assert!(info.covers_whole_document);
    assert_eq!(info.certificate_cn.as_deref(), Some("Alice Corp"));
    assert_eq!(info.byte_range.len(), 4);
    assert_eq!(info.byte_range[0], 0);
    assert_eq!((info.byte_range[2] + info.byte_range[3]) as usize, signed.len());
}

#[test]
fn test_trusted_root_is_recognized() {
    let ws = Workspace::new();
    let input = ws.write("report.pdf", &classic_pdf(10_000));
    let signed = std::fs::read(sign(&signer(&ws), &input).unwrap()).unwrap();

    let mut verifier = SignatureVerifier::new();
    verifier.add_trusted_root(signer(&ws).credentials().certificate_der().to_vec());
    let results = verifier.verify_document(&signed).unwrap();
    assert_eq!(results[0].status, VerificationStatus::Valid);
    assert!(results[0].certificate_trusted);

    let mut strangers = SignatureVerifier::new();
    strangers.add_trusted_root(b"not a certificate".to_vec());
    let results = strangers.verify_document(&signed).unwrap();
    assert_eq!(results[0].status, VerificationStatus::ValidWithWarnings);
    assert!(!results[0].certificate_trusted);
}

#[test]
fn test_tampered_content_fails_verification() {
    let ws = Workspace::new();
    let input = ws.write("report.pdf", &classic_pdf(10_000));
    let mut signed = std::fs::read(sign(&signer(&ws), &input).unwrap()).unwrap();

    let pos = find(&signed, b"Certificate of Completion");
    signed[pos] = b'X';

    let results = SignatureVerifier::new().verify_document(&signed).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status, VerificationStatus::Invalid);
    assert!(results[0].document_modified);
}

#[test]
fn test_sign_options_are_recorded() {
    let ws = Workspace::new();
    let input = ws.write("report.pdf", &classic_pdf(10_000));
    let options = SignOptions::default()
        .with_reason("Course completed")
        .with_location("Zürich")
        .with_name("Alice Corp");
    let signer = signer(&ws).with_options(options);

    let signed = std::fs::read(sign(&signer, &input).unwrap()).unwrap();
    let results = SignatureVerifier::new().verify_document(&signed).unwrap();
    let info = &results[0].signature_info;

    assert!(results[0].status.is_ok());
    assert_eq!(info.reason.as_deref(), Some("Course completed"));
    assert_eq!(info.location.as_deref(), Some("Zürich"));
    assert_eq!(info.signer_name.as_deref(), Some("Alice Corp"));
    assert!(info.signing_time.as_deref().unwrap().starts_with("D:"));
}

#[test]
fn test_xref_stream_document_signs_and_verifies() {
    let ws = Workspace::new();
    let original = xref_stream_pdf();
    assert_eq!(
        PdfDocument::from_bytes(original.clone()).unwrap().xref_kind(),
        XRefKind::Stream
    );
    let input = ws.write("transcript.pdf", &original);

    let output = sign(&signer(&ws), &input).unwrap();
    assert_eq!(output, ws.path("transcript_signed.pdf"));
    let signed = std::fs::read(&output).unwrap();
    assert_eq!(&signed[..original.len()], &original[..]);

    let mut doc = PdfDocument::from_bytes(signed.clone()).unwrap();
    assert_eq!(doc.xref_kind(), XRefKind::Stream);
    doc.page_ref(0).unwrap();

    let results = SignatureVerifier::new().verify_document(&signed).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status, VerificationStatus::Valid, "{:?}", results[0].messages);
}

#[test]
fn test_signing_signed_output_keeps_first_signature() {
    let ws = Workspace::new();
    let input = ws.write("report.pdf", &classic_pdf(10_000));
    let signer = signer(&ws);

    let once = sign(&signer, &input).unwrap();
    let first = std::fs::read(&once).unwrap();
    let twice = sign(&signer, &once).unwrap();
    assert_eq!(twice, ws.path("report_signed_signed.pdf"));

    let second = std::fs::read(&twice).unwrap();
    assert_eq!(&second[..first.len()], &first[..]);

    let results = SignatureVerifier::new().verify_document(&second).unwrap();
    assert_eq!(results.len(), 2);

    let by_name = |name: &str| {
        results
            .iter()
            .find(|r| r.signature_info.field_name == name)
            .unwrap()
    };
    let older = by_name("Signature1");
    let newer = by_name("Signature2");
    assert!(older.status.is_ok(), "{:?}", older.messages);
    assert!(!older.signature_info.covers_whole_document);
    assert!(newer.status.is_ok(), "{:?}", newer.messages);
    assert!(newer.signature_info.covers_whole_document);
}

#[test]
fn test_signing_twice_with_object_streams() {
    let ws = Workspace::new();
    let input = ws.write("transcript.pdf", &xref_stream_pdf());
    let signer = signer(&ws);

    let twice = sign(&signer, sign(&signer, &input).unwrap()).unwrap();
    let signed = std::fs::read(&twice).unwrap();

    // The page must keep the first widget after being rewritten again
    let mut doc = PdfDocument::from_bytes(signed.clone()).unwrap();
    let page_ref = doc.page_ref(0).unwrap();
    let page = doc
        .resolve_dict(&certigo::object::Object::Reference(page_ref))
        .unwrap();
    assert_eq!(page.get("Annots").unwrap().as_array().unwrap().len(), 2);

    let results = SignatureVerifier::new().verify_document(&signed).unwrap();
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.status.is_ok()));
}

#[test]
fn test_missing_input_is_input_error() {
    let ws = Workspace::new();
    let err = sign(&signer(&ws), ws.path("missing.pdf")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Input);
    assert!(!ws.path("missing_signed.pdf").exists());
}

#[test]
fn test_non_pdf_input_is_input_error() {
    let ws = Workspace::new();
    let input = ws.write("notes.pdf", b"these are not the bytes you are looking for");
    let err = sign(&signer(&ws), &input).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Input);
    assert!(!ws.path("notes_signed.pdf").exists());
}

#[test]
fn test_wrong_passphrase_is_authentication_error() {
    let ws = Workspace::new();
    let err = load_signer(&ws.paths.cert_path, &ws.paths.key_path, "wrong").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authentication);
}

#[test]
fn test_certificate_of_another_key_is_crypto_error() {
    let ws = Workspace::new();
    let other_dir = tempfile::tempdir().unwrap();
    let subject = SubjectDetails::new("Mallory Ltd").country("GB");
    let request = IssuanceRequest::new(subject, 30, PASSPHRASE);
    let (_, other) = issue_and_persist(&request, &fast_config(other_dir.path())).unwrap();

    let err = load_signer(&ws.paths.cert_path, &other.key_path, PASSPHRASE).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Crypto);
    let err = load_signer(&other.cert_path, &ws.paths.key_path, PASSPHRASE).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Crypto);

    // Both halves of each pair still load together
    load_signer(&other.cert_path, &other.key_path, PASSPHRASE).unwrap();
}

#[test]
fn test_missing_credentials_are_input_errors() {
    let ws = Workspace::new();
    let err = load_signer(ws.path("nope.pem"), &ws.paths.key_path, PASSPHRASE).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Input);
    let err = load_signer(&ws.paths.cert_path, ws.path("nope.pem"), PASSPHRASE).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Input);
}

#[test]
fn test_one_signer_many_threads() {
    let ws = Workspace::new();
    let signer = &signer(&ws);
    let inputs: Vec<_> = (0..3)
        .map(|i| ws.write(&format!("report{}.pdf", i), &classic_pdf(10_000)))
        .collect();

    std::thread::scope(|scope| {
        let handles: Vec<_> = inputs
            .iter()
            .map(|input| scope.spawn(move || sign(signer, input).unwrap()))
            .collect();
        for handle in handles {
            let output = handle.join().unwrap();
            let signed = std::fs::read(output).unwrap();
            let results = SignatureVerifier::new().verify_document(&signed).unwrap();
            assert_eq!(results[0].status, VerificationStatus::Valid);
        }
    });
}
