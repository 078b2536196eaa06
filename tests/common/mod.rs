//! Shared fixtures: synthesized PDFs and a throwaway signing identity.

#![allow(dead_code)]

use certigo::config::IssuerConfig;
use certigo::identity::{issue, IdentityPaths, IssuanceRequest, IssuedIdentity, SubjectDetails};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tempfile::TempDir;

pub const PASSPHRASE: &str = "p@ss";

/// Small keys and few PBKDF2 rounds keep the suite fast.
pub fn fast_config(dir: &Path) -> IssuerConfig {
    IssuerConfig::new()
        .with_key_bits(2048)
        .with_pbkdf2_iterations(1_000)
        .with_output_dir(dir)
}

pub fn alice_subject() -> SubjectDetails {
    SubjectDetails::new("Alice Corp")
        .email("a@x.com")
        .country("US")
        .state("CA")
        .locality("SF")
        .organization("Alice Inc")
}

/// One identity per test binary; RSA key generation dominates the runtime.
pub fn shared_identity() -> &'static IssuedIdentity {
    static IDENTITY: OnceLock<IssuedIdentity> = OnceLock::new();
    IDENTITY.get_or_init(|| {
        let request = IssuanceRequest::new(alice_subject(), 30, PASSPHRASE);
        let scratch = std::env::temp_dir();
        issue(&request, &fast_config(&scratch)).unwrap()
    })
}

/// A temporary directory holding `key.pem` and `cert.pem`.
pub struct Workspace {
    pub dir: TempDir,
    pub paths: IdentityPaths,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let paths = shared_identity().persist(&fast_config(dir.path())).unwrap();
        Self { dir, paths }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn write(&self, name: &str, data: &[u8]) -> PathBuf {
        let path = self.path(name);
        std::fs::write(&path, data).unwrap();
        path
    }
}

fn push_object(out: &mut Vec<u8>, offsets: &mut Vec<(u32, usize)>, id: u32, body: &[u8]) {
    offsets.push((id, out.len()));
    out.extend_from_slice(format!("{} 0 obj\n", id).as_bytes());
    out.extend_from_slice(body);
    out.extend_from_slice(b"\nendobj\n");
}

fn content_stream(padding: usize) -> Vec<u8> {
    let mut data = b"BT /F1 24 Tf 72 720 Td (Certificate of Completion) Tj ET\n".to_vec();
    data.extend(std::iter::repeat(b'%').take(padding));
    let mut body = format!("<< /Length {} >>\nstream\n", data.len()).into_bytes();
    body.extend_from_slice(&data);
    body.extend_from_slice(b"\nendstream");
    body
}

fn classic_with_padding(padding: usize) -> Vec<u8> {
    let mut out = b"%PDF-1.7\n%\xe2\xe3\xcf\xd3\n".to_vec();
    let mut offsets = Vec::new();
    push_object(&mut out, &mut offsets, 1, b"<< /Type /Catalog /Pages 2 0 R >>");
    push_object(&mut out, &mut offsets, 2, b"<< /Type /Pages /Kids [3 0 R] /Count 1 >>");
    push_object(
        &mut out,
        &mut offsets,
        3,
        b"<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R >>",
    );
    push_object(&mut out, &mut offsets, 4, &content_stream(padding));

    let xref_at = out.len();
    out.extend_from_slice(b"xref\n0 5\n0000000000 65535 f \n");
    for (_, offset) in &offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!("trailer\n<< /Size 5 /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n", xref_at).as_bytes(),
    );
    out
}

/// A one-page PDF with a classic xref table, exactly `target_len` bytes long.
pub fn classic_pdf(target_len: usize) -> Vec<u8> {
    let mut padding = 0;
    for _ in 0..16 {
        let pdf = classic_with_padding(padding);
        if pdf.len() == target_len {
            return pdf;
        }
        assert!(pdf.len() < target_len + padding, "target below minimum size");
        padding = (padding + target_len).saturating_sub(pdf.len());
    }
    panic!("could not pad PDF to {} bytes", target_len);
}

fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// A one-page PDF 1.5 file: catalog, page tree and page packed in a
/// compressed object stream, located through a cross-reference stream.
pub fn xref_stream_pdf() -> Vec<u8> {
    let packed: [(u32, &str); 3] = [
        (1, "<< /Type /Catalog /Pages 2 0 R >>"),
        (2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>"),
        (3, "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R >>"),
    ];
    let mut header = String::new();
    let mut bodies = String::new();
    for (id, body) in &packed {
        header.push_str(&format!("{} {} ", id, bodies.len()));
        bodies.push_str(body);
        bodies.push('\n');
    }
    let raw = format!("{}{}", header, bodies);
    let compressed = deflate(raw.as_bytes());

    let mut out = b"%PDF-1.5\n%\xe2\xe3\xcf\xd3\n".to_vec();
    let mut offsets = Vec::new();
    push_object(&mut out, &mut offsets, 4, &content_stream(0));

    let mut objstm = format!(
        "<< /Type /ObjStm /N 3 /First {} /Filter /FlateDecode /Length {} >>\nstream\n",
        header.len(),
        compressed.len()
    )
    .into_bytes();
    objstm.extend_from_slice(&compressed);
    objstm.extend_from_slice(b"\nendstream");
    push_object(&mut out, &mut offsets, 5, &objstm);

    let xref_at = out.len();
    let offset_of = |id: u32| offsets.iter().find(|(i, _)| *i == id).map(|(_, o)| *o).unwrap();
    let mut rows = Vec::new();
    let mut row = |kind: u8, field2: u32, field3: u16| {
        rows.push(kind);
        rows.extend_from_slice(&field2.to_be_bytes());
        rows.extend_from_slice(&field3.to_be_bytes());
    };
    row(0, 0, 0xffff);
    for index in 0..3u16 {
        row(2, 5, index);
    }
    row(1, offset_of(4) as u32, 0);
    row(1, offset_of(5) as u32, 0);
    row(1, xref_at as u32, 0);

    let mut xref = format!(
        "<< /Type /XRef /Size 7 /W [1 4 2] /Root 1 0 R /Length {} >>\nstream\n",
        rows.len()
    )
    .into_bytes();
    xref.extend_from_slice(&rows);
    xref.extend_from_slice(b"\nendstream");
    push_object(&mut out, &mut offsets, 6, &xref);

    out.extend_from_slice(format!("startxref\n{}\n%%EOF\n", xref_at).as_bytes());
    out
}
