//! Incremental update assembly.
//!
//! An incremental update appends new and replacement objects after the
//! original bytes, followed by a cross-reference section that covers only
//! those objects and chains back to the previous one through `/Prev`. The
//! original bytes are copied verbatim; nothing before the end of the source
//! file is ever modified.

use crate::document::PdfDocument;
use crate::error::{Error, Result};
use crate::object::{Dict, Object, ObjectRef};
use crate::writer::ObjectSerializer;
use crate::xref::{inherited_trailer_entries, XRefKind};
use std::collections::HashMap;

/// Field widths of the cross-reference streams this writer emits.
const XREF_STREAM_WIDTHS: [usize; 3] = [1, 4, 2];

/// Pending update to an existing document.
#[derive(Debug)]
pub struct IncrementalUpdate {
    base_len: usize,
    prev_xref: u64,
    kind: XRefKind,
    inherited: Vec<(&'static str, Object)>,
    next_id: u32,
    objects: Vec<(ObjectRef, Vec<u8>)>,
    serializer: ObjectSerializer,
}

/// Result of [`IncrementalUpdate::write`].
#[derive(Debug, Clone)]
pub struct UpdateOutput {
    /// Original bytes followed by the update section
    pub bytes: Vec<u8>,
    /// Offset of each written object's `N G obj` header
    pub offsets: HashMap<ObjectRef, usize>,
    /// Offset of the new cross-reference section
    pub xref_offset: usize,
}

impl UpdateOutput {
    /// Bytes of one written object, from its header through `endobj`.
    pub fn object_span(&self, obj_ref: ObjectRef) -> Option<std::ops::Range<usize>> {
        let start = *self.offsets.get(&obj_ref)?;
        let end = find(&self.bytes[start..], b"endobj")? + start + b"endobj".len();
        Some(start..end)
    }
}

impl IncrementalUpdate {
    /// Prepare an update on top of the newest revision of `doc`.
    ///
    /// The new cross-reference section uses the same syntax as the one it
    /// chains to, so readers that understand the original file understand
    /// the update.
    pub fn new(doc: &PdfDocument) -> Self {
        Self {
            base_len: doc.data().len(),
            prev_xref: doc.xref_offset(),
            kind: doc.xref_kind(),
            inherited: inherited_trailer_entries(doc.trailer()),
            next_id: doc.next_object_number(),
            objects: Vec::new(),
            serializer: ObjectSerializer::compact(),
        }
    }

    /// Syntax of the cross-reference section this update will write.
    pub fn xref_kind(&self) -> XRefKind {
        self.kind
    }

    /// Reserve a fresh object number.
    pub fn allocate(&mut self) -> ObjectRef {
        let obj_ref = ObjectRef::new(self.next_id, 0);
        self.next_id += 1;
        obj_ref
    }

    /// Add a new object or replace an existing one.
    pub fn put(&mut self, obj_ref: ObjectRef, obj: &Object) {
        let body = self.serializer.serialize(obj);
        self.put_raw(obj_ref, body);
    }

    /// Add an object whose body was serialized by the caller.
    ///
    /// `body` is the text between `N G obj` and `endobj`.
    pub fn put_raw(&mut self, obj_ref: ObjectRef, body: Vec<u8>) {
        match self.objects.iter_mut().find(|(r, _)| *r == obj_ref) {
            Some(slot) => slot.1 = body,
            None => self.objects.push((obj_ref, body)),
        }
    }

    /// Append the update to `base`, which must be the document bytes this
    /// update was prepared from.
    pub fn write(mut self, base: &[u8]) -> Result<UpdateOutput> {
        if base.len() != self.base_len {
            return Err(Error::InvalidPdf(format!(
                "update prepared for {} bytes applied to {} bytes",
                self.base_len,
                base.len()
            )));
        }

        let xref_stream_ref = match self.kind {
            XRefKind::Stream => Some(self.allocate()),
            XRefKind::Table => None,
        };

        let mut out = Vec::with_capacity(base.len() + 4096);
        out.extend_from_slice(base);
        if !matches!(base.last(), Some(b'\n') | Some(b'\r')) {
            out.push(b'\n');
        }

        let mut offsets = HashMap::new();
        for (obj_ref, body) in &self.objects {
            offsets.insert(*obj_ref, out.len());
            out.extend_from_slice(format!("{} {} obj\n", obj_ref.id, obj_ref.gen).as_bytes());
            out.extend_from_slice(body);
            out.extend_from_slice(b"\nendobj\n");
        }

        let xref_offset = out.len();
        let mut entries: Vec<(ObjectRef, usize)> = offsets.iter().map(|(r, o)| (*r, *o)).collect();
        if let Some(stream_ref) = xref_stream_ref {
            entries.push((stream_ref, xref_offset));
        }
        entries.sort();

        let mut trailer = Dict::new();
        trailer.insert("Size".to_string(), Object::Integer(self.next_id as i64));
        trailer.insert("Prev".to_string(), Object::Integer(self.prev_xref as i64));
        for (key, value) in &self.inherited {
            trailer.insert(key.to_string(), value.clone());
        }

        match xref_stream_ref {
            None => write_xref_table(&mut out, &entries, &trailer, &self.serializer),
            Some(stream_ref) => {
                write_xref_stream(&mut out, stream_ref, &entries, trailer, &self.serializer)?
            },
        }
        out.extend_from_slice(format!("startxref\n{}\n%%EOF\n", xref_offset).as_bytes());

        log::debug!(
            "Incremental update: {} objects, {:?} xref at {}, {} bytes appended",
            entries.len(),
            self.kind,
            xref_offset,
            out.len() - base.len()
        );

        Ok(UpdateOutput {
            bytes: out,
            offsets,
            xref_offset,
        })
    }
}

/// Group sorted entries into runs of consecutive object numbers.
fn subsections(entries: &[(ObjectRef, usize)]) -> Vec<&[(ObjectRef, usize)]> {
    let mut runs = Vec::new();
    let mut start = 0;
    for i in 1..=entries.len() {
        if i == entries.len() || entries[i].0.id != entries[i - 1].0.id + 1 {
            runs.push(&entries[start..i]);
            start = i;
        }
    }
    runs
}

fn write_xref_table(
    out: &mut Vec<u8>,
    entries: &[(ObjectRef, usize)],
    trailer: &Dict,
    serializer: &ObjectSerializer,
) {
    out.extend_from_slice(b"xref\n");
    for run in subsections(entries) {
        out.extend_from_slice(format!("{} {}\n", run[0].0.id, run.len()).as_bytes());
        for (obj_ref, offset) in run {
            out.extend_from_slice(format!("{:010} {:05} n \n", offset, obj_ref.gen).as_bytes());
        }
    }
    out.extend_from_slice(b"trailer\n");
    serializer.write_object(out, &Object::Dictionary(trailer.clone()));
    out.push(b'\n');
}

fn write_xref_stream(
    out: &mut Vec<u8>,
    stream_ref: ObjectRef,
    entries: &[(ObjectRef, usize)],
    mut dict: Dict,
    serializer: &ObjectSerializer,
) -> Result<()> {
    let [w1, w2, w3] = XREF_STREAM_WIDTHS;
    let mut rows = Vec::with_capacity(entries.len() * (w1 + w2 + w3));
    let mut index = Vec::new();

    for run in subsections(entries) {
        index.push(Object::Integer(run[0].0.id as i64));
        index.push(Object::Integer(run.len() as i64));
        for (obj_ref, offset) in run {
            let offset = u32::try_from(*offset).map_err(|_| {
                Error::InvalidPdf("document too large for cross-reference stream".to_string())
            })?;
            rows.push(1u8);
            rows.extend_from_slice(&offset.to_be_bytes());
            rows.extend_from_slice(&obj_ref.gen.to_be_bytes());
        }
    }

    dict.insert("Type".to_string(), Object::name("XRef"));
    dict.insert(
        "W".to_string(),
        Object::Array(XREF_STREAM_WIDTHS.iter().map(|w| Object::Integer(*w as i64)).collect()),
    );
    dict.insert("Index".to_string(), Object::Array(index));

    let stream = Object::Stream {
        dict,
        data: bytes::Bytes::from(rows),
    };
    out.extend_from_slice(&serializer.serialize_indirect(stream_ref, &stream));
    Ok(())
}

pub(crate) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xref::{parse_xref, XRefEntryType};

    const SOURCE: &[u8] = b"%PDF-1.4\n\
1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n\
2 0 obj\n<< /Type /Pages /Kids [] /Count 0 >>\nendobj\n\
xref\n0 3\n0000000000 65535 f \n0000000009 00000 n \n0000000058 00000 n \n\
trailer\n<< /Size 3 /Root 1 0 R /ID [<AB> <CD>] >>\nstartxref\n110\n%%EOF\n";

    #[test]
    fn test_subsections() {
        let e = |id| (ObjectRef::new(id, 0), 0usize);
        let entries = vec![e(1), e(2), e(5), e(6), e(7), e(9)];
        let runs: Vec<usize> = subsections(&entries).iter().map(|r| r.len()).collect();
        assert_eq!(runs, vec![2, 3, 1]);
        assert!(subsections(&[]).is_empty());
    }

    #[test]
    fn test_table_update_appends_and_chains() {
        let doc = PdfDocument::from_bytes(SOURCE.to_vec()).unwrap();
        let mut update = IncrementalUpdate::new(&doc);
        let new_ref = update.allocate();
        assert_eq!(new_ref, ObjectRef::new(3, 0));
        update.put(new_ref, &Object::name("Marker"));
        update.put(ObjectRef::new(1, 0), &Object::Integer(1));
        update.put(ObjectRef::new(1, 0), &Object::Integer(2));

        let output = update.write(doc.data()).unwrap();
        assert!(output.bytes.starts_with(SOURCE));
        assert_eq!(output.offsets.len(), 2);

        let xref = parse_xref(&output.bytes, output.xref_offset as u64).unwrap();
        assert_eq!(xref.kind(), XRefKind::Table);
        assert_eq!(xref.get(3).unwrap().offset as usize, output.offsets[&new_ref]);
        assert_eq!(xref.get(2).unwrap().offset, 58);
        let trailer = xref.trailer().unwrap();
        assert_eq!(trailer.get("Size").unwrap().as_integer(), Some(4));
        assert_eq!(trailer.get("Prev").unwrap().as_integer(), Some(110));
        assert!(trailer.contains_key("ID"));

        let span = output.object_span(ObjectRef::new(1, 0)).unwrap();
        assert_eq!(&output.bytes[span], b"1 0 obj\n2\nendobj");
    }

    #[test]
    fn test_stream_update_is_readable() {
        let doc = PdfDocument::from_bytes(SOURCE.to_vec()).unwrap();
        let mut update = IncrementalUpdate::new(&doc);
        update.kind = XRefKind::Stream;
        let r = update.allocate();
        update.put(r, &Object::Boolean(true));

        let output = update.write(doc.data()).unwrap();
        let xref = parse_xref(&output.bytes, output.xref_offset as u64).unwrap();
        assert_eq!(xref.kind(), XRefKind::Stream);
        assert_eq!(xref.get(3).unwrap().entry_type, XRefEntryType::Uncompressed);
        assert_eq!(xref.get(4).unwrap().offset as usize, output.xref_offset);
        assert_eq!(xref.trailer().unwrap().get("Size").unwrap().as_integer(), Some(5));
        // chained table entries remain visible
        assert_eq!(xref.get(1).unwrap().offset, 9);
    }

    #[test]
    fn test_write_rejects_other_base() {
        let doc = PdfDocument::from_bytes(SOURCE.to_vec()).unwrap();
        let update = IncrementalUpdate::new(&doc);
        assert!(update.write(b"%PDF-1.4\n").is_err());
    }
}
