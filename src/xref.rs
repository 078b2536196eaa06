//! Cross-reference parsing.
//!
//! The xref maps object numbers to byte offsets (or object stream slots),
//! enabling random access to PDF objects. Both classic `xref` tables and
//! cross-reference streams (PDF 1.5+) are supported, including `/Prev`
//! chains left by earlier incremental updates and hybrid `/XRefStm` files.

use crate::error::{Error, Result};
use crate::lexer::skip_ws;
use crate::object::{Dict, Object};
use crate::parser::{parse_indirect_object, parse_object};
use std::collections::HashMap;

/// Maximum number of chained xref sections followed through `/Prev`.
const MAX_PREV_DEPTH: u32 = 100;

/// Cross-reference table entry type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefEntryType {
    /// Entry for a free object
    Free,
    /// Entry for an uncompressed object
    Uncompressed,
    /// Entry for an object in an object stream (PDF 1.5+)
    Compressed,
}

/// Cross-reference table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XRefEntry {
    /// Type of entry
    pub entry_type: XRefEntryType,
    /// Byte offset (uncompressed) or object stream number (compressed)
    pub offset: u64,
    /// Generation number (uncompressed) or index within stream (compressed)
    pub generation: u16,
}

impl XRefEntry {
    /// Create a new uncompressed entry.
    pub fn uncompressed(offset: u64, generation: u16) -> Self {
        Self {
            entry_type: XRefEntryType::Uncompressed,
            offset,
            generation,
        }
    }

    /// Create a new compressed entry (object in object stream).
    pub fn compressed(stream_obj_num: u64, index_in_stream: u16) -> Self {
        Self {
            entry_type: XRefEntryType::Compressed,
            offset: stream_obj_num,
            generation: index_in_stream,
        }
    }

    /// Create a new free entry.
    pub fn free(next_free: u64, generation: u16) -> Self {
        Self {
            entry_type: XRefEntryType::Free,
            offset: next_free,
            generation,
        }
    }

    /// Whether the entry describes a live object.
    pub fn in_use(&self) -> bool {
        self.entry_type != XRefEntryType::Free
    }
}

/// The syntax used by a cross-reference section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefKind {
    /// Classic `xref` keyword table followed by a `trailer` dictionary
    Table,
    /// `/Type /XRef` stream whose dictionary doubles as the trailer
    Stream,
}

/// Cross-reference table that maps object numbers to their locations.
#[derive(Debug, Clone)]
pub struct CrossRefTable {
    entries: HashMap<u32, XRefEntry>,
    trailer: Option<Dict>,
    kind: XRefKind,
}

impl CrossRefTable {
    /// Create a new empty cross-reference table.
    pub fn new(kind: XRefKind) -> Self {
        Self {
            entries: HashMap::new(),
            trailer: None,
            kind,
        }
    }

    /// Set the trailer dictionary.
    pub fn set_trailer(&mut self, trailer: Dict) {
        self.trailer = Some(trailer);
    }

    /// Get the trailer dictionary if present.
    pub fn trailer(&self) -> Option<&Dict> {
        self.trailer.as_ref()
    }

    /// Syntax of the most recent section.
    pub fn kind(&self) -> XRefKind {
        self.kind
    }

    /// Add an entry to the cross-reference table.
    pub fn add_entry(&mut self, object_number: u32, entry: XRefEntry) {
        self.entries.insert(object_number, entry);
    }

    /// Get an entry by object number.
    pub fn get(&self, object_number: u32) -> Option<&XRefEntry> {
        self.entries.get(&object_number)
    }

    /// Highest object number with any entry.
    pub fn max_object_number(&self) -> u32 {
        self.entries.keys().copied().max().unwrap_or(0)
    }

    /// Merge an older section. Entries already present win, as does the newer trailer.
    pub fn merge_from(&mut self, other: CrossRefTable) {
        for (obj_num, entry) in other.entries {
            self.entries.entry(obj_num).or_insert(entry);
        }
        if self.trailer.is_none() {
            self.trailer = other.trailer;
        }
    }

    /// Merge the `/XRefStm` section of a hybrid file, which fills entries the
    /// classic table leaves free or omits.
    fn merge_hidden(&mut self, hidden: CrossRefTable) {
        for (obj_num, entry) in hidden.entries {
            match self.entries.get(&obj_num) {
                Some(existing) if existing.in_use() => {},
                _ => {
                    self.entries.insert(obj_num, entry);
                },
            }
        }
    }

    /// Get the number of entries in the table.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Find the offset recorded after the last `startxref` keyword.
///
/// Only the final 2 KiB are searched.
pub fn find_xref_offset(data: &[u8]) -> Result<u64> {
    let tail_start = data.len().saturating_sub(2048);
    let tail = &data[tail_start..];

    let keyword = b"startxref";
    let pos = tail
        .windows(keyword.len())
        .rposition(|w| w == keyword)
        .ok_or(Error::InvalidXref)?;

    let after = skip_ws(&tail[pos + keyword.len()..]);
    let digits = after.iter().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return Err(Error::InvalidXref);
    }

    std::str::from_utf8(&after[..digits])
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or(Error::InvalidXref)
}

/// Parse the cross-reference chain starting at `offset`.
pub fn parse_xref(data: &[u8], offset: u64) -> Result<CrossRefTable> {
    parse_xref_recursive(data, offset, 0)
}

fn parse_xref_recursive(data: &[u8], offset: u64, depth: u32) -> Result<CrossRefTable> {
    if depth > MAX_PREV_DEPTH {
        return Err(Error::InvalidPdf(format!(
            "xref /Prev chain depth exceeded {}",
            MAX_PREV_DEPTH
        )));
    }

    let section = data
        .get(offset as usize..)
        .ok_or_else(|| Error::InvalidPdf(format!("xref offset {} beyond end of file", offset)))?;
    let section = skip_ws(section);

    log::debug!("Parsing xref at offset {}", offset);

    let mut xref = if section.starts_with(b"xref") {
        parse_traditional_xref(section)?
    } else if section.first().is_some_and(|c| c.is_ascii_digit()) {
        parse_xref_stream(section)?
    } else {
        return Err(Error::InvalidXref);
    };

    let trailer_int = |key: &str| {
        xref.trailer()
            .and_then(|t| t.get(key))
            .and_then(|o| o.as_integer())
    };
    let xref_stm = trailer_int("XRefStm");
    let prev = trailer_int("Prev");

    if let Some(stm_offset) = xref_stm {
        log::debug!("Hybrid file: following /XRefStm {}", stm_offset);
        let hidden = parse_xref_recursive(data, stm_offset as u64, depth + 1)?;
        xref.merge_hidden(hidden);
    }

    if let Some(prev_offset) = prev {
        if prev_offset < 0 || prev_offset as u64 == offset {
            return Err(Error::InvalidPdf(format!("invalid /Prev offset {}", prev_offset)));
        }
        log::debug!("Following /Prev {} from xref at {}", prev_offset, offset);
        let prev_xref = parse_xref_recursive(data, prev_offset as u64, depth + 1)?;
        xref.merge_from(prev_xref);
    }

    Ok(xref)
}

/// Read an unsigned decimal integer after optional whitespace.
fn read_uint(input: &[u8]) -> Option<(u64, &[u8])> {
    let input = skip_ws(input);
    let digits = input.iter().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    let value = std::str::from_utf8(&input[..digits]).ok()?.parse().ok()?;
    Some((value, &input[digits..]))
}

/// Parse a classic table:
///
/// ```text
/// xref
/// 0 3
/// 0000000000 65535 f
/// 0000000017 00000 n
/// 0000000081 00000 n
/// trailer
/// << /Size 3 /Root 1 0 R >>
/// ```
fn parse_traditional_xref(section: &[u8]) -> Result<CrossRefTable> {
    let mut xref = CrossRefTable::new(XRefKind::Table);
    let mut input = &section[b"xref".len()..];

    loop {
        input = skip_ws(input);
        if input.starts_with(b"trailer") {
            let (_, trailer) = parse_object(&input[b"trailer".len()..])
                .map_err(|e| Error::InvalidPdf(format!("unreadable trailer: {:?}", e)))?;
            let trailer = trailer
                .into_dict()
                .ok_or_else(|| Error::InvalidPdf("trailer is not a dictionary".to_string()))?;
            xref.set_trailer(trailer);
            return Ok(xref);
        }

        let (start, rest) = read_uint(input).ok_or(Error::InvalidXref)?;
        let (count, rest) = read_uint(rest).ok_or(Error::InvalidXref)?;
        if count > 1_000_000 {
            return Err(Error::InvalidPdf("xref subsection count exceeds limit".to_string()));
        }
        input = rest;

        for i in 0..count {
            let (offset, rest) = read_uint(input).ok_or(Error::InvalidXref)?;
            let (generation, rest) = read_uint(rest).ok_or(Error::InvalidXref)?;
            let rest = skip_ws(rest);
            let entry = match rest.first() {
                Some(b'n') => XRefEntry::uncompressed(offset, generation as u16),
                Some(b'f') => XRefEntry::free(offset, generation as u16),
                _ => return Err(Error::InvalidXref),
            };
            xref.add_entry((start + i) as u32, entry);
            input = &rest[1..];
        }
    }
}

/// Parse a cross-reference stream object.
///
/// `/W [w1 w2 w3]` gives the field widths. Field 1 is the entry type
/// (0 free, 1 uncompressed, 2 compressed). `/Index` lists subsection
/// ranges and defaults to `[0 Size]`.
fn parse_xref_stream(section: &[u8]) -> Result<CrossRefTable> {
    let (_, (_, stream)) = parse_indirect_object(section)
        .map_err(|e| Error::InvalidPdf(format!("failed to parse xref stream object: {:?}", e)))?;

    let dict = stream
        .as_dict()
        .ok_or_else(|| Error::InvalidPdf("xref stream is not a stream object".to_string()))?;
    if dict.get("Type").and_then(|o| o.as_name()) != Some("XRef") {
        return Err(Error::InvalidPdf("expected /Type /XRef".to_string()));
    }

    let widths: Vec<usize> = dict
        .get("W")
        .and_then(|o| o.as_array())
        .map(|w| w.iter().filter_map(|o| o.as_integer()).map(|v| v as usize).collect())
        .unwrap_or_default();
    if widths.len() != 3 || widths.iter().any(|&w| w > 8) {
        return Err(Error::InvalidPdf("invalid /W array in xref stream".to_string()));
    }
    let (w1, w2, w3) = (widths[0], widths[1], widths[2]);
    let entry_size = w1 + w2 + w3;

    let size = dict
        .get("Size")
        .and_then(|o| o.as_integer())
        .ok_or_else(|| Error::InvalidPdf("missing /Size in xref stream".to_string()))?
        as u32;

    let ranges: Vec<(u32, u32)> = match dict.get("Index").and_then(|o| o.as_array()) {
        Some(index) => index
            .chunks(2)
            .filter_map(|pair| match pair {
                [start, count] => Some((start.as_integer()? as u32, count.as_integer()? as u32)),
                _ => None,
            })
            .collect(),
        None => vec![(0, size)],
    };

    let decoded = stream.decode_stream_data()?;
    let mut xref = CrossRefTable::new(XRefKind::Stream);
    let mut rows = decoded.chunks_exact(entry_size.max(1));

    for (start_obj, count) in ranges {
        for i in 0..count {
            let row = rows
                .next()
                .ok_or_else(|| Error::InvalidPdf("truncated xref stream data".to_string()))?;
            let entry_type = if w1 > 0 { read_int(&row[..w1]) } else { 1 };
            let field2 = read_int(&row[w1..w1 + w2]);
            let field3 = read_int(&row[w1 + w2..]);

            let entry = match entry_type {
                0 => XRefEntry::free(field2, field3 as u16),
                1 => XRefEntry::uncompressed(field2, field3 as u16),
                2 => XRefEntry::compressed(field2, field3 as u16),
                other => {
                    return Err(Error::InvalidPdf(format!("invalid xref entry type: {}", other)))
                },
            };
            xref.add_entry(start_obj + i, entry);
        }
    }

    if let Some(dict) = stream.into_dict() {
        xref.set_trailer(dict);
    }
    Ok(xref)
}

/// Read a big-endian integer of arbitrary width.
fn read_int(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

/// Trailer keys that must survive into every later update.
pub(crate) fn inherited_trailer_entries(trailer: &Dict) -> Vec<(&'static str, Object)> {
    ["Root", "Info", "ID"]
        .into_iter()
        .filter_map(|key| trailer.get(key).map(|v| (key, v.clone())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjectRef;

    #[test]
    fn test_find_xref_offset() {
        let pdf = b"%PDF-1.4\ntrailer\n<< /Size 2 >>\nstartxref\n50\n%%EOF";
        assert_eq!(find_xref_offset(pdf).unwrap(), 50);
    }

    #[test]
    fn test_find_xref_offset_uses_last_keyword() {
        let pdf = b"startxref\n10\n%%EOF\nstartxref\r\n\r\n777\r\n%%EOF\r\n";
        assert_eq!(find_xref_offset(pdf).unwrap(), 777);
    }

    #[test]
    fn test_find_xref_offset_missing() {
        assert!(find_xref_offset(b"%PDF-1.4\nxref\n0 1\n").is_err());
        assert!(find_xref_offset(b"startxref\n%%EOF").is_err());
    }

    #[test]
    fn test_parse_traditional_xref_with_trailer() {
        let data = b"xref\n0 3\n0000000000 65535 f\r\n0000000017 00000 n\r\n0000000081 00000 n\r\n\
                     trailer\n<< /Size 3 /Root 1 0 R >>\nstartxref\n0\n%%EOF";
        let xref = parse_xref(data, 0).unwrap();

        assert_eq!(xref.kind(), XRefKind::Table);
        assert_eq!(xref.len(), 3);
        assert!(!xref.get(0).unwrap().in_use());
        assert_eq!(xref.get(2).unwrap().offset, 81);
        let trailer = xref.trailer().unwrap();
        assert_eq!(trailer.get("Root"), Some(&Object::Reference(ObjectRef::new(1, 0))));
        assert_eq!(xref.max_object_number(), 2);
    }

    #[test]
    fn test_parse_xref_multiple_subsections() {
        let data = b"xref\n0 1\n0000000000 65535 f \n5 2\n\
                     0000000100 00000 n \n0000000200 00001 n \n\
                     trailer << /Size 7 >>";
        let xref = parse_xref(data, 0).unwrap();
        assert_eq!(xref.get(6).unwrap().generation, 1);
        assert!(xref.get(3).is_none());
    }

    #[test]
    fn test_prev_chain_newest_wins() {
        let old = b"xref\n0 2\n0000000000 65535 f \n0000000010 00000 n \n\
                    trailer\n<< /Size 2 /Root 1 0 R >>\n";
        let mut data = old.to_vec();
        let new_offset = data.len();
        data.extend_from_slice(
            b"xref\n1 1\n0000000999 00000 n \ntrailer\n<< /Size 2 /Root 1 0 R /Prev 0 >>\n",
        );

        let xref = parse_xref(&data, new_offset as u64).unwrap();
        assert_eq!(xref.get(1).unwrap().offset, 999);
        assert!(xref.get(0).is_some());
        assert_eq!(xref.trailer().unwrap().get("Prev").unwrap().as_integer(), Some(0));
    }

    #[test]
    fn test_prev_pointing_at_itself_is_rejected() {
        let data = b"xref\n0 1\n0000000000 65535 f \ntrailer\n<< /Size 1 /Prev 0 >>\n";
        assert!(parse_xref(data, 0).is_err());
    }

    #[test]
    fn test_parse_uncompressed_xref_stream() {
        let rows: Vec<u8> = vec![
            0, 0, 0, 0xFF, //
            1, 0, 15, 0, //
            2, 0, 4, 1,
        ];
        let mut data = format!(
            "9 0 obj\n<< /Type /XRef /Size 3 /W [1 2 1] /Root 1 0 R /Length {} >>\nstream\n",
            rows.len()
        )
        .into_bytes();
        data.extend_from_slice(&rows);
        data.extend_from_slice(b"\nendstream\nendobj\n");

        let xref = parse_xref(&data, 0).unwrap();
        assert_eq!(xref.kind(), XRefKind::Stream);
        assert_eq!(xref.get(1).unwrap(), &XRefEntry::uncompressed(15, 0));
        assert_eq!(xref.get(2).unwrap(), &XRefEntry::compressed(4, 1));
        assert!(xref.trailer().unwrap().contains_key("Root"));
    }

    #[test]
    fn test_inherited_trailer_entries() {
        let mut trailer = Dict::new();
        trailer.insert("Root".to_string(), Object::Reference(ObjectRef::new(1, 0)));
        trailer.insert("Size".to_string(), Object::Integer(4));
        trailer.insert("ID".to_string(), Object::Array(vec![]));
        let kept = inherited_trailer_entries(&trailer);
        let keys: Vec<&str> = kept.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec!["Root", "ID"]);
    }
}
