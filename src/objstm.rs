//! Object stream parsing (PDF 1.5+).
//!
//! An object stream (`/Type /ObjStm`) packs several objects into one
//! compressed stream:
//!
//! ```text
//! << /Type /ObjStm /N 2 /First 10 /Filter /FlateDecode >>
//! stream
//! 3 0 4 25            % pairs: (object number, offset relative to /First)
//! << /Type /Catalog >> << /Type /Pages >>
//! endstream
//! ```

use crate::error::{Error, Result};
use crate::lexer::{token, Token};
use crate::object::Object;
use crate::parser::parse_object;
use std::collections::HashMap;

/// Parse an object stream and extract all objects, keyed by object number.
///
/// Objects that fail to parse are skipped with a warning so that one bad
/// entry does not hide the rest of the stream.
pub fn parse_object_stream(stream_obj: &Object) -> Result<HashMap<u32, Object>> {
    let dict = match stream_obj {
        Object::Stream { dict, .. } => dict,
        _ => return Err(Error::InvalidPdf("object stream is not a Stream object".to_string())),
    };

    if let Some(type_name) = dict.get("Type").and_then(|o| o.as_name()) {
        if type_name != "ObjStm" {
            return Err(Error::InvalidPdf(format!(
                "expected /Type /ObjStm, got /Type /{}",
                type_name
            )));
        }
    }

    let n = dict
        .get("N")
        .and_then(|o| o.as_integer())
        .ok_or_else(|| Error::InvalidPdf("object stream missing /N entry".to_string()))?;
    let first = dict
        .get("First")
        .and_then(|o| o.as_integer())
        .ok_or_else(|| Error::InvalidPdf("object stream missing /First entry".to_string()))?;

    if !(0..=1_000_000).contains(&n) || first < 0 {
        return Err(Error::InvalidPdf(format!(
            "invalid object stream header: /N {} /First {}",
            n, first
        )));
    }
    let first = first as usize;

    let decoded = stream_obj.decode_stream_data()?;
    if decoded.len() < first {
        return Err(Error::InvalidPdf(format!(
            "object stream data too short: {} bytes, expected at least {}",
            decoded.len(),
            first
        )));
    }

    let pairs = parse_object_number_pairs(&decoded[..first], n as usize)?;
    let objects_data = &decoded[first..];
    let mut result = HashMap::with_capacity(pairs.len());

    for (obj_num, offset) in pairs {
        let Some(obj_data) = objects_data.get(offset..) else {
            log::warn!("Object {} offset {} is beyond object stream data", obj_num, offset);
            continue;
        };
        match parse_object(obj_data) {
            Ok((_, obj)) => {
                result.insert(obj_num, obj);
            },
            Err(e) => log::warn!("Failed to parse object {} from object stream: {:?}", obj_num, e),
        }
    }

    Ok(result)
}

/// Read `count` (object number, offset) pairs from the header section.
fn parse_object_number_pairs(data: &[u8], count: usize) -> Result<Vec<(u32, usize)>> {
    let mut pairs = Vec::with_capacity(count);
    let mut remaining = data;

    for i in 0..count {
        let mut next_int = || -> Result<i64> {
            match token(remaining) {
                Ok((rest, Token::Integer(v))) if v >= 0 => {
                    remaining = rest;
                    Ok(v)
                },
                _ => Err(Error::InvalidPdf(format!(
                    "object stream header truncated at pair {}",
                    i
                ))),
            }
        };
        let obj_num = next_int()? as u32;
        let offset = next_int()? as usize;
        pairs.push((obj_num, offset));
    }

    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Dict;

    fn objstm(n: i64, first: i64, body: &'static [u8]) -> Object {
        let mut dict = Dict::new();
        dict.insert("Type".to_string(), Object::name("ObjStm"));
        dict.insert("N".to_string(), Object::Integer(n));
        dict.insert("First".to_string(), Object::Integer(first));
        Object::Stream {
            dict,
            data: bytes::Bytes::from_static(body),
        }
    }

    #[test]
    fn test_parse_object_number_pairs() {
        let pairs = parse_object_number_pairs(b"10 0 11 15\n12 28 ", 3).unwrap();
        assert_eq!(pairs, vec![(10, 0), (11, 15), (12, 28)]);
    }

    #[test]
    fn test_parse_object_number_pairs_truncated() {
        assert!(parse_object_number_pairs(b"10 0 11", 2).is_err());
    }

    #[test]
    fn test_parse_object_stream_basic() {
        let stream = objstm(2, 9, b"3 0 4 21 << /Type /Catalog >> [1 2]");
        let objects = parse_object_stream(&stream).unwrap();

        assert_eq!(objects.len(), 2);
        let catalog = objects.get(&3).unwrap().as_dict().unwrap();
        assert_eq!(catalog.get("Type").unwrap().as_name(), Some("Catalog"));
        assert_eq!(objects.get(&4).unwrap().as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_parse_object_stream_not_stream() {
        assert!(parse_object_stream(&Object::Integer(1)).is_err());
    }

    #[test]
    fn test_parse_object_stream_missing_first() {
        let mut dict = Dict::new();
        dict.insert("N".to_string(), Object::Integer(1));
        let stream = Object::Stream {
            dict,
            data: bytes::Bytes::from_static(b"1 0 null"),
        };
        assert!(parse_object_stream(&stream).is_err());
    }

    #[test]
    fn test_parse_object_stream_data_too_short() {
        assert!(parse_object_stream(&objstm(1, 100, b"1 0 null")).is_err());
    }
}
