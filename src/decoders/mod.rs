//! Stream decoders for the filters that carry document structure.
//!
//! Cross-reference streams and object streams are FlateDecode-compressed,
//! usually with a PNG predictor. Content filters (images, fonts) are never
//! decoded here since signing does not touch page content.

use crate::error::{Error, Result};

mod flate;
mod predictor;

pub use flate::FlateDecoder;
pub use predictor::{decode_predictor, DecodeParams};

/// Trait for PDF stream decoders.
pub trait StreamDecoder {
    /// Decode the input data.
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>>;

    /// Get the name of this decoder (e.g., "FlateDecode").
    fn name(&self) -> &str;
}

fn decoder_for(filter_name: &str) -> Option<Box<dyn StreamDecoder>> {
    match filter_name {
        "FlateDecode" | "Fl" => Some(Box::new(FlateDecoder)),
        _ => None,
    }
}

/// Decode stream data through a filter pipeline, then undo any predictor.
pub fn decode_stream_with_params(
    data: &[u8],
    filters: &[String],
    params: Option<&DecodeParams>,
) -> Result<Vec<u8>> {
    let mut current = data.to_vec();

    for filter_name in filters {
        let decoder = decoder_for(filter_name)
            .ok_or_else(|| Error::Decode(format!("Unsupported filter: {}", filter_name)))?;
        log::trace!("Applying {} to {} bytes", decoder.name(), current.len());
        current = decoder.decode(&current)?;
    }

    if let Some(params) = params {
        if params.predictor != 1 {
            current = decode_predictor(&current, params)?;
        }
    }

    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn test_decode_stream_no_filters() {
        assert_eq!(decode_stream_with_params(b"raw", &[], None).unwrap(), b"raw");
    }

    #[test]
    fn test_decode_stream_unsupported_filter() {
        let err = decode_stream_with_params(b"x", &["LZWDecode".to_string()], None).unwrap_err();
        assert!(err.to_string().contains("LZWDecode"));
    }

    #[test]
    fn test_flate_then_png_up() {
        // two rows of 3 columns, second row encoded as Up deltas
        let encoded_rows = [2u8, 1, 2, 3, 2, 1, 1, 1];
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&encoded_rows).unwrap();
        let compressed = encoder.finish().unwrap();

        let params = DecodeParams {
            predictor: 12,
            columns: 3,
            ..DecodeParams::default()
        };
        let out =
            decode_stream_with_params(&compressed, &["FlateDecode".to_string()], Some(&params))
                .unwrap();
        assert_eq!(out, vec![1, 2, 3, 2, 3, 4]);
    }
}
