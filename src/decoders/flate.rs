//! FlateDecode (zlib/deflate) via flate2.

use crate::decoders::StreamDecoder;
use crate::error::{Error, Result};
use flate2::read::{DeflateDecoder, ZlibDecoder};
use std::io::Read;

/// FlateDecode filter implementation.
pub struct FlateDecoder;

impl StreamDecoder for FlateDecoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        match ZlibDecoder::new(input).read_to_end(&mut output) {
            Ok(_) => return Ok(output),
            Err(e) if !output.is_empty() => {
                log::warn!(
                    "FlateDecode partial recovery: kept {} bytes before corruption: {}",
                    output.len(),
                    e
                );
                return Ok(output);
            },
            Err(e) => log::debug!("Zlib decode failed ({}), trying raw deflate", e),
        }

        // Some writers omit the zlib wrapper
        output.clear();
        DeflateDecoder::new(input)
            .read_to_end(&mut output)
            .map_err(|e| Error::Decode(format!("FlateDecode failed: {}", e)))?;
        Ok(output)
    }

    fn name(&self) -> &str {
        "FlateDecode"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::{DeflateEncoder, ZlibEncoder};
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn test_flate_decode_zlib() {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"<< /Type /XRef >>").unwrap();
        let compressed = encoder.finish().unwrap();

        assert_eq!(FlateDecoder.decode(&compressed).unwrap(), b"<< /Type /XRef >>");
    }

    #[test]
    fn test_flate_decode_raw_deflate() {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"headerless").unwrap();
        let compressed = encoder.finish().unwrap();

        assert_eq!(FlateDecoder.decode(&compressed).unwrap(), b"headerless");
    }

    #[test]
    fn test_flate_decode_invalid_data() {
        assert!(FlateDecoder.decode(&[0xFF, 0xFE, 0x00, 0x13]).is_err());
    }
}
