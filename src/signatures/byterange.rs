//! ByteRange calculation for PDF signatures.
//!
//! PDF digital signatures use a ByteRange array to specify which portions
//! of the document are covered by the signature. The signature itself is
//! stored in a placeholder that is excluded from the signed bytes.
//!
//! ## ByteRange Format
//!
//! The ByteRange is an array of four integers:
//! `[offset1, length1, offset2, length2]`
//!
//! Where:
//! - `offset1` = 0 (start of file)
//! - `length1` = byte offset where the signature value begins
//! - `offset2` = byte offset where the signature value ends
//! - `length2` = remaining bytes to end of file
//!
//! The signature value is a hex-encoded string within `<` and `>` delimiters.

use crate::error::{Error, Result};

/// Text written for `/ByteRange` before offsets are known.
///
/// Each offset gets ten digits, enough for files under 10 GB. The patched
/// array is padded with spaces to this exact width.
pub const BYTE_RANGE_PLACEHOLDER: &str = "[0 0000000000 0000000000 0000000000]";

/// Calculator for PDF signature byte ranges.
#[derive(Debug, Clone)]
pub struct ByteRangeCalculator {
    /// Size of the placeholder for the signature value (hex digits + 2 for angle brackets)
    placeholder_size: usize,
}

impl ByteRangeCalculator {
    /// Create a new ByteRange calculator with the specified signature size.
    ///
    /// The placeholder size will be calculated as: (signature_size * 2) + 2
    /// because the signature is hex-encoded and enclosed in angle brackets.
    pub fn new(estimated_signature_size: usize) -> Self {
        let placeholder_size = estimated_signature_size * 2 + 2;
        Self { placeholder_size }
    }

    /// Get the placeholder size (for the /Contents value).
    pub fn placeholder_size(&self) -> usize {
        self.placeholder_size
    }

    /// Generate a placeholder string for the signature contents.
    pub fn generate_placeholder(&self) -> String {
        format!("<{}>", "0".repeat(self.placeholder_size.saturating_sub(2)))
    }

    /// Calculate the ByteRange array given the position of the /Contents value.
    ///
    /// `contents_offset` is the offset of the opening `<`. Returns
    /// `[0, before_sig, after_sig_start, after_sig_len]`.
    pub fn calculate_byte_range(&self, file_size: usize, contents_offset: usize) -> [i64; 4] {
        let before_sig = contents_offset as i64;
        let after_sig_start = (contents_offset + self.placeholder_size) as i64;
        let after_sig_len = file_size as i64 - after_sig_start;

        [0, before_sig, after_sig_start, after_sig_len]
    }

    /// Format a ByteRange array as a PDF array string.
    pub fn format_byte_range(byte_range: &[i64; 4]) -> String {
        format!("[{} {} {} {}]", byte_range[0], byte_range[1], byte_range[2], byte_range[3])
    }

    /// Overwrite the fixed-width `/ByteRange` placeholder at `offset`.
    pub fn patch_byte_range(
        pdf_data: &mut [u8],
        offset: usize,
        byte_range: &[i64; 4],
    ) -> Result<()> {
        let width = BYTE_RANGE_PLACEHOLDER.len();
        let slot = pdf_data
            .get_mut(offset..offset + width)
            .filter(|slot| *slot == BYTE_RANGE_PLACEHOLDER.as_bytes())
            .ok_or_else(|| Error::InvalidPdf(format!("no ByteRange placeholder at {}", offset)))?;

        let formatted = Self::format_byte_range(byte_range);
        if formatted.len() > width {
            return Err(Error::InvalidPdf(format!("ByteRange {} does not fit", formatted)));
        }
        slot.fill(b' ');
        slot[..formatted.len()].copy_from_slice(formatted.as_bytes());
        Ok(())
    }

    /// Extract the bytes to be signed from a PDF file.
    ///
    /// This returns the concatenation of the two ranges specified by ByteRange.
    pub fn extract_signed_bytes(pdf_data: &[u8], byte_range: &[i64; 4]) -> Result<Vec<u8>> {
        if byte_range.iter().any(|&v| v < 0) {
            return Err(Error::InvalidPdf(format!("negative ByteRange value: {:?}", byte_range)));
        }
        let offset1 = byte_range[0] as usize;
        let length1 = byte_range[1] as usize;
        let offset2 = byte_range[2] as usize;
        let length2 = byte_range[3] as usize;

        if offset1 + length1 > pdf_data.len() {
            return Err(Error::InvalidPdf(format!(
                "ByteRange first range exceeds file size: {} + {} > {}",
                offset1,
                length1,
                pdf_data.len()
            )));
        }
        if offset2 + length2 > pdf_data.len() {
            return Err(Error::InvalidPdf(format!(
                "ByteRange second range exceeds file size: {} + {} > {}",
                offset2,
                length2,
                pdf_data.len()
            )));
        }

        let mut signed_bytes = Vec::with_capacity(length1 + length2);
        signed_bytes.extend_from_slice(&pdf_data[offset1..offset1 + length1]);
        signed_bytes.extend_from_slice(&pdf_data[offset2..offset2 + length2]);

        Ok(signed_bytes)
    }

    /// Check that a ByteRange covers `file_size` bytes with a single gap.
    ///
    /// A valid ByteRange:
    /// - Starts at offset 0
    /// - Ends at the file size
    /// - Leaves exactly one gap, which holds the `<...>` signature value
    pub fn validate_byte_range(pdf_data: &[u8], byte_range: &[i64; 4]) -> Result<()> {
        let [offset1, length1, offset2, length2] = *byte_range;

        if offset1 != 0 {
            return Err(Error::InvalidPdf(format!("ByteRange must start at 0, got {}", offset1)));
        }

        let expected_end = pdf_data.len() as i64;
        let actual_end = offset2 + length2;
        if actual_end != expected_end {
            return Err(Error::InvalidPdf(format!(
                "ByteRange must end at file size {}, got {}",
                expected_end, actual_end
            )));
        }

        if length1 < 0 || length2 < 0 || length1 >= offset2 {
            return Err(Error::InvalidPdf(format!(
                "ByteRange first range ({}) overlaps with second range start ({})",
                length1, offset2
            )));
        }

        let gap = &pdf_data[length1 as usize..offset2 as usize];
        let is_hex_string = gap.len() >= 2
            && gap[0] == b'<'
            && gap[gap.len() - 1] == b'>'
            && gap[1..gap.len() - 1].iter().all(|b| b.is_ascii_hexdigit());
        if !is_hex_string {
            return Err(Error::InvalidPdf(
                "ByteRange gap is not the signature value".to_string(),
            ));
        }

        Ok(())
    }

    /// Replace the placeholder in the PDF with the actual signature.
    ///
    /// The hex value is padded with zeros to fill the placeholder.
    pub fn insert_signature(
        &self,
        pdf_data: &mut [u8],
        contents_offset: usize,
        signature_hex: &str,
    ) -> Result<()> {
        let sig_len = signature_hex.len() + 2;
        if sig_len > self.placeholder_size {
            return Err(Error::SignatureTooLarge {
                needed: sig_len,
                available: self.placeholder_size,
            });
        }

        if contents_offset + self.placeholder_size > pdf_data.len() {
            return Err(Error::InvalidPdf(
                "Signature insertion would exceed file bounds".to_string(),
            ));
        }

        let slot = &mut pdf_data[contents_offset..contents_offset + self.placeholder_size];
        slot.fill(b'0');
        slot[0] = b'<';
        slot[1..1 + signature_hex.len()].copy_from_slice(signature_hex.as_bytes());
        slot[self.placeholder_size - 1] = b'>';

        Ok(())
    }
}

impl Default for ByteRangeCalculator {
    fn default() -> Self {
        Self::new(8192)
    }
}
