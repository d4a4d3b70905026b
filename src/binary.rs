//! Bounds-checked little-endian reads and string codecs.
//!
//! Every read helper validates the slice length before touching it, so record
//! parsers can propagate a corruption error instead of panicking on truncated
//! input.
use crate::error::{DrawingError, Result};
use zerocopy::{FromBytes, I32, LE, U16, U32};

/// Read a little-endian u16 from a byte slice at the given offset.
#[inline]
pub fn read_u16_le(data: &[u8], offset: usize) -> Result<u16> {
    if offset + 2 > data.len() {
        return Err(DrawingError::corrupt("not enough data for u16"));
    }
    U16::<LE>::read_from_bytes(&data[offset..offset + 2])
        .map(|v| v.get())
        .map_err(|_| DrawingError::corrupt("failed to read u16"))
}

/// Read a little-endian i16 from a byte slice at the given offset.
#[inline]
pub fn read_i16_le(data: &[u8], offset: usize) -> Result<i16> {
    read_u16_le(data, offset).map(|v| v as i16)
}

/// Read a little-endian u32 from a byte slice at the given offset.
#[inline]
pub fn read_u32_le(data: &[u8], offset: usize) -> Result<u32> {
    if offset + 4 > data.len() {
        return Err(DrawingError::corrupt("not enough data for u32"));
    }
    U32::<LE>::read_from_bytes(&data[offset..offset + 4])
        .map(|v| v.get())
        .map_err(|_| DrawingError::corrupt("failed to read u32"))
}

/// Read a little-endian i32 from a byte slice at the given offset.
#[inline]
pub fn read_i32_le(data: &[u8], offset: usize) -> Result<i32> {
    if offset + 4 > data.len() {
        return Err(DrawingError::corrupt("not enough data for i32"));
    }
    I32::<LE>::read_from_bytes(&data[offset..offset + 4])
        .map(|v| v.get())
        .map_err(|_| DrawingError::corrupt("failed to read i32"))
}

/// Parse a UTF-16LE string, stopping at a null terminator if present.
///
/// Based on Apache POI's StringUtil.getFromUnicodeLE.
pub fn parse_utf16le_string(data: &[u8]) -> String {
    if data.len() < 2 {
        return String::new();
    }

    let mut result = String::with_capacity(data.len() / 2);
    let mut i = 0;
    while i + 1 < data.len() {
        let code_unit = U16::<LE>::read_from_bytes(&data[i..i + 2])
            .map(|v| v.get())
            .unwrap_or(0);
        i += 2;

        if code_unit == 0 {
            break;
        }
        if let Some(ch) = char::from_u32(code_unit as u32) {
            result.push(ch);
        }
    }

    result
}

/// Encode a string as UTF-16LE bytes with a trailing null terminator.
pub fn utf16le_bytes_nul(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() * 2 + 2);
    for unit in text.encode_utf16() {
        out.extend_from_slice(&unit.to_le_bytes());
    }
    out.extend_from_slice(&[0, 0]);
    out
}

/// Decode a compressed (single-byte) string payload.
pub fn decode_windows1252(data: &[u8]) -> String {
    encoding_rs::WINDOWS_1252.decode(data).0.into_owned()
}

/// Encode a string into single-byte form if every character maps to
/// Windows-1252; returns `None` when the text needs the UTF-16 path.
pub fn encode_windows1252(text: &str) -> Option<Vec<u8>> {
    let (bytes, _, had_errors) = encoding_rs::WINDOWS_1252.encode(text);
    if had_errors {
        None
    } else {
        Some(bytes.into_owned())
    }
}
