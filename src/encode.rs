//! Sans-IO encoding primitives for serialized metadata records.
//!
//! These functions append to byte buffers without any I/O traits.

use byteorder::{ByteOrder, LittleEndian};

// ============================================================================
// PRIMITIVE ENCODERS
// ============================================================================

/// Encode a u8 to a buffer.
#[inline]
pub fn encode_u8(buf: &mut Vec<u8>, value: u8) {
    buf.push(value);
}

/// Encode a little-endian u16 to a buffer.
#[inline]
pub fn encode_u16_le(buf: &mut Vec<u8>, value: u16) {
    let mut bytes = [0u8; 2];
    LittleEndian::write_u16(&mut bytes, value);
    buf.extend_from_slice(&bytes);
}

/// Encode a little-endian u32 to a buffer.
#[inline]
pub fn encode_u32_le(buf: &mut Vec<u8>, value: u32) {
    let mut bytes = [0u8; 4];
    LittleEndian::write_u32(&mut bytes, value);
    buf.extend_from_slice(&bytes);
}

/// Encode a little-endian u64 to a buffer.
#[inline]
pub fn encode_u64_le(buf: &mut Vec<u8>, value: u64) {
    let mut bytes = [0u8; 8];
    LittleEndian::write_u64(&mut bytes, value);
    buf.extend_from_slice(&bytes);
}

/// Encode a little-endian i64 to a buffer.
#[inline]
pub fn encode_i64_le(buf: &mut Vec<u8>, value: i64) {
    let mut bytes = [0u8; 8];
    LittleEndian::write_i64(&mut bytes, value);
    buf.extend_from_slice(&bytes);
}

// ============================================================================
// STRING AND BYTES ENCODERS
// ============================================================================

/// Encode a u32-length-prefixed byte slice.
pub fn encode_bytes(buf: &mut Vec<u8>, data: &[u8]) {
    encode_u32_le(buf, data.len() as u32);
    buf.extend_from_slice(data);
}

/// Encode a presence byte, followed by the string when present.
pub fn encode_opt_str(buf: &mut Vec<u8>, s: Option<&str>) {
    match s {
        Some(s) => {
            encode_u8(buf, 1);
            encode_bytes(buf, s.as_bytes());
        }
        None => encode_u8(buf, 0),
    }
}

// ============================================================================
// TAGGED SECTIONS
// ============================================================================

/// Write a tag and a length-prefixed payload produced by `body`.
///
/// The length is back-filled once the payload is written so readers can skip
/// tags they do not understand.
pub fn encode_section(buf: &mut Vec<u8>, tag: u8, body: impl FnOnce(&mut Vec<u8>)) {
    encode_u8(buf, tag);
    let len_pos = buf.len();
    buf.extend_from_slice(&[0u8; 4]);

    let content_start = buf.len();
    body(buf);

    let len = (buf.len() - content_start) as u32;
    LittleEndian::write_u32(&mut buf[len_pos..len_pos + 4], len);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::{Reader, parse_bytes};

    #[test]
    fn section_length_is_backfilled() {
        let mut buf = Vec::new();
        encode_section(&mut buf, 7, |b| {
            encode_u16_le(b, 0xbeef);
            encode_bytes(b, b"abc");
        });

        let mut reader = Reader::new(&buf);
        assert_eq!(reader.u8().unwrap(), 7);
        let body = reader.bytes().unwrap();
        assert_eq!(body.len(), 2 + 4 + 3);
        assert!(reader.is_empty());

        let mut inner = Reader::new(body);
        assert_eq!(inner.u16().unwrap(), 0xbeef);
        assert_eq!(inner.read(parse_bytes).unwrap(), b"abc");
    }
}
