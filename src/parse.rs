//! Sans-IO parsing primitives for serialized metadata records.
//!
//! These functions work on byte slices without any I/O traits. All of them
//! return `(value, bytes_consumed)` on success, leaving buffer positions to
//! the caller.

use byteorder::{ByteOrder, LittleEndian};

/// Error type for parsing operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Need more bytes to complete parsing. Contains minimum additional bytes needed.
    NeedMoreBytes(usize),
    /// Invalid data encountered.
    InvalidData(&'static str),
    /// A versioned structure carried a version this crate does not know.
    UnknownVersion(u32),
}

impl core::fmt::Display for ParseError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ParseError::NeedMoreBytes(n) => write!(f, "need {} more bytes", n),
            ParseError::InvalidData(msg) => write!(f, "invalid data: {}", msg),
            ParseError::UnknownVersion(v) => write!(f, "unknown version: {}", v),
        }
    }
}

impl core::error::Error for ParseError {}

impl From<ParseError> for std::io::Error {
    fn from(e: ParseError) -> Self {
        match e {
            ParseError::NeedMoreBytes(_) => {
                std::io::Error::new(std::io::ErrorKind::UnexpectedEof, e)
            }
            ParseError::InvalidData(_) | ParseError::UnknownVersion(_) => {
                std::io::Error::new(std::io::ErrorKind::InvalidData, e)
            }
        }
    }
}

pub type ParseResult<T> = Result<(T, usize), ParseError>;

// ============================================================================
// PRIMITIVE PARSERS
// ============================================================================

#[inline]
fn need(data: &[u8], len: usize) -> Result<(), ParseError> {
    if data.len() < len {
        return Err(ParseError::NeedMoreBytes(len - data.len()));
    }
    Ok(())
}

/// Parse a single byte.
#[inline]
pub fn parse_u8(data: &[u8]) -> ParseResult<u8> {
    need(data, 1)?;
    Ok((data[0], 1))
}

/// Parse a little-endian u16.
#[inline]
pub fn parse_u16_le(data: &[u8]) -> ParseResult<u16> {
    need(data, 2)?;
    Ok((LittleEndian::read_u16(data), 2))
}

/// Parse a little-endian u32.
#[inline]
pub fn parse_u32_le(data: &[u8]) -> ParseResult<u32> {
    need(data, 4)?;
    Ok((LittleEndian::read_u32(data), 4))
}

/// Parse a little-endian u64.
#[inline]
pub fn parse_u64_le(data: &[u8]) -> ParseResult<u64> {
    need(data, 8)?;
    Ok((LittleEndian::read_u64(data), 8))
}

/// Parse a little-endian i64.
#[inline]
pub fn parse_i64_le(data: &[u8]) -> ParseResult<i64> {
    need(data, 8)?;
    Ok((LittleEndian::read_i64(data), 8))
}

// ============================================================================
// STRING AND BYTES PARSERS
// ============================================================================

/// Parse a u32-length-prefixed byte slice.
pub fn parse_bytes(data: &[u8]) -> ParseResult<&[u8]> {
    let (len, prefix) = parse_u32_le(data)?;
    let len = len as usize;
    need(&data[prefix..], len)?;
    Ok((&data[prefix..prefix + len], prefix + len))
}

/// Parse a length-prefixed UTF-8 string.
pub fn parse_str(data: &[u8]) -> ParseResult<&str> {
    let (bytes, consumed) = parse_bytes(data)?;
    let s = std::str::from_utf8(bytes).map_err(|_| ParseError::InvalidData("invalid UTF-8"))?;
    Ok((s, consumed))
}

/// Parse a presence byte followed by a length-prefixed string when present.
pub fn parse_opt_str(data: &[u8]) -> ParseResult<Option<&str>> {
    let (present, mut pos) = parse_u8(data)?;
    match present {
        0 => Ok((None, pos)),
        1 => {
            let (s, n) = parse_str(&data[pos..])?;
            pos += n;
            Ok((Some(s), pos))
        }
        _ => Err(ParseError::InvalidData("bad presence marker")),
    }
}

/// A cursor over a byte slice for parsing sequential fields.
pub(crate) struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Reader<'a> {
        Reader { data, pos: 0 }
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    pub(crate) fn read<T>(
        &mut self,
        parse: impl FnOnce(&'a [u8]) -> ParseResult<T>,
    ) -> Result<T, ParseError> {
        let (value, consumed) = parse(&self.data[self.pos..])?;
        self.pos += consumed;
        Ok(value)
    }

    pub(crate) fn u8(&mut self) -> Result<u8, ParseError> {
        self.read(parse_u8)
    }

    pub(crate) fn u16(&mut self) -> Result<u16, ParseError> {
        self.read(parse_u16_le)
    }

    pub(crate) fn u32(&mut self) -> Result<u32, ParseError> {
        self.read(parse_u32_le)
    }

    pub(crate) fn u64(&mut self) -> Result<u64, ParseError> {
        self.read(parse_u64_le)
    }

    pub(crate) fn i64(&mut self) -> Result<i64, ParseError> {
        self.read(parse_i64_le)
    }

    pub(crate) fn bytes(&mut self) -> Result<&'a [u8], ParseError> {
        self.read(parse_bytes)
    }

    pub(crate) fn opt_str(&mut self) -> Result<Option<&'a str>, ParseError> {
        self.read(parse_opt_str)
    }
}
