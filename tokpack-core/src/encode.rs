//! Minimal-width MessagePack encoder.
//!
//! The encoder is a thin cursor over a caller-owned byte slice: every
//! operation appends the narrowest wire form that round-trips the value
//! exactly and advances the write position. There is no internal buffer
//! and no allocation; callers pre-size the output (see
//! [`Value::encoded_size`](crate::Value::encoded_size)). Running out of
//! capacity is a caller bug surfaced as [`EncodeError::BufferTooSmall`],
//! not a state the encoder recovers from.

use thiserror::Error;

use crate::token::Token;

/// Error code for encode operations.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeError {
    /// The output buffer has no room for the bytes being appended.
    /// This is a contract violation - pre-size the buffer.
    #[error("output buffer too small")]
    BufferTooSmall,
}

/// Write cursor over a caller-owned output buffer.
#[derive(Debug)]
pub struct Encoder<'b> {
    buf: &'b mut [u8],
    pos: usize,
}

impl<'b> Encoder<'b> {
    /// Create an encoder writing from the start of `buf`.
    pub fn new(buf: &'b mut [u8]) -> Self {
        Encoder { buf, pos: 0 }
    }

    /// Bytes written so far.
    #[inline]
    pub fn written(&self) -> usize {
        self.pos
    }

    /// Capacity left in the output buffer.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn put(&mut self, bytes: &[u8]) -> Result<(), EncodeError> {
        let end = self.pos + bytes.len();
        let dst = self
            .buf
            .get_mut(self.pos..end)
            .ok_or(EncodeError::BufferTooSmall)?;
        dst.copy_from_slice(bytes);
        self.pos = end;
        Ok(())
    }

    #[inline]
    fn put1(&mut self, v: u8) -> Result<(), EncodeError> {
        self.put(&[v])
    }

    #[inline]
    fn put2(&mut self, v: u16) -> Result<(), EncodeError> {
        self.put(&v.to_be_bytes())
    }

    #[inline]
    fn put4(&mut self, v: u32) -> Result<(), EncodeError> {
        self.put(&v.to_be_bytes())
    }

    #[inline]
    fn put8(&mut self, v: u64) -> Result<(), EncodeError> {
        self.put(&v.to_be_bytes())
    }

    /// Nil: `0xc0`.
    pub fn nil(&mut self) -> Result<(), EncodeError> {
        self.put1(0xc0)
    }

    /// Boolean: `0xc2` / `0xc3`.
    pub fn boolean(&mut self, v: bool) -> Result<(), EncodeError> {
        self.put1(if v { 0xc3 } else { 0xc2 })
    }

    /// Unsigned integer in its narrowest form: positive fixint, then
    /// 8/16/32-bit widths; the 64-bit form only when the high half is
    /// nonzero.
    pub fn uint(&mut self, v: u64) -> Result<(), EncodeError> {
        if v < 0x80 {
            self.put1(v as u8)
        } else if v < 0x100 {
            self.put1(0xcc)?;
            self.put1(v as u8)
        } else if v < 0x10000 {
            self.put1(0xcd)?;
            self.put2(v as u16)
        } else if v <= u64::from(u32::MAX) {
            self.put1(0xce)?;
            self.put4(v as u32)
        } else {
            self.put1(0xcf)?;
            self.put8(v)
        }
    }

    /// Signed integer in its narrowest form. Non-negative values take
    /// the unsigned encodings; negatives use negative fixint down to
    /// -32, then 8/16/32/64-bit two's-complement widths.
    pub fn sint(&mut self, v: i64) -> Result<(), EncodeError> {
        if v >= 0 {
            self.uint(v as u64)
        } else if v >= -0x20 {
            self.put1(v as u8)
        } else if v >= -0x80 {
            self.put1(0xd0)?;
            self.put1(v as u8)
        } else if v >= -0x8000 {
            self.put1(0xd1)?;
            self.put2(v as u16)
        } else if v >= -0x8000_0000 {
            self.put1(0xd2)?;
            self.put4(v as u32)
        } else {
            self.put1(0xd3)?;
            self.put8(v as u64)
        }
    }

    /// Float: the 32-bit form iff casting to f32 and back reproduces the
    /// value exactly (NaN always takes the 64-bit form), else 64-bit.
    #[allow(clippy::float_cmp)]
    pub fn float(&mut self, v: f64) -> Result<(), EncodeError> {
        let narrow = v as f32;
        if f64::from(narrow) == v {
            self.put1(0xca)?;
            self.put4(narrow.to_bits())
        } else {
            self.put1(0xcb)?;
            self.put8(v.to_bits())
        }
    }

    /// String header: fixstr below 32, then 8/16/32-bit lengths.
    /// Payload bytes follow via [`raw`](Self::raw).
    pub fn str_header(&mut self, len: u32) -> Result<(), EncodeError> {
        if len < 0x20 {
            self.put1(0xa0 | len as u8)
        } else if len < 0x100 {
            self.put1(0xd9)?;
            self.put1(len as u8)
        } else if len < 0x10000 {
            self.put1(0xda)?;
            self.put2(len as u16)
        } else {
            self.put1(0xdb)?;
            self.put4(len)
        }
    }

    /// Binary header: 8/16/32-bit lengths (no inline form).
    pub fn bin_header(&mut self, len: u32) -> Result<(), EncodeError> {
        if len < 0x100 {
            self.put1(0xc4)?;
            self.put1(len as u8)
        } else if len < 0x10000 {
            self.put1(0xc5)?;
            self.put2(len as u16)
        } else {
            self.put1(0xc6)?;
            self.put4(len)
        }
    }

    /// Extension header. Lengths 1/2/4/8/16 use the fixext forms (no
    /// explicit length field); everything else carries an 8/16/32-bit
    /// length followed by the type byte. `tag` must be 0-127.
    pub fn ext_header(&mut self, tag: u8, len: u32) -> Result<(), EncodeError> {
        debug_assert!(tag < 0x80, "extension type tag must be 0-127");
        match len {
            1 => self.put1(0xd4)?,
            2 => self.put1(0xd5)?,
            4 => self.put1(0xd6)?,
            8 => self.put1(0xd7)?,
            16 => self.put1(0xd8)?,
            _ => {
                if len < 0x100 {
                    self.put1(0xc7)?;
                    self.put1(len as u8)?;
                } else if len < 0x10000 {
                    self.put1(0xc8)?;
                    self.put2(len as u16)?;
                } else {
                    self.put1(0xc9)?;
                    self.put4(len)?;
                }
            }
        }
        self.put1(tag)
    }

    /// Array header: fixarray below 16, then 16/32-bit counts.
    pub fn array_header(&mut self, len: u32) -> Result<(), EncodeError> {
        if len < 0x10 {
            self.put1(0x90 | len as u8)
        } else if len < 0x10000 {
            self.put1(0xdc)?;
            self.put2(len as u16)
        } else {
            self.put1(0xdd)?;
            self.put4(len)
        }
    }

    /// Map header: fixmap below 16, then 16/32-bit counts. `len` counts
    /// key/value pairs; 2x `len` elements must follow.
    pub fn map_header(&mut self, len: u32) -> Result<(), EncodeError> {
        if len < 0x10 {
            self.put1(0x80 | len as u8)
        } else if len < 0x10000 {
            self.put1(0xde)?;
            self.put2(len as u16)
        } else {
            self.put1(0xdf)?;
            self.put4(len)
        }
    }

    /// Verbatim payload bytes (string/binary/extension chunks).
    pub fn raw(&mut self, bytes: &[u8]) -> Result<(), EncodeError> {
        self.put(bytes)
    }

    /// Emit the wire form of one token. Headers emit only the header
    /// bytes; chunk tokens emit their payload verbatim.
    pub fn token(&mut self, token: &Token<'_>) -> Result<(), EncodeError> {
        match *token {
            Token::Nil => self.nil(),
            Token::Boolean(v) => self.boolean(v),
            Token::Uint(v) => self.uint(v),
            Token::Sint(v) => self.sint(v),
            Token::Float(v) => self.float(v),
            Token::Chunk(bytes) => self.raw(bytes),
            Token::Str { len } => self.str_header(len),
            Token::Bin { len } => self.bin_header(len),
            Token::Ext { tag, len } => self.ext_header(tag, len),
            Token::Array { len } => self.array_header(len),
            Token::Map { len } => self.map_header(len),
        }
    }
}
