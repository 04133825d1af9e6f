//! Resumable MessagePack tokenizer.
//!
//! This module provides true streaming decode capability:
//! - Input arrives in chunks of any size, tokens emitted as they complete
//! - A multi-byte field may span any number of `read` calls
//! - Byte-array payloads stream out as chunk tokens, never buffered whole
//! - Nesting is an explicit frame stack with a checked depth bound, so
//!   adversarially deep input cannot exhaust the call stack
//!
//! # Driving loop
//!
//! ```
//! use tokpack_core::Tokenizer;
//!
//! let mut tok = Tokenizer::new();
//! let mut input: &[u8] = &[0x93, 0x01, 0xc2, 0xa1, 0x61];
//! let mut tokens = Vec::new();
//! while let Some(token) = tok.read(&mut input).unwrap() {
//!     tokens.push(format!("{token:?}"));
//! }
//! assert_eq!(tokens.len(), 5); // array header, 1, false, str header, chunk
//! ```
//!
//! `read` returning `Ok(None)` means the input ran out mid-field; the
//! tokenizer keeps all progress and the same call is retried once more
//! bytes are available. Fatal errors latch the instance permanently.

use thiserror::Error;

use crate::token::Token;

/// Default maximum container nesting depth.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Fatal decode errors. Once returned, the same error is returned by
/// every further call on the instance without consuming input.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// An unrecognized type-tag byte was encountered (0xc1 is the only
    /// byte MessagePack leaves unassigned).
    #[error("unknown lead byte 0x{0:02x}")]
    UnknownLeadByte(u8),

    /// The input nests containers deeper than the configured maximum.
    #[error("nesting exceeds maximum depth {0}")]
    NestingTooDeep(usize),
}

/// What a completed multi-byte field means once assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    Uint,
    Sint,
    Float,
    StrLen,
    BinLen,
    ExtLen,
    ArrayLen,
    MapLen,
}

/// One level of in-progress parsing on the frame stack.
#[derive(Debug, Clone, Copy)]
enum Frame {
    /// Expecting the lead byte of the next value.
    LeadByte,
    /// Accumulating a big-endian field one byte at a time.
    Value {
        kind: Pending,
        width: u8,
        remaining: u8,
        acc: u64,
    },
    /// Expecting the extension type tag byte; `len` payload bytes follow.
    ExtTag { len: u32 },
    /// Streaming a byte-array payload out as chunks.
    ByteArray { remaining: usize },
    /// Iterating the elements of an array or map (maps count 2x pairs).
    Collection { remaining: usize },
}

/// Streaming tokenizer state machine.
///
/// The frame stack is never empty: the bottom frame is always
/// [`Frame::LeadByte`] and serves every top-level value in the stream.
#[derive(Debug)]
pub struct Tokenizer {
    stack: Vec<Frame>,
    /// Open collection frames; checked against `max_depth` on every push.
    depth: usize,
    max_depth: usize,
    error: Option<DecodeError>,
}

impl Tokenizer {
    /// Create a tokenizer with the default depth bound.
    pub fn new() -> Self {
        Self::with_max_depth(DEFAULT_MAX_DEPTH)
    }

    /// Create a tokenizer allowing at most `max_depth` nested containers.
    pub fn with_max_depth(max_depth: usize) -> Self {
        Tokenizer {
            stack: vec![Frame::LeadByte],
            depth: 0,
            max_depth,
            error: None,
        }
    }

    /// The configured nesting bound.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Decode the next token from the front of `*buf`, advancing the
    /// cursor past every byte consumed.
    ///
    /// Returns `Ok(Some(token))` for one completed token, `Ok(None)` when
    /// the input was exhausted mid-field (call again with more bytes), or
    /// a fatal error that latches the instance.
    pub fn read<'a>(&mut self, buf: &mut &'a [u8]) -> Result<Option<Token<'a>>, DecodeError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        while !buf.is_empty() {
            let step = match *self.stack.last().expect("frame stack is never empty") {
                Frame::LeadByte => self.lead_byte(buf),
                Frame::Value { .. } => self.value(buf),
                Frame::ExtTag { .. } => self.ext_tag(buf),
                Frame::ByteArray { .. } => Ok(Some(self.byte_array(buf))),
                Frame::Collection { .. } => self.collection().map(|()| None),
            };
            match step {
                Ok(Some(token)) => return Ok(Some(token)),
                Ok(None) => {}
                Err(err) => {
                    self.error = Some(err);
                    return Err(err);
                }
            }
        }
        Ok(None)
    }

    /// Classify one lead byte. Emits complete scalars directly; multi-byte
    /// fields, extension tags, payloads, and collections push frames.
    fn lead_byte<'a>(&mut self, buf: &mut &'a [u8]) -> Result<Option<Token<'a>>, DecodeError> {
        let t = advance(buf);
        if self.stack.len() > 1 {
            // this element's placeholder frame; whatever the lead byte
            // starts takes its place
            self.stack.pop();
        }
        let token = match t {
            0x00..=0x7f => Some(Token::Uint(u64::from(t))),
            0x80..=0x8f => {
                let pairs = u32::from(t & 0x0f);
                self.push_collection(2 * pairs as usize)?;
                Some(Token::Map { len: pairs })
            }
            0x90..=0x9f => {
                let len = u32::from(t & 0x0f);
                self.push_collection(len as usize)?;
                Some(Token::Array { len })
            }
            0xa0..=0xbf => {
                let len = u32::from(t & 0x1f);
                self.push_byte_array(len);
                Some(Token::Str { len })
            }
            0xc0 => Some(Token::Nil),
            0xc1 => return Err(DecodeError::UnknownLeadByte(t)),
            0xc2 => Some(Token::Boolean(false)),
            0xc3 => Some(Token::Boolean(true)),
            0xc4..=0xc6 => {
                self.push_value(Pending::BinLen, 1 << (t - 0xc4));
                None
            }
            0xc7..=0xc9 => {
                self.push_value(Pending::ExtLen, 1 << (t - 0xc7));
                None
            }
            0xca | 0xcb => {
                self.push_value(Pending::Float, 1 << (t - 0xc8));
                None
            }
            0xcc..=0xcf => {
                self.push_value(Pending::Uint, 1 << (t - 0xcc));
                None
            }
            0xd0..=0xd3 => {
                self.push_value(Pending::Sint, 1 << (t - 0xd0));
                None
            }
            0xd4..=0xd8 => {
                self.stack.push(Frame::ExtTag {
                    len: 1u32 << (t - 0xd4),
                });
                None
            }
            0xd9..=0xdb => {
                self.push_value(Pending::StrLen, 1 << (t - 0xd9));
                None
            }
            0xdc | 0xdd => {
                self.push_value(Pending::ArrayLen, 1 << (t - 0xdb));
                None
            }
            0xde | 0xdf => {
                self.push_value(Pending::MapLen, 1 << (t - 0xdd));
                None
            }
            0xe0..=0xff => Some(Token::Sint(i64::from(t as i8))),
        };
        Ok(token)
    }

    /// Accumulate a big-endian field, resumable at any byte boundary.
    /// On completion, scalars become tokens and length headers dispatch
    /// to their payload or element states.
    fn value<'a>(&mut self, buf: &mut &'a [u8]) -> Result<Option<Token<'a>>, DecodeError> {
        {
            let frame = self.stack.last_mut().expect("frame stack is never empty");
            let Frame::Value { remaining, acc, .. } = frame else {
                unreachable!("value step on non-value frame");
            };
            while *remaining > 0 && !buf.is_empty() {
                *acc = (*acc << 8) | u64::from(advance(buf));
                *remaining -= 1;
            }
            if *remaining > 0 {
                return Ok(None);
            }
        }
        let Some(Frame::Value { kind, width, acc, .. }) = self.stack.pop() else {
            unreachable!("value step on non-value frame");
        };
        match kind {
            Pending::Uint => Ok(Some(Token::Uint(acc))),
            Pending::Sint => Ok(Some(Token::Sint(sign_extend(acc, width)))),
            Pending::Float => {
                let v = if width == 4 {
                    f64::from(f32::from_bits(acc as u32))
                } else {
                    f64::from_bits(acc)
                };
                Ok(Some(Token::Float(v)))
            }
            Pending::StrLen => {
                let len = acc as u32;
                self.push_byte_array(len);
                Ok(Some(Token::Str { len }))
            }
            Pending::BinLen => {
                let len = acc as u32;
                self.push_byte_array(len);
                Ok(Some(Token::Bin { len }))
            }
            Pending::ExtLen => {
                self.stack.push(Frame::ExtTag { len: acc as u32 });
                Ok(None)
            }
            Pending::ArrayLen => {
                let len = acc as u32;
                self.push_collection(len as usize)?;
                Ok(Some(Token::Array { len }))
            }
            Pending::MapLen => {
                let len = acc as u32;
                self.push_collection(2 * len as usize)?;
                Ok(Some(Token::Map { len }))
            }
        }
    }

    /// Consume the extension type tag byte and start the payload stream.
    fn ext_tag<'a>(&mut self, buf: &mut &'a [u8]) -> Result<Option<Token<'a>>, DecodeError> {
        let tag = advance(buf);
        let Some(Frame::ExtTag { len }) = self.stack.pop() else {
            unreachable!("ext-tag step on non-ext frame");
        };
        self.push_byte_array(len);
        Ok(Some(Token::Ext { tag, len }))
    }

    /// Emit a payload chunk sized to whatever input is available, up to
    /// the remaining declared length.
    fn byte_array<'a>(&mut self, buf: &mut &'a [u8]) -> Token<'a> {
        let frame = self.stack.last_mut().expect("frame stack is never empty");
        let Frame::ByteArray { remaining } = frame else {
            unreachable!("byte-array step on non-byte-array frame");
        };
        let n = (*remaining).min(buf.len());
        let (chunk, rest) = buf.split_at(n);
        *buf = rest;
        *remaining -= n;
        let done = *remaining == 0;
        if done {
            self.stack.pop();
        }
        Token::Chunk(chunk)
    }

    /// Step the element iteration of an open collection.
    fn collection(&mut self) -> Result<(), DecodeError> {
        let frame = self.stack.last_mut().expect("frame stack is never empty");
        let Frame::Collection { remaining } = frame else {
            unreachable!("collection step on non-collection frame");
        };
        if *remaining == 0 {
            self.stack.pop();
            self.depth -= 1;
            return Ok(());
        }
        *remaining -= 1;
        self.stack.push(Frame::LeadByte);
        Ok(())
    }

    fn push_value(&mut self, kind: Pending, width: u8) {
        self.stack.push(Frame::Value {
            kind,
            width,
            remaining: width,
            acc: 0,
        });
    }

    /// Zero-length payloads push no frame: the header token is complete
    /// on its own and no chunk follows.
    fn push_byte_array(&mut self, len: u32) {
        if len > 0 {
            self.stack.push(Frame::ByteArray {
                remaining: len as usize,
            });
        }
    }

    fn push_collection(&mut self, remaining: usize) -> Result<(), DecodeError> {
        if self.depth == self.max_depth {
            return Err(DecodeError::NestingTooDeep(self.max_depth));
        }
        self.depth += 1;
        self.stack.push(Frame::Collection { remaining });
        Ok(())
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn advance(buf: &mut &[u8]) -> u8 {
    let b = buf[0];
    *buf = &buf[1..];
    b
}

/// Sign-extend a big-endian accumulated integer of the given wire width
/// into canonical 64-bit two's-complement form.
fn sign_extend(acc: u64, width: u8) -> i64 {
    match width {
        1 => i64::from(acc as u8 as i8),
        2 => i64::from(acc as u16 as i16),
        4 => i64::from(acc as u32 as i32),
        _ => acc as i64,
    }
}
