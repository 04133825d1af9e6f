//! Owned value trees for callers that want a document, not a stream.
//!
//! [`Value`] is the buffered counterpart of the token stream: decoding
//! collects chunks into owned byte vectors and elements into owned
//! children, encoding walks the tree back out through the [`Encoder`].
//! Both directions ride the [`Walker`], so depth stays bounded and
//! nothing recurses.
//!
//! Strings are kept as raw bytes. MessagePack says str payloads are
//! UTF-8 but plenty of producers disagree, and rejecting their data at
//! the codec layer helps nobody.

use thiserror::Error;

use crate::encode::Encoder;
use crate::token::Token;
use crate::walk::{Emitter, Node, Parser, Visitor, WalkError, WalkState, Walker};

/// Errors from the buffered decode path.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueError {
    /// The input ended before a complete top-level value.
    #[error("input ended before the value was complete")]
    UnexpectedEof,

    #[error(transparent)]
    Walk(#[from] WalkError),
}

/// A complete MessagePack value as an owned tree.
///
/// Integers and floats are canonical (see [`Token`]); maps preserve
/// insertion order and allow keys of any kind, as the wire format does.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Boolean(bool),
    Uint(u64),
    Sint(i64),
    Float(f64),
    Str(Vec<u8>),
    Bin(Vec<u8>),
    Ext(u8, Vec<u8>),
    Array(Vec<Value>),
    Map(Vec<(Value, Value)>),
}

impl Value {
    /// Decode one value from the front of `buf`. Trailing bytes are
    /// ignored; an input that ends mid-value is [`ValueError::UnexpectedEof`].
    pub fn decode(buf: &[u8]) -> Result<Value, ValueError> {
        let mut cursor = buf;
        let mut parser = Parser::new();
        let mut builder = Builder { root: None };
        match parser.parse(&mut cursor, &mut builder)? {
            WalkState::Done => Ok(builder.root.expect("completed walk produced a root")),
            WalkState::More => Err(ValueError::UnexpectedEof),
        }
    }

    /// Encode this value into `buf`, returning the number of bytes
    /// written. Size the buffer with [`encoded_size`](Value::encoded_size).
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, WalkError> {
        let mut out = Encoder::new(buf);
        let mut walker = Walker::new();
        let mut unbuilder = Unbuilder { root: self };
        walker.unparse(&mut out, &mut unbuilder)?;
        Ok(out.written())
    }

    /// Encode into a freshly allocated, exactly sized vector.
    pub fn to_vec(&self) -> Result<Vec<u8>, WalkError> {
        let mut buf = vec![0u8; self.encoded_size()];
        let written = self.encode(&mut buf)?;
        debug_assert_eq!(written, buf.len());
        Ok(buf)
    }

    /// The exact number of bytes [`encode`](Value::encode) will write,
    /// with every field at its minimal width.
    pub fn encoded_size(&self) -> usize {
        let mut total = 0usize;
        let mut work = vec![self];
        while let Some(value) = work.pop() {
            total += match value {
                Value::Nil | Value::Boolean(_) => 1,
                Value::Uint(v) => uint_size(*v),
                Value::Sint(v) => sint_size(*v),
                Value::Float(v) => float_size(*v),
                Value::Str(bytes) => str_header_size(bytes.len()) + bytes.len(),
                Value::Bin(bytes) => bin_header_size(bytes.len()) + bytes.len(),
                Value::Ext(_, bytes) => ext_header_size(bytes.len()) + bytes.len(),
                Value::Array(items) => {
                    work.extend(items.iter());
                    container_header_size(items.len())
                }
                Value::Map(pairs) => {
                    for (key, val) in pairs {
                        work.push(key);
                        work.push(val);
                    }
                    container_header_size(pairs.len())
                }
            };
        }
        total
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_uint(&self) -> Option<u64> {
        match self {
            Value::Uint(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_sint(&self) -> Option<i64> {
        match self {
            Value::Sint(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Payload bytes of a `Str` or `Bin` value.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Str(bytes) | Value::Bin(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&[(Value, Value)]> {
        match self {
            Value::Map(pairs) => Some(pairs),
            _ => None,
        }
    }
}

/// Upper bound on capacity reserved from a wire-declared length. The
/// header arrives before any payload, so a truncated input can claim
/// billions of elements; beyond this the vectors grow with actual data.
const PREALLOC_LIMIT: usize = 4096;

fn prealloc(len: u32) -> usize {
    (len as usize).min(PREALLOC_LIMIT)
}

/// Collects the walk into an owned tree. Each container node carries its
/// partial `Value` in the node data slot until exit attaches it to the
/// parent.
struct Builder {
    root: Option<Value>,
}

impl Visitor<Value> for Builder {
    fn enter(
        &mut self,
        token: &Token<'_>,
        node: &mut Node<Value>,
        parent: Option<&mut Node<Value>>,
    ) -> Result<(), WalkError> {
        node.data = match *token {
            Token::Nil => Some(Value::Nil),
            Token::Boolean(v) => Some(Value::Boolean(v)),
            Token::Uint(v) => Some(Value::Uint(v)),
            Token::Sint(v) => Some(Value::Sint(v)),
            Token::Float(v) => Some(Value::Float(v)),
            Token::Str { len } => Some(Value::Str(Vec::with_capacity(prealloc(len)))),
            Token::Bin { len } => Some(Value::Bin(Vec::with_capacity(prealloc(len)))),
            Token::Ext { tag, len } => Some(Value::Ext(tag, Vec::with_capacity(prealloc(len)))),
            Token::Array { len } => Some(Value::Array(Vec::with_capacity(prealloc(len)))),
            Token::Map { len } => Some(Value::Map(Vec::with_capacity(prealloc(len)))),
            Token::Chunk(bytes) => {
                let parent = parent.expect("chunk tokens always have a byte-array parent");
                match parent.data.as_mut() {
                    Some(Value::Str(buf) | Value::Bin(buf) | Value::Ext(_, buf)) => {
                        buf.extend_from_slice(bytes);
                    }
                    _ => unreachable!("chunk parent holds a byte-array value"),
                }
                None
            }
        };
        Ok(())
    }

    fn exit(
        &mut self,
        node: &mut Node<Value>,
        parent: Option<&mut Node<Value>>,
    ) -> Result<(), WalkError> {
        let Some(value) = node.data.take() else {
            // chunk nodes carry no value of their own
            return Ok(());
        };
        let Some(parent) = parent else {
            self.root = Some(value);
            return Ok(());
        };
        let is_key = parent.visiting_key();
        match parent.data.as_mut() {
            Some(Value::Array(items)) => items.push(value),
            Some(Value::Map(pairs)) => {
                if is_key {
                    pairs.push((value, Value::Nil));
                } else {
                    let slot = pairs.last_mut().expect("key was pushed first");
                    slot.1 = value;
                }
            }
            _ => unreachable!("exit parent is always a container"),
        }
        Ok(())
    }
}

/// Streams a borrowed tree back out as tokens. Container nodes carry a
/// reference to their `Value` so children can be looked up by the
/// parent's walk position.
struct Unbuilder<'v> {
    root: &'v Value,
}

impl<'v> Emitter<&'v Value> for Unbuilder<'v> {
    fn enter<'s>(
        &'s mut self,
        node: &mut Node<&'v Value>,
        parent: Option<&mut Node<&'v Value>>,
    ) -> Result<Token<'s>, WalkError> {
        let value: &'v Value = match parent {
            None => self.root,
            Some(parent) => {
                let container = parent.data.expect("container nodes carry their value");
                match container {
                    Value::Array(items) => &items[parent.pos as usize],
                    Value::Map(pairs) => {
                        let pair = &pairs[(parent.pos / 2) as usize];
                        if parent.visiting_key() {
                            &pair.0
                        } else {
                            &pair.1
                        }
                    }
                    Value::Str(bytes) | Value::Bin(bytes) | Value::Ext(_, bytes) => {
                        // payload: one chunk covering the rest
                        return Ok(Token::Chunk(&bytes[parent.pos as usize..]));
                    }
                    _ => unreachable!("scalar nodes have no children"),
                }
            }
        };
        node.data = Some(value);
        header_token(value)
    }

    fn exit(
        &mut self,
        _node: &mut Node<&'v Value>,
        _parent: Option<&mut Node<&'v Value>>,
    ) -> Result<(), WalkError> {
        Ok(())
    }
}

/// Wire length field for an in-memory size; the format caps payload
/// lengths and element counts at 32 bits.
fn wire_len(len: usize) -> Result<u32, WalkError> {
    u32::try_from(len).map_err(|_| WalkError::OversizedValue)
}

/// The token that opens `value` on the wire.
fn header_token(value: &Value) -> Result<Token<'_>, WalkError> {
    Ok(match value {
        Value::Nil => Token::Nil,
        Value::Boolean(v) => Token::Boolean(*v),
        Value::Uint(v) => Token::Uint(*v),
        Value::Sint(v) => Token::Sint(*v),
        Value::Float(v) => Token::Float(*v),
        Value::Str(bytes) => Token::Str {
            len: wire_len(bytes.len())?,
        },
        Value::Bin(bytes) => Token::Bin {
            len: wire_len(bytes.len())?,
        },
        Value::Ext(tag, bytes) => Token::Ext {
            tag: *tag,
            len: wire_len(bytes.len())?,
        },
        Value::Array(items) => Token::Array {
            len: wire_len(items.len())?,
        },
        Value::Map(pairs) => Token::Map {
            len: wire_len(pairs.len())?,
        },
    })
}

fn uint_size(v: u64) -> usize {
    if v < 0x80 {
        1
    } else if v <= 0xff {
        2
    } else if v <= 0xffff {
        3
    } else if v <= 0xffff_ffff {
        5
    } else {
        9
    }
}

fn sint_size(v: i64) -> usize {
    if v >= 0 {
        uint_size(v as u64)
    } else if v >= -0x20 {
        1
    } else if v >= -0x80 {
        2
    } else if v >= -0x8000 {
        3
    } else if v >= -0x8000_0000 {
        5
    } else {
        9
    }
}

#[allow(clippy::float_cmp)]
fn float_size(v: f64) -> usize {
    if f64::from(v as f32) == v {
        5
    } else {
        9
    }
}

fn str_header_size(len: usize) -> usize {
    if len < 0x20 {
        1
    } else if len <= 0xff {
        2
    } else if len <= 0xffff {
        3
    } else {
        5
    }
}

fn bin_header_size(len: usize) -> usize {
    if len <= 0xff {
        2
    } else if len <= 0xffff {
        3
    } else {
        5
    }
}

fn ext_header_size(len: usize) -> usize {
    match len {
        1 | 2 | 4 | 8 | 16 => 2,
        _ if len <= 0xff => 3,
        _ if len <= 0xffff => 4,
        _ => 6,
    }
}

fn container_header_size(len: usize) -> usize {
    if len < 0x10 {
        1
    } else if len <= 0xffff {
        3
    } else {
        5
    }
}
