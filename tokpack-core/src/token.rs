//! Codec tokens - the shared vocabulary of the decoder and encoder.
//!
//! One token is one decoded unit of the wire format: a complete scalar,
//! the header of a container or byte array, or a payload chunk of a byte
//! array being streamed. Structure is flat; nesting is represented by a
//! header token followed by exactly `len` child tokens (2x `len` elements
//! for maps, which count key/value pairs).

/// One unit of the MessagePack token stream.
///
/// The lifetime `'a` refers to the input buffer - chunk payloads are
/// zero-copy slices into the bytes fed to the tokenizer.
///
/// Integers and floats are canonical: every unsigned wire width decodes
/// to `Uint(u64)`, every signed width is sign-extended into `Sint(i64)`,
/// and 32-bit wire floats are promoted bit-exactly into `Float(f64)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Token<'a> {
    /// Nil: `0xc0`
    Nil,

    /// Boolean: `0xc2` / `0xc3`
    Boolean(bool),

    /// Unsigned integer, any wire width including positive fixint.
    Uint(u64),

    /// Signed integer, any wire width including negative fixint.
    Sint(i64),

    /// Float, 32-bit or 64-bit wire form.
    Float(f64),

    /// A fragment of a string/binary/extension payload.
    ///
    /// Chunks are sized to whatever input was available when they were
    /// produced; only their concatenation is meaningful.
    Chunk(&'a [u8]),

    /// String header; `len` payload bytes follow as chunks.
    Str { len: u32 },

    /// Binary header; `len` payload bytes follow as chunks.
    Bin { len: u32 },

    /// Extension header with application type tag (0-127).
    Ext { tag: u8, len: u32 },

    /// Array header; `len` elements follow.
    Array { len: u32 },

    /// Map header; `len` key/value *pairs* (2x `len` elements) follow.
    Map { len: u32 },
}

/// Data-free discriminant of [`Token`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Nil,
    Boolean,
    Uint,
    Sint,
    Float,
    Chunk,
    Str,
    Bin,
    Ext,
    Array,
    Map,
}

impl Token<'_> {
    /// Get the kind of this token.
    pub fn kind(&self) -> TokenKind {
        match self {
            Token::Nil => TokenKind::Nil,
            Token::Boolean(_) => TokenKind::Boolean,
            Token::Uint(_) => TokenKind::Uint,
            Token::Sint(_) => TokenKind::Sint,
            Token::Float(_) => TokenKind::Float,
            Token::Chunk(_) => TokenKind::Chunk,
            Token::Str { .. } => TokenKind::Str,
            Token::Bin { .. } => TokenKind::Bin,
            Token::Ext { .. } => TokenKind::Ext,
            Token::Array { .. } => TokenKind::Array,
            Token::Map { .. } => TokenKind::Map,
        }
    }

    /// Check if this is a complete scalar value (no children follow).
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Token::Nil
                | Token::Boolean(_)
                | Token::Uint(_)
                | Token::Sint(_)
                | Token::Float(_)
        )
    }

    /// Check if this is a container header (Array or Map).
    pub fn is_container(&self) -> bool {
        matches!(self, Token::Array { .. } | Token::Map { .. })
    }

    /// Check if this is a byte-array header (Str, Bin, or Ext).
    pub fn is_byte_array(&self) -> bool {
        matches!(
            self,
            Token::Str { .. } | Token::Bin { .. } | Token::Ext { .. }
        )
    }
}

impl TokenKind {
    /// Kinds whose header token is followed by children (elements or
    /// payload chunks) before the value is complete.
    pub fn has_children(self) -> bool {
        matches!(
            self,
            TokenKind::Str
                | TokenKind::Bin
                | TokenKind::Ext
                | TokenKind::Array
                | TokenKind::Map
        )
    }
}
