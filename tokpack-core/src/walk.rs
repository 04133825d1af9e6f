//! Depth-tracking tree walker over token streams.
//!
//! The tokenizer emits a flat token sequence; this module restores the
//! tree shape without recursion. A [`Walker`] keeps an explicit stack of
//! [`Node`]s, one per unfinished container or byte array, and invokes a
//! caller-supplied [`Visitor`] on entry and exit of every value. Running
//! the other direction, an [`Emitter`] supplies tokens on demand and the
//! walker serializes them through an [`Encoder`], enforcing the same
//! depth bound.
//!
//! [`Parser`] bundles a tokenizer and a walker into the common
//! decode-and-visit loop.

use thiserror::Error;

use crate::decode::{DecodeError, Tokenizer, DEFAULT_MAX_DEPTH};
use crate::encode::{EncodeError, Encoder};
use crate::token::{Token, TokenKind};

/// Fatal walk errors. Like the tokenizer, a walker latches its first
/// error and returns it from every further call.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkError {
    /// The structure nests deeper than the configured maximum.
    #[error("structure exceeds maximum nesting depth {0}")]
    TooDeep(usize),

    /// A visitor or emitter callback reported failure.
    #[error("visitor callback failed")]
    CallbackFailed,

    /// A payload or chunk is too large for the format's 32-bit length
    /// field.
    #[error("value exceeds the wire format's 32-bit length limit")]
    OversizedValue,

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// Whether a walk has consumed a complete top-level value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkState {
    /// More tokens are needed to finish the current value.
    More,
    /// One complete top-level value has been walked.
    Done,
}

/// One level of the walk stack: an in-progress value and its traversal
/// position. `T` is per-node state owned by the visitor or emitter.
#[derive(Debug)]
pub struct Node<T> {
    /// The kind of the token that opened this node.
    pub kind: TokenKind,
    /// Declared length: elements for arrays, pairs for maps, payload
    /// bytes for strings/binaries/extensions, chunk bytes for chunks.
    pub len: u32,
    /// Extension type tag; meaningful only when `kind` is `Ext`.
    pub tag: u8,
    /// Children consumed so far: elements for containers (2x pairs for
    /// maps), payload bytes for byte arrays.
    pub pos: u64,
    /// Visitor/emitter-owned state attached to this node.
    pub data: Option<T>,
    /// Children required before this node is complete.
    expect: u64,
}

impl<T> Node<T> {
    fn new(token: &Token<'_>) -> Self {
        let mut node = Node::blank();
        node.assign(token);
        node
    }

    fn blank() -> Self {
        Node {
            kind: TokenKind::Nil,
            len: 0,
            tag: 0,
            pos: 0,
            data: None,
            expect: 0,
        }
    }

    fn assign(&mut self, token: &Token<'_>) {
        self.kind = token.kind();
        match *token {
            Token::Chunk(bytes) => {
                debug_assert!(
                    u32::try_from(bytes.len()).is_ok(),
                    "chunk exceeds the 32-bit length field"
                );
                self.len = bytes.len() as u32;
            }
            Token::Str { len } | Token::Bin { len } | Token::Array { len } => {
                self.len = len;
                self.expect = u64::from(len);
            }
            Token::Ext { tag, len } => {
                self.len = len;
                self.tag = tag;
                self.expect = u64::from(len);
            }
            Token::Map { len } => {
                self.len = len;
                self.expect = 2 * u64::from(len);
            }
            _ => {}
        }
    }

    /// True when the next child of this map node is a key. Always false
    /// for non-map nodes.
    pub fn visiting_key(&self) -> bool {
        self.kind == TokenKind::Map && self.pos % 2 == 0
    }
}

/// Callbacks invoked while walking a decoded token stream.
///
/// `enter` fires once per value, before any of its children; `exit`
/// fires after the last child. For scalars and chunks the two calls are
/// back to back. `parent` is `None` at the top level.
pub trait Visitor<T> {
    fn enter(
        &mut self,
        token: &Token<'_>,
        node: &mut Node<T>,
        parent: Option<&mut Node<T>>,
    ) -> Result<(), WalkError>;

    fn exit(&mut self, node: &mut Node<T>, parent: Option<&mut Node<T>>) -> Result<(), WalkError>;
}

/// Token source for serializing a tree. The walker calls `enter` once
/// per value to fetch its token; for byte-array nodes it keeps calling
/// until the chunks returned cover the declared payload length.
pub trait Emitter<T> {
    fn enter<'s>(
        &'s mut self,
        node: &mut Node<T>,
        parent: Option<&mut Node<T>>,
    ) -> Result<Token<'s>, WalkError>;

    fn exit(&mut self, node: &mut Node<T>, parent: Option<&mut Node<T>>) -> Result<(), WalkError>;
}

/// Non-recursive tree traversal over a token sequence.
///
/// Feed tokens with [`parse_token`](Walker::parse_token) (decoding) or
/// pull them with [`unparse_token`](Walker::unparse_token) (encoding).
/// The node stack never grows past `max_depth` branch nodes, so input
/// depth cannot exhaust the call stack or the heap.
#[derive(Debug)]
pub struct Walker<T> {
    nodes: Vec<Node<T>>,
    max_depth: usize,
    error: Option<WalkError>,
}

impl<T> Walker<T> {
    /// Create a walker with the default depth bound.
    pub fn new() -> Self {
        Self::with_max_depth(DEFAULT_MAX_DEPTH)
    }

    /// Create a walker allowing at most `max_depth` nested values.
    pub fn with_max_depth(max_depth: usize) -> Self {
        Walker {
            nodes: Vec::new(),
            max_depth,
            error: None,
        }
    }

    /// The configured nesting bound.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Current number of unfinished nodes.
    pub fn depth(&self) -> usize {
        self.nodes.len()
    }

    /// Feed one decoded token to the visitor.
    ///
    /// Returns [`WalkState::Done`] when the token completed a top-level
    /// value, [`WalkState::More`] otherwise.
    pub fn parse_token<V: Visitor<T>>(
        &mut self,
        token: &Token<'_>,
        visitor: &mut V,
    ) -> Result<WalkState, WalkError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        self.parse_inner(token, visitor).map_err(|err| {
            self.error = Some(err);
            err
        })
    }

    fn parse_inner<V: Visitor<T>>(
        &mut self,
        token: &Token<'_>,
        visitor: &mut V,
    ) -> Result<WalkState, WalkError> {
        self.push_node(Node::new(token), token.kind().has_children())?;
        let (node, rest) = self
            .nodes
            .split_last_mut()
            .expect("node was just pushed");
        visitor.enter(token, node, rest.last_mut())?;
        self.unwind(|node, parent| visitor.exit(node, parent))
    }

    /// Pull one token from the emitter and write it to `out`.
    pub fn unparse_token<E: Emitter<T>>(
        &mut self,
        out: &mut Encoder<'_>,
        emitter: &mut E,
    ) -> Result<WalkState, WalkError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        self.unparse_inner(out, emitter).map_err(|err| {
            self.error = Some(err);
            err
        })
    }

    fn unparse_inner<E: Emitter<T>>(
        &mut self,
        out: &mut Encoder<'_>,
        emitter: &mut E,
    ) -> Result<WalkState, WalkError> {
        // the node's kind is unknown until the emitter speaks, so admit
        // it under the transient bound and re-check below
        self.push_node(Node::blank(), false)?;
        let (node, rest) = self
            .nodes
            .split_last_mut()
            .expect("node was just pushed");
        let token = emitter.enter(node, rest.last_mut())?;
        if let Token::Chunk(bytes) = token {
            if u32::try_from(bytes.len()).is_err() {
                return Err(WalkError::OversizedValue);
            }
        }
        out.token(&token)?;
        let node = self.nodes.last_mut().expect("node was just pushed");
        node.assign(&token);
        if token.kind().has_children() && self.nodes.len() > self.max_depth {
            return Err(WalkError::TooDeep(self.max_depth));
        }
        self.unwind(|node, parent| emitter.exit(node, parent))
    }

    /// Serialize one complete value, pulling tokens until the emitter's
    /// tree closes.
    pub fn unparse<E: Emitter<T>>(
        &mut self,
        out: &mut Encoder<'_>,
        emitter: &mut E,
    ) -> Result<(), WalkError> {
        while self.unparse_token(out, emitter)? == WalkState::More {}
        Ok(())
    }

    /// Pop every node that has consumed all its children, firing exit
    /// callbacks innermost first.
    fn unwind<F>(&mut self, mut exit: F) -> Result<WalkState, WalkError>
    where
        F: FnMut(&mut Node<T>, Option<&mut Node<T>>) -> Result<(), WalkError>,
    {
        while self.nodes.last().is_some_and(|n| n.pos >= n.expect) {
            let (node, rest) = self
                .nodes
                .split_last_mut()
                .expect("loop condition checked last()");
            exit(node, rest.last_mut())?;
            let child = self.nodes.pop().expect("loop condition checked last()");
            match self.nodes.last_mut() {
                Some(parent) => {
                    // byte-array parents advance by payload bytes,
                    // containers by one element
                    if matches!(
                        parent.kind,
                        TokenKind::Str | TokenKind::Bin | TokenKind::Ext
                    ) {
                        parent.pos += u64::from(child.len);
                    } else {
                        parent.pos += 1;
                    }
                }
                None => return Ok(WalkState::Done),
            }
        }
        Ok(WalkState::More)
    }

    fn push_node(&mut self, node: Node<T>, branch: bool) -> Result<(), WalkError> {
        // scalars and chunks live one level below the deepest branch
        // for the instant between enter and exit
        let limit = if branch {
            self.max_depth
        } else {
            self.max_depth + 1
        };
        if self.nodes.len() >= limit {
            return Err(WalkError::TooDeep(self.max_depth));
        }
        self.nodes.push(node);
        Ok(())
    }
}

impl<T> Default for Walker<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A tokenizer and a walker joined into a decode-and-visit pipeline.
#[derive(Debug)]
pub struct Parser<T> {
    tokenizer: Tokenizer,
    walker: Walker<T>,
}

impl<T> Parser<T> {
    /// Create a parser with the default depth bound.
    pub fn new() -> Self {
        Self::with_max_depth(DEFAULT_MAX_DEPTH)
    }

    /// Create a parser bounding both wire nesting and walk depth at
    /// `max_depth`.
    pub fn with_max_depth(max_depth: usize) -> Self {
        Parser {
            tokenizer: Tokenizer::with_max_depth(max_depth),
            walker: Walker::with_max_depth(max_depth),
        }
    }

    /// Decode tokens from `*buf` and feed them to `visitor` until a
    /// top-level value completes or the input runs out.
    ///
    /// [`WalkState::More`] means the buffer was exhausted mid-value;
    /// call again with more input. The cursor is advanced past every
    /// consumed byte either way.
    pub fn parse<'a, V: Visitor<T>>(
        &mut self,
        buf: &mut &'a [u8],
        visitor: &mut V,
    ) -> Result<WalkState, WalkError> {
        while let Some(token) = self.tokenizer.read(buf)? {
            if self.walker.parse_token(&token, visitor)? == WalkState::Done {
                return Ok(WalkState::Done);
            }
        }
        Ok(WalkState::More)
    }
}

impl<T> Default for Parser<T> {
    fn default() -> Self {
        Self::new()
    }
}
