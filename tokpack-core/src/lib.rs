//! Tokpack Core Codec
//!
//! Streaming, allocation-free MessagePack codec. Decodes incrementally
//! arriving bytes into a flat token stream and encodes tokens back at
//! minimal width, without recursion or internal buffering.
//!
//! # Architecture
//!
//! - **token.rs** - Token/TokenKind vocabulary shared by both directions
//! - **encode.rs** - Minimal-width encoder over a caller-owned buffer
//! - **decode.rs** - Resumable tokenizer state machine
//! - **walk.rs** - Depth-bounded tree walker, visitor/emitter traits
//! - **value.rs** - Owned Value tree convenience layer

pub mod decode;
pub mod encode;
pub mod token;
pub mod value;
pub mod walk;

pub use decode::{DecodeError, Tokenizer, DEFAULT_MAX_DEPTH};
pub use encode::{EncodeError, Encoder};
pub use token::{Token, TokenKind};
pub use value::{Value, ValueError};
pub use walk::{Emitter, Node, Parser, Visitor, WalkError, WalkState, Walker};
