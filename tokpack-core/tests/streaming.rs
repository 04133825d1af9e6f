//! Streaming decode tests: the tokenizer must produce the same logical
//! token sequence no matter how the input is sliced, resume cleanly
//! mid-field, and latch fatal errors.

use pretty_assertions::assert_eq;
use tokpack_core::{DecodeError, Token, Tokenizer};

/// Owned token mirror for cross-buffer comparison; consecutive chunks
/// are merged because chunk boundaries are an artifact of input slicing.
#[derive(Debug, Clone, PartialEq)]
enum T {
    Nil,
    Bool(bool),
    Uint(u64),
    Sint(i64),
    Float(f64),
    Payload(Vec<u8>),
    Str(u32),
    Bin(u32),
    Ext(u8, u32),
    Array(u32),
    Map(u32),
}

fn push(out: &mut Vec<T>, token: Token<'_>) {
    match token {
        Token::Nil => out.push(T::Nil),
        Token::Boolean(v) => out.push(T::Bool(v)),
        Token::Uint(v) => out.push(T::Uint(v)),
        Token::Sint(v) => out.push(T::Sint(v)),
        Token::Float(v) => out.push(T::Float(v)),
        Token::Str { len } => out.push(T::Str(len)),
        Token::Bin { len } => out.push(T::Bin(len)),
        Token::Ext { tag, len } => out.push(T::Ext(tag, len)),
        Token::Array { len } => out.push(T::Array(len)),
        Token::Map { len } => out.push(T::Map(len)),
        Token::Chunk(bytes) => match out.last_mut() {
            Some(T::Payload(buf)) => buf.extend_from_slice(bytes),
            _ => out.push(T::Payload(bytes.to_vec())),
        },
    }
}

/// Decode `wire` feeding `step` bytes per call.
fn drain(wire: &[u8], step: usize) -> Vec<T> {
    let mut tok = Tokenizer::new();
    let mut out = Vec::new();
    for piece in wire.chunks(step) {
        let mut cursor = piece;
        while let Some(token) = tok.read(&mut cursor).unwrap() {
            push(&mut out, token);
        }
        assert!(cursor.is_empty());
    }
    out
}

/// A document exercising every token family.
/// {"num": 70000, "neg": -70000, "pi": 3.25, "s": "hello world",
///  "b": bin(4), "e": ext(3, 2), "inner": [nil, true, {}]}
fn document() -> Vec<u8> {
    let mut wire = vec![0x87];
    wire.extend_from_slice(&[0xa3, b'n', b'u', b'm']);
    wire.extend_from_slice(&[0xce, 0x00, 0x01, 0x11, 0x70]);
    wire.extend_from_slice(&[0xa3, b'n', b'e', b'g']);
    wire.extend_from_slice(&[0xd2, 0xff, 0xfe, 0xee, 0x90]);
    wire.extend_from_slice(&[0xa2, b'p', b'i']);
    wire.extend_from_slice(&[0xca, 0x40, 0x50, 0x00, 0x00]);
    wire.extend_from_slice(&[0xa1, b's']);
    wire.extend_from_slice(&[0xab]);
    wire.extend_from_slice(b"hello world");
    wire.extend_from_slice(&[0xa1, b'b']);
    wire.extend_from_slice(&[0xc4, 0x04, 0xde, 0xad, 0xbe, 0xef]);
    wire.extend_from_slice(&[0xa1, b'e']);
    wire.extend_from_slice(&[0xd5, 0x03, 0x12, 0x34]);
    wire.extend_from_slice(&[0xa5, b'i', b'n', b'n', b'e', b'r']);
    wire.extend_from_slice(&[0x93, 0xc0, 0xc3, 0x80]);
    wire
}

#[test]
fn whole_buffer_token_sequence() {
    let wire = document();
    let got = drain(&wire, wire.len());
    assert_eq!(
        got,
        vec![
            T::Map(7),
            T::Str(3),
            T::Payload(b"num".to_vec()),
            T::Uint(70000),
            T::Str(3),
            T::Payload(b"neg".to_vec()),
            T::Sint(-70000),
            T::Str(2),
            T::Payload(b"pi".to_vec()),
            T::Float(3.25),
            T::Str(1),
            T::Payload(b"s".to_vec()),
            T::Str(11),
            T::Payload(b"hello world".to_vec()),
            T::Str(1),
            T::Payload(b"b".to_vec()),
            T::Bin(4),
            T::Payload(vec![0xde, 0xad, 0xbe, 0xef]),
            T::Str(1),
            T::Payload(b"e".to_vec()),
            T::Ext(3, 2),
            T::Payload(vec![0x12, 0x34]),
            T::Str(5),
            T::Payload(b"inner".to_vec()),
            T::Array(3),
            T::Nil,
            T::Bool(true),
            T::Map(0),
        ]
    );
}

#[test]
fn slicing_is_invisible() {
    let wire = document();
    let reference = drain(&wire, wire.len());
    for step in [1, 2, 3, 5, 7, 13] {
        assert_eq!(drain(&wire, step), reference, "step {step}");
    }
}

#[test]
fn split_at_every_position() {
    let wire = document();
    let reference = drain(&wire, wire.len());
    for at in 0..=wire.len() {
        let mut tok = Tokenizer::new();
        let mut out = Vec::new();
        for piece in [&wire[..at], &wire[at..]] {
            let mut cursor = piece;
            while let Some(token) = tok.read(&mut cursor).unwrap() {
                push(&mut out, token);
            }
        }
        assert_eq!(out, reference, "split at {at}");
    }
}

#[test]
fn need_more_input_is_not_an_error() {
    let mut tok = Tokenizer::new();
    // str 16 header, one byte at a time
    let mut cursor: &[u8] = &[0xda];
    assert_eq!(tok.read(&mut cursor).unwrap(), None);
    let mut cursor: &[u8] = &[0x00];
    assert_eq!(tok.read(&mut cursor).unwrap(), None);
    let mut cursor: &[u8] = &[0x02];
    assert_eq!(tok.read(&mut cursor).unwrap(), Some(Token::Str { len: 2 }));
    let mut cursor: &[u8] = b"ok";
    assert_eq!(tok.read(&mut cursor).unwrap(), Some(Token::Chunk(b"ok")));
    assert_eq!(tok.read(&mut cursor).unwrap(), None);
}

#[test]
fn payload_chunks_track_available_input() {
    let mut tok = Tokenizer::new();
    let mut cursor: &[u8] = &[0xc4, 0x05, b'a', b'b'];
    assert_eq!(tok.read(&mut cursor).unwrap(), Some(Token::Bin { len: 5 }));
    assert_eq!(tok.read(&mut cursor).unwrap(), Some(Token::Chunk(b"ab")));
    assert_eq!(tok.read(&mut cursor).unwrap(), None);
    // more payload than remains outstanding: only 3 bytes are consumed
    let mut cursor: &[u8] = b"cdexx";
    assert_eq!(tok.read(&mut cursor).unwrap(), Some(Token::Chunk(b"cde")));
    assert_eq!(cursor, b"xx");
}

#[test]
fn back_to_back_top_level_values() {
    let got = drain(&[0x01, 0xa1, b'z', 0x91, 0xc0, 0xc2], 6);
    assert_eq!(
        got,
        vec![
            T::Uint(1),
            T::Str(1),
            T::Payload(b"z".to_vec()),
            T::Array(1),
            T::Nil,
            T::Bool(false),
        ]
    );
}

#[test]
fn reserved_byte_is_fatal_and_latches() {
    let mut tok = Tokenizer::new();
    let mut cursor: &[u8] = &[0x92, 0x01, 0xc1, 0x02];
    assert_eq!(tok.read(&mut cursor).unwrap(), Some(Token::Array { len: 2 }));
    assert_eq!(tok.read(&mut cursor).unwrap(), Some(Token::Uint(1)));
    assert_eq!(
        tok.read(&mut cursor),
        Err(DecodeError::UnknownLeadByte(0xc1))
    );
    // every further call reports the same error without progress
    let mut fresh: &[u8] = &[0x01];
    assert_eq!(
        tok.read(&mut fresh),
        Err(DecodeError::UnknownLeadByte(0xc1))
    );
    assert_eq!(fresh, &[0x01]);
}

#[test]
fn nesting_limit_counts_open_containers() {
    // depth returns between siblings, so a shallow array of singleton
    // arrays fits in max_depth 2
    let mut wire: &[u8] = &[0x94, 0x91, 0x01, 0x91, 0x01, 0x91, 0x01, 0x91, 0x01];
    let mut tok = Tokenizer::with_max_depth(2);
    let mut count = 0;
    while tok.read(&mut wire).unwrap().is_some() {
        count += 1;
    }
    assert_eq!(count, 9);

    let mut tok = Tokenizer::with_max_depth(3);
    let mut cursor: &[u8] = &[0x91, 0x91, 0x91, 0x91, 0x01];
    for _ in 0..3 {
        assert!(matches!(
            tok.read(&mut cursor),
            Ok(Some(Token::Array { len: 1 }))
        ));
    }
    assert_eq!(tok.read(&mut cursor), Err(DecodeError::NestingTooDeep(3)));
}

#[test]
fn sixteen_bit_container_headers() {
    let mut wire = vec![0xdc, 0x00, 0x11];
    wire.extend(std::iter::repeat(0x00).take(17));
    let got = drain(&wire, 4);
    assert_eq!(got[0], T::Array(17));
    assert_eq!(got.len(), 18);

    let mut wire = vec![0xde, 0x00, 0x10];
    wire.extend(std::iter::repeat(0x00).take(32));
    let got = drain(&wire, 5);
    assert_eq!(got[0], T::Map(16));
    assert_eq!(got.len(), 33);
}
