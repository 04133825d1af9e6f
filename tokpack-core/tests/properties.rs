//! Property-based tests for the codec.
//!
//! These verify invariants that must hold for ANY input: the tokenizer
//! never panics on byte soup, slicing an input never changes the token
//! sequence, and canonical documents survive an encode/decode round
//! trip. proptest shrinks failures to minimal cases.

use proptest::prelude::*;
use tokpack_core::{Token, Tokenizer, Value};

fn config() -> ProptestConfig {
    ProptestConfig {
        cases: 256,
        max_shrink_iters: 200,
        ..ProptestConfig::default()
    }
}

/// Run the tokenizer to completion, counting tokens. Errors are fine;
/// panics are not.
fn drain(mut input: &[u8]) -> usize {
    let mut tok = Tokenizer::new();
    let mut count = 0;
    while let Ok(Some(_)) = tok.read(&mut input) {
        count += 1;
    }
    count
}

/// Owned rendering of a token for cross-slicing comparison; consecutive
/// payload chunks merge because their boundaries depend on slicing.
#[derive(Debug, Clone, PartialEq)]
enum Out {
    Tok(String),
    Payload(Vec<u8>),
}

fn render(out: &mut Vec<Out>, token: &Token<'_>) {
    match token {
        Token::Chunk(bytes) => match out.last_mut() {
            Some(Out::Payload(buf)) => buf.extend_from_slice(bytes),
            _ => out.push(Out::Payload(bytes.to_vec())),
        },
        _ => out.push(Out::Tok(format!("{token:?}"))),
    }
}

/// Canonical documents: negative signed ints (non-negatives encode as
/// unsigned), no NaN floats.
fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Nil),
        any::<bool>().prop_map(Value::Boolean),
        any::<u64>().prop_map(Value::Uint),
        (i64::MIN..0i64).prop_map(Value::Sint),
        (-1.0e18..1.0e18f64).prop_map(Value::Float),
        prop::collection::vec(any::<u8>(), 0..48).prop_map(Value::Str),
        prop::collection::vec(any::<u8>(), 0..48).prop_map(Value::Bin),
        (0u8..0x80, prop::collection::vec(any::<u8>(), 0..24))
            .prop_map(|(tag, bytes)| Value::Ext(tag, bytes)),
    ]
}

fn document() -> impl Strategy<Value = Value> {
    scalar().prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::vec((inner.clone(), inner), 0..6).prop_map(Value::Map),
        ]
    })
}

proptest! {
    #![proptest_config(config())]

    /// The tokenizer must never panic, whatever the bytes.
    #[test]
    fn tokenizer_never_panics(input in prop::collection::vec(any::<u8>(), 0..512)) {
        let _ = drain(&input);
    }

    /// Feeding the same bytes in two pieces yields the same outcome as
    /// one piece, wherever the cut lands.
    #[test]
    fn slicing_never_changes_the_tokens(
        doc in document(),
        cut in any::<prop::sample::Index>(),
    ) {
        let wire = doc.to_vec().unwrap();
        let at = cut.index(wire.len() + 1);

        let mut whole = Vec::new();
        let mut tok = Tokenizer::new();
        let mut cursor: &[u8] = &wire;
        while let Some(token) = tok.read(&mut cursor).unwrap() {
            render(&mut whole, &token);
        }

        let mut split = Vec::new();
        let mut tok = Tokenizer::new();
        for mut piece in [&wire[..at], &wire[at..]] {
            while let Some(token) = tok.read(&mut piece).unwrap() {
                render(&mut split, &token);
            }
            prop_assert!(piece.is_empty());
        }

        prop_assert_eq!(split, whole);
    }

    /// Canonical documents round-trip exactly.
    #[test]
    fn documents_round_trip(doc in document()) {
        let wire = doc.to_vec().unwrap();
        prop_assert_eq!(Value::decode(&wire).unwrap(), doc);
    }

    /// The size estimate is exact, not an upper bound.
    #[test]
    fn encoded_size_is_exact(doc in document()) {
        let size = doc.encoded_size();
        let mut buf = vec![0u8; size];
        let written = doc.encode(&mut buf).unwrap();
        prop_assert_eq!(written, size);
    }

    /// Integers survive the wire at every width.
    #[test]
    fn integers_round_trip(v in any::<u64>(), n in i64::MIN..0i64) {
        let wire = Value::Uint(v).to_vec().unwrap();
        prop_assert_eq!(Value::decode(&wire).unwrap(), Value::Uint(v));
        let wire = Value::Sint(n).to_vec().unwrap();
        prop_assert_eq!(Value::decode(&wire).unwrap(), Value::Sint(n));
    }
}
