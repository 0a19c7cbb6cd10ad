//! Lex ↔ package round-trip tests

use keel_common::{CompilerContext, SourceBuffer};
use keel_lexer::{pkg_read, pkg_read_file, pkg_write, pkg_write_file, tokenize, TokenKind};
use pretty_assertions::assert_eq;

fn lex(source: &str) -> Vec<keel_lexer::Token> {
    let mut ctx = CompilerContext::new();
    let buffer = SourceBuffer::new("test.keel", source, 0);
    tokenize(&mut ctx, &buffer).expect("lexing failed")
}

fn kinds(tokens: &[keel_lexer::Token]) -> Vec<TokenKind> {
    tokens.iter().map(|t| t.value.clone()).collect()
}

#[test]
fn test_round_trip_preserves_ids_and_payloads() {
    let source = "func main {\n    puts('hi')\n    x int = 5\n    y double = 2.500000\n}\n";
    let tokens = lex(source);

    let mut bytes = Vec::new();
    pkg_write(&mut bytes, &tokens).unwrap();
    let reread = pkg_read(&mut bytes.as_slice(), 0).unwrap();

    assert_eq!(kinds(&tokens), kinds(&reread));
}

#[test]
fn test_round_trip_every_payload_kind() {
    let source = "word \"str\" 'cstr' 9 2.500000 1b 2ub 3s 4us 5i 6ui 7l 8ul 1.25f 9.75d";
    let tokens = lex(source);

    let mut bytes = Vec::new();
    pkg_write(&mut bytes, &tokens).unwrap();
    let reread = pkg_read(&mut bytes.as_slice(), 0).unwrap();

    assert_eq!(kinds(&tokens), kinds(&reread));
}

#[test]
fn test_round_trip_compressed_type_names() {
    let source = "x usize = cast usize (y)\nptr *ubyte = null\n";
    let tokens = lex(source);

    let mut bytes = Vec::new();
    pkg_write(&mut bytes, &tokens).unwrap();
    let reread = pkg_read(&mut bytes.as_slice(), 0).unwrap();

    assert_eq!(kinds(&tokens), kinds(&reread));
}

#[test]
fn test_round_trip_spans_point_into_target_unit() {
    let tokens = lex("a b c");

    let mut bytes = Vec::new();
    pkg_write(&mut bytes, &tokens).unwrap();
    let reread = pkg_read(&mut bytes.as_slice(), 3).unwrap();

    assert!(reread.iter().all(|t| t.span.unit == 3));
}

#[test]
fn test_round_trip_through_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tokens.pkg");

    let tokens = lex("foreign puts(*ubyte) int\n");
    pkg_write_file(&path, &tokens).unwrap();
    let reread = pkg_read_file(&path, 0).unwrap();

    assert_eq!(kinds(&tokens), kinds(&reread));
}
