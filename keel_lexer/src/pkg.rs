//! Pre-lexed package format
//!
//! A package stores a token list so a library can be distributed without
//! re-lexing its source. Layout:
//!
//! ```text
//! u64 magic number      (0x74706461)
//! u16 endianness marker (0x00EF)
//! u64 iteration version (must equal TOKEN_ITERATION_VERSION)
//! u64 token count
//! <records>             1-byte tag, then a NUL-terminated payload string
//!                       for payload-carrying tokens
//! ```
//!
//! Tags 0x80..=0x8B compress the most common type-name words down to a
//! single byte.

use crate::token::{Token, TokenKind};
use keel_common::{CompileError, CompileResult, Span, Spanned, UnitId};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Version state of the token list. Incremented whenever tokens are added
/// or removed, or the lexer starts generating different tokens from the
/// same code. Used for compatibility checking with pre-lexed libraries.
pub const TOKEN_ITERATION_VERSION: u64 = 0x0000_000C;

pub const PKG_MAGIC_NUMBER: u64 = 0x7470_6461;
pub const PKG_ENDIANNESS: u16 = 0x00EF;

/// First tag of the compressed common-word range.
pub const PKG_WORD_MIN: u8 = 0x80;
/// Last tag of the compressed common-word range.
pub const PKG_WORD_MAX: u8 = 0x8B;

/// Words compressed to a single tag byte. Sorted; a word's tag is
/// `PKG_WORD_MIN + index`.
pub const PKG_COMPRESSIBLE_WORDS: [&str; 12] = [
    "bool", "byte", "double", "float", "int", "long", "short", "ubyte", "uint", "ulong",
    "ushort", "usize",
];

/// Write a token list as a package.
pub fn pkg_write(writer: &mut impl Write, tokens: &[Token]) -> CompileResult<()> {
    writer.write_all(&PKG_MAGIC_NUMBER.to_le_bytes())?;
    writer.write_all(&PKG_ENDIANNESS.to_le_bytes())?;
    writer.write_all(&TOKEN_ITERATION_VERSION.to_le_bytes())?;
    writer.write_all(&(tokens.len() as u64).to_le_bytes())?;

    for token in tokens {
        match &token.value {
            TokenKind::Word(word) => write_compressed_word(writer, word)?,
            TokenKind::StringLit(text) | TokenKind::CStringLit(text) => {
                writer.write_all(&[token.value.tag()])?;
                write_payload(writer, text)?;
            }
            TokenKind::GenericInt(value) => {
                writer.write_all(&[token.value.tag()])?;
                write_payload(writer, &value.to_string())?;
            }
            TokenKind::GenericFloat(value) => {
                writer.write_all(&[token.value.tag()])?;
                write_payload(writer, &format!("{:.6}", value))?;
            }
            TokenKind::ByteLit(value)
            | TokenKind::UbyteLit(value)
            | TokenKind::ShortLit(value)
            | TokenKind::UshortLit(value)
            | TokenKind::IntLit(value)
            | TokenKind::UintLit(value)
            | TokenKind::LongLit(value)
            | TokenKind::UlongLit(value) => {
                writer.write_all(&[token.value.tag()])?;
                write_payload(writer, &value.to_string())?;
            }
            TokenKind::FloatLit(value) | TokenKind::DoubleLit(value) => {
                writer.write_all(&[token.value.tag()])?;
                write_payload(writer, &value.to_string())?;
            }
            bare => writer.write_all(&[bare.tag()])?,
        }
    }

    Ok(())
}

/// Write a token list to a package file.
pub fn pkg_write_file(path: impl AsRef<Path>, tokens: &[Token]) -> CompileResult<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    pkg_write(&mut writer, tokens)?;
    writer.flush()?;
    Ok(())
}

/// Read a token list from a package. All produced spans point into the
/// given translation unit; byte offsets are not preserved by the format.
pub fn pkg_read(reader: &mut impl Read, unit: UnitId) -> CompileResult<Vec<Token>> {
    let magic = read_u64(reader)?;
    if magic != PKG_MAGIC_NUMBER {
        return Err(CompileError::io("not a package file (bad magic number)"));
    }

    let endianness = read_u16(reader)?;
    if endianness != PKG_ENDIANNESS {
        return Err(CompileError::io("package has mismatched endianness"));
    }

    let version = read_u64(reader)?;
    if version != TOKEN_ITERATION_VERSION {
        return Err(CompileError::io(format!(
            "incompatible package iteration version {} (expected {})",
            version, TOKEN_ITERATION_VERSION
        )));
    }

    let count = read_u64(reader)?;
    let mut tokens = Vec::with_capacity(count as usize);
    let span = Span::new(0, unit);

    for _ in 0..count {
        let tag = read_u8(reader)?;

        let kind = match tag {
            0x01 => TokenKind::Word(read_payload(reader)?),
            0x02 => TokenKind::StringLit(read_payload(reader)?),
            0x03 => TokenKind::CStringLit(read_payload(reader)?),
            0x04 => TokenKind::GenericInt(read_int_payload(reader)?),
            0x05 => TokenKind::GenericFloat(read_float_payload(reader)?),
            0x06 => TokenKind::ByteLit(read_int_payload(reader)?),
            0x07 => TokenKind::UbyteLit(read_int_payload(reader)?),
            0x08 => TokenKind::ShortLit(read_int_payload(reader)?),
            0x09 => TokenKind::UshortLit(read_int_payload(reader)?),
            0x0A => TokenKind::IntLit(read_int_payload(reader)?),
            0x0B => TokenKind::UintLit(read_int_payload(reader)?),
            0x0C => TokenKind::LongLit(read_int_payload(reader)?),
            0x0D => TokenKind::UlongLit(read_int_payload(reader)?),
            0x0E => TokenKind::FloatLit(read_float_payload(reader)?),
            0x0F => TokenKind::DoubleLit(read_float_payload(reader)?),
            PKG_WORD_MIN..=PKG_WORD_MAX => {
                let word = PKG_COMPRESSIBLE_WORDS[(tag - PKG_WORD_MIN) as usize];
                TokenKind::Word(word.to_string())
            }
            bare => TokenKind::from_bare_tag(bare).ok_or_else(|| {
                CompileError::io(format!("unknown token tag 0x{:02X} in package", bare))
            })?,
        };

        tokens.push(Spanned::new(kind, span));
    }

    Ok(tokens)
}

/// Read a token list from a package file.
pub fn pkg_read_file(path: impl AsRef<Path>, unit: UnitId) -> CompileResult<Vec<Token>> {
    let mut reader = BufReader::new(File::open(path)?);
    pkg_read(&mut reader, unit)
}

fn write_compressed_word(writer: &mut impl Write, word: &str) -> CompileResult<()> {
    match PKG_COMPRESSIBLE_WORDS.binary_search(&word) {
        Ok(index) => {
            writer.write_all(&[PKG_WORD_MIN + index as u8])?;
        }
        Err(_) => {
            writer.write_all(&[0x01])?;
            write_payload(writer, word)?;
        }
    }
    Ok(())
}

fn write_payload(writer: &mut impl Write, text: &str) -> CompileResult<()> {
    writer.write_all(text.as_bytes())?;
    writer.write_all(&[0])?;
    Ok(())
}

fn read_payload(reader: &mut impl Read) -> CompileResult<String> {
    let mut bytes = Vec::new();
    loop {
        let byte = read_u8(reader)?;
        if byte == 0 {
            break;
        }
        bytes.push(byte);
    }
    String::from_utf8(bytes)
        .map_err(|_| CompileError::io("malformed token payload in package"))
}

fn read_int_payload(reader: &mut impl Read) -> CompileResult<i64> {
    read_payload(reader)?
        .parse()
        .map_err(|_| CompileError::io("malformed integer payload in package"))
}

fn read_float_payload(reader: &mut impl Read) -> CompileResult<f64> {
    read_payload(reader)?
        .parse()
        .map_err(|_| CompileError::io("malformed float payload in package"))
}

fn read_u8(reader: &mut impl Read) -> CompileResult<u8> {
    let mut buf = [0u8; 1];
    reader.read_exact(&mut buf)?;
    Ok(buf[0])
}

fn read_u16(reader: &mut impl Read) -> CompileResult<u16> {
    let mut buf = [0u8; 2];
    reader.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

fn read_u64(reader: &mut impl Read) -> CompileResult<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_common::Span;

    fn token(kind: TokenKind) -> Token {
        Spanned::new(kind, Span::new(0, 0))
    }

    #[test]
    fn test_common_word_compression() {
        let tokens = vec![token(TokenKind::Word("usize".into()))];
        let mut bytes = Vec::new();
        pkg_write(&mut bytes, &tokens).unwrap();

        // 8 + 2 + 8 + 8 header bytes, then exactly one record byte
        assert_eq!(bytes.len(), 27);
        assert_eq!(bytes[26], PKG_WORD_MAX);
    }

    #[test]
    fn test_bad_magic_rejected() {
        let mut bytes = Vec::new();
        pkg_write(&mut bytes, &[]).unwrap();
        bytes[0] = 0xFF;
        assert!(matches!(
            pkg_read(&mut bytes.as_slice(), 0),
            Err(CompileError::Io { .. })
        ));
    }

    #[test]
    fn test_bad_version_rejected() {
        let mut bytes = Vec::new();
        pkg_write(&mut bytes, &[]).unwrap();
        bytes[10] = 0xFF;
        assert!(matches!(
            pkg_read(&mut bytes.as_slice(), 0),
            Err(CompileError::Io { .. })
        ));
    }
}
