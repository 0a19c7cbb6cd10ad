//! Lexer implementation for the Keel language
//!
//! Produces a token stream terminated by an end-of-file token. Newlines are
//! significant and produced as their own tokens; comments are discarded.
//! The lexer stops at the first error.

use crate::token::{lookup_keyword, Token, TokenKind};
use keel_common::{CompileError, CompileResult, CompilerContext, SourceBuffer, Span, Spanned};
use memchr::memchr;

/// Tokenize an entire source buffer.
pub fn tokenize(ctx: &mut CompilerContext, buffer: &SourceBuffer) -> CompileResult<Vec<Token>> {
    Lexer::new(ctx, buffer).tokenize()
}

/// Lexer for the Keel language
pub struct Lexer<'a> {
    ctx: &'a mut CompilerContext,
    buffer: &'a SourceBuffer,
    bytes: &'a [u8],
    position: usize,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    pub fn new(ctx: &'a mut CompilerContext, buffer: &'a SourceBuffer) -> Self {
        Self {
            ctx,
            buffer,
            bytes: buffer.bytes(),
            position: 0,
            tokens: Vec::new(),
        }
    }

    /// Tokenize the entire input into a vector of tokens.
    pub fn tokenize(mut self) -> CompileResult<Vec<Token>> {
        while !self.is_at_end() {
            self.skip_blanks_and_comments()?;

            if self.is_at_end() {
                break;
            }

            let start = self.position;
            let kind = self.next_token_kind()?;
            self.push(kind, start);
        }

        let end = self.position;
        self.push(TokenKind::EndOfFile, end);
        Ok(self.tokens)
    }

    fn next_token_kind(&mut self) -> CompileResult<TokenKind> {
        let kind = match self.current() {
            b'\n' => { self.advance(); TokenKind::Newline }
            b'(' => { self.advance(); TokenKind::OpenParen }
            b')' => { self.advance(); TokenKind::CloseParen }
            b'{' => { self.advance(); TokenKind::OpenBrace }
            b'}' => { self.advance(); TokenKind::CloseBrace }
            b'[' => { self.advance(); TokenKind::OpenBracket }
            b']' => { self.advance(); TokenKind::CloseBracket }
            b',' => { self.advance(); TokenKind::Comma }
            b':' => { self.advance(); TokenKind::Colon }
            b'#' => { self.advance(); TokenKind::Hash }
            b'.' => self.scan_dot(),
            b'+' => self.scan_with_assign(TokenKind::Add, TokenKind::AddAssign),
            b'-' => self.scan_minus()?,
            b'*' => self.scan_with_assign(TokenKind::Multiply, TokenKind::MultiplyAssign),
            b'/' => self.scan_with_assign(TokenKind::Divide, TokenKind::DivideAssign),
            b'%' => self.scan_with_assign(TokenKind::Modulus, TokenKind::ModulusAssign),
            b'=' => self.scan_with_assign(TokenKind::Assign, TokenKind::Equals),
            b'!' => self.scan_with_assign(TokenKind::Not, TokenKind::NotEquals),
            b'<' => self.scan_with_assign(TokenKind::LessThan, TokenKind::LessThanEq),
            b'>' => self.scan_with_assign(TokenKind::GreaterThan, TokenKind::GreaterThanEq),
            b'&' => self.scan_pair(b'&', TokenKind::Address, TokenKind::UberAnd),
            b'|' => {
                if self.peek() == Some(b'|') {
                    self.advance();
                    self.advance();
                    TokenKind::UberOr
                } else {
                    return self.fail("unexpected character '|'", self.position);
                }
            }
            b'"' => self.scan_string(b'"')?,
            b'\'' => self.scan_string(b'\'')?,
            c if c.is_ascii_digit() => self.scan_number(false)?,
            c if c.is_ascii_alphabetic() || c == b'_' => self.scan_word(),
            c => {
                return self.fail(
                    format!("unexpected character '{}'", c as char),
                    self.position,
                );
            }
        };
        Ok(kind)
    }

    /// Skip spaces, tabs, carriage returns and comments. Newlines are left
    /// for the token loop; a line comment therefore still terminates in a
    /// newline token.
    fn skip_blanks_and_comments(&mut self) -> CompileResult<()> {
        loop {
            match self.current() {
                b' ' | b'\t' | b'\r' => self.advance(),
                b'/' if self.peek() == Some(b'/') => self.skip_line_comment(),
                b'/' if self.peek() == Some(b'*') => self.skip_block_comment()?,
                _ => return Ok(()),
            }
            if self.is_at_end() {
                return Ok(());
            }
        }
    }

    fn skip_line_comment(&mut self) {
        match memchr(b'\n', &self.bytes[self.position..]) {
            Some(offset) => self.position += offset,
            None => self.position = self.bytes.len(),
        }
    }

    /// Block comments nest.
    fn skip_block_comment(&mut self) -> CompileResult<()> {
        let start = self.position;
        self.advance();
        self.advance();

        let mut depth = 1usize;
        while depth > 0 {
            if self.is_at_end() {
                return self.fail("unterminated block comment", start);
            }
            if self.current() == b'/' && self.peek() == Some(b'*') {
                self.advance();
                self.advance();
                depth += 1;
            } else if self.current() == b'*' && self.peek() == Some(b'/') {
                self.advance();
                self.advance();
                depth -= 1;
            } else {
                self.advance();
            }
        }
        Ok(())
    }

    fn scan_word(&mut self) -> TokenKind {
        let start = self.position;
        while !self.is_at_end()
            && (self.current().is_ascii_alphanumeric() || self.current() == b'_')
        {
            self.advance();
        }

        let word = &self.buffer.text()[start..self.position];
        lookup_keyword(word).unwrap_or_else(|| TokenKind::Word(word.to_string()))
    }

    /// `.` or `...`
    fn scan_dot(&mut self) -> TokenKind {
        self.advance();
        if self.current() == b'.' && self.peek() == Some(b'.') {
            self.advance();
            self.advance();
            TokenKind::Ellipsis
        } else {
            TokenKind::Member
        }
    }

    fn scan_with_assign(&mut self, plain: TokenKind, with_equal: TokenKind) -> TokenKind {
        self.advance();
        if !self.is_at_end() && self.current() == b'=' {
            self.advance();
            with_equal
        } else {
            plain
        }
    }

    fn scan_pair(&mut self, follow: u8, single: TokenKind, double: TokenKind) -> TokenKind {
        self.advance();
        if !self.is_at_end() && self.current() == follow {
            self.advance();
            double
        } else {
            single
        }
    }

    /// `-` is an operator, `-=` an assignment, and `-5` a negative literal
    /// when the previous token cannot end an expression.
    fn scan_minus(&mut self) -> CompileResult<TokenKind> {
        if self.peek().map_or(false, |c| c.is_ascii_digit()) && !self.previous_ends_expression() {
            self.advance();
            return self.scan_number(true);
        }
        Ok(self.scan_with_assign(TokenKind::Subtract, TokenKind::SubtractAssign))
    }

    fn previous_ends_expression(&self) -> bool {
        matches!(
            self.tokens.last().map(|t| &t.value),
            Some(
                TokenKind::Word(_)
                    | TokenKind::GenericInt(_)
                    | TokenKind::GenericFloat(_)
                    | TokenKind::ByteLit(_)
                    | TokenKind::UbyteLit(_)
                    | TokenKind::ShortLit(_)
                    | TokenKind::UshortLit(_)
                    | TokenKind::IntLit(_)
                    | TokenKind::UintLit(_)
                    | TokenKind::LongLit(_)
                    | TokenKind::UlongLit(_)
                    | TokenKind::FloatLit(_)
                    | TokenKind::DoubleLit(_)
                    | TokenKind::CloseParen
                    | TokenKind::CloseBracket
            )
        )
    }

    /// Scan a numeric literal, classified by suffix:
    /// `b ub s us i ui l ul` select a specific integer width, `f`/`d` a
    /// specific float width; no suffix yields a generic literal.
    fn scan_number(&mut self, negative: bool) -> CompileResult<TokenKind> {
        let start = self.position;

        while !self.is_at_end() && self.current().is_ascii_digit() {
            self.advance();
        }

        let mut is_float = false;
        if !self.is_at_end()
            && self.current() == b'.'
            && self.peek().map_or(false, |c| c.is_ascii_digit())
        {
            is_float = true;
            self.advance();
            while !self.is_at_end() && self.current().is_ascii_digit() {
                self.advance();
            }
        }

        let digits_end = self.position;
        while !self.is_at_end() && self.current().is_ascii_alphabetic() {
            self.advance();
        }

        let digits = &self.buffer.text()[start..digits_end];
        let suffix = &self.buffer.text()[digits_end..self.position];

        let int_value = |text: &str| -> CompileResult<i64> {
            let magnitude: i64 = text.parse().map_err(|_| {
                CompileError::lex(format!("malformed numeric literal '{}'", text))
            })?;
            Ok(if negative { -magnitude } else { magnitude })
        };
        let float_value = |text: &str| -> CompileResult<f64> {
            let magnitude: f64 = text.parse().map_err(|_| {
                CompileError::lex(format!("malformed numeric literal '{}'", text))
            })?;
            Ok(if negative { -magnitude } else { magnitude })
        };

        if is_float && !suffix.is_empty() && suffix != "f" && suffix != "d" {
            return self.fail(
                format!("invalid suffix '{}' on float literal", suffix),
                start,
            );
        }

        let kind = match suffix {
            "" if is_float => TokenKind::GenericFloat(float_value(digits)?),
            "" => TokenKind::GenericInt(int_value(digits)?),
            "b" => TokenKind::ByteLit(int_value(digits)?),
            "ub" => TokenKind::UbyteLit(int_value(digits)?),
            "s" => TokenKind::ShortLit(int_value(digits)?),
            "us" => TokenKind::UshortLit(int_value(digits)?),
            "i" => TokenKind::IntLit(int_value(digits)?),
            "ui" => TokenKind::UintLit(int_value(digits)?),
            "l" => TokenKind::LongLit(int_value(digits)?),
            "ul" => TokenKind::UlongLit(int_value(digits)?),
            "f" => TokenKind::FloatLit(float_value(digits)?),
            "d" => TokenKind::DoubleLit(float_value(digits)?),
            other => {
                return self.fail(
                    format!("invalid suffix '{}' on numeric literal", other),
                    start,
                );
            }
        };

        Ok(kind)
    }

    /// Scan a string literal. `"…"` produces a string token, `'…'` a
    /// c-string token; both share the same escape set. The implicit
    /// trailing NUL of c-strings is added during lowering, not here.
    fn scan_string(&mut self, quote: u8) -> CompileResult<TokenKind> {
        let start = self.position;
        self.advance();

        let mut value = String::new();
        loop {
            if self.is_at_end() {
                return self.fail("unterminated string literal", start);
            }
            match self.current() {
                c if c == quote => {
                    self.advance();
                    break;
                }
                b'\\' => {
                    let escape_start = self.position;
                    self.advance();
                    if self.is_at_end() {
                        return self.fail("unterminated string literal", start);
                    }
                    let escaped = self.current();
                    self.advance();
                    match escaped {
                        b'n' => value.push('\n'),
                        b'r' => value.push('\r'),
                        b't' => value.push('\t'),
                        b'\\' => value.push('\\'),
                        b'\'' => value.push('\''),
                        b'"' => value.push('"'),
                        b'0' => value.push('\0'),
                        b'x' => {
                            let high = self.expect_hex_digit(escape_start)?;
                            let low = self.expect_hex_digit(escape_start)?;
                            value.push((high * 16 + low) as char);
                        }
                        c => {
                            return self.fail(
                                format!("invalid escape sequence '\\{}'", c as char),
                                escape_start,
                            );
                        }
                    }
                }
                c => {
                    value.push(c as char);
                    self.advance();
                }
            }
        }

        Ok(if quote == b'"' {
            TokenKind::StringLit(value)
        } else {
            TokenKind::CStringLit(value)
        })
    }

    fn expect_hex_digit(&mut self, escape_start: usize) -> CompileResult<u8> {
        if self.is_at_end() || !self.current().is_ascii_hexdigit() {
            return self.fail("invalid '\\x' escape sequence", escape_start);
        }
        let digit = (self.current() as char).to_digit(16).unwrap() as u8;
        self.advance();
        Ok(digit)
    }

    // Utility methods

    fn push(&mut self, kind: TokenKind, start: usize) {
        let span = Span::new(start as u32, self.buffer.unit());
        self.tokens.push(Spanned::new(kind, span));
    }

    fn fail<T>(&mut self, message: impl Into<String>, offset: usize) -> CompileResult<T> {
        let message = message.into();
        let span = Span::new(offset as u32, self.buffer.unit());
        self.ctx.diagnostics.error(message.clone(), span);
        Err(CompileError::lex(message))
    }

    fn current(&self) -> u8 {
        self.bytes.get(self.position).copied().unwrap_or(0)
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.position + 1).copied()
    }

    fn advance(&mut self) {
        if self.position < self.bytes.len() {
            self.position += 1;
        }
    }

    fn is_at_end(&self) -> bool {
        self.position >= self.bytes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lex(source: &str) -> Vec<TokenKind> {
        let mut ctx = CompilerContext::new();
        let buffer = SourceBuffer::new("test.keel", source, 0);
        tokenize(&mut ctx, &buffer)
            .expect("lexing failed")
            .into_iter()
            .map(|t| t.value)
            .collect()
    }

    fn lex_err(source: &str) -> CompileError {
        let mut ctx = CompilerContext::new();
        let buffer = SourceBuffer::new("test.keel", source, 0);
        tokenize(&mut ctx, &buffer).expect_err("lexing should fail")
    }

    #[test]
    fn test_keywords_and_words() {
        assert_eq!(
            lex("func main"),
            vec![
                TokenKind::KeywordFunc,
                TokenKind::Word("main".into()),
                TokenKind::EndOfFile,
            ]
        );
    }

    #[test]
    fn test_newlines_are_tokens() {
        assert_eq!(
            lex("a\nb"),
            vec![
                TokenKind::Word("a".into()),
                TokenKind::Newline,
                TokenKind::Word("b".into()),
                TokenKind::EndOfFile,
            ]
        );
    }

    #[test]
    fn test_numeric_suffixes() {
        assert_eq!(
            lex("1 2b 3ub 4s 5us 6i 7ui 8l 9ul 1.5 2.5f 3.5d"),
            vec![
                TokenKind::GenericInt(1),
                TokenKind::ByteLit(2),
                TokenKind::UbyteLit(3),
                TokenKind::ShortLit(4),
                TokenKind::UshortLit(5),
                TokenKind::IntLit(6),
                TokenKind::UintLit(7),
                TokenKind::LongLit(8),
                TokenKind::UlongLit(9),
                TokenKind::GenericFloat(1.5),
                TokenKind::FloatLit(2.5),
                TokenKind::DoubleLit(3.5),
                TokenKind::EndOfFile,
            ]
        );
    }

    #[test]
    fn test_negative_literal_vs_subtraction() {
        assert_eq!(
            lex("x = -5"),
            vec![
                TokenKind::Word("x".into()),
                TokenKind::Assign,
                TokenKind::GenericInt(-5),
                TokenKind::EndOfFile,
            ]
        );
        assert_eq!(
            lex("x - 5"),
            vec![
                TokenKind::Word("x".into()),
                TokenKind::Subtract,
                TokenKind::GenericInt(5),
                TokenKind::EndOfFile,
            ]
        );
        assert_eq!(
            lex("x -5"),
            vec![
                TokenKind::Word("x".into()),
                TokenKind::Subtract,
                TokenKind::GenericInt(5),
                TokenKind::EndOfFile,
            ]
        );
    }

    #[test]
    fn test_string_kinds_and_escapes() {
        assert_eq!(
            lex(r#""a\tb" '\x41\n'"#),
            vec![
                TokenKind::StringLit("a\tb".into()),
                TokenKind::CStringLit("A\n".into()),
                TokenKind::EndOfFile,
            ]
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            lex("a += b && c || d.e"),
            vec![
                TokenKind::Word("a".into()),
                TokenKind::AddAssign,
                TokenKind::Word("b".into()),
                TokenKind::UberAnd,
                TokenKind::Word("c".into()),
                TokenKind::UberOr,
                TokenKind::Word("d".into()),
                TokenKind::Member,
                TokenKind::Word("e".into()),
                TokenKind::EndOfFile,
            ]
        );
    }

    #[test]
    fn test_comments_are_discarded() {
        assert_eq!(
            lex("a // comment\nb /* multi \n line /* nested */ */ c"),
            vec![
                TokenKind::Word("a".into()),
                TokenKind::Newline,
                TokenKind::Word("b".into()),
                TokenKind::Word("c".into()),
                TokenKind::EndOfFile,
            ]
        );
    }

    #[test]
    fn test_unterminated_string_fails() {
        assert!(matches!(lex_err("\"abc"), CompileError::Lex { .. }));
    }

    #[test]
    fn test_unterminated_block_comment_fails() {
        assert!(matches!(lex_err("/* abc"), CompileError::Lex { .. }));
    }

    #[test]
    fn test_invalid_escape_fails() {
        assert!(matches!(lex_err(r#""\q""#), CompileError::Lex { .. }));
    }

    #[test]
    fn test_invalid_suffix_fails() {
        assert!(matches!(lex_err("5qq"), CompileError::Lex { .. }));
    }

    #[test]
    fn test_spans_point_at_token_starts() {
        let mut ctx = CompilerContext::new();
        let buffer = SourceBuffer::new("test.keel", "ab cd", 7);
        let tokens = tokenize(&mut ctx, &buffer).unwrap();
        assert_eq!(tokens[0].span.offset, 0);
        assert_eq!(tokens[1].span.offset, 3);
        assert_eq!(tokens[1].span.unit, 7);
    }
}
