//! Token definitions for the Keel language

use keel_common::Spanned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// First tag assigned to a keyword. A keyword's tag is
/// `KEYWORD_TAG_BASE + index` of the keyword in the sorted `KEYWORDS` table,
/// so the keyword tag range is contiguous.
pub const KEYWORD_TAG_BASE: u8 = 0x40;

/// Token types in the Keel language
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TokenKind {
    // Literals
    GenericInt(i64),
    GenericFloat(f64),
    ByteLit(i64),
    UbyteLit(i64),
    ShortLit(i64),
    UshortLit(i64),
    IntLit(i64),
    UintLit(i64),
    LongLit(i64),
    UlongLit(i64),
    FloatLit(f64),
    DoubleLit(f64),
    StringLit(String),
    CStringLit(String),

    // Identifiers
    Word(String),

    // Punctuation
    OpenParen,     // (
    CloseParen,    // )
    OpenBrace,     // {
    CloseBrace,    // }
    OpenBracket,   // [
    CloseBracket,  // ]
    Comma,         // ,
    Member,        // .
    Ellipsis,      // ...
    Hash,          // #
    Colon,         // :

    // Operators
    Add,            // +
    Subtract,       // -
    Multiply,       // *
    Divide,         // /
    Modulus,        // %
    Assign,         // =
    AddAssign,      // +=
    SubtractAssign, // -=
    MultiplyAssign, // *=
    DivideAssign,   // /=
    ModulusAssign,  // %=
    Equals,         // ==
    NotEquals,      // !=
    LessThan,       // <
    GreaterThan,    // >
    LessThanEq,     // <=
    GreaterThanEq,  // >=
    Not,            // !
    UberAnd,        // &&
    UberOr,         // ||
    Address,        // &

    // Special
    Newline,
    EndOfFile,

    // Keywords (in sorted order, matching the KEYWORDS table)
    KeywordPod,
    KeywordAlias,
    KeywordAnd,
    KeywordAs,
    KeywordBreak,
    KeywordCase,
    KeywordCast,
    KeywordConst,
    KeywordContinue,
    KeywordDef,
    KeywordDefault,
    KeywordDefer,
    KeywordDelete,
    KeywordDynamic,
    KeywordElse,
    KeywordEnum,
    KeywordExternal,
    KeywordFalse,
    KeywordFor,
    KeywordForeign,
    KeywordFunc,
    KeywordFuncptr,
    KeywordGlobal,
    KeywordIf,
    KeywordImport,
    KeywordIn,
    KeywordInout,
    KeywordLink,
    KeywordNew,
    KeywordNull,
    KeywordOr,
    KeywordOut,
    KeywordPacked,
    KeywordPragma,
    KeywordPrivate,
    KeywordPublic,
    KeywordRepeat,
    KeywordReturn,
    KeywordSizeof,
    KeywordStatic,
    KeywordStdcall,
    KeywordStruct,
    KeywordSwitch,
    KeywordTrue,
    KeywordUndef,
    KeywordUnless,
    KeywordUntil,
    KeywordWhile,
}

/// The keyword table. Sorted by spelling; the lexer binary-searches it and
/// the package format derives keyword tags from the index.
pub const KEYWORDS: [(&str, TokenKind); 48] = [
    ("POD", TokenKind::KeywordPod),
    ("alias", TokenKind::KeywordAlias),
    ("and", TokenKind::KeywordAnd),
    ("as", TokenKind::KeywordAs),
    ("break", TokenKind::KeywordBreak),
    ("case", TokenKind::KeywordCase),
    ("cast", TokenKind::KeywordCast),
    ("const", TokenKind::KeywordConst),
    ("continue", TokenKind::KeywordContinue),
    ("def", TokenKind::KeywordDef),
    ("default", TokenKind::KeywordDefault),
    ("defer", TokenKind::KeywordDefer),
    ("delete", TokenKind::KeywordDelete),
    ("dynamic", TokenKind::KeywordDynamic),
    ("else", TokenKind::KeywordElse),
    ("enum", TokenKind::KeywordEnum),
    ("external", TokenKind::KeywordExternal),
    ("false", TokenKind::KeywordFalse),
    ("for", TokenKind::KeywordFor),
    ("foreign", TokenKind::KeywordForeign),
    ("func", TokenKind::KeywordFunc),
    ("funcptr", TokenKind::KeywordFuncptr),
    ("global", TokenKind::KeywordGlobal),
    ("if", TokenKind::KeywordIf),
    ("import", TokenKind::KeywordImport),
    ("in", TokenKind::KeywordIn),
    ("inout", TokenKind::KeywordInout),
    ("link", TokenKind::KeywordLink),
    ("new", TokenKind::KeywordNew),
    ("null", TokenKind::KeywordNull),
    ("or", TokenKind::KeywordOr),
    ("out", TokenKind::KeywordOut),
    ("packed", TokenKind::KeywordPacked),
    ("pragma", TokenKind::KeywordPragma),
    ("private", TokenKind::KeywordPrivate),
    ("public", TokenKind::KeywordPublic),
    ("repeat", TokenKind::KeywordRepeat),
    ("return", TokenKind::KeywordReturn),
    ("sizeof", TokenKind::KeywordSizeof),
    ("static", TokenKind::KeywordStatic),
    ("stdcall", TokenKind::KeywordStdcall),
    ("struct", TokenKind::KeywordStruct),
    ("switch", TokenKind::KeywordSwitch),
    ("true", TokenKind::KeywordTrue),
    ("undef", TokenKind::KeywordUndef),
    ("unless", TokenKind::KeywordUnless),
    ("until", TokenKind::KeywordUntil),
    ("while", TokenKind::KeywordWhile),
];

/// Look up an identifier in the keyword table.
pub fn lookup_keyword(word: &str) -> Option<TokenKind> {
    KEYWORDS
        .binary_search_by(|(name, _)| name.cmp(&word))
        .ok()
        .map(|index| KEYWORDS[index].1.clone())
}

impl TokenKind {
    /// The stable one-byte tag used by the pre-lexed package format.
    pub fn tag(&self) -> u8 {
        match self {
            TokenKind::EndOfFile => 0x00,
            TokenKind::Word(_) => 0x01,
            TokenKind::StringLit(_) => 0x02,
            TokenKind::CStringLit(_) => 0x03,
            TokenKind::GenericInt(_) => 0x04,
            TokenKind::GenericFloat(_) => 0x05,
            TokenKind::ByteLit(_) => 0x06,
            TokenKind::UbyteLit(_) => 0x07,
            TokenKind::ShortLit(_) => 0x08,
            TokenKind::UshortLit(_) => 0x09,
            TokenKind::IntLit(_) => 0x0A,
            TokenKind::UintLit(_) => 0x0B,
            TokenKind::LongLit(_) => 0x0C,
            TokenKind::UlongLit(_) => 0x0D,
            TokenKind::FloatLit(_) => 0x0E,
            TokenKind::DoubleLit(_) => 0x0F,
            TokenKind::OpenParen => 0x10,
            TokenKind::CloseParen => 0x11,
            TokenKind::OpenBrace => 0x12,
            TokenKind::CloseBrace => 0x13,
            TokenKind::OpenBracket => 0x14,
            TokenKind::CloseBracket => 0x15,
            TokenKind::Add => 0x16,
            TokenKind::Subtract => 0x17,
            TokenKind::Multiply => 0x18,
            TokenKind::Divide => 0x19,
            TokenKind::Modulus => 0x1A,
            TokenKind::Assign => 0x1B,
            TokenKind::AddAssign => 0x1C,
            TokenKind::SubtractAssign => 0x1D,
            TokenKind::MultiplyAssign => 0x1E,
            TokenKind::DivideAssign => 0x1F,
            TokenKind::ModulusAssign => 0x20,
            TokenKind::Equals => 0x21,
            TokenKind::NotEquals => 0x22,
            TokenKind::LessThan => 0x23,
            TokenKind::GreaterThan => 0x24,
            TokenKind::LessThanEq => 0x25,
            TokenKind::GreaterThanEq => 0x26,
            TokenKind::Not => 0x27,
            TokenKind::UberAnd => 0x28,
            TokenKind::UberOr => 0x29,
            TokenKind::Address => 0x2A,
            TokenKind::Member => 0x2B,
            TokenKind::Comma => 0x2C,
            TokenKind::Ellipsis => 0x2D,
            TokenKind::Hash => 0x2E,
            TokenKind::Colon => 0x2F,
            TokenKind::Newline => 0x30,
            keyword => {
                let index = KEYWORDS
                    .iter()
                    .position(|(_, kind)| kind == keyword)
                    .expect("every non-keyword kind is matched above");
                KEYWORD_TAG_BASE + index as u8
            }
        }
    }

    /// Reconstruct a payload-free token kind from its package tag.
    /// Payload tags and the compressed-word range are handled by the
    /// package reader itself.
    pub fn from_bare_tag(tag: u8) -> Option<TokenKind> {
        let kind = match tag {
            0x00 => TokenKind::EndOfFile,
            0x10 => TokenKind::OpenParen,
            0x11 => TokenKind::CloseParen,
            0x12 => TokenKind::OpenBrace,
            0x13 => TokenKind::CloseBrace,
            0x14 => TokenKind::OpenBracket,
            0x15 => TokenKind::CloseBracket,
            0x16 => TokenKind::Add,
            0x17 => TokenKind::Subtract,
            0x18 => TokenKind::Multiply,
            0x19 => TokenKind::Divide,
            0x1A => TokenKind::Modulus,
            0x1B => TokenKind::Assign,
            0x1C => TokenKind::AddAssign,
            0x1D => TokenKind::SubtractAssign,
            0x1E => TokenKind::MultiplyAssign,
            0x1F => TokenKind::DivideAssign,
            0x20 => TokenKind::ModulusAssign,
            0x21 => TokenKind::Equals,
            0x22 => TokenKind::NotEquals,
            0x23 => TokenKind::LessThan,
            0x24 => TokenKind::GreaterThan,
            0x25 => TokenKind::LessThanEq,
            0x26 => TokenKind::GreaterThanEq,
            0x27 => TokenKind::Not,
            0x28 => TokenKind::UberAnd,
            0x29 => TokenKind::UberOr,
            0x2A => TokenKind::Address,
            0x2B => TokenKind::Member,
            0x2C => TokenKind::Comma,
            0x2D => TokenKind::Ellipsis,
            0x2E => TokenKind::Hash,
            0x2F => TokenKind::Colon,
            0x30 => TokenKind::Newline,
            tag if (KEYWORD_TAG_BASE..KEYWORD_TAG_BASE + KEYWORDS.len() as u8)
                .contains(&tag) =>
            {
                KEYWORDS[(tag - KEYWORD_TAG_BASE) as usize].1.clone()
            }
            _ => return None,
        };
        Some(kind)
    }

    /// Whether this token carries payload data in the package format.
    pub fn has_payload(&self) -> bool {
        matches!(
            self,
            TokenKind::Word(_)
                | TokenKind::StringLit(_)
                | TokenKind::CStringLit(_)
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
        )
    }

    pub fn is_keyword(&self) -> bool {
        self.tag() >= KEYWORD_TAG_BASE && self.tag() < KEYWORD_TAG_BASE + KEYWORDS.len() as u8
    }

    pub fn is_assignment(&self) -> bool {
        matches!(
            self,
            TokenKind::Assign
                | TokenKind::AddAssign
                | TokenKind::SubtractAssign
                | TokenKind::MultiplyAssign
                | TokenKind::DivideAssign
                | TokenKind::ModulusAssign
        )
    }

    /// Tokens that end an expression when encountered by the operator
    /// parser.
    pub fn terminates_expression(&self) -> bool {
        matches!(
            self,
            TokenKind::Newline
                | TokenKind::CloseParen
                | TokenKind::CloseBracket
                | TokenKind::Comma
                | TokenKind::OpenBrace
                | TokenKind::KeywordElse
                | TokenKind::EndOfFile
        ) || self.is_assignment()
    }

    /// A short human-readable name for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            TokenKind::GenericInt(_) => "integer literal",
            TokenKind::GenericFloat(_) => "float literal",
            TokenKind::ByteLit(_) => "byte literal",
            TokenKind::UbyteLit(_) => "ubyte literal",
            TokenKind::ShortLit(_) => "short literal",
            TokenKind::UshortLit(_) => "ushort literal",
            TokenKind::IntLit(_) => "int literal",
            TokenKind::UintLit(_) => "uint literal",
            TokenKind::LongLit(_) => "long literal",
            TokenKind::UlongLit(_) => "ulong literal",
            TokenKind::FloatLit(_) => "float literal",
            TokenKind::DoubleLit(_) => "double literal",
            TokenKind::StringLit(_) => "string literal",
            TokenKind::CStringLit(_) => "c-string literal",
            TokenKind::Word(_) => "identifier",
            TokenKind::OpenParen => "'('",
            TokenKind::CloseParen => "')'",
            TokenKind::OpenBrace => "'{'",
            TokenKind::CloseBrace => "'}'",
            TokenKind::OpenBracket => "'['",
            TokenKind::CloseBracket => "']'",
            TokenKind::Comma => "','",
            TokenKind::Member => "'.'",
            TokenKind::Ellipsis => "'...'",
            TokenKind::Hash => "'#'",
            TokenKind::Colon => "':'",
            TokenKind::Add => "'+'",
            TokenKind::Subtract => "'-'",
            TokenKind::Multiply => "'*'",
            TokenKind::Divide => "'/'",
            TokenKind::Modulus => "'%'",
            TokenKind::Assign => "'='",
            TokenKind::AddAssign => "'+='",
            TokenKind::SubtractAssign => "'-='",
            TokenKind::MultiplyAssign => "'*='",
            TokenKind::DivideAssign => "'/='",
            TokenKind::ModulusAssign => "'%='",
            TokenKind::Equals => "'=='",
            TokenKind::NotEquals => "'!='",
            TokenKind::LessThan => "'<'",
            TokenKind::GreaterThan => "'>'",
            TokenKind::LessThanEq => "'<='",
            TokenKind::GreaterThanEq => "'>='",
            TokenKind::Not => "'!'",
            TokenKind::UberAnd => "'&&'",
            TokenKind::UberOr => "'||'",
            TokenKind::Address => "'&'",
            TokenKind::Newline => "newline",
            TokenKind::EndOfFile => "end of file",
            keyword => {
                KEYWORDS
                    .iter()
                    .find(|(_, kind)| kind == keyword)
                    .map(|(name, _)| *name)
                    .unwrap_or("keyword")
            }
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::GenericInt(n) => write!(f, "{}", n),
            TokenKind::GenericFloat(n) => write!(f, "{}", n),
            TokenKind::ByteLit(n) => write!(f, "{}b", n),
            TokenKind::UbyteLit(n) => write!(f, "{}ub", n),
            TokenKind::ShortLit(n) => write!(f, "{}s", n),
            TokenKind::UshortLit(n) => write!(f, "{}us", n),
            TokenKind::IntLit(n) => write!(f, "{}i", n),
            TokenKind::UintLit(n) => write!(f, "{}ui", n),
            TokenKind::LongLit(n) => write!(f, "{}l", n),
            TokenKind::UlongLit(n) => write!(f, "{}ul", n),
            TokenKind::FloatLit(n) => write!(f, "{}f", n),
            TokenKind::DoubleLit(n) => write!(f, "{}d", n),
            TokenKind::StringLit(s) => write!(f, "\"{}\"", s),
            TokenKind::CStringLit(s) => write!(f, "'{}'", s),
            TokenKind::Word(name) => write!(f, "{}", name),
            other => write!(f, "{}", other.name()),
        }
    }
}

/// A token with source location information
pub type Token = Spanned<TokenKind>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_table_is_sorted_and_complete() {
        assert_eq!(KEYWORDS.len(), 48);
        for pair in KEYWORDS.windows(2) {
            assert!(pair[0].0 < pair[1].0, "{} !< {}", pair[0].0, pair[1].0);
        }
    }

    #[test]
    fn test_keyword_tags_are_contiguous() {
        for (index, (_, kind)) in KEYWORDS.iter().enumerate() {
            assert_eq!(kind.tag(), KEYWORD_TAG_BASE + index as u8);
        }
    }

    #[test]
    fn test_lookup_keyword() {
        assert_eq!(lookup_keyword("func"), Some(TokenKind::KeywordFunc));
        assert_eq!(lookup_keyword("unless"), Some(TokenKind::KeywordUnless));
        assert_eq!(lookup_keyword("POD"), Some(TokenKind::KeywordPod));
        assert_eq!(lookup_keyword("banana"), None);
    }

    #[test]
    fn test_bare_tag_round_trip() {
        let kinds = [
            TokenKind::OpenParen,
            TokenKind::Newline,
            TokenKind::KeywordWhile,
            TokenKind::UberAnd,
            TokenKind::EndOfFile,
        ];
        for kind in kinds {
            assert_eq!(TokenKind::from_bare_tag(kind.tag()), Some(kind));
        }
    }

    #[test]
    fn test_payload_tokens_have_no_bare_tag() {
        assert_eq!(TokenKind::from_bare_tag(0x01), None);
        assert_eq!(TokenKind::from_bare_tag(0x04), None);
    }
}
