//! Lexical analysis for the Keel language
//!
//! Turns a source buffer into a token stream with source spans, and reads
//! and writes the pre-lexed package format.

pub mod lexer;
pub mod pkg;
pub mod token;

pub use lexer::*;
pub use pkg::*;
pub use token::*;
