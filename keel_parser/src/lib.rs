//! Syntax analysis for the Keel language
//!
//! Recursive-descent parsing of a token stream into an abstract syntax
//! tree, with Pratt-style precedence for operator chains.

pub mod ast;
pub mod parser;
pub mod precedence;

pub use ast::*;
pub use parser::*;
pub use precedence::*;
