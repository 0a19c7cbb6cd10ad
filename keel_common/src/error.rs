//! Error handling utilities for the Keel compiler

use thiserror::Error;

/// The main error type for the Keel compiler.
///
/// One variant per error kind; each stage reports the first error it hits
/// and the pipeline halts the affected translation unit.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error("lex error: {message}")]
    Lex { message: String },

    #[error("parse error: {message}")]
    Parse { message: String },

    #[error("name resolution error: {message}")]
    Resolve { message: String },

    #[error("type error: {message}")]
    Type { message: String },

    #[error("overload error: {message}")]
    Overload { message: String },

    #[error("I/O error: {message}")]
    Io { message: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}

/// Result type alias for Keel compiler operations
pub type CompileResult<T> = Result<T, CompileError>;

impl CompileError {
    pub fn lex(message: impl Into<String>) -> Self {
        Self::Lex { message: message.into() }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse { message: message.into() }
    }

    pub fn resolve(message: impl Into<String>) -> Self {
        Self::Resolve { message: message.into() }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::Type { message: message.into() }
    }

    pub fn overload(message: impl Into<String>) -> Self {
        Self::Overload { message: message.into() }
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::Io { message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }
}

impl From<std::io::Error> for CompileError {
    fn from(error: std::io::Error) -> Self {
        Self::Io { message: error.to_string() }
    }
}
