//! Shared utilities for the Keel compiler
//!
//! This crate provides functionality used across all compiler components:
//! - Source spans and on-demand location resolution
//! - Error types and handling utilities
//! - Diagnostic collection
//! - Build-time meta definitions and the compiler context

pub mod context;
pub mod diagnostics;
pub mod error;
pub mod meta;
pub mod source;
pub mod span;

pub use context::*;
pub use diagnostics::*;
pub use error::*;
pub use meta::*;
pub use source::*;
pub use span::*;
