//! Semantic resolution for the Keel language
//!
//! Structural type equality and aliasing, the type table used for runtime
//! type information, the conformance relation, and symbol lookup over
//! functions, methods, globals and locals.

pub mod alias;
pub mod conform;
pub mod search;
pub mod table;

pub use alias::*;
pub use conform::*;
pub use search::*;
pub use table::*;
