//! Intermediate representation for the Keel compiler
//!
//! A basic-block IR with typed values. Types and values live in a pool
//! owned by the module and are referenced by index; the whole pool is
//! released when the module is dropped.

pub mod function;
pub mod instruction;
pub mod lower;
pub mod module;
pub mod pool;
pub mod scope;
pub mod types;
pub mod value;
pub mod verify;

pub use function::*;
pub use instruction::*;
pub use lower::lower;
pub use module::*;
pub use pool::*;
pub use scope::*;
pub use types::*;
pub use value::*;
