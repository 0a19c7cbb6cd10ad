//! IR values

use crate::pool::{TypeId, ValueId};
use serde::{Deserialize, Serialize};

/// A literal payload, tagged with its concrete kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IrLiteral {
    S8(i8),
    S16(i16),
    S32(i32),
    S64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    Half(f64),
    Float(f64),
    Double(f64),
    Boolean(bool),
}

/// The payload variant of an IR value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IrValueKind {
    Literal(IrLiteral),
    /// The result of instruction `instruction` in basic block `block`.
    Result { block: usize, instruction: usize },
    NullPtr,
    ArrayLiteral(Vec<ValueId>),
    StructLiteral(Vec<ValueId>),
    StructConstruction(Vec<ValueId>),
    AnonGlobal(usize),
    ConstAnonGlobal(usize),
    /// A string constant of known length. The byte array carries a
    /// trailing NUL that is not counted by `length`.
    CstrOfLen { bytes: Vec<u8>, length: usize },
    ConstBitcast(ValueId),
}

/// A typed IR value, owned by the pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrValue {
    pub ty: TypeId,
    pub kind: IrValueKind,
}
