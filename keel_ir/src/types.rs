//! IR types

use crate::pool::{IrPool, TypeId};
use serde::{Deserialize, Serialize};

/// The kind of an IR type. `Pointer`, `Structure`, `Union` and `FixedArray`
/// weakly reference other pooled types by index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IrTypeKind {
    None,
    Pointer(TypeId),
    S8,
    S16,
    S32,
    S64,
    U8,
    U16,
    U32,
    U64,
    Half,
    Float,
    Double,
    Boolean,
    Union(Vec<TypeId>),
    Structure { subtypes: Vec<TypeId>, packed: bool },
    Void,
    FuncPtr,
    FixedArray { subtype: TypeId, length: u64 },
}

/// An IR type node, owned by the pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrType {
    pub kind: IrTypeKind,
}

impl IrTypeKind {
    pub fn is_signed_integer(&self) -> bool {
        matches!(self, IrTypeKind::S8 | IrTypeKind::S16 | IrTypeKind::S32 | IrTypeKind::S64)
    }

    pub fn is_unsigned_integer(&self) -> bool {
        matches!(self, IrTypeKind::U8 | IrTypeKind::U16 | IrTypeKind::U32 | IrTypeKind::U64)
    }

    pub fn is_integer(&self) -> bool {
        self.is_signed_integer() || self.is_unsigned_integer()
    }

    pub fn is_float(&self) -> bool {
        matches!(self, IrTypeKind::Half | IrTypeKind::Float | IrTypeKind::Double)
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, IrTypeKind::Pointer(_))
    }
}

/// How a type behaves in math instruction selection: pointers and booleans
/// count as unsigned integers, float kinds use the float opcodes, and
/// everything else has no built-in opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    SignedInteger,
    UnsignedInteger,
    FloatingPoint,
    None,
}

pub fn type_category(kind: &IrTypeKind) -> TypeCategory {
    match kind {
        IrTypeKind::S8 | IrTypeKind::S16 | IrTypeKind::S32 | IrTypeKind::S64 => {
            TypeCategory::SignedInteger
        }
        IrTypeKind::U8
        | IrTypeKind::U16
        | IrTypeKind::U32
        | IrTypeKind::U64
        | IrTypeKind::Boolean
        | IrTypeKind::Pointer(_) => TypeCategory::UnsignedInteger,
        IrTypeKind::Half | IrTypeKind::Float | IrTypeKind::Double => TypeCategory::FloatingPoint,
        _ => TypeCategory::None,
    }
}

/// Structural equality on type shape.
pub fn types_identical(pool: &IrPool, a: TypeId, b: TypeId) -> bool {
    if a == b {
        return true;
    }
    match (pool.type_kind(a), pool.type_kind(b)) {
        (IrTypeKind::Pointer(x), IrTypeKind::Pointer(y)) => types_identical(pool, *x, *y),
        (
            IrTypeKind::Structure { subtypes: xs, packed: xp },
            IrTypeKind::Structure { subtypes: ys, packed: yp },
        ) => {
            xp == yp
                && xs.len() == ys.len()
                && xs.iter().zip(ys.iter()).all(|(x, y)| types_identical(pool, *x, *y))
        }
        (IrTypeKind::Union(xs), IrTypeKind::Union(ys)) => {
            xs.len() == ys.len()
                && xs.iter().zip(ys.iter()).all(|(x, y)| types_identical(pool, *x, *y))
        }
        (
            IrTypeKind::FixedArray { subtype: x, length: xl },
            IrTypeKind::FixedArray { subtype: y, length: yl },
        ) => xl == yl && types_identical(pool, *x, *y),
        (x, y) => x == y,
    }
}
