//! The IR pool
//!
//! All IR types and values live here, referenced by index. The pool is
//! released in one shot when the module is dropped; individual nodes are
//! never freed piecewise. Cross-references between pooled nodes are
//! indices, so there is no ownership between them.

use crate::types::{IrType, IrTypeKind};
use crate::value::{IrValue, IrValueKind};
use serde::{Deserialize, Serialize};

/// Index of a pooled IR type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeId(u32);

impl TypeId {
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Index of a pooled IR value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValueId(u32);

impl ValueId {
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Bulk storage for IR types and values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IrPool {
    types: Vec<IrType>,
    values: Vec<IrValue>,
}

impl IrPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_type(&mut self, kind: IrTypeKind) -> TypeId {
        self.types.push(IrType { kind });
        TypeId(self.types.len() as u32 - 1)
    }

    pub fn pointer_to(&mut self, inner: TypeId) -> TypeId {
        self.add_type(IrTypeKind::Pointer(inner))
    }

    pub fn type_kind(&self, id: TypeId) -> &IrTypeKind {
        &self.types[id.0 as usize].kind
    }

    /// Replace a type's kind in place. Used to fill struct skeletons after
    /// every struct name is known.
    pub fn set_type_kind(&mut self, id: TypeId, kind: IrTypeKind) {
        self.types[id.0 as usize].kind = kind;
    }

    /// The pointee of a pointer type.
    pub fn pointee(&self, id: TypeId) -> Option<TypeId> {
        match self.type_kind(id) {
            IrTypeKind::Pointer(inner) => Some(*inner),
            _ => None,
        }
    }

    pub fn add_value(&mut self, ty: TypeId, kind: IrValueKind) -> ValueId {
        self.values.push(IrValue { ty, kind });
        ValueId(self.values.len() as u32 - 1)
    }

    pub fn value(&self, id: ValueId) -> &IrValue {
        &self.values[id.0 as usize]
    }

    pub fn value_type(&self, id: ValueId) -> TypeId {
        self.values[id.0 as usize].ty
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    pub fn value_count(&self) -> usize {
        self.values.len()
    }
}
