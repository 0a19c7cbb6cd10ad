//! The IR module
//!
//! Owns the pool, the lowered functions, the sorted function and method
//! indices, the sorted type map, globals and anonymous globals. This is
//! the object handed to the code generation collaborator.

use crate::function::IrFunction;
use crate::pool::{IrPool, TypeId, ValueId};
use crate::types::IrTypeKind;
use crate::value::{IrLiteral, IrValueKind};
use keel_resolver::{FuncIndex, MethodIndex};
use serde::{Deserialize, Serialize};

/// Traits of a module global.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IrGlobalTraits {
    pub external: bool,
}

/// A lowered global variable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IrGlobal {
    pub name: String,
    pub ty: TypeId,
    pub traits: IrGlobalTraits,
}

/// An anonymous global, created for string data and runtime type records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnonGlobal {
    pub ty: TypeId,
    pub constant: bool,
    pub initializer: Option<ValueId>,
}

/// A named IR type, sorted by name for binary search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeMapping {
    pub name: String,
    pub ty: TypeId,
}

/// Frequently used types, created once per module.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CommonTypes {
    pub void: TypeId,
    pub boolean: TypeId,
    pub s32: TypeId,
    pub ubyte: TypeId,
    pub ubyte_ptr: TypeId,
    pub usize_ty: TypeId,
    pub usize_ptr: TypeId,
    pub funcptr: TypeId,
}

/// The lowered form of one translation unit.
#[derive(Debug, Clone)]
pub struct IrModule {
    pub pool: IrPool,
    pub funcs: Vec<IrFunction>,
    /// Functions sorted by name, then declaration id.
    pub func_mappings: FuncIndex,
    /// Methods sorted by receiver struct, then name, then declaration id.
    pub methods: MethodIndex,
    type_map: Vec<TypeMapping>,
    pub globals: Vec<IrGlobal>,
    pub anon_globals: Vec<AnonGlobal>,
    pub common: CommonTypes,
}

impl IrModule {
    pub fn new() -> Self {
        let mut pool = IrPool::new();

        let void = pool.add_type(IrTypeKind::Void);
        let boolean = pool.add_type(IrTypeKind::Boolean);
        let s32 = pool.add_type(IrTypeKind::S32);
        let ubyte = pool.add_type(IrTypeKind::U8);
        let ubyte_ptr = pool.pointer_to(ubyte);
        let usize_ty = pool.add_type(IrTypeKind::U64);
        let usize_ptr = pool.pointer_to(usize_ty);
        let funcptr = pool.add_type(IrTypeKind::FuncPtr);

        let common = CommonTypes {
            void,
            boolean,
            s32,
            ubyte,
            ubyte_ptr,
            usize_ty,
            usize_ptr,
            funcptr,
        };

        Self {
            pool,
            funcs: Vec::new(),
            func_mappings: FuncIndex::default(),
            methods: MethodIndex::default(),
            type_map: Vec::new(),
            globals: Vec::new(),
            anon_globals: Vec::new(),
            common,
        }
    }

    /// Install the named-type map. Entries are sorted by name here so
    /// lookups can binary search.
    pub fn set_type_map(&mut self, mut mappings: Vec<TypeMapping>) {
        mappings.sort_by(|a, b| a.name.cmp(&b.name));
        self.type_map = mappings;
    }

    /// Look up an IR type by name.
    pub fn find_type(&self, name: &str) -> Option<TypeId> {
        self.type_map
            .binary_search_by(|mapping| mapping.name.as_str().cmp(name))
            .ok()
            .map(|index| self.type_map[index].ty)
    }

    pub fn type_map(&self) -> &[TypeMapping] {
        &self.type_map
    }

    pub fn add_anon_global(&mut self, ty: TypeId, constant: bool) -> usize {
        self.anon_globals.push(AnonGlobal { ty, constant, initializer: None });
        self.anon_globals.len() - 1
    }

    pub fn set_anon_global_initializer(&mut self, id: usize, initializer: ValueId) {
        self.anon_globals[id].initializer = Some(initializer);
    }

    /// Render a type for diagnostics and debugging.
    pub fn type_to_string(&self, id: TypeId) -> String {
        match self.pool.type_kind(id) {
            IrTypeKind::None => "none".to_string(),
            IrTypeKind::Pointer(inner) => format!("*{}", self.type_to_string(*inner)),
            IrTypeKind::S8 => "s8".to_string(),
            IrTypeKind::S16 => "s16".to_string(),
            IrTypeKind::S32 => "s32".to_string(),
            IrTypeKind::S64 => "s64".to_string(),
            IrTypeKind::U8 => "u8".to_string(),
            IrTypeKind::U16 => "u16".to_string(),
            IrTypeKind::U32 => "u32".to_string(),
            IrTypeKind::U64 => "u64".to_string(),
            IrTypeKind::Half => "h".to_string(),
            IrTypeKind::Float => "f".to_string(),
            IrTypeKind::Double => "d".to_string(),
            IrTypeKind::Boolean => "bool".to_string(),
            IrTypeKind::Union(subtypes) => {
                let inner: Vec<String> =
                    subtypes.iter().map(|s| self.type_to_string(*s)).collect();
                format!("union ({})", inner.join(", "))
            }
            IrTypeKind::Structure { subtypes, .. } => {
                let inner: Vec<String> =
                    subtypes.iter().map(|s| self.type_to_string(*s)).collect();
                format!("struct ({})", inner.join(", "))
            }
            IrTypeKind::Void => "void".to_string(),
            IrTypeKind::FuncPtr => "funcptr".to_string(),
            IrTypeKind::FixedArray { subtype, length } => {
                format!("{} {}", length, self.type_to_string(*subtype))
            }
        }
    }

    /// Render a value for diagnostics and debugging.
    pub fn value_to_string(&self, id: ValueId) -> String {
        let value = self.pool.value(id);
        let type_string = self.type_to_string(value.ty);

        match &value.kind {
            IrValueKind::Literal(literal) => {
                let payload = match literal {
                    IrLiteral::S8(v) => v.to_string(),
                    IrLiteral::S16(v) => v.to_string(),
                    IrLiteral::S32(v) => v.to_string(),
                    IrLiteral::S64(v) => v.to_string(),
                    IrLiteral::U8(v) => v.to_string(),
                    IrLiteral::U16(v) => v.to_string(),
                    IrLiteral::U32(v) => v.to_string(),
                    IrLiteral::U64(v) => v.to_string(),
                    IrLiteral::Half(v) | IrLiteral::Float(v) | IrLiteral::Double(v) => {
                        format!("{:.6}", v)
                    }
                    IrLiteral::Boolean(v) => v.to_string(),
                };
                format!("{} {}", type_string, payload)
            }
            IrValueKind::Result { block, instruction } => {
                format!("{} >|{}| 0x{:08X}<", type_string, block, instruction)
            }
            IrValueKind::NullPtr => "null".to_string(),
            IrValueKind::ArrayLiteral(_) => "larr".to_string(),
            IrValueKind::StructLiteral(_) => "stru".to_string(),
            IrValueKind::StructConstruction(values) => {
                format!("construct {} (from {} values)", type_string, values.len())
            }
            IrValueKind::AnonGlobal(id) => format!("anonglob {}", id),
            IrValueKind::ConstAnonGlobal(id) => format!("constanonglob {}", id),
            IrValueKind::CstrOfLen { bytes, length } => {
                let text = String::from_utf8_lossy(&bytes[..*length]);
                format!("cstroflen {} \"{}\"", length, text)
            }
            IrValueKind::ConstBitcast(inner) => {
                format!("cbc {} to {}", self.value_to_string(*inner), type_string)
            }
        }
    }
}

impl Default for IrModule {
    fn default() -> Self {
        Self::new()
    }
}
