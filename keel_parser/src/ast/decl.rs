//! Program-scope declarations and the root AST

use crate::ast::expr::Expr;
use crate::ast::stmt::Stmt;
use crate::ast::types::{Flow, TypeExpr};
use keel_common::Span;
use serde::{Deserialize, Serialize};

/// Traits of a function declaration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionTraits {
    pub foreign: bool,
    pub variadic: bool,
    pub main: bool,
    pub stdcall: bool,
}

/// Per-argument type traits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgTraits {
    /// Treated as plain-old-data: management methods are not inserted when
    /// passing this argument.
    pub pod: bool,
}

/// A function within the root AST
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub arg_names: Vec<String>,
    pub arg_types: Vec<TypeExpr>,
    pub arg_flows: Vec<Flow>,
    pub arg_type_traits: Vec<ArgTraits>,
    pub return_type: TypeExpr,
    pub traits: FunctionTraits,
    pub statements: Vec<Stmt>,
    pub span: Span,
}

impl Function {
    pub fn arity(&self) -> usize {
        self.arg_types.len()
    }

    /// Whether this function is a struct method: a non-foreign function
    /// whose first argument is named `this` and typed `*SomeStruct`.
    pub fn method_receiver(&self) -> Option<&str> {
        if self.traits.foreign || self.arg_names.first().map(String::as_str) != Some("this") {
            return None;
        }
        let this_type = self.arg_types.first()?;
        if !this_type.is_base_ptr() {
            return None;
        }
        match &this_type.elements[1] {
            crate::ast::types::TypeElem::Base(name) => Some(name),
            _ => None,
        }
    }
}

/// A structure within the root AST
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Struct {
    pub name: String,
    pub field_names: Vec<String>,
    pub field_types: Vec<TypeExpr>,
    pub packed: bool,
    pub span: Span,
}

impl Struct {
    pub fn field_count(&self) -> usize {
        self.field_names.len()
    }

    pub fn find_field(&self, name: &str) -> Option<usize> {
        self.field_names.iter().position(|field| field == name)
    }
}

/// A type alias within the root AST
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alias {
    pub name: String,
    pub ty: TypeExpr,
    pub span: Span,
}

/// A named constant expression within the root AST
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Constant {
    pub name: String,
    pub value: Expr,
    pub span: Span,
}

/// A global variable within the root AST
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Global {
    pub name: String,
    pub ty: TypeExpr,
    pub initial: Option<Expr>,
    pub external: bool,
    pub span: Span,
}

/// The four distinguished globals that trigger runtime type table emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialGlobal {
    Types,
    TypesLength,
    TypeKinds,
    TypeKindsLength,
}

impl Global {
    pub fn special_kind(&self) -> Option<SpecialGlobal> {
        match self.name.as_str() {
            "__types__" => Some(SpecialGlobal::Types),
            "__types_length__" => Some(SpecialGlobal::TypesLength),
            "__type_kinds__" => Some(SpecialGlobal::TypeKinds),
            "__type_kinds_length__" => Some(SpecialGlobal::TypeKindsLength),
            _ => None,
        }
    }
}

/// An enum declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnumDecl {
    pub name: String,
    pub kinds: Vec<String>,
    pub span: Span,
}

impl EnumDecl {
    pub fn find_kind(&self, name: &str) -> Option<usize> {
        self.kinds.iter().position(|kind| kind == name)
    }
}

/// A foreign library to hand to the linker driver
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignLibrary {
    pub name: String,
    pub is_framework: bool,
}

/// An import recorded for the surrounding driver
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Import {
    pub path: String,
    pub span: Span,
}

/// The root AST of one translation unit
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ast {
    pub funcs: Vec<Function>,
    pub structs: Vec<Struct>,
    pub aliases: Vec<Alias>,
    pub constants: Vec<Constant>,
    pub globals: Vec<Global>,
    pub enums: Vec<EnumDecl>,
    pub libraries: Vec<ForeignLibrary>,
    pub imports: Vec<Import>,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find_struct(&self, name: &str) -> Option<&Struct> {
        self.structs.iter().find(|s| s.name == name)
    }

    pub fn find_alias(&self, name: &str) -> Option<&Alias> {
        self.aliases.iter().find(|a| a.name == name)
    }

    pub fn find_constant(&self, name: &str) -> Option<&Constant> {
        self.constants.iter().find(|c| c.name == name)
    }

    pub fn find_enum(&self, name: &str) -> Option<&EnumDecl> {
        self.enums.iter().find(|e| e.name == name)
    }

    /// Find the enum kind a bare name refers to, if any.
    pub fn find_enum_kind(&self, name: &str) -> Option<(&EnumDecl, usize)> {
        self.enums
            .iter()
            .find_map(|e| e.find_kind(name).map(|index| (e, index)))
    }

    pub fn find_global(&self, name: &str) -> Option<(usize, &Global)> {
        self.globals
            .iter()
            .enumerate()
            .find(|(_, g)| g.name == name)
    }
}

/// Names of built-in types that declarations may not shadow.
/// Sorted for binary search.
pub const RESERVED_TYPE_NAMES: [&str; 16] = [
    "bool", "byte", "double", "float", "funcptr", "half", "int", "long", "ptr", "short",
    "ubyte", "uint", "ulong", "ushort", "usize", "void",
];

/// Whether a name is a reserved built-in type name.
pub fn is_reserved_type_name(name: &str) -> bool {
    RESERVED_TYPE_NAMES.binary_search(&name).is_ok()
}
