//! Written types
//!
//! Type elements appear in a `TypeExpr` in the same order they are written
//! in source. For example the type `**ubyte` is represented as
//! `[Pointer, Pointer, Base("ubyte")]`.

use keel_common::Span;
use serde::{Deserialize, Serialize};
use smallvec::{smallvec, SmallVec};
use std::fmt;

/// Data flow pattern of a function argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Flow {
    In,
    Out,
    InOut,
}

impl Default for Flow {
    fn default() -> Self {
        Flow::In
    }
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Flow::In => write!(f, "in"),
            Flow::Out => write!(f, "out"),
            Flow::InOut => write!(f, "inout"),
        }
    }
}

/// Traits of a function type element, compared during structural equality.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuncTypeTraits {
    pub foreign: bool,
    pub variadic: bool,
    pub stdcall: bool,
}

/// Type element for a function pointer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuncTypeElem {
    pub arg_types: Vec<TypeExpr>,
    pub arg_flows: Vec<Flow>,
    pub return_type: Box<TypeExpr>,
    pub traits: FuncTypeTraits,
}

/// One element of a written type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TypeElem {
    /// Base structure or primitive
    Base(String),
    Pointer,
    Array,
    FixedArray(u64),
    /// Integer literal awaiting type context
    GenericInt,
    /// Float literal awaiting type context
    GenericFloat,
    Func(FuncTypeElem),
}

/// A written type: an ordered sequence of type elements, read left to right.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeExpr {
    pub elements: SmallVec<[TypeElem; 4]>,
    pub span: Span,
}

impl TypeExpr {
    pub fn new(elements: SmallVec<[TypeElem; 4]>, span: Span) -> Self {
        Self { elements, span }
    }

    /// A single base element type.
    pub fn base(name: impl Into<String>, span: Span) -> Self {
        Self { elements: smallvec![TypeElem::Base(name.into())], span }
    }

    /// A pointer to a single base element type.
    pub fn base_ptr(name: impl Into<String>, span: Span) -> Self {
        Self {
            elements: smallvec![TypeElem::Pointer, TypeElem::Base(name.into())],
            span,
        }
    }

    pub fn generic_int(span: Span) -> Self {
        Self { elements: smallvec![TypeElem::GenericInt], span }
    }

    pub fn generic_float(span: Span) -> Self {
        Self { elements: smallvec![TypeElem::GenericFloat], span }
    }

    /// The empty element sequence, treated as `void`.
    pub fn void(span: Span) -> Self {
        Self { elements: SmallVec::new(), span }
    }

    /// Whether this type is `void` (no elements, or the `void` base).
    pub fn is_void(&self) -> bool {
        self.elements.is_empty() || self.is_base_of("void")
    }

    pub fn is_base(&self) -> bool {
        self.elements.len() == 1 && matches!(self.elements[0], TypeElem::Base(_))
    }

    pub fn is_base_of(&self, base: &str) -> bool {
        self.elements.len() == 1
            && matches!(&self.elements[0], TypeElem::Base(name) if name == base)
    }

    pub fn is_base_ptr(&self) -> bool {
        self.elements.len() == 2
            && matches!(self.elements[0], TypeElem::Pointer)
            && matches!(self.elements[1], TypeElem::Base(_))
    }

    pub fn is_base_ptr_of(&self, base: &str) -> bool {
        self.elements.len() == 2
            && matches!(self.elements[0], TypeElem::Pointer)
            && matches!(&self.elements[1], TypeElem::Base(name) if name == base)
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self.elements.first(), Some(TypeElem::Pointer))
    }

    /// The base name of this type, when it is a lone base or a pointer
    /// chain ending in one.
    pub fn base_name(&self) -> Option<&str> {
        match self.elements.last() {
            Some(TypeElem::Base(name)) if self.elements.len() == 1 => Some(name),
            _ => None,
        }
    }

    /// Prepend a pointer element, producing `*self`.
    pub fn prepend_ptr(&mut self) {
        self.elements.insert(0, TypeElem::Pointer);
    }

    pub fn pointer_to(&self) -> TypeExpr {
        let mut cloned = self.clone();
        cloned.prepend_ptr();
        cloned
    }

    /// Remove a leading pointer element, producing the pointee. A type with
    /// no remaining elements is `void`.
    pub fn dereference(&self) -> Option<TypeExpr> {
        match self.elements.first() {
            Some(TypeElem::Pointer) => {
                let mut cloned = self.clone();
                cloned.elements.remove(0);
                Some(cloned)
            }
            _ => None,
        }
    }

    /// Structural equality: equal length element sequences with identical
    /// corresponding elements.
    pub fn identical(&self, other: &TypeExpr) -> bool {
        self.elements.len() == other.elements.len()
            && self
                .elements
                .iter()
                .zip(other.elements.iter())
                .all(|(a, b)| a.identical(b))
    }
}

impl TypeElem {
    pub fn identical(&self, other: &TypeElem) -> bool {
        match (self, other) {
            (TypeElem::Base(a), TypeElem::Base(b)) => a == b,
            (TypeElem::Pointer, TypeElem::Pointer) => true,
            (TypeElem::Array, TypeElem::Array) => true,
            (TypeElem::FixedArray(a), TypeElem::FixedArray(b)) => a == b,
            (TypeElem::GenericInt, TypeElem::GenericInt) => true,
            (TypeElem::GenericFloat, TypeElem::GenericFloat) => true,
            (TypeElem::Func(a), TypeElem::Func(b)) => {
                a.traits == b.traits
                    && a.arg_types.len() == b.arg_types.len()
                    && a.arg_flows == b.arg_flows
                    && a.return_type.identical(&b.return_type)
                    && a
                        .arg_types
                        .iter()
                        .zip(b.arg_types.iter())
                        .all(|(x, y)| x.identical(y))
            }
            _ => false,
        }
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.elements.is_empty() {
            return write!(f, "void");
        }
        for element in &self.elements {
            write!(f, "{}", element)?;
        }
        Ok(())
    }
}

impl fmt::Display for TypeElem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeElem::Base(name) => write!(f, "{}", name),
            TypeElem::Pointer => write!(f, "*"),
            TypeElem::Array => write!(f, "[]"),
            TypeElem::FixedArray(length) => write!(f, "{} ", length),
            TypeElem::GenericInt => write!(f, "<int>"),
            TypeElem::GenericFloat => write!(f, "<float>"),
            TypeElem::Func(func) => {
                write!(f, "func(")?;
                for (index, arg) in func.arg_types.iter().enumerate() {
                    if index != 0 {
                        write!(f, ", ")?;
                    }
                    match func.arg_flows.get(index) {
                        Some(Flow::In) | None => {}
                        Some(flow) => write!(f, "{} ", flow)?,
                    }
                    write!(f, "{}", arg)?;
                }
                if func.traits.variadic {
                    if !func.arg_types.is_empty() {
                        write!(f, ", ")?;
                    }
                    write!(f, "...")?;
                }
                write!(f, ") {}", func.return_type)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_common::Span;
    use pretty_assertions::assert_eq;

    fn span() -> Span {
        Span::none()
    }

    #[test]
    fn test_element_order_matches_source() {
        let ty = TypeExpr::base_ptr("ubyte", span()).pointer_to();
        assert!(matches!(ty.elements[0], TypeElem::Pointer));
        assert!(matches!(ty.elements[1], TypeElem::Pointer));
        assert!(matches!(&ty.elements[2], TypeElem::Base(name) if name == "ubyte"));
        assert_eq!(ty.to_string(), "**ubyte");
    }

    #[test]
    fn test_identical_ignores_span() {
        let a = TypeExpr::base("int", span());
        let b = TypeExpr::base("int", Span::new(55, 1));
        assert!(a.identical(&b));
        assert!(!a.identical(&TypeExpr::base("long", span())));
    }

    #[test]
    fn test_dereference() {
        let ty = TypeExpr::base_ptr("short", span());
        let pointee = ty.dereference().unwrap();
        assert!(pointee.is_base_of("short"));
        assert!(pointee.dereference().is_none());
    }

    #[test]
    fn test_void_conventions() {
        assert!(TypeExpr::void(span()).is_void());
        assert!(TypeExpr::base("void", span()).is_void());
        assert!(!TypeExpr::base("int", span()).is_void());
    }

    #[test]
    fn test_fixed_array_formatting() {
        let ty = TypeExpr::new(
            smallvec![TypeElem::FixedArray(8), TypeElem::Base("ubyte".into())],
            span(),
        );
        assert_eq!(ty.to_string(), "8 ubyte");
    }
}
