//! The conformance relation
//!
//! A directed compatibility check between a value's current written type
//! and a target type. Succeeding yields the cast needed to materialize the
//! conversion; the lowerer records the corresponding instruction.

use keel_parser::TypeExpr;
use serde::{Deserialize, Serialize};

/// How permissive the conformance check is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConformMode {
    /// Numeric widening/narrowing between integer kinds and between float
    /// kinds, plus generic literals adopting a concrete numeric type.
    Primitives,
    /// Additionally allows bit-equivalent pointer casts, `usize ↔ *T`,
    /// bool ↔ integer, and int ↔ float conversions.
    All,
}

/// Cast operations a conformance (or an explicit `cast`) can materialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CastOp {
    Bitcast,
    ZeroExtend,
    SignExtend,
    Truncate,
    FloatExtend,
    FloatTruncate,
    IntToPtr,
    PtrToInt,
    FloatToUInt,
    FloatToSInt,
    UIntToFloat,
    SIntToFloat,
    Reinterpret,
    IsZero,
    IsNonZero,
}

/// The action needed to conform a value to a target type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conformance {
    /// Types are already identical.
    Identity,
    /// A generic literal adopts the target type directly, without a cast
    /// instruction.
    MorphLiteral,
    Cast(CastOp),
}

/// Numeric classification of primitive base type names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericClass {
    Signed(u8),
    Unsigned(u8),
    Float(u8),
    Bool,
}

/// Classify a primitive base type name by kind and bit width.
pub fn classify_primitive(name: &str) -> Option<NumericClass> {
    Some(match name {
        "byte" => NumericClass::Signed(8),
        "short" => NumericClass::Signed(16),
        "int" => NumericClass::Signed(32),
        "long" => NumericClass::Signed(64),
        "ubyte" => NumericClass::Unsigned(8),
        "ushort" => NumericClass::Unsigned(16),
        "uint" => NumericClass::Unsigned(32),
        "ulong" | "usize" => NumericClass::Unsigned(64),
        "half" => NumericClass::Float(16),
        "float" => NumericClass::Float(32),
        "double" => NumericClass::Float(64),
        "bool" => NumericClass::Bool,
        _ => return None,
    })
}

/// Check whether `from ≺ to` holds under the given mode, and which cast
/// materializes it. Returns `None` when the types are incompatible; the
/// caller reports the error at the expression site.
pub fn conform(from: &TypeExpr, to: &TypeExpr, mode: ConformMode) -> Option<Conformance> {
    if from.identical(to) {
        return Some(Conformance::Identity);
    }

    let to_class = to.base_name().and_then(classify_primitive);

    // Generic literals adopt any compatible concrete type.
    if from.elements.len() == 1 {
        use keel_parser::TypeElem;
        match (&from.elements[0], to_class) {
            (TypeElem::GenericInt, Some(NumericClass::Signed(_)))
            | (TypeElem::GenericInt, Some(NumericClass::Unsigned(_)))
            | (TypeElem::GenericInt, Some(NumericClass::Float(_)))
            | (TypeElem::GenericFloat, Some(NumericClass::Float(_))) => {
                return Some(Conformance::MorphLiteral);
            }
            _ => {}
        }
    }

    let from_class = from.base_name().and_then(classify_primitive);

    // The generic pointer base conforms to any pointer, which is what lets
    // `null` flow into typed pointer contexts.
    if from.is_base_of("ptr") && to.is_pointer() {
        return Some(Conformance::Cast(CastOp::Bitcast));
    }
    if from.is_pointer() && to.is_base_of("ptr") {
        return Some(Conformance::Cast(CastOp::Bitcast));
    }

    if let (Some(from_class), Some(to_class)) = (from_class, to_class) {
        if let Some(conformance) = conform_primitives(from_class, to_class, mode) {
            return Some(conformance);
        }
    }

    if mode == ConformMode::All {
        // Bit-equivalent pointer casts.
        if from.is_pointer() && to.is_pointer() {
            return Some(Conformance::Cast(CastOp::Bitcast));
        }
        // usize ↔ *T
        if from.is_base_of("usize") && to.is_pointer() {
            return Some(Conformance::Cast(CastOp::IntToPtr));
        }
        if from.is_pointer() && to.is_base_of("usize") {
            return Some(Conformance::Cast(CastOp::PtrToInt));
        }
    }

    None
}

fn conform_primitives(
    from: NumericClass,
    to: NumericClass,
    mode: ConformMode,
) -> Option<Conformance> {
    use NumericClass::*;

    let cast = match (from, to) {
        // Integer widening keeps the source's signedness; narrowing
        // truncates; same width reinterprets the sign.
        (Signed(a), Signed(b)) | (Signed(a), Unsigned(b)) => int_resize(a, b, true),
        (Unsigned(a), Signed(b)) | (Unsigned(a), Unsigned(b)) => int_resize(a, b, false),

        (Float(a), Float(b)) if a < b => CastOp::FloatExtend,
        (Float(a), Float(b)) if a > b => CastOp::FloatTruncate,
        (Float(_), Float(_)) => return Some(Conformance::Identity),

        // Everything below needs the permissive mode.
        _ if mode != ConformMode::All => return None,

        (Bool, Signed(_)) | (Bool, Unsigned(_)) => CastOp::ZeroExtend,
        (Signed(_), Bool) | (Unsigned(_), Bool) => CastOp::IsNonZero,

        (Signed(_), Float(_)) => CastOp::SIntToFloat,
        (Unsigned(_), Float(_)) => CastOp::UIntToFloat,
        (Float(_), Signed(_)) => CastOp::FloatToSInt,
        (Float(_), Unsigned(_)) => CastOp::FloatToUInt,

        _ => return None,
    };

    Some(Conformance::Cast(cast))
}

fn int_resize(from_width: u8, to_width: u8, signed_source: bool) -> CastOp {
    if from_width < to_width {
        if signed_source {
            CastOp::SignExtend
        } else {
            CastOp::ZeroExtend
        }
    } else if from_width > to_width {
        CastOp::Truncate
    } else {
        CastOp::Bitcast
    }
}
