//! Runtime type information
//!
//! Four distinguished globals trigger emission of the reduced type table:
//! `__types__`, `__types_length__`, `__type_kinds__` and
//! `__type_kinds_length__`. Their values are materialized by stores at the
//! entry of `main`, together with ordinary global initializers. With the
//! no-type-info switch set they are initialized to null/0 instead.

use crate::lower::builder::FuncBuilder;
use crate::lower::management::management_assign;
use crate::pool::{TypeId, ValueId};
use crate::types::IrTypeKind;
use crate::value::IrValueKind;
use keel_common::{CompileError, CompileResult, Span};
use keel_parser::{SpecialGlobal, TypeElem, TypeExpr};
use keel_resolver::ConformMode;

/// Kind tags of the emitted type table. The kind-names array mirrors this
/// order exactly.
pub const ANY_TYPE_KIND_NAMES: [&str; 16] = [
    "void", "ptr", "byte", "ubyte", "short", "ushort", "int", "uint", "long", "ulong",
    "float", "double", "bool", "struct", "func_ptr", "fixed_array",
];

/// Map an IR type kind to its runtime kind tag. `Half` collapses into
/// `ushort`.
pub fn any_type_kind_id(kind: &IrTypeKind) -> u64 {
    match kind {
        IrTypeKind::None | IrTypeKind::Void | IrTypeKind::Union(_) => 0,
        IrTypeKind::Pointer(_) => 1,
        IrTypeKind::S8 => 2,
        IrTypeKind::U8 => 3,
        IrTypeKind::S16 => 4,
        IrTypeKind::U16 => 5,
        IrTypeKind::U32 => 7,
        IrTypeKind::S32 => 6,
        IrTypeKind::S64 => 8,
        IrTypeKind::U64 => 9,
        IrTypeKind::Float => 10,
        IrTypeKind::Double => 11,
        IrTypeKind::Boolean => 12,
        IrTypeKind::Structure { .. } => 13,
        IrTypeKind::FuncPtr => 14,
        IrTypeKind::FixedArray { .. } => 15,
        IrTypeKind::Half => 5,
    }
}

impl<'l, 'a> FuncBuilder<'l, 'a> {
    /// Generate the stores that initialize module globals, at the entry of
    /// `main`. Special globals emit the runtime type table.
    pub fn lower_global_initializers(&mut self) -> CompileResult<()> {
        for global_id in 0..self.lw.ast.globals.len() {
            let global = &self.lw.ast.globals[global_id];
            if global.external {
                continue;
            }

            match &global.initial {
                Some(initial) => {
                    let target_type = global.ty.clone();
                    let (value, value_type) = self.lower_expr(initial, false)?;
                    let conformed = self
                        .conform_value(value, &value_type, &target_type, ConformMode::Primitives)?
                        .ok_or_else(|| {
                            CompileError::type_error(format!(
                                "incompatible types '{}' and '{}'",
                                value_type, target_type
                            ))
                        })?;
                    let destination = self.build_gvarptr(global_id)?;
                    management_assign(self, conformed, destination, &target_type, true)?;
                }
                None => {
                    if let Some(kind) = self.lw.ast.globals[global_id].special_kind() {
                        self.lower_special_global(global_id, kind)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn lower_special_global(
        &mut self,
        global_id: usize,
        kind: SpecialGlobal,
    ) -> CompileResult<()> {
        let no_type_info = self.lw.ctx.flags.no_type_info;
        let destination = self.build_gvarptr(global_id)?;

        match kind {
            SpecialGlobal::TypesLength => {
                let length = if no_type_info {
                    0
                } else {
                    self.lw.type_table.reduce();
                    self.lw.type_table.len() as u64
                };
                let value = self.literal_usize(length);
                self.build_store(value, destination);
            }
            SpecialGlobal::TypeKindsLength => {
                let length = if no_type_info { 0 } else { ANY_TYPE_KIND_NAMES.len() as u64 };
                let value = self.literal_usize(length);
                self.build_store(value, destination);
            }
            SpecialGlobal::TypeKinds => {
                let ubyte_ptr = self.lw.module.common.ubyte_ptr;
                let ubyte_ptr_ptr = self.lw.module.pool.pointer_to(ubyte_ptr);

                let value = if no_type_info {
                    self.null_of(ubyte_ptr_ptr)
                } else {
                    let names: Vec<ValueId> = ANY_TYPE_KIND_NAMES
                        .iter()
                        .map(|name| self.cstr_of_len(name))
                        .collect();
                    self.lw
                        .module
                        .pool
                        .add_value(ubyte_ptr_ptr, IrValueKind::ArrayLiteral(names))
                };
                self.build_store(value, destination);
            }
            SpecialGlobal::Types => self.lower_types_table(destination)?,
        }
        Ok(())
    }

    fn lower_types_table(&mut self, destination: ValueId) -> CompileResult<()> {
        let any_type = self.injected_type("AnyType")?;
        let any_type_ptr = self.lw.module.pool.pointer_to(any_type);
        let any_type_ptr_ptr = self.lw.module.pool.pointer_to(any_type_ptr);

        if self.lw.ctx.flags.no_type_info {
            let null = self.null_of(any_type_ptr_ptr);
            self.build_store(null, destination);
            return Ok(());
        }

        let any_ptr_type = self.injected_type("AnyPtrType")?;
        let any_struct_type = self.injected_type("AnyStructType")?;
        let any_funcptr_type = self.injected_type("AnyFuncPtrType")?;
        let any_fixed_array_type = self.injected_type("AnyFixedArrayType")?;

        self.lw.type_table.reduce();

        // Resolve every record's IR type first; variant selection and the
        // subtype back-references need them all.
        for index in 0..self.lw.type_table.len() {
            let ast_type = self.lw.type_table.records()[index].ast_type.clone();
            let ir_type = self.lw.resolve_type(&ast_type, false)?;
            self.lw.type_table.record_mut(index).ir_type = Some(ir_type);
        }

        let record_count = self.lw.type_table.len();
        let mut variant_types = Vec::with_capacity(record_count);
        let mut record_values = Vec::with_capacity(record_count);
        let mut anon_ids = Vec::with_capacity(record_count);

        for index in 0..record_count {
            let ir_type = self.lw.type_table.records()[index]
                .ir_type
                .ok_or_else(|| CompileError::internal("type table record left unresolved"))?;
            let variant = match self.lw.module.pool.type_kind(ir_type) {
                IrTypeKind::Pointer(_) => any_ptr_type,
                IrTypeKind::Structure { .. } => any_struct_type,
                IrTypeKind::FuncPtr => any_funcptr_type,
                IrTypeKind::FixedArray { .. } => any_fixed_array_type,
                _ => any_type,
            };
            let (anon_id, value) = self.build_anon_global(variant, true);
            variant_types.push(variant);
            record_values.push(value);
            anon_ids.push(anon_id);
        }

        for index in 0..record_count {
            let record = &self.lw.type_table.records()[index];
            let record_name = record.name.clone();
            let record_ast_type = record.ast_type.clone();
            let is_alias = record.is_alias;
            let ir_type = record.ir_type.expect("resolved above");
            let variant = variant_types[index];

            let kind_id = any_type_kind_id(self.lw.module.pool.type_kind(ir_type));
            let mut members = vec![
                self.literal_usize(kind_id),
                self.cstr_of_len(&record_name),
                self.literal_bool(is_alias),
            ];

            match self.lw.module.pool.type_kind(ir_type).clone() {
                IrTypeKind::Pointer(_) => {
                    let subtype = self.table_back_reference(
                        &record_values,
                        any_type_ptr,
                        dereference_written(&record_ast_type),
                    );
                    members.push(subtype);
                }
                IrTypeKind::Structure { subtypes, packed } => {
                    self.push_struct_record_members(
                        &mut members,
                        &record_ast_type,
                        &record_values,
                        any_type_ptr,
                        subtypes.len(),
                        packed,
                    )?;
                }
                IrTypeKind::FixedArray { length, .. } => {
                    let subtype = self.table_back_reference(
                        &record_values,
                        any_type_ptr,
                        strip_fixed_array(&record_ast_type),
                    );
                    members.push(subtype);
                    let length = self.literal_usize(length);
                    members.push(length);
                }
                _ => {}
            }

            let initializer = self
                .lw
                .module
                .pool
                .add_value(variant, IrValueKind::StructLiteral(members));
            self.lw.module.set_anon_global_initializer(anon_ids[index], initializer);

            if variant != any_type {
                record_values[index] = self
                    .lw
                    .module
                    .pool
                    .add_value(any_type_ptr, IrValueKind::ConstBitcast(record_values[index]));
            }
        }

        let table_value = self
            .lw
            .module
            .pool
            .add_value(any_type_ptr_ptr, IrValueKind::ArrayLiteral(record_values));
        self.build_store(table_value, destination);
        Ok(())
    }

    /// struct AnyStructType (kind, name, is_alias, members **AnyType,
    /// length usize, offsets *usize, member_names **ubyte, is_packed bool)
    ///
    /// Member offsets are placeholder zeros here; the code generator fills
    /// them once layout is known.
    fn push_struct_record_members(
        &mut self,
        members: &mut Vec<ValueId>,
        record_ast_type: &TypeExpr,
        record_values: &[ValueId],
        any_type_ptr: TypeId,
        expected_field_count: usize,
        packed: bool,
    ) -> CompileResult<()> {
        let struct_name = record_ast_type.base_name().unwrap_or_default().to_string();
        let structure = self.lw.ast.find_struct(&struct_name).ok_or_else(|| {
            CompileError::internal(format!(
                "failed to find struct '{}' while generating the runtime type table",
                struct_name
            ))
        })?;

        if structure.field_count() != expected_field_count {
            return Err(CompileError::internal(format!(
                "mismatching member counts of IR and AST types for struct '{}' \
                 while generating the runtime type table",
                struct_name
            )));
        }

        let field_types = structure.field_types.clone();
        let field_names = structure.field_names.clone();

        let mut field_members = Vec::with_capacity(field_types.len());
        let mut field_offsets = Vec::with_capacity(field_types.len());
        let mut member_names = Vec::with_capacity(field_types.len());

        for (field_type, field_name) in field_types.iter().zip(field_names.iter()) {
            let back_reference =
                self.table_back_reference(record_values, any_type_ptr, Some(field_type.clone()));
            field_members.push(back_reference);
            field_offsets.push(self.literal_usize(0));
            member_names.push(self.cstr_of_len(field_name));
        }

        let usize_ptr = self.lw.module.common.usize_ptr;
        let ubyte_ptr = self.lw.module.common.ubyte_ptr;
        let ubyte_ptr_ptr = self.lw.module.pool.pointer_to(ubyte_ptr);
        let any_type_ptr_ptr = self.lw.module.pool.pointer_to(any_type_ptr);

        let members_array = self
            .lw
            .module
            .pool
            .add_value(any_type_ptr_ptr, IrValueKind::ArrayLiteral(field_members));
        let length = self.literal_usize(field_types.len() as u64);
        let offsets_array = self
            .lw
            .module
            .pool
            .add_value(usize_ptr, IrValueKind::ArrayLiteral(field_offsets));
        let names_array = self
            .lw
            .module
            .pool
            .add_value(ubyte_ptr_ptr, IrValueKind::ArrayLiteral(member_names));
        let packed_flag = self.literal_bool(packed);

        members.push(members_array);
        members.push(length);
        members.push(offsets_array);
        members.push(names_array);
        members.push(packed_flag);
        Ok(())
    }

    /// A `*AnyType` reference back into the table for a written type, or a
    /// null pointer when the type never appears in the table.
    fn table_back_reference(
        &mut self,
        record_values: &[ValueId],
        any_type_ptr: TypeId,
        written: Option<TypeExpr>,
    ) -> ValueId {
        let index = written
            .map(|ty| ty.to_string())
            .and_then(|name| self.lw.type_table.find(&name));

        match index {
            Some(index) => self
                .lw
                .module
                .pool
                .add_value(any_type_ptr, IrValueKind::ConstBitcast(record_values[index])),
            None => self.null_of(any_type_ptr),
        }
    }

    /// An anonymous global plus the value referencing it.
    fn build_anon_global(&mut self, ty: TypeId, constant: bool) -> (usize, ValueId) {
        let anon_id = self.lw.module.add_anon_global(ty, constant);
        let pointer_type = self.lw.module.pool.pointer_to(ty);
        let kind = if constant {
            IrValueKind::ConstAnonGlobal(anon_id)
        } else {
            IrValueKind::AnonGlobal(anon_id)
        };
        let value = self.lw.module.pool.add_value(pointer_type, kind);
        (anon_id, value)
    }

    fn injected_type(&mut self, name: &str) -> CompileResult<TypeId> {
        self.lw.module.find_type(name).ok_or_else(|| {
            self.lw.ctx.diagnostics.internal(
                format!(
                    "failed to get '{}' which should've been injected \
                     when building the runtime type table",
                    name
                ),
                Span::none(),
            );
            CompileError::internal(format!("missing injected standard type '{}'", name))
        })
    }
}

/// The written pointee of a pointer-written type, when there is one.
fn dereference_written(ty: &TypeExpr) -> Option<TypeExpr> {
    if ty.elements.len() > 1 && matches!(ty.elements[0], TypeElem::Pointer) {
        ty.dereference()
    } else {
        None
    }
}

/// The written element type of a fixed-array written type.
fn strip_fixed_array(ty: &TypeExpr) -> Option<TypeExpr> {
    if ty.elements.len() > 1 && matches!(ty.elements[0], TypeElem::FixedArray(_)) {
        let mut stripped = ty.clone();
        stripped.elements.remove(0);
        Some(stripped)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_match_tag_order() {
        assert_eq!(ANY_TYPE_KIND_NAMES.len(), 16);
        assert_eq!(ANY_TYPE_KIND_NAMES[1], "ptr");
        assert_eq!(ANY_TYPE_KIND_NAMES[13], "struct");
        assert_eq!(ANY_TYPE_KIND_NAMES[15], "fixed_array");
    }

    #[test]
    fn test_half_collapses_to_ushort() {
        assert_eq!(any_type_kind_id(&IrTypeKind::Half), 5);
        assert_eq!(any_type_kind_id(&IrTypeKind::U16), 5);
    }
}
