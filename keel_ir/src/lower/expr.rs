//! Expression lowering
//!
//! Expressions lower to typed pool values. L-value-capable expressions can
//! be lowered "mutable", yielding a pointer to the storage instead of the
//! loaded value. Binary operators dispatch on the unified operand's IR
//! type kind; integer signedness selects between the signed and unsigned
//! opcodes.

use crate::instruction::{CastOp, Instruction, MathOp};
use crate::lower::builder::FuncBuilder;
use crate::lower::management::{management_math, management_pass};
use crate::pool::ValueId;
use crate::types::{type_category, IrTypeKind, TypeCategory};
use crate::value::{IrLiteral, IrValueKind};
use keel_common::{CompileError, CompileResult, Span};
use keel_parser::{BinaryOp, Expr, ExprKind, TypeElem, TypeExpr};
use keel_resolver::{
    classify_primitive, find_func_conforming, find_method_conforming, nearest_name,
    ConformMode, NumericClass,
};

/// Select the opcode for a binary operator applied to an IR type kind.
/// Pointers and booleans compare as unsigned integers. `None` means the
/// built-in opcode does not apply.
pub fn select_math_op(op: BinaryOp, kind: &IrTypeKind) -> Option<MathOp> {
    use TypeCategory::{FloatingPoint as F, SignedInteger as S, UnsignedInteger as U};

    let category = type_category(kind);
    if category == TypeCategory::None {
        return None;
    }

    Some(match (op, category) {
        (BinaryOp::Add, S) | (BinaryOp::Add, U) => MathOp::Add,
        (BinaryOp::Add, F) => MathOp::FAdd,
        (BinaryOp::Subtract, S) | (BinaryOp::Subtract, U) => MathOp::Subtract,
        (BinaryOp::Subtract, F) => MathOp::FSubtract,
        (BinaryOp::Multiply, S) | (BinaryOp::Multiply, U) => MathOp::Multiply,
        (BinaryOp::Multiply, F) => MathOp::FMultiply,
        (BinaryOp::Divide, S) => MathOp::SDivide,
        (BinaryOp::Divide, U) => MathOp::UDivide,
        (BinaryOp::Divide, F) => MathOp::FDivide,
        (BinaryOp::Modulus, S) => MathOp::SModulus,
        (BinaryOp::Modulus, U) => MathOp::UModulus,
        (BinaryOp::Modulus, F) => MathOp::FModulus,
        (BinaryOp::Equals, S) | (BinaryOp::Equals, U) => MathOp::Equals,
        (BinaryOp::Equals, F) => MathOp::FEquals,
        (BinaryOp::NotEquals, S) | (BinaryOp::NotEquals, U) => MathOp::NotEquals,
        (BinaryOp::NotEquals, F) => MathOp::FNotEquals,
        (BinaryOp::LessThan, S) => MathOp::SLesser,
        (BinaryOp::LessThan, U) => MathOp::ULesser,
        (BinaryOp::LessThan, F) => MathOp::FLesser,
        (BinaryOp::GreaterThan, S) => MathOp::SGreater,
        (BinaryOp::GreaterThan, U) => MathOp::UGreater,
        (BinaryOp::GreaterThan, F) => MathOp::FGreater,
        (BinaryOp::LessThanEq, S) => MathOp::SLesserEq,
        (BinaryOp::LessThanEq, U) => MathOp::ULesserEq,
        (BinaryOp::LessThanEq, F) => MathOp::FLesserEq,
        (BinaryOp::GreaterThanEq, S) => MathOp::SGreaterEq,
        (BinaryOp::GreaterThanEq, U) => MathOp::UGreaterEq,
        (BinaryOp::GreaterThanEq, F) => MathOp::FGreaterEq,
        _ => return None,
    })
}

fn is_generic(ty: &TypeExpr) -> bool {
    ty.elements.len() == 1
        && matches!(ty.elements[0], TypeElem::GenericInt | TypeElem::GenericFloat)
}

impl<'l, 'a> FuncBuilder<'l, 'a> {
    /// Lower an expression. With `leave_mutable`, l-value expressions yield
    /// a pointer to their storage and the returned written type is still
    /// the type of the value itself.
    pub fn lower_expr(
        &mut self,
        expr: &'a Expr,
        leave_mutable: bool,
    ) -> CompileResult<(ValueId, TypeExpr)> {
        let span = expr.span;
        match &expr.kind {
            ExprKind::ByteLit(v) => self.lower_typed_literal("byte", IrLiteral::S8(*v as i8), span),
            ExprKind::UbyteLit(v) => {
                self.lower_typed_literal("ubyte", IrLiteral::U8(*v as u8), span)
            }
            ExprKind::ShortLit(v) => {
                self.lower_typed_literal("short", IrLiteral::S16(*v as i16), span)
            }
            ExprKind::UshortLit(v) => {
                self.lower_typed_literal("ushort", IrLiteral::U16(*v as u16), span)
            }
            ExprKind::IntLit(v) => self.lower_typed_literal("int", IrLiteral::S32(*v as i32), span),
            ExprKind::UintLit(v) => {
                self.lower_typed_literal("uint", IrLiteral::U32(*v as u32), span)
            }
            ExprKind::LongLit(v) => self.lower_typed_literal("long", IrLiteral::S64(*v), span),
            ExprKind::UlongLit(v) => {
                self.lower_typed_literal("ulong", IrLiteral::U64(*v as u64), span)
            }
            ExprKind::FloatLit(v) => self.lower_typed_literal("float", IrLiteral::Float(*v), span),
            ExprKind::DoubleLit(v) => {
                self.lower_typed_literal("double", IrLiteral::Double(*v), span)
            }
            ExprKind::BoolLit(v) => {
                let value = self.literal_bool(*v);
                Ok((value, TypeExpr::base("bool", span)))
            }
            ExprKind::GenericInt(v) => {
                let long = self.lw.resolve_type(&TypeExpr::base("long", span), false)?;
                let value = self.literal(long, IrLiteral::S64(*v));
                Ok((value, TypeExpr::generic_int(span)))
            }
            ExprKind::GenericFloat(v) => {
                let double = self.lw.resolve_type(&TypeExpr::base("double", span), false)?;
                let value = self.literal(double, IrLiteral::Double(*v));
                Ok((value, TypeExpr::generic_float(span)))
            }
            ExprKind::CStringLit(text) => {
                let value = self.cstr_of_len(text);
                Ok((value, TypeExpr::base_ptr("ubyte", span)))
            }
            ExprKind::StringLit(text) => self.lower_string_literal(text, span),
            ExprKind::Null => {
                let value = self.null_of(self.lw.module.common.ubyte_ptr);
                Ok((value, TypeExpr::base("ptr", span)))
            }
            ExprKind::Variable(name) => self.lower_variable(name, span, leave_mutable),
            ExprKind::Call { name, args } => self.lower_call(name, args, span),
            ExprKind::MethodCall { value, name, args } => {
                self.lower_method_call(value, name, args, span)
            }
            ExprKind::Member { value, field } => {
                self.lower_member(value, field, span, leave_mutable)
            }
            ExprKind::AddressOf(inner) => {
                let (pointer, inner_type) = self.lower_expr(inner, true)?;
                Ok((pointer, inner_type.pointer_to()))
            }
            ExprKind::Dereference(inner) => {
                let (value, value_type) = self.lower_expr(inner, false)?;
                let pointee = value_type.dereference().ok_or_else(|| {
                    CompileError::type_error(format!(
                        "can't dereference value of non-pointer type '{}'",
                        value_type
                    ))
                })?;
                if leave_mutable {
                    Ok((value, pointee))
                } else {
                    let loaded = self.build_load(value)?;
                    Ok((loaded, pointee))
                }
            }
            ExprKind::ArrayIndex { value, index } => {
                self.lower_array_index(value, index, leave_mutable)
            }
            ExprKind::Cast { to, value } => {
                let (inner, inner_type) = self.lower_expr(value, false)?;
                let conformed = self
                    .conform_value(inner, &inner_type, to, ConformMode::All)?
                    .ok_or_else(|| {
                        CompileError::type_error(format!(
                            "can't cast type '{}' to type '{}'",
                            inner_type, to
                        ))
                    })?;
                Ok((conformed, to.clone()))
            }
            ExprKind::Sizeof(ty) => {
                let target = self.lw.resolve_type(ty, true)?;
                let usize_ty = self.lw.module.common.usize_ty;
                let value =
                    self.push_valued(Instruction::Sizeof { result_type: usize_ty, ty: target })?;
                Ok((value, TypeExpr::base("usize", span)))
            }
            ExprKind::New { ty, amount } => self.lower_new(ty, amount.as_deref(), span),
            ExprKind::FuncAddress { name } => self.lower_func_address(name, span),
            ExprKind::Not(inner) => {
                let (value, value_type) = self.lower_expr(inner, false)?;
                let kind = self.lw.module.pool.type_kind(self.lw.module.pool.value_type(value));
                if type_category(kind) == TypeCategory::None {
                    return Err(CompileError::type_error(format!(
                        "can't use operator '!' on type '{}'",
                        value_type
                    )));
                }
                let boolean = self.lw.module.common.boolean;
                let value = self.build_cast(CastOp::IsZero, value, boolean)?;
                Ok((value, TypeExpr::base("bool", span)))
            }
            ExprKind::Binary { op, a, b } => self.lower_binary(*op, a, b, span),
        }
    }

    fn lower_typed_literal(
        &mut self,
        type_name: &str,
        literal: IrLiteral,
        span: Span,
    ) -> CompileResult<(ValueId, TypeExpr)> {
        let ast_type = TypeExpr::base(type_name, span);
        let ir_type = self.lw.resolve_type(&ast_type, false)?;
        let value = self.literal(ir_type, literal);
        Ok((value, ast_type))
    }

    /// `"…"` literals build a `String` struct value; the standard library
    /// provides the struct.
    fn lower_string_literal(
        &mut self,
        text: &str,
        span: Span,
    ) -> CompileResult<(ValueId, TypeExpr)> {
        let Some(string_type) = self.lw.module.find_type("String") else {
            return Err(CompileError::type_error(
                "can't create a string literal without a 'String' struct",
            ));
        };
        let cstr = self.cstr_of_len(text);
        let length = self.literal_usize(text.len() as u64);
        let value = self.lw.module.pool.add_value(
            string_type,
            IrValueKind::StructConstruction(vec![cstr, length]),
        );
        Ok((value, TypeExpr::base("String", span)))
    }

    /// Variable lookup order: local scopes innermost first (parameters live
    /// in the root scope), then module globals, then constants, then enum
    /// kinds.
    fn lower_variable(
        &mut self,
        name: &str,
        span: Span,
        leave_mutable: bool,
    ) -> CompileResult<(ValueId, TypeExpr)> {
        if let Some(variable) = self.scopes.find(self.current_scope, name).cloned() {
            let pointer = self.build_varptr(variable.ir_type, variable.id)?;
            let value = if leave_mutable {
                pointer
            } else {
                self.build_load(pointer)?
            };
            return Ok((value, variable.ast_type));
        }

        if let Some((global_id, global)) = self.lw.ast.find_global(name) {
            let ast_type = global.ty.clone();
            let pointer = self.build_gvarptr(global_id)?;
            let value = if leave_mutable {
                pointer
            } else {
                self.build_load(pointer)?
            };
            return Ok((value, ast_type));
        }

        if let Some(constant) = self.lw.ast.find_constant(name) {
            if leave_mutable {
                return Err(CompileError::type_error(format!(
                    "constant '{}' is not mutable",
                    name
                )));
            }
            return self.lower_expr(&constant.value, false);
        }

        if let Some((_, kind_index)) = self.lw.ast.find_enum_kind(name) {
            if leave_mutable {
                return Err(CompileError::type_error(format!(
                    "enum kind '{}' is not mutable",
                    name
                )));
            }
            let value = self.literal_usize(kind_index as u64);
            return Ok((value, TypeExpr::base("usize", span)));
        }

        let visible = self.scopes.visible_names(self.current_scope);
        let message = match nearest_name(visible.into_iter(), name) {
            Some(suggestion) => format!(
                "undeclared variable '{}' (did you mean '{}'?)",
                name, suggestion
            ),
            None => format!("undeclared variable '{}'", name),
        };
        Err(CompileError::resolve(message))
    }

    fn lower_call(
        &mut self,
        name: &str,
        args: &'a [Expr],
        _span: Span,
    ) -> CompileResult<(ValueId, TypeExpr)> {
        let mut arg_values = Vec::with_capacity(args.len());
        let mut arg_types = Vec::with_capacity(args.len());
        for arg in args {
            let (value, ty) = self.lower_expr(arg, false)?;
            arg_values.push(value);
            arg_types.push(ty);
        }

        let func_id = find_func_conforming(
            &self.lw.module.func_mappings,
            self.lw.ast,
            name,
            &arg_types,
        )?;

        self.materialize_call(func_id, arg_values, arg_types)
    }

    /// Conform argument values to the chosen callee's parameter types,
    /// insert `__pass__` management, and emit the call.
    fn materialize_call(
        &mut self,
        func_id: usize,
        mut arg_values: Vec<ValueId>,
        mut arg_types: Vec<TypeExpr>,
    ) -> CompileResult<(ValueId, TypeExpr)> {
        let callee = &self.lw.ast.funcs[func_id];
        let return_ast_type = callee.return_type.clone();

        for index in 0..callee.arity().min(arg_values.len()) {
            let expected = &self.lw.ast.funcs[func_id].arg_types[index];
            if arg_types[index].identical(expected) {
                continue;
            }
            let expected = expected.clone();
            arg_values[index] = self
                .conform_value(
                    arg_values[index],
                    &arg_types[index],
                    &expected,
                    ConformMode::Primitives,
                )?
                .ok_or_else(|| {
                    CompileError::internal(
                        "selected overload stopped conforming during materialization",
                    )
                })?;
            arg_types[index] = expected;
        }

        management_pass(self, func_id, &mut arg_values, &arg_types)?;

        let result_type = self.lw.module.funcs[func_id].return_type;
        let value = self.push_valued(Instruction::Call {
            result_type,
            func_id,
            args: arg_values,
        })?;
        Ok((value, return_ast_type))
    }

    /// Lower the receiver of `a.b` / `a.b(...)`. Yields a pointer to the
    /// struct value and the struct's name; a `*S` receiver is silently
    /// dereferenced once.
    fn lower_receiver(
        &mut self,
        value_expr: &'a Expr,
    ) -> CompileResult<(ValueId, String, TypeExpr)> {
        let expr_mutable = value_expr.kind.is_mutable();
        let (value, value_type) = self.lower_expr(value_expr, expr_mutable)?;

        if value_type.is_base() {
            if !expr_mutable {
                return Err(CompileError::type_error(
                    "can't access field of immutable value",
                ));
            }
            let struct_name = value_type.base_name().unwrap_or_default().to_string();
            let this_type = value_type.pointer_to();
            return Ok((value, struct_name, this_type));
        }

        if value_type.is_base_ptr() {
            // The receiver is already a pointer; load it once when the
            // expression was lowered mutably.
            let pointer = if expr_mutable {
                self.build_load(value)?
            } else {
                value
            };
            let TypeElem::Base(struct_name) = &value_type.elements[1] else {
                return Err(CompileError::internal("base pointer without base element"));
            };
            return Ok((pointer, struct_name.clone(), value_type));
        }

        Err(CompileError::type_error(format!(
            "can't access members of type '{}'",
            value_type
        )))
    }

    fn lower_member(
        &mut self,
        value_expr: &'a Expr,
        field: &str,
        _span: Span,
        leave_mutable: bool,
    ) -> CompileResult<(ValueId, TypeExpr)> {
        let (pointer, struct_name, _) = self.lower_receiver(value_expr)?;

        let structure = self.lw.ast.find_struct(&struct_name).ok_or_else(|| {
            CompileError::resolve(format!("undeclared struct '{}'", struct_name))
        })?;
        let member = structure.find_field(field).ok_or_else(|| {
            CompileError::type_error(format!(
                "field '{}' does not exist in struct '{}'",
                field, struct_name
            ))
        })?;
        let field_ast_type = structure.field_types[member].clone();

        let field_type = self.lw.resolve_type(&field_ast_type, true)?;
        let result_type = self.lw.module.pool.pointer_to(field_type);
        let field_pointer =
            self.push_valued(Instruction::MemberPtr { result_type, value: pointer, member })?;

        if leave_mutable {
            Ok((field_pointer, field_ast_type))
        } else {
            let loaded = self.build_load(field_pointer)?;
            Ok((loaded, field_ast_type))
        }
    }

    /// `a.b(args)`: when `b` is a field holding a function pointer the call
    /// goes through the field; otherwise `b` is a method of `a`'s struct
    /// and lowers as `call(method_id, [&a, args…])`.
    fn lower_method_call(
        &mut self,
        value_expr: &'a Expr,
        name: &str,
        args: &'a [Expr],
        span: Span,
    ) -> CompileResult<(ValueId, TypeExpr)> {
        let (this_pointer, struct_name, this_type) = self.lower_receiver(value_expr)?;

        let structure = self.lw.ast.find_struct(&struct_name).ok_or_else(|| {
            CompileError::resolve(format!("undeclared struct '{}'", struct_name))
        })?;

        if let Some(member) = structure.find_field(name) {
            let field_ast_type = structure.field_types[member].clone();
            return self.lower_field_call(this_pointer, member, &field_ast_type, args, span);
        }

        let mut arg_values = vec![this_pointer];
        let mut arg_types = vec![this_type];
        for arg in args {
            let (value, ty) = self.lower_expr(arg, false)?;
            arg_values.push(value);
            arg_types.push(ty);
        }

        let func_id = find_method_conforming(
            &self.lw.module.methods,
            self.lw.ast,
            &struct_name,
            name,
            &arg_types,
        )?;

        self.materialize_call(func_id, arg_values, arg_types)
    }

    /// Call through a function-pointer field: `calladdr(load(memberptr), args)`.
    fn lower_field_call(
        &mut self,
        this_pointer: ValueId,
        member: usize,
        field_ast_type: &TypeExpr,
        args: &'a [Expr],
        span: Span,
    ) -> CompileResult<(ValueId, TypeExpr)> {
        let Some(TypeElem::Func(func_elem)) = field_ast_type.elements.first() else {
            return Err(CompileError::type_error(format!(
                "can't call field of non-function type '{}'",
                field_ast_type
            )));
        };
        let return_ast_type = (*func_elem.return_type).clone();
        let expected_types = func_elem.arg_types.clone();

        let field_type = self.lw.resolve_type(field_ast_type, true)?;
        let result_type = self.lw.module.pool.pointer_to(field_type);
        let field_pointer =
            self.push_valued(Instruction::MemberPtr { result_type, value: this_pointer, member })?;
        let address = self.build_load(field_pointer)?;

        if args.len() != expected_types.len() && !func_elem.traits.variadic {
            return Err(CompileError::type_error(format!(
                "function pointer takes {} arguments, got {}",
                expected_types.len(),
                args.len()
            )));
        }

        let mut arg_values = Vec::with_capacity(args.len());
        for (index, arg) in args.iter().enumerate() {
            let (value, ty) = self.lower_expr(arg, false)?;
            let value = match expected_types.get(index) {
                Some(expected) => self
                    .conform_value(value, &ty, expected, ConformMode::Primitives)?
                    .ok_or_else(|| {
                        CompileError::type_error(format!(
                            "incompatible types '{}' and '{}'",
                            ty, expected
                        ))
                    })?,
                None => value,
            };
            arg_values.push(value);
        }

        let return_type = self.lw.resolve_type(&return_ast_type, false)?;
        let value = self.push_valued(Instruction::CallAddress {
            result_type: return_type,
            address,
            args: arg_values,
        })?;
        let _ = span;
        Ok((value, return_ast_type))
    }

    fn lower_array_index(
        &mut self,
        value_expr: &'a Expr,
        index_expr: &'a Expr,
        leave_mutable: bool,
    ) -> CompileResult<(ValueId, TypeExpr)> {
        let (value, value_type) = self.lower_expr(value_expr, false)?;
        let element_type = value_type.dereference().ok_or_else(|| {
            CompileError::type_error(format!(
                "can't index into value of non-pointer type '{}'",
                value_type
            ))
        })?;

        let (index, index_type) = self.lower_expr(index_expr, false)?;
        let index_kind = self.lw.module.pool.type_kind(self.lw.module.pool.value_type(index));
        if !index_kind.is_integer() {
            return Err(CompileError::type_error(format!(
                "can't index with value of non-integer type '{}'",
                index_type
            )));
        }

        let element_ir = self.lw.resolve_type(&element_type, true)?;
        let result_type = self.lw.module.pool.pointer_to(element_ir);
        let element_pointer =
            self.push_valued(Instruction::ArrayPtr { result_type, value, index })?;

        if leave_mutable {
            Ok((element_pointer, element_type))
        } else {
            let loaded = self.build_load(element_pointer)?;
            Ok((loaded, element_type))
        }
    }

    /// `new T` is a `malloc` sized for `T`; `new T * count` multiplies by
    /// the count, which must be an integer.
    fn lower_new(
        &mut self,
        ty: &TypeExpr,
        amount: Option<&'a Expr>,
        _span: Span,
    ) -> CompileResult<(ValueId, TypeExpr)> {
        let alloc_type = self.lw.resolve_type(ty, true)?;

        let amount_value = match amount {
            Some(expr) => {
                let (value, value_type) = self.lower_expr(expr, false)?;
                let kind = self.lw.module.pool.type_kind(self.lw.module.pool.value_type(value));
                if !kind.is_integer() {
                    return Err(CompileError::type_error(format!(
                        "can't specify allocation count using non-integer type '{}'",
                        value_type
                    )));
                }
                Some(value)
            }
            None => None,
        };

        let result_type = self.lw.module.pool.pointer_to(alloc_type);
        let value = self.push_valued(Instruction::Malloc {
            result_type,
            alloc_type,
            amount: amount_value,
        })?;
        Ok((value, ty.pointer_to()))
    }

    /// `func &name` resolves by name only; matching an overload by
    /// argument types is not implemented.
    fn lower_func_address(
        &mut self,
        name: &str,
        span: Span,
    ) -> CompileResult<(ValueId, TypeExpr)> {
        self.lw.ctx.diagnostics.warning(
            format!(
                "function address resolution by argument types is not implemented; \
                 matching '{}' by name only",
                name
            ),
            span,
        );

        let group = self.lw.module.func_mappings.group(name);
        let func_id = group.first().map(|mapping| mapping.func_id).ok_or_else(|| {
            CompileError::resolve(format!("undeclared function '{}'", name))
        })?;

        let funcptr = self.lw.module.common.funcptr;
        let value = self.push_valued(Instruction::FuncAddress {
            result_type: funcptr,
            name: name.to_string(),
            func_id: Some(func_id),
        })?;
        Ok((value, TypeExpr::base("funcptr", span)))
    }

    fn lower_binary(
        &mut self,
        op: BinaryOp,
        a_expr: &'a Expr,
        b_expr: &'a Expr,
        span: Span,
    ) -> CompileResult<(ValueId, TypeExpr)> {
        let (mut a, a_type) = self.lower_expr(a_expr, false)?;
        let (mut b, b_type) = self.lower_expr(b_expr, false)?;

        // `and` / `or` conform both operands to bool.
        if matches!(op, BinaryOp::And | BinaryOp::Or) {
            let bool_type = TypeExpr::base("bool", span);
            for (value, value_type) in [(&mut a, &a_type), (&mut b, &b_type)] {
                *value = self
                    .conform_value(*value, value_type, &bool_type, ConformMode::Primitives)?
                    .ok_or_else(|| {
                        CompileError::type_error(format!(
                            "can't use operator '{}' on type '{}'",
                            op, value_type
                        ))
                    })?;
            }
            let math_op = if op == BinaryOp::And { MathOp::And } else { MathOp::Or };
            let boolean = self.lw.module.common.boolean;
            let value = self.push_valued(Instruction::Math {
                op: math_op,
                a,
                b,
                result_type: boolean,
            })?;
            return Ok((value, bool_type));
        }

        let (a, b, operand_type) = self.unify_math_operands(a, a_type, b, b_type, op)?;

        let operand_ir = self.lw.module.pool.value_type(a);
        let kind = self.lw.module.pool.type_kind(operand_ir).clone();

        let Some(math_op) = select_math_op(op, &kind) else {
            // No built-in opcode applies; try the operator's management
            // method before reporting a type error.
            if let Some(result) = management_math(self, op, a, b, &operand_type)? {
                return Ok(result);
            }
            return Err(CompileError::type_error(format!(
                "operator '{}' does not apply to type '{}'",
                op, operand_type
            )));
        };

        let result_type = if math_op.produces_bool() {
            self.lw.module.common.boolean
        } else {
            operand_ir
        };
        let value = self.push_valued(Instruction::Math { op: math_op, a, b, result_type })?;

        let result_ast_type = if math_op.produces_bool() {
            TypeExpr::base("bool", span)
        } else {
            operand_type
        };
        Ok((value, result_ast_type))
    }

    /// Unify two math operands onto a common type: generic literals adopt
    /// the concrete side, and the narrower numeric operand widens to the
    /// wider one.
    fn unify_math_operands(
        &mut self,
        a: ValueId,
        a_type: TypeExpr,
        b: ValueId,
        b_type: TypeExpr,
        op: BinaryOp,
    ) -> CompileResult<(ValueId, ValueId, TypeExpr)> {
        if a_type.identical(&b_type) {
            return Ok((a, b, a_type));
        }

        let incompatible = |a_type: &TypeExpr, b_type: &TypeExpr| {
            CompileError::type_error(format!(
                "incompatible types '{}' and '{}' for operator '{}'",
                a_type, b_type, op
            ))
        };

        let target = match (is_generic(&a_type), is_generic(&b_type)) {
            (true, false) => b_type.clone(),
            (false, true) => a_type.clone(),
            // A generic int meeting a generic float computes in double.
            (true, true) => TypeExpr::base("double", a_type.span),
            (false, false) => {
                let a_class = a_type.base_name().and_then(classify_primitive);
                let b_class = b_type.base_name().and_then(classify_primitive);
                match (a_class, b_class) {
                    (Some(a_class), Some(b_class)) => {
                        if numeric_rank(b_class) > numeric_rank(a_class) {
                            b_type.clone()
                        } else {
                            a_type.clone()
                        }
                    }
                    // Pointers and structs must match exactly or conform
                    // directly.
                    _ => {
                        if keel_resolver::conform(&b_type, &a_type, ConformMode::Primitives)
                            .is_some()
                        {
                            a_type.clone()
                        } else {
                            return Err(incompatible(&a_type, &b_type));
                        }
                    }
                }
            }
        };

        let a = self
            .conform_value(a, &a_type, &target, ConformMode::Primitives)?
            .ok_or_else(|| incompatible(&a_type, &b_type))?;
        let b = self
            .conform_value(b, &b_type, &target, ConformMode::Primitives)?
            .ok_or_else(|| incompatible(&a_type, &b_type))?;

        Ok((a, b, target))
    }
}

fn numeric_rank(class: NumericClass) -> u32 {
    match class {
        NumericClass::Bool => 1,
        NumericClass::Signed(width) | NumericClass::Unsigned(width) => width as u32,
        NumericClass::Float(width) => 1000 + width as u32,
    }
}
