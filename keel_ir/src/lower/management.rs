//! Management method insertion
//!
//! When a user-defined struct defines one of the operator-like methods
//! (`__defer__`, `__pass__`, `__assign__`, `__add__`, ...) the lowerer
//! inserts calls to them automatically. Absence of a method is never an
//! error by itself; only sites where no built-in applies surface as type
//! errors.

use crate::instruction::Instruction;
use crate::lower::builder::FuncBuilder;
use crate::pool::ValueId;
use keel_common::CompileResult;
use keel_parser::{BinaryOp, TypeExpr};
use keel_resolver::{find_func_conforming, find_method_conforming};

/// The operator overload name for a binary operator, when one exists.
pub fn math_overload_name(op: BinaryOp) -> Option<&'static str> {
    Some(match op {
        BinaryOp::Add => "__add__",
        BinaryOp::Subtract => "__subtract__",
        BinaryOp::Multiply => "__multiply__",
        BinaryOp::Divide => "__divide__",
        BinaryOp::Modulus => "__modulus__",
        BinaryOp::Equals => "__equals__",
        BinaryOp::NotEquals => "__not_equals__",
        BinaryOp::LessThan => "__less_than__",
        BinaryOp::GreaterThan => "__greater_than__",
        BinaryOp::LessThanEq => "__less_than_or_equal__",
        BinaryOp::GreaterThanEq => "__greater_than_or_equal__",
        BinaryOp::And | BinaryOp::Or => return None,
    })
}

/// The name of the struct a written type directly denotes, when that
/// struct exists.
fn struct_base_name<'b>(builder: &FuncBuilder<'_, 'b>, ty: &TypeExpr) -> Option<String> {
    let name = ty.base_name()?;
    builder.lw.ast.find_struct(name)?;
    Some(name.to_string())
}

/// Insert `__defer__` calls for every stack variable of the scope, in
/// reverse declaration order.
pub fn management_defer_scope(builder: &mut FuncBuilder, scope: usize) -> CompileResult<()> {
    let variables: Vec<_> = builder.scopes.variables(scope).to_vec();

    for variable in variables.iter().rev() {
        if variable.traits.pod {
            continue;
        }
        let Some(struct_name) = struct_base_name(builder, &variable.ast_type) else {
            continue;
        };

        let this_type = variable.ast_type.pointer_to();
        let Ok(func_id) = find_method_conforming(
            &builder.lw.module.methods,
            builder.lw.ast,
            &struct_name,
            "__defer__",
            std::slice::from_ref(&this_type),
        ) else {
            continue;
        };

        let this_pointer = builder.build_varptr(variable.ir_type, variable.id)?;
        let result_type = builder.lw.module.funcs[func_id].return_type;
        builder.push(Instruction::Call {
            result_type,
            func_id,
            args: vec![this_pointer],
        });
    }

    Ok(())
}

/// Insert `__pass__` calls for arguments of struct type, unless the
/// parameter carries the plain-old-data trait.
pub fn management_pass(
    builder: &mut FuncBuilder,
    callee_id: usize,
    values: &mut [ValueId],
    types: &[TypeExpr],
) -> CompileResult<()> {
    for index in 0..values.len() {
        let callee = &builder.lw.ast.funcs[callee_id];
        if callee
            .arg_type_traits
            .get(index)
            .map(|traits| traits.pod)
            .unwrap_or(false)
        {
            continue;
        }

        let arg_type = callee.arg_types.get(index).unwrap_or(&types[index]).clone();
        let Some(_) = struct_base_name(builder, &arg_type) else {
            continue;
        };

        // `__pass__` has the conceptual signature `(arg: S) -> S`.
        let Ok(func_id) = find_func_conforming(
            &builder.lw.module.func_mappings,
            builder.lw.ast,
            "__pass__",
            std::slice::from_ref(&arg_type),
        ) else {
            continue;
        };

        let result_type = builder.lw.module.funcs[func_id].return_type;
        values[index] = builder.push_valued(Instruction::Call {
            result_type,
            func_id,
            args: vec![values[index]],
        })?;
    }

    Ok(())
}

/// Assign a value into a destination, going through the struct's
/// `__assign__` when one exists and falling back to a plain store.
pub fn management_assign(
    builder: &mut FuncBuilder,
    value: ValueId,
    destination: ValueId,
    ty: &TypeExpr,
    _fresh_memory: bool,
) -> CompileResult<()> {
    if let Some(struct_name) = struct_base_name(builder, ty) {
        let this_type = ty.pointer_to();
        let arg_types = [this_type, ty.clone()];

        // `__assign__` may be written as a method (`this *S, src S`) or a
        // free function (`dst *S, src S`).
        let found = find_method_conforming(
            &builder.lw.module.methods,
            builder.lw.ast,
            &struct_name,
            "__assign__",
            &arg_types,
        )
        .or_else(|_| {
            find_func_conforming(
                &builder.lw.module.func_mappings,
                builder.lw.ast,
                "__assign__",
                &arg_types,
            )
        });

        if let Ok(func_id) = found {
            let result_type = builder.lw.module.funcs[func_id].return_type;
            builder.push(Instruction::Call {
                result_type,
                func_id,
                args: vec![destination, value],
            });
            return Ok(());
        }
    }

    builder.build_store(value, destination);
    Ok(())
}

/// Operator fallback: called when the built-in opcode does not apply to
/// the operand type. Returns the call's value and result type when the
/// struct provides the operator method.
pub fn management_math<'l, 'a>(
    builder: &mut FuncBuilder<'l, 'a>,
    op: BinaryOp,
    a: ValueId,
    b: ValueId,
    operand_type: &TypeExpr,
) -> CompileResult<Option<(ValueId, TypeExpr)>> {
    let Some(overload_name) = math_overload_name(op) else {
        return Ok(None);
    };
    if struct_base_name(builder, operand_type).is_none() {
        return Ok(None);
    }

    let arg_types = [operand_type.clone(), operand_type.clone()];
    let Ok(func_id) = find_func_conforming(
        &builder.lw.module.func_mappings,
        builder.lw.ast,
        overload_name,
        &arg_types,
    ) else {
        return Ok(None);
    };

    let return_ast_type = builder.lw.ast.funcs[func_id].return_type.clone();
    let result_type = builder.lw.module.funcs[func_id].return_type;
    let value = builder.push_valued(Instruction::Call {
        result_type,
        func_id,
        args: vec![a, b],
    })?;
    Ok(Some((value, return_ast_type)))
}
