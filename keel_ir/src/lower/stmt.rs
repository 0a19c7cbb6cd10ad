//! Statement lowering
//!
//! Structured control flow becomes explicit basic blocks; variables become
//! stack slots; `defer` bodies are replayed in reverse insertion order at
//! every scope exit.

use crate::instruction::Instruction;
use crate::lower::builder::{FuncBuilder, LoopLabel};
use crate::lower::expr::select_math_op;
use crate::lower::management::{management_assign, management_defer_scope};
use crate::scope::VariableTraits;
use crate::value::IrLiteral;
use keel_common::{CompileError, CompileResult, Span};
use keel_parser::{BinaryOp, Expr, Stmt, StmtKind, TypeExpr};
use keel_resolver::ConformMode;

impl<'l, 'a> FuncBuilder<'l, 'a> {
    pub fn lower_stmt(&mut self, stmt: &'a Stmt) -> CompileResult<()> {
        match &stmt.kind {
            StmtKind::Return(value) => self.lower_return(value.as_ref(), stmt.span),
            StmtKind::Call(expr) => {
                self.lower_expr(expr, false)?;
                Ok(())
            }
            StmtKind::Declare { name, ty, value, undef } => {
                self.lower_declare(name, ty, value.as_ref(), *undef, stmt.span)
            }
            StmtKind::Assign { target, value } => self.lower_assign(target, value),
            StmtKind::CompoundAssign { op, target, value } => {
                self.lower_compound_assign(*op, target, value)
            }
            StmtKind::If { condition, body } => {
                self.lower_conditional(condition, body, None, false)
            }
            StmtKind::IfElse { condition, body, else_body } => {
                self.lower_conditional(condition, body, Some(else_body), false)
            }
            StmtKind::Unless { condition, body } => {
                self.lower_conditional(condition, body, None, true)
            }
            StmtKind::UnlessElse { condition, body, else_body } => {
                self.lower_conditional(condition, body, Some(else_body), true)
            }
            StmtKind::While { label, condition, body } => {
                self.lower_loop(label.clone(), condition, body, false)
            }
            StmtKind::Until { label, condition, body } => {
                self.lower_loop(label.clone(), condition, body, true)
            }
            StmtKind::Break => self.lower_break(None),
            StmtKind::BreakTo(label) => self.lower_break(Some(label.as_str())),
            StmtKind::Continue => self.lower_continue(None),
            StmtKind::ContinueTo(label) => self.lower_continue(Some(label.as_str())),
            StmtKind::Defer(inner) => {
                self.defer_stack.push(inner.as_ref());
                Ok(())
            }
            StmtKind::Delete(expr) => {
                let (value, value_type) = self.lower_expr(expr, false)?;
                if !value_type.is_pointer() && !value_type.is_base_of("ptr") {
                    return Err(CompileError::type_error(format!(
                        "can't delete value of non-pointer type '{}'",
                        value_type
                    )));
                }
                self.push(Instruction::Free { value });
                Ok(())
            }
        }
    }

    /// Lower a lexical block: open a scope, collect its defers, and on
    /// normal exit replay the defers and the scope's `__defer__` calls.
    pub fn lower_block(&mut self, statements: &'a [Stmt]) -> CompileResult<()> {
        let previous_scope = self.current_scope;
        let scope = self.scopes.open(previous_scope);
        self.current_scope = scope;
        let defer_base = self.defer_stack.len();

        for stmt in statements {
            self.lower_stmt(stmt)?;
        }

        if !self.blocks[self.current].is_terminated() {
            self.unravel_defers(defer_base)?;
            management_defer_scope(self, scope)?;
        }

        self.defer_stack.truncate(defer_base);
        self.current_scope = previous_scope;
        Ok(())
    }

    fn lower_return(&mut self, value: Option<&'a Expr>, span: Span) -> CompileResult<()> {
        let ast_func = self.ast_func();
        let is_main_void = ast_func.traits.main && ast_func.return_type.is_void();
        let return_type = ast_func.return_type.clone();
        let func_name = ast_func.name.clone();

        let return_value = match value {
            Some(expr) => {
                if return_type.is_void() && !is_main_void {
                    return Err(CompileError::type_error(format!(
                        "function '{}' returns void, but a value was returned",
                        func_name
                    )));
                }
                let target = if is_main_void {
                    TypeExpr::base("int", span)
                } else {
                    return_type
                };
                let (value, value_type) = self.lower_expr(expr, false)?;
                let conformed = self
                    .conform_value(value, &value_type, &target, ConformMode::Primitives)?
                    .ok_or_else(|| {
                        CompileError::type_error(format!(
                            "can't return value of type '{}' from function '{}' returning '{}'",
                            value_type, func_name, target
                        ))
                    })?;
                Some(conformed)
            }
            None if is_main_void => {
                Some(self.literal(self.lw.module.common.s32, IrLiteral::S32(0)))
            }
            None if return_type.is_void() => None,
            None => {
                return Err(CompileError::type_error(format!(
                    "function '{}' must return a value of type '{}'",
                    func_name, return_type
                )));
            }
        };

        self.unravel_defers(0)?;
        self.emit_scope_defer_calls(self.current_scope, None)?;
        self.push(Instruction::Return(return_value));
        Ok(())
    }

    fn lower_declare(
        &mut self,
        name: &str,
        ty: &TypeExpr,
        value: Option<&'a Expr>,
        undef: bool,
        _span: Span,
    ) -> CompileResult<()> {
        if self
            .scopes
            .variables(self.current_scope)
            .iter()
            .any(|v| v.name == name)
        {
            return Err(CompileError::resolve(format!(
                "duplicate variable '{}'",
                name
            )));
        }

        let ir_type = self.lw.resolve_type(ty, true)?;
        let variable_id = self.next_var_id;
        self.next_var_id += 1;
        self.scopes.add_variable(
            self.current_scope,
            name,
            variable_id,
            ir_type,
            ty.clone(),
            VariableTraits { pod: false, undef },
        );

        match value {
            None if undef => {}
            None => {
                self.push(Instruction::VarZeroInit { variable_id });
            }
            Some(expr) => {
                let (value, value_type) = self.lower_expr(expr, false)?;
                let conformed = self
                    .conform_value(value, &value_type, ty, ConformMode::Primitives)?
                    .ok_or_else(|| {
                        CompileError::type_error(format!(
                            "incompatible types '{}' and '{}'",
                            value_type, ty
                        ))
                    })?;
                let destination = self.build_varptr(ir_type, variable_id)?;
                management_assign(self, conformed, destination, ty, true)?;
            }
        }
        Ok(())
    }

    fn lower_assign(&mut self, target: &'a Expr, value: &'a Expr) -> CompileResult<()> {
        let (destination, target_type) = self.lower_expr(target, true)?;
        let (value, value_type) = self.lower_expr(value, false)?;

        let conformed = self
            .conform_value(value, &value_type, &target_type, ConformMode::Primitives)?
            .ok_or_else(|| {
                CompileError::type_error(format!(
                    "incompatible types '{}' and '{}'",
                    value_type, target_type
                ))
            })?;

        management_assign(self, conformed, destination, &target_type, false)
    }

    fn lower_compound_assign(
        &mut self,
        op: BinaryOp,
        target: &'a Expr,
        value: &'a Expr,
    ) -> CompileResult<()> {
        let (destination, target_type) = self.lower_expr(target, true)?;
        let loaded = self.build_load(destination)?;

        let (value, value_type) = self.lower_expr(value, false)?;
        let conformed = self
            .conform_value(value, &value_type, &target_type, ConformMode::Primitives)?
            .ok_or_else(|| {
                CompileError::type_error(format!(
                    "incompatible types '{}' and '{}'",
                    value_type, target_type
                ))
            })?;

        let operand_type = self.lw.module.pool.value_type(loaded);
        let kind = self.lw.module.pool.type_kind(operand_type).clone();
        let math_op = select_math_op(op, &kind).ok_or_else(|| {
            CompileError::type_error(format!(
                "operator '{}' does not apply to type '{}'",
                op, target_type
            ))
        })?;

        let result = self.push_valued(Instruction::Math {
            op: math_op,
            a: loaded,
            b: conformed,
            result_type: operand_type,
        })?;
        self.build_store(result, destination);
        Ok(())
    }

    fn lower_conditional(
        &mut self,
        condition: &'a Expr,
        body: &'a [Stmt],
        else_body: Option<&'a [Stmt]>,
        inverted: bool,
    ) -> CompileResult<()> {
        let condition = self.lower_condition(condition)?;

        // The merge block can only be created after the branch bodies (so
        // their nested blocks come first); the conditional branch targets
        // are patched once it exists.
        let condbr_at = self.push(Instruction::ConditionalBranch {
            condition,
            true_block: usize::MAX,
            false_block: usize::MAX,
        });

        let then_block = self.new_block();
        self.use_block(then_block);
        self.lower_block(body)?;
        let then_exit =
            (!self.blocks[self.current].is_terminated()).then_some(self.current);

        let (else_target, else_exit) = match else_body {
            None => (None, None),
            Some(else_body) => {
                let else_block = self.new_block();
                self.use_block(else_block);
                self.lower_block(else_body)?;
                let else_exit =
                    (!self.blocks[self.current].is_terminated()).then_some(self.current);
                (Some(else_block), else_exit)
            }
        };

        let merge_block = self.new_block();
        let on_false = else_target.unwrap_or(merge_block);

        let (true_block, false_block) = if inverted {
            (on_false, then_block)
        } else {
            (then_block, on_false)
        };
        if let Instruction::ConditionalBranch {
            true_block: patched_true,
            false_block: patched_false,
            ..
        } = &mut self.blocks[condbr_at.0].instructions[condbr_at.1]
        {
            *patched_true = true_block;
            *patched_false = false_block;
        }

        for exit in [then_exit, else_exit].into_iter().flatten() {
            self.blocks[exit]
                .instructions
                .push(Instruction::Branch { block: merge_block });
        }

        self.use_block(merge_block);
        Ok(())
    }

    fn lower_loop(
        &mut self,
        label: Option<String>,
        condition: &'a Expr,
        body: &'a [Stmt],
        inverted: bool,
    ) -> CompileResult<()> {
        let header = self.new_block();
        self.build_branch(header);
        self.use_block(header);

        let condition = self.lower_condition(condition)?;

        let body_block = self.new_block();
        let exit_block = self.new_block();

        if inverted {
            self.build_cond_branch(condition, exit_block, body_block);
        } else {
            self.build_cond_branch(condition, body_block, exit_block);
        }

        self.label_stack.push(LoopLabel {
            label,
            break_block: exit_block,
            continue_block: header,
            unravel_point: self.defer_stack.len(),
            scope: self.current_scope,
        });

        self.use_block(body_block);
        self.lower_block(body)?;
        if !self.blocks[self.current].is_terminated() {
            self.build_branch(header);
        }

        self.label_stack.pop();
        self.use_block(exit_block);
        Ok(())
    }

    /// Lower a condition expression and conform it to bool.
    fn lower_condition(&mut self, condition: &'a Expr) -> CompileResult<crate::pool::ValueId> {
        let bool_type = TypeExpr::base("bool", condition.span);
        let (value, value_type) = self.lower_expr(condition, false)?;
        self.conform_value(value, &value_type, &bool_type, ConformMode::Primitives)?
            .ok_or_else(|| {
                CompileError::type_error(format!(
                    "expected conditional expression to be 'bool', got '{}'",
                    value_type
                ))
            })
    }

    fn lower_break(&mut self, label: Option<&str>) -> CompileResult<()> {
        let entry = self.find_label(label).cloned().ok_or_else(|| match label {
            Some(name) => CompileError::resolve(format!("undeclared loop label '{}'", name)),
            None => CompileError::resolve("'break' outside of a loop"),
        })?;

        self.unravel_defers(entry.unravel_point)?;
        self.emit_scope_defer_calls(self.current_scope, Some(entry.scope))?;
        self.build_branch(entry.break_block);
        Ok(())
    }

    fn lower_continue(&mut self, label: Option<&str>) -> CompileResult<()> {
        let entry = self.find_label(label).cloned().ok_or_else(|| match label {
            Some(name) => CompileError::resolve(format!("undeclared loop label '{}'", name)),
            None => CompileError::resolve("'continue' outside of a loop"),
        })?;

        self.unravel_defers(entry.unravel_point)?;
        self.emit_scope_defer_calls(self.current_scope, Some(entry.scope))?;
        self.build_branch(entry.continue_block);
        Ok(())
    }
}
