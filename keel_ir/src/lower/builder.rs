//! The function-level IR builder
//!
//! Holds the blocks being built, the variable scope tree, the defer stack
//! and the label stack for one function, plus the `build_*` helper family
//! the statement and expression lowerers are written against.

use crate::instruction::{BasicBlock, CastOp, Instruction};
use crate::lower::Lowerer;
use crate::pool::{TypeId, ValueId};
use crate::scope::{ScopeTree, VariableTraits};
use crate::value::{IrLiteral, IrValueKind};
use keel_common::{CompileError, CompileResult};
use keel_parser::{Function, Stmt, TypeExpr};
use keel_resolver::{conform, classify_primitive, ConformMode, Conformance, NumericClass};

/// An entry of the label stack: one enclosing loop, with the defer-stack
/// index captured when it was entered (the unravel point) and the scope
/// that surrounds the loop body.
#[derive(Debug, Clone)]
pub struct LoopLabel {
    pub label: Option<String>,
    pub break_block: usize,
    pub continue_block: usize,
    pub unravel_point: usize,
    pub scope: usize,
}

/// Builds the body of a single IR function.
pub struct FuncBuilder<'l, 'a> {
    pub lw: &'l mut Lowerer<'a>,
    pub func_id: usize,
    pub blocks: Vec<BasicBlock>,
    pub current: usize,
    pub scopes: ScopeTree,
    pub current_scope: usize,
    pub next_var_id: usize,
    pub defer_stack: Vec<&'a Stmt>,
    pub label_stack: Vec<LoopLabel>,
}

impl<'l, 'a> FuncBuilder<'l, 'a> {
    /// Lower the body of `func_id` and install it into the module.
    pub fn run(lw: &'l mut Lowerer<'a>, func_id: usize) -> CompileResult<()> {
        let mut builder = FuncBuilder {
            lw,
            func_id,
            blocks: Vec::new(),
            current: 0,
            scopes: ScopeTree::new(),
            current_scope: ScopeTree::ROOT,
            next_var_id: 0,
            defer_stack: Vec::new(),
            label_stack: Vec::new(),
        };
        builder.lower_body()
    }

    pub fn ast_func(&self) -> &'a Function {
        &self.lw.ast.funcs[self.func_id]
    }

    fn lower_body(&mut self) -> CompileResult<()> {
        let ast_func = self.ast_func();

        // Parameters become variables of the root scope, occupying the
        // first slot ids.
        for (index, name) in ast_func.arg_names.iter().enumerate() {
            let ir_type = self.lw.module.funcs[self.func_id].argument_types[index];
            let id = self.next_var_id;
            self.next_var_id += 1;
            self.scopes.add_variable(
                ScopeTree::ROOT,
                name.clone(),
                id,
                ir_type,
                ast_func.arg_types[index].clone(),
                VariableTraits { pod: ast_func.arg_type_traits[index].pod, undef: false },
            );
        }

        let entry = self.new_block();
        self.use_block(entry);

        if ast_func.traits.main {
            self.lower_global_initializers()?;
        }

        for stmt in &ast_func.statements {
            self.lower_stmt(stmt)?;
        }

        self.finish_function_exit()?;

        let func = &mut self.lw.module.funcs[self.func_id];
        func.basicblocks = std::mem::take(&mut self.blocks);
        func.scopes = std::mem::take(&mut self.scopes);
        func.variable_count = self.next_var_id;
        Ok(())
    }

    /// Close the function: run remaining defers and emit the implicit
    /// return for void functions and `main`.
    fn finish_function_exit(&mut self) -> CompileResult<()> {
        if self.blocks[self.current].is_terminated() {
            return Ok(());
        }

        // A merge block that every path jumped over stays empty and
        // unreferenced; drop it instead of inventing a return for it.
        if self.blocks[self.current].instructions.is_empty()
            && !self.block_is_referenced(self.current)
            && self.current + 1 == self.blocks.len()
            && self.current != 0
        {
            self.blocks.pop();
            return Ok(());
        }

        self.unravel_defers(0)?;
        self.emit_scope_defer_calls(self.current_scope, None)?;

        let ast_func = self.ast_func();
        if ast_func.traits.main && ast_func.return_type.is_void() {
            let zero = self.literal(self.lw.module.common.s32, IrLiteral::S32(0));
            self.push(Instruction::Return(Some(zero)));
        } else if ast_func.return_type.is_void() {
            self.push(Instruction::Return(None));
        } else {
            return Err(CompileError::type_error(format!(
                "function '{}' must return a value of type '{}'",
                ast_func.name, ast_func.return_type
            )));
        }
        Ok(())
    }

    fn block_is_referenced(&self, target: usize) -> bool {
        self.blocks.iter().any(|block| {
            block
                .instructions
                .iter()
                .any(|instruction| instruction.successors().contains(&target))
        })
    }

    // ------------------------------------------------------------------
    // Block plumbing
    // ------------------------------------------------------------------

    /// Open a new basic block in the current function.
    pub fn new_block(&mut self) -> usize {
        self.blocks.push(BasicBlock::new());
        self.blocks.len() - 1
    }

    /// Change the basic block new instructions are added into.
    pub fn use_block(&mut self, id: usize) {
        self.current = id;
    }

    /// Append an instruction to the current block. Instructions that would
    /// follow a terminator land in a fresh unreachable block so blocks
    /// keep the single-terminator invariant.
    pub fn push(&mut self, instruction: Instruction) -> (usize, usize) {
        if self.blocks[self.current].is_terminated() {
            let dead = self.new_block();
            self.use_block(dead);
        }
        let block = self.current;
        self.blocks[block].instructions.push(instruction);
        (block, self.blocks[block].instructions.len() - 1)
    }

    /// Append an instruction and build the value referencing its result.
    pub fn push_valued(&mut self, instruction: Instruction) -> CompileResult<ValueId> {
        let result_type = instruction.result_type().ok_or_else(|| {
            CompileError::internal("instruction pushed as valued but produces no result")
        })?;
        let (block, index) = self.push(instruction);
        Ok(self
            .lw
            .module
            .pool
            .add_value(result_type, IrValueKind::Result { block, instruction: index }))
    }

    // ------------------------------------------------------------------
    // Value builders
    // ------------------------------------------------------------------

    pub fn literal(&mut self, ty: TypeId, literal: IrLiteral) -> ValueId {
        self.lw.module.pool.add_value(ty, IrValueKind::Literal(literal))
    }

    pub fn literal_usize(&mut self, value: u64) -> ValueId {
        self.literal(self.lw.module.common.usize_ty, IrLiteral::U64(value))
    }

    pub fn literal_bool(&mut self, value: bool) -> ValueId {
        self.literal(self.lw.module.common.boolean, IrLiteral::Boolean(value))
    }

    pub fn null_of(&mut self, ty: TypeId) -> ValueId {
        self.lw.module.pool.add_value(ty, IrValueKind::NullPtr)
    }

    /// A string constant of known length, typed `*ubyte`, with an implicit
    /// trailing NUL.
    pub fn cstr_of_len(&mut self, text: &str) -> ValueId {
        let mut bytes = text.as_bytes().to_vec();
        bytes.push(0);
        self.lw.module.pool.add_value(
            self.lw.module.common.ubyte_ptr,
            IrValueKind::CstrOfLen { bytes, length: text.len() },
        )
    }

    pub fn build_varptr(&mut self, ir_type: TypeId, variable_id: usize) -> CompileResult<ValueId> {
        let result_type = self.lw.module.pool.pointer_to(ir_type);
        self.push_valued(Instruction::Varptr { result_type, variable_id })
    }

    pub fn build_gvarptr(&mut self, global_id: usize) -> CompileResult<ValueId> {
        let global_type = self.lw.module.globals[global_id].ty;
        let result_type = self.lw.module.pool.pointer_to(global_type);
        self.push_valued(Instruction::GlobalVarptr { result_type, global_id })
    }

    pub fn build_load(&mut self, value: ValueId) -> CompileResult<ValueId> {
        let value_type = self.lw.module.pool.value_type(value);
        let result_type = self.lw.module.pool.pointee(value_type).ok_or_else(|| {
            CompileError::internal("load from a non-pointer value")
        })?;
        self.push_valued(Instruction::Load { result_type, value })
    }

    pub fn build_store(&mut self, value: ValueId, destination: ValueId) {
        self.push(Instruction::Store { value, destination });
    }

    pub fn build_cast(&mut self, op: CastOp, value: ValueId, to: TypeId) -> CompileResult<ValueId> {
        let result_type = match op {
            CastOp::IsZero | CastOp::IsNonZero => self.lw.module.common.boolean,
            _ => to,
        };
        self.push_valued(Instruction::Cast { op, result_type, value })
    }

    pub fn build_branch(&mut self, block: usize) {
        self.push(Instruction::Branch { block });
    }

    pub fn build_cond_branch(&mut self, condition: ValueId, true_block: usize, false_block: usize) {
        self.push(Instruction::ConditionalBranch { condition, true_block, false_block });
    }

    // ------------------------------------------------------------------
    // Conformance materialization
    // ------------------------------------------------------------------

    /// Conform a value to a target written type, emitting the cast the
    /// relation requires. Returns `None` when the types are incompatible.
    pub fn conform_value(
        &mut self,
        value: ValueId,
        from: &TypeExpr,
        to: &TypeExpr,
        mode: ConformMode,
    ) -> CompileResult<Option<ValueId>> {
        let Some(conformance) = conform(from, to, mode) else {
            return Ok(None);
        };

        let conformed = match conformance {
            Conformance::Identity => value,
            Conformance::MorphLiteral => self.morph_generic(value, to)?,
            Conformance::Cast(op) => {
                let target = self.lw.resolve_type(to, true)?;
                // Retype a literal null pointer instead of bitcasting it.
                if op == CastOp::Bitcast
                    && matches!(self.lw.module.pool.value(value).kind, IrValueKind::NullPtr)
                {
                    self.null_of(target)
                } else {
                    self.build_cast(op, value, target)?
                }
            }
        };
        Ok(Some(conformed))
    }

    /// Give a generic literal (or a generic result value) the concrete
    /// target type.
    fn morph_generic(&mut self, value: ValueId, to: &TypeExpr) -> CompileResult<ValueId> {
        let target_class = to
            .base_name()
            .and_then(classify_primitive)
            .ok_or_else(|| CompileError::internal("literal morph into non-primitive type"))?;
        let target_type = self.lw.resolve_type(to, true)?;

        match self.lw.module.pool.value(value).kind.clone() {
            IrValueKind::Literal(IrLiteral::S64(int_value)) => {
                let literal = match target_class {
                    NumericClass::Signed(8) => IrLiteral::S8(int_value as i8),
                    NumericClass::Signed(16) => IrLiteral::S16(int_value as i16),
                    NumericClass::Signed(32) => IrLiteral::S32(int_value as i32),
                    NumericClass::Signed(_) => IrLiteral::S64(int_value),
                    NumericClass::Unsigned(8) => IrLiteral::U8(int_value as u8),
                    NumericClass::Unsigned(16) => IrLiteral::U16(int_value as u16),
                    NumericClass::Unsigned(32) => IrLiteral::U32(int_value as u32),
                    NumericClass::Unsigned(_) => IrLiteral::U64(int_value as u64),
                    NumericClass::Float(16) => IrLiteral::Half(int_value as f64),
                    NumericClass::Float(32) => IrLiteral::Float(int_value as f64),
                    NumericClass::Float(_) => IrLiteral::Double(int_value as f64),
                    NumericClass::Bool => {
                        return Err(CompileError::internal("integer literal morph into bool"))
                    }
                };
                Ok(self.literal(target_type, literal))
            }
            IrValueKind::Literal(IrLiteral::Double(float_value)) => {
                let literal = match target_class {
                    NumericClass::Float(16) => IrLiteral::Half(float_value),
                    NumericClass::Float(32) => IrLiteral::Float(float_value),
                    NumericClass::Float(_) => IrLiteral::Double(float_value),
                    _ => {
                        return Err(CompileError::internal(
                            "float literal morph into non-float type",
                        ))
                    }
                };
                Ok(self.literal(target_type, literal))
            }
            // A generic-typed computation result (lowered as s64 or
            // double) needs an actual cast.
            _ => {
                let op = match target_class {
                    NumericClass::Signed(64) | NumericClass::Unsigned(64) => CastOp::Bitcast,
                    NumericClass::Signed(_) | NumericClass::Unsigned(_) => CastOp::Truncate,
                    NumericClass::Float(64) => CastOp::Bitcast,
                    NumericClass::Float(_) => CastOp::FloatTruncate,
                    NumericClass::Bool => {
                        return Err(CompileError::internal("generic result morph into bool"))
                    }
                };
                let source_kind = self.lw.module.pool.type_kind(self.lw.module.pool.value_type(value)).clone();
                let op = if source_kind.is_integer() && matches!(target_class, NumericClass::Float(_)) {
                    CastOp::SIntToFloat
                } else {
                    op
                };
                self.build_cast(op, value, target_type)
            }
        }
    }

    // ------------------------------------------------------------------
    // Defers and label stack
    // ------------------------------------------------------------------

    /// Emit deferred statements in reverse insertion order, down to the
    /// given unravel point. The stack itself is left untouched; callers
    /// truncate when the scope actually closes.
    pub fn unravel_defers(&mut self, unravel_point: usize) -> CompileResult<()> {
        let deferred: Vec<&'a Stmt> = self.defer_stack[unravel_point..].to_vec();
        for stmt in deferred.iter().rev() {
            self.lower_stmt(stmt)?;
        }
        Ok(())
    }

    /// Insert `__defer__` calls for stack variables of the scopes from
    /// `from` up to (excluding) `until`; `None` walks through the root.
    pub fn emit_scope_defer_calls(
        &mut self,
        from: usize,
        until: Option<usize>,
    ) -> CompileResult<()> {
        let mut current = Some(from);
        while let Some(scope) = current {
            if Some(scope) == until {
                break;
            }
            management_defer_scope(self, scope)?;
            current = self.scopes.parent(scope);
        }
        Ok(())
    }

    /// Find the label-stack entry for a `break`/`continue`, innermost
    /// first. `None` targets the top entry.
    pub fn find_label(&self, label: Option<&str>) -> Option<&LoopLabel> {
        match label {
            None => self.label_stack.last(),
            Some(name) => self
                .label_stack
                .iter()
                .rev()
                .find(|entry| entry.label.as_deref() == Some(name)),
        }
    }
}

use crate::lower::management::management_defer_scope;
