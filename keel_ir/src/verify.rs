//! IR invariant checks
//!
//! Used by tests to validate lowered modules: every block ends in exactly
//! one terminator, result references are defined before use, member
//! accesses stay inside their struct, and branch targets exist. The
//! language has no phi nodes (variables are materialized as stack slots),
//! so a lightweight reachability check on result references suffices.

use crate::instruction::Instruction;
use crate::module::IrModule;
use crate::pool::ValueId;
use crate::types::IrTypeKind;
use crate::value::IrValueKind;
use crate::IrFunction;

/// Validate a single function.
pub fn verify_function(module: &IrModule, func: &IrFunction) -> Result<(), String> {
    if func.traits.foreign {
        return Ok(());
    }

    for (block_id, block) in func.basicblocks.iter().enumerate() {
        if block.instructions.is_empty() {
            return Err(format!(
                "function '{}': block {} is empty",
                func.name, block_id
            ));
        }

        for (index, instruction) in block.instructions.iter().enumerate() {
            let is_last = index + 1 == block.instructions.len();
            if instruction.is_terminator() != is_last {
                return Err(format!(
                    "function '{}': block {} must end in exactly one terminator \
                     (instruction {} violates this)",
                    func.name, block_id, index
                ));
            }

            for target in instruction.successors() {
                if target >= func.basicblocks.len() {
                    return Err(format!(
                        "function '{}': block {} branches to missing block {}",
                        func.name, block_id, target
                    ));
                }
            }

            for operand in instruction.operands() {
                verify_operand(module, func, block_id, index, operand)?;
            }
        }
    }

    Ok(())
}

/// Check that a result reference is defined before its use.
fn verify_operand(
    module: &IrModule,
    func: &IrFunction,
    use_block: usize,
    use_index: usize,
    operand: ValueId,
) -> Result<(), String> {
    match &module.pool.value(operand).kind {
        IrValueKind::Result { block, instruction } => {
            if *block >= func.basicblocks.len() {
                return Err(format!(
                    "function '{}': result references missing block {}",
                    func.name, block
                ));
            }
            let defining_block = &func.basicblocks[*block];
            if *instruction >= defining_block.instructions.len() {
                return Err(format!(
                    "function '{}': result references missing instruction {} of block {}",
                    func.name, instruction, block
                ));
            }
            if defining_block.instructions[*instruction].result_type().is_none() {
                return Err(format!(
                    "function '{}': result references instruction {} of block {}, \
                     which produces no value",
                    func.name, instruction, block
                ));
            }
            // Blocks are created in lowering order, so a definition must
            // not come from a later block, nor later in the same block.
            if *block > use_block || (*block == use_block && *instruction >= use_index) {
                return Err(format!(
                    "function '{}': block {} instruction {} uses a result defined later \
                     (block {} instruction {})",
                    func.name, use_block, use_index, block, instruction
                ));
            }
            Ok(())
        }
        IrValueKind::ArrayLiteral(values)
        | IrValueKind::StructLiteral(values)
        | IrValueKind::StructConstruction(values) => {
            for value in values {
                verify_operand(module, func, use_block, use_index, *value)?;
            }
            Ok(())
        }
        IrValueKind::ConstBitcast(inner) => {
            verify_operand(module, func, use_block, use_index, *inner)
        }
        _ => Ok(()),
    }
}

/// Check that member accesses resolve to a field index strictly less than
/// the struct's field count.
fn verify_member_bounds(module: &IrModule, func: &IrFunction) -> Result<(), String> {
    for block in &func.basicblocks {
        for instruction in &block.instructions {
            if let Instruction::MemberPtr { value, member, .. } = instruction {
                let value_type = module.pool.value_type(*value);
                let Some(pointee) = module.pool.pointee(value_type) else {
                    return Err(format!(
                        "function '{}': member access through non-pointer value",
                        func.name
                    ));
                };
                match module.pool.type_kind(pointee) {
                    IrTypeKind::Structure { subtypes, .. } => {
                        if *member >= subtypes.len() {
                            return Err(format!(
                                "function '{}': member index {} out of bounds for struct \
                                 with {} fields",
                                func.name,
                                member,
                                subtypes.len()
                            ));
                        }
                    }
                    _ => {
                        return Err(format!(
                            "function '{}': member access into non-struct type",
                            func.name
                        ));
                    }
                }
            }
        }
    }
    Ok(())
}

/// Validate the whole module.
pub fn verify_module(module: &IrModule) -> Result<(), String> {
    for func in &module.funcs {
        verify_function(module, func)?;
        verify_member_bounds(module, func)?;
    }

    for pair in module.type_map().windows(2) {
        if pair[0].name >= pair[1].name {
            return Err(format!(
                "type map is not strictly ascending: '{}' then '{}'",
                pair[0].name, pair[1].name
            ));
        }
    }

    Ok(())
}
