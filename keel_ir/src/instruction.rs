//! IR instructions and basic blocks

use crate::pool::{TypeId, ValueId};
pub use keel_resolver::CastOp;
use serde::{Deserialize, Serialize};

/// Binary math, logic and comparison opcodes. Signed, unsigned and float
/// forms are distinct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MathOp {
    Add,
    FAdd,
    Subtract,
    FSubtract,
    Multiply,
    FMultiply,
    SDivide,
    UDivide,
    FDivide,
    SModulus,
    UModulus,
    FModulus,
    Equals,
    FEquals,
    NotEquals,
    FNotEquals,
    SGreater,
    UGreater,
    FGreater,
    SLesser,
    ULesser,
    FLesser,
    SGreaterEq,
    UGreaterEq,
    FGreaterEq,
    SLesserEq,
    ULesserEq,
    FLesserEq,
    And,
    Or,
}

impl MathOp {
    /// Whether the opcode produces a boolean rather than matching its
    /// operand type.
    pub fn produces_bool(&self) -> bool {
        !matches!(
            self,
            MathOp::Add
                | MathOp::FAdd
                | MathOp::Subtract
                | MathOp::FSubtract
                | MathOp::Multiply
                | MathOp::FMultiply
                | MathOp::SDivide
                | MathOp::UDivide
                | MathOp::FDivide
                | MathOp::SModulus
                | MathOp::UModulus
                | MathOp::FModulus
        )
    }
}

/// An IR instruction. Operands are pooled value indices; result types are
/// pooled type indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Instruction {
    // Binary math, logic, comparison
    Math { op: MathOp, a: ValueId, b: ValueId, result_type: TypeId },

    // Memory
    Varptr { result_type: TypeId, variable_id: usize },
    GlobalVarptr { result_type: TypeId, global_id: usize },
    Load { result_type: TypeId, value: ValueId },
    Store { value: ValueId, destination: ValueId },
    Malloc { result_type: TypeId, alloc_type: TypeId, amount: Option<ValueId> },
    Free { value: ValueId },
    MemberPtr { result_type: TypeId, value: ValueId, member: usize },
    ArrayPtr { result_type: TypeId, value: ValueId, index: ValueId },

    // Control
    Branch { block: usize },
    ConditionalBranch { condition: ValueId, true_block: usize, false_block: usize },
    Return(Option<ValueId>),

    // Calls
    Call { result_type: TypeId, func_id: usize, args: Vec<ValueId> },
    CallAddress { result_type: TypeId, address: ValueId, args: Vec<ValueId> },

    // Casts
    Cast { op: CastOp, result_type: TypeId, value: ValueId },

    // Misc
    Sizeof { result_type: TypeId, ty: TypeId },
    Offsetof { result_type: TypeId, ty: TypeId, member: usize },
    FuncAddress { result_type: TypeId, name: String, func_id: Option<usize> },
    VarZeroInit { variable_id: usize },
    BitComplement { result_type: TypeId, value: ValueId },
    Negate { result_type: TypeId, value: ValueId },
    FNegate { result_type: TypeId, value: ValueId },
}

impl Instruction {
    /// Whether this instruction ends a basic block.
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Instruction::Branch { .. }
                | Instruction::ConditionalBranch { .. }
                | Instruction::Return(_)
        )
    }

    /// The type of the value this instruction produces, if any.
    pub fn result_type(&self) -> Option<TypeId> {
        match self {
            Instruction::Math { result_type, .. }
            | Instruction::Varptr { result_type, .. }
            | Instruction::GlobalVarptr { result_type, .. }
            | Instruction::Load { result_type, .. }
            | Instruction::Malloc { result_type, .. }
            | Instruction::MemberPtr { result_type, .. }
            | Instruction::ArrayPtr { result_type, .. }
            | Instruction::Call { result_type, .. }
            | Instruction::CallAddress { result_type, .. }
            | Instruction::Cast { result_type, .. }
            | Instruction::Sizeof { result_type, .. }
            | Instruction::Offsetof { result_type, .. }
            | Instruction::FuncAddress { result_type, .. }
            | Instruction::BitComplement { result_type, .. }
            | Instruction::Negate { result_type, .. }
            | Instruction::FNegate { result_type, .. } => Some(*result_type),
            Instruction::Store { .. }
            | Instruction::Free { .. }
            | Instruction::Branch { .. }
            | Instruction::ConditionalBranch { .. }
            | Instruction::Return(_)
            | Instruction::VarZeroInit { .. } => None,
        }
    }

    /// Operand values of this instruction.
    pub fn operands(&self) -> Vec<ValueId> {
        match self {
            Instruction::Math { a, b, .. } => vec![*a, *b],
            Instruction::Load { value, .. }
            | Instruction::Free { value }
            | Instruction::Cast { value, .. }
            | Instruction::MemberPtr { value, .. }
            | Instruction::BitComplement { value, .. }
            | Instruction::Negate { value, .. }
            | Instruction::FNegate { value, .. } => vec![*value],
            Instruction::Store { value, destination } => vec![*value, *destination],
            Instruction::Malloc { amount, .. } => amount.iter().copied().collect(),
            Instruction::ArrayPtr { value, index, .. } => vec![*value, *index],
            Instruction::ConditionalBranch { condition, .. } => vec![*condition],
            Instruction::Return(value) => value.iter().copied().collect(),
            Instruction::Call { args, .. } => args.clone(),
            Instruction::CallAddress { address, args, .. } => {
                let mut operands = vec![*address];
                operands.extend(args.iter().copied());
                operands
            }
            _ => Vec::new(),
        }
    }

    /// The basic blocks this instruction can branch to.
    pub fn successors(&self) -> Vec<usize> {
        match self {
            Instruction::Branch { block } => vec![*block],
            Instruction::ConditionalBranch { true_block, false_block, .. } => {
                vec![*true_block, *false_block]
            }
            _ => Vec::new(),
        }
    }
}

/// A maximal straight-line instruction sequence ending in a single
/// terminator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BasicBlock {
    pub instructions: Vec<Instruction>,
}

impl BasicBlock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_terminated(&self) -> bool {
        self.instructions
            .last()
            .map(Instruction::is_terminator)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminators() {
        assert!(Instruction::Return(None).is_terminator());
        assert!(Instruction::Branch { block: 0 }.is_terminator());
        assert!(!Instruction::VarZeroInit { variable_id: 0 }.is_terminator());
    }

    #[test]
    fn test_block_termination() {
        let mut block = BasicBlock::new();
        assert!(!block.is_terminated());
        block.instructions.push(Instruction::Return(None));
        assert!(block.is_terminated());
    }

    #[test]
    fn test_successors() {
        let branch = Instruction::ConditionalBranch {
            condition: ValueId::from_raw(0),
            true_block: 3,
            false_block: 5,
        };
        assert_eq!(branch.successors(), vec![3, 5]);
        assert!(Instruction::Return(None).successors().is_empty());
    }
}
