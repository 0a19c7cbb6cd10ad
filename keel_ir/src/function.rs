//! IR functions

use crate::instruction::BasicBlock;
use crate::pool::TypeId;
use crate::scope::ScopeTree;
use serde::{Deserialize, Serialize};

/// Traits of an IR function.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IrFunctionTraits {
    pub foreign: bool,
    pub variadic: bool,
    pub main: bool,
    pub stdcall: bool,
}

/// A lowered function.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IrFunction {
    pub name: String,
    pub traits: IrFunctionTraits,
    pub argument_types: Vec<TypeId>,
    pub return_type: TypeId,
    pub basicblocks: Vec<BasicBlock>,
    pub scopes: ScopeTree,
    pub variable_count: usize,
}

impl IrFunction {
    pub fn arity(&self) -> usize {
        self.argument_types.len()
    }
}
