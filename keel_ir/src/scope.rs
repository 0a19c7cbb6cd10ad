//! Variable scope tree
//!
//! Each lexical block opens a scope and appends variable descriptors.
//! The function owns the root; scopes form an ownership tree with parent
//! indices.

use crate::pool::TypeId;
use keel_parser::TypeExpr;
use serde::{Deserialize, Serialize};

/// Traits of a scoped variable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableTraits {
    /// Plain-old-data: `__defer__` is not inserted for this variable.
    pub pod: bool,
    /// Skip zero initialization (`= undef`).
    pub undef: bool,
}

/// A variable descriptor within a scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    /// The stack slot id used by `varptr`.
    pub id: usize,
    pub ir_type: TypeId,
    pub ast_type: TypeExpr,
    pub traits: VariableTraits,
}

/// One lexical scope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scope {
    pub parent: Option<usize>,
    pub variables: Vec<Variable>,
    pub children: Vec<usize>,
}

/// The scope tree of one function. Index 0 is the root scope, which holds
/// the function's parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
}

impl Default for ScopeTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeTree {
    pub fn new() -> Self {
        Self { scopes: vec![Scope::default()] }
    }

    pub const ROOT: usize = 0;

    /// Open a child scope and return its index.
    pub fn open(&mut self, parent: usize) -> usize {
        let index = self.scopes.len();
        self.scopes.push(Scope { parent: Some(parent), ..Scope::default() });
        self.scopes[parent].children.push(index);
        index
    }

    pub fn parent(&self, scope: usize) -> Option<usize> {
        self.scopes[scope].parent
    }

    pub fn add_variable(
        &mut self,
        scope: usize,
        name: impl Into<String>,
        id: usize,
        ir_type: TypeId,
        ast_type: TypeExpr,
        traits: VariableTraits,
    ) {
        self.scopes[scope].variables.push(Variable {
            name: name.into(),
            id,
            ir_type,
            ast_type,
            traits,
        });
    }

    /// Look up a variable, innermost scope first.
    pub fn find(&self, scope: usize, name: &str) -> Option<&Variable> {
        let mut current = Some(scope);
        while let Some(index) = current {
            let found = self.scopes[index]
                .variables
                .iter()
                .rev()
                .find(|v| v.name == name);
            if found.is_some() {
                return found;
            }
            current = self.scopes[index].parent;
        }
        None
    }

    pub fn variables(&self, scope: usize) -> &[Variable] {
        &self.scopes[scope].variables
    }

    /// Every name visible from a scope, for "did you mean" hints.
    pub fn visible_names(&self, scope: usize) -> Vec<&str> {
        let mut names = Vec::new();
        let mut current = Some(scope);
        while let Some(index) = current {
            names.extend(self.scopes[index].variables.iter().map(|v| v.name.as_str()));
            current = self.scopes[index].parent;
        }
        names
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_common::Span;

    #[test]
    fn test_scope_shadowing_and_walk_up() {
        let mut tree = ScopeTree::new();
        let inner = tree.open(ScopeTree::ROOT);

        tree.add_variable(
            ScopeTree::ROOT,
            "x",
            0,
            TypeId::from_raw(0),
            TypeExpr::base("int", Span::none()),
            VariableTraits::default(),
        );
        tree.add_variable(
            inner,
            "x",
            1,
            TypeId::from_raw(0),
            TypeExpr::base("long", Span::none()),
            VariableTraits::default(),
        );

        assert_eq!(tree.find(inner, "x").unwrap().id, 1);
        assert_eq!(tree.find(ScopeTree::ROOT, "x").unwrap().id, 0);
        assert!(tree.find(inner, "y").is_none());
    }

    #[test]
    fn test_visible_names() {
        let mut tree = ScopeTree::new();
        let inner = tree.open(ScopeTree::ROOT);
        tree.add_variable(
            ScopeTree::ROOT,
            "outer",
            0,
            TypeId::from_raw(0),
            TypeExpr::base("int", Span::none()),
            VariableTraits::default(),
        );
        tree.add_variable(
            inner,
            "inner",
            1,
            TypeId::from_raw(0),
            TypeExpr::base("int", Span::none()),
            VariableTraits::default(),
        );

        let names = tree.visible_names(inner);
        assert!(names.contains(&"outer"));
        assert!(names.contains(&"inner"));
    }
}
