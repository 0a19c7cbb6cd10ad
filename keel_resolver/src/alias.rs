//! Type alias resolution
//!
//! Aliases are resolved by substituting the alias's stored element sequence
//! for its base occurrence. Cycles are detected with a visited set during
//! substitution.

use hashbrown::HashSet;
use keel_common::{CompileError, CompileResult};
use keel_parser::{Ast, FuncTypeElem, TypeElem, TypeExpr};
use smallvec::SmallVec;

/// Substitute every alias occurrence in a written type.
pub fn resolve_aliases(ast: &Ast, ty: &TypeExpr) -> CompileResult<TypeExpr> {
    let mut visited = HashSet::new();
    resolve(ast, ty, &mut visited)
}

fn resolve(ast: &Ast, ty: &TypeExpr, visited: &mut HashSet<String>) -> CompileResult<TypeExpr> {
    let mut elements: SmallVec<[TypeElem; 4]> = SmallVec::new();

    for element in &ty.elements {
        match element {
            TypeElem::Base(name) => match ast.find_alias(name) {
                Some(alias) => {
                    if !visited.insert(name.clone()) {
                        return Err(CompileError::resolve(format!(
                            "alias cycle detected involving '{}'",
                            name
                        )));
                    }
                    let substituted = resolve(ast, &alias.ty, visited)?;
                    visited.remove(name);
                    elements.extend(substituted.elements);
                }
                None => elements.push(element.clone()),
            },
            TypeElem::Func(func) => {
                let arg_types = func
                    .arg_types
                    .iter()
                    .map(|arg| resolve(ast, arg, visited))
                    .collect::<CompileResult<Vec<_>>>()?;
                let return_type = resolve(ast, &func.return_type, visited)?;
                elements.push(TypeElem::Func(FuncTypeElem {
                    arg_types,
                    arg_flows: func.arg_flows.clone(),
                    return_type: Box::new(return_type),
                    traits: func.traits,
                }));
            }
            other => elements.push(other.clone()),
        }
    }

    Ok(TypeExpr::new(elements, ty.span))
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_common::Span;
    use keel_parser::Alias;

    fn ast_with_aliases(aliases: Vec<(&str, TypeExpr)>) -> Ast {
        let mut ast = Ast::new();
        for (name, ty) in aliases {
            ast.aliases.push(Alias { name: name.into(), ty, span: Span::none() });
        }
        ast
    }

    #[test]
    fn test_simple_substitution() {
        let ast = ast_with_aliases(vec![("Cstr", TypeExpr::base_ptr("ubyte", Span::none()))]);
        let resolved = resolve_aliases(&ast, &TypeExpr::base("Cstr", Span::none())).unwrap();
        assert!(resolved.is_base_ptr_of("ubyte"));
    }

    #[test]
    fn test_nested_substitution() {
        let ast = ast_with_aliases(vec![
            ("A", TypeExpr::base("B", Span::none())),
            ("B", TypeExpr::base("int", Span::none())),
        ]);
        let resolved =
            resolve_aliases(&ast, &TypeExpr::base("A", Span::none()).pointer_to()).unwrap();
        assert!(resolved.is_base_ptr_of("int"));
    }

    #[test]
    fn test_cycle_detected() {
        let ast = ast_with_aliases(vec![
            ("A", TypeExpr::base("B", Span::none())),
            ("B", TypeExpr::base("A", Span::none())),
        ]);
        let result = resolve_aliases(&ast, &TypeExpr::base("A", Span::none()));
        assert!(matches!(result, Err(CompileError::Resolve { .. })));
    }

    #[test]
    fn test_self_cycle_detected() {
        let ast = ast_with_aliases(vec![("A", TypeExpr::base("A", Span::none()))]);
        let result = resolve_aliases(&ast, &TypeExpr::base("A", Span::none()));
        assert!(matches!(result, Err(CompileError::Resolve { .. })));
    }

    #[test]
    fn test_diamond_is_not_a_cycle() {
        // A -> func(B, B) B is fine even though B appears twice.
        let ast = ast_with_aliases(vec![("B", TypeExpr::base("int", Span::none()))]);
        let func = TypeExpr::new(
            smallvec::smallvec![TypeElem::Func(FuncTypeElem {
                arg_types: vec![
                    TypeExpr::base("B", Span::none()),
                    TypeExpr::base("B", Span::none()),
                ],
                arg_flows: vec![Default::default(), Default::default()],
                return_type: Box::new(TypeExpr::base("B", Span::none())),
                traits: Default::default(),
            })],
            Span::none(),
        );
        let resolved = resolve_aliases(&ast, &func).unwrap();
        match &resolved.elements[0] {
            TypeElem::Func(f) => {
                assert!(f.arg_types[0].is_base_of("int"));
                assert!(f.return_type.is_base_of("int"));
            }
            other => panic!("expected func element, got {:?}", other),
        }
    }
}
