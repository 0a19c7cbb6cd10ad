//! Symbol lookup and overload resolution
//!
//! Function declarations and struct methods live in sorted indices. Looking
//! up a call by name yields a contiguous candidate group; the resolver
//! picks the candidate whose parameters accept the actual argument types
//! under the primitive conformance mode, breaking ties by exact-match
//! count, then declaration order.

use crate::conform::{conform, ConformMode};
use keel_common::{CompileError, CompileResult};
use keel_parser::{Ast, Function, TypeExpr};

/// A function index entry: functions sorted by name, then declaration id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuncMapping {
    pub name: String,
    pub func_id: usize,
}

/// Sorted index over the module's function declarations.
#[derive(Debug, Clone, Default)]
pub struct FuncIndex {
    mappings: Vec<FuncMapping>,
}

impl FuncIndex {
    pub fn build(ast: &Ast) -> Self {
        let mut mappings: Vec<FuncMapping> = ast
            .funcs
            .iter()
            .enumerate()
            .map(|(func_id, func)| FuncMapping { name: func.name.clone(), func_id })
            .collect();
        mappings.sort_by(|a, b| a.name.cmp(&b.name).then(a.func_id.cmp(&b.func_id)));
        Self { mappings }
    }

    pub fn mappings(&self) -> &[FuncMapping] {
        &self.mappings
    }

    /// The contiguous candidate group sharing a name.
    pub fn group(&self, name: &str) -> &[FuncMapping] {
        let start = self.mappings.partition_point(|m| m.name.as_str() < name);
        let end = self.mappings.partition_point(|m| m.name.as_str() <= name);
        &self.mappings[start..end]
    }
}

/// A method index entry: methods sorted by receiver struct, then name,
/// then declaration id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodMapping {
    pub struct_name: String,
    pub name: String,
    pub func_id: usize,
}

/// Sorted index over struct methods (functions whose first argument is
/// `this *Struct`).
#[derive(Debug, Clone, Default)]
pub struct MethodIndex {
    mappings: Vec<MethodMapping>,
}

impl MethodIndex {
    pub fn build(ast: &Ast) -> Self {
        let mut mappings: Vec<MethodMapping> = ast
            .funcs
            .iter()
            .enumerate()
            .filter_map(|(func_id, func)| {
                func.method_receiver().map(|receiver| MethodMapping {
                    struct_name: receiver.to_string(),
                    name: func.name.clone(),
                    func_id,
                })
            })
            .collect();
        mappings.sort_by(|a, b| {
            a.struct_name
                .cmp(&b.struct_name)
                .then(a.name.cmp(&b.name))
                .then(a.func_id.cmp(&b.func_id))
        });
        Self { mappings }
    }

    pub fn mappings(&self) -> &[MethodMapping] {
        &self.mappings
    }

    pub fn group(&self, struct_name: &str, name: &str) -> &[MethodMapping] {
        let key = (struct_name, name);
        let start = self
            .mappings
            .partition_point(|m| (m.struct_name.as_str(), m.name.as_str()) < key);
        let end = self
            .mappings
            .partition_point(|m| (m.struct_name.as_str(), m.name.as_str()) <= key);
        &self.mappings[start..end]
    }
}

/// Whether a function accepts the given argument types under the primitive
/// conformance mode. Returns the number of exactly matching arguments for
/// tie-breaking.
fn args_conform(func: &Function, arg_types: &[TypeExpr]) -> Option<usize> {
    if func.traits.variadic {
        if arg_types.len() < func.arity() {
            return None;
        }
    } else if arg_types.len() != func.arity() {
        return None;
    }

    let mut exact = 0usize;
    for (actual, expected) in arg_types.iter().zip(func.arg_types.iter()) {
        if actual.identical(expected) {
            exact += 1;
            continue;
        }
        conform(actual, expected, ConformMode::Primitives)?;
    }
    Some(exact)
}

fn pick_conforming(
    ast: &Ast,
    candidates: impl Iterator<Item = usize>,
    arg_types: &[TypeExpr],
) -> Option<usize> {
    let mut best: Option<(usize, usize)> = None;

    for func_id in candidates {
        let Some(exact) = args_conform(&ast.funcs[func_id], arg_types) else {
            continue;
        };
        best = match best {
            // Declaration order breaks exact-count ties: candidates arrive
            // in id order, so a strictly better count is required to win.
            Some((best_id, best_exact)) if exact <= best_exact => Some((best_id, best_exact)),
            _ => Some((func_id, exact)),
        };
    }

    best.map(|(func_id, _)| func_id)
}

/// A human-readable signature for overload diagnostics.
pub fn format_signature(func: &Function) -> String {
    let args: Vec<String> = func.arg_types.iter().map(|t| t.to_string()).collect();
    let variadic = if func.traits.variadic {
        if args.is_empty() { "..." } else { ", ..." }
    } else {
        ""
    };
    format!(
        "{}({}{}) {}",
        func.name,
        args.join(", "),
        variadic,
        func.return_type
    )
}

/// Find the function with the given name that conforms to the actual
/// argument types.
pub fn find_func_conforming(
    index: &FuncIndex,
    ast: &Ast,
    name: &str,
    arg_types: &[TypeExpr],
) -> CompileResult<usize> {
    let group = index.group(name);
    if group.is_empty() {
        return Err(CompileError::resolve(format!("undeclared function '{}'", name)));
    }

    pick_conforming(ast, group.iter().map(|m| m.func_id), arg_types).ok_or_else(|| {
        let candidates: Vec<String> = group
            .iter()
            .map(|m| format!("    {}", format_signature(&ast.funcs[m.func_id])))
            .collect();
        CompileError::overload(format!(
            "no conforming candidate for call to '{}'; candidates are:\n{}",
            name,
            candidates.join("\n")
        ))
    })
}

/// Find the method of `struct_name` with the given name that conforms to
/// the actual argument types (including the leading `this` pointer).
pub fn find_method_conforming(
    index: &MethodIndex,
    ast: &Ast,
    struct_name: &str,
    name: &str,
    arg_types: &[TypeExpr],
) -> CompileResult<usize> {
    let group = index.group(struct_name, name);
    if group.is_empty() {
        return Err(CompileError::resolve(format!(
            "undeclared method '{}' on struct '{}'",
            name, struct_name
        )));
    }

    pick_conforming(ast, group.iter().map(|m| m.func_id), arg_types).ok_or_else(|| {
        let candidates: Vec<String> = group
            .iter()
            .map(|m| format!("    {}", format_signature(&ast.funcs[m.func_id])))
            .collect();
        CompileError::overload(format!(
            "no conforming candidate for call to method '{}' on '{}'; candidates are:\n{}",
            name,
            struct_name,
            candidates.join("\n")
        ))
    })
}

/// Classic edit distance between two names.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0usize; b.len() + 1];

    for (i, &ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = substitution
                .min(previous[j + 1] + 1)
                .min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}

/// The lexically nearest name to `target`, for "did you mean" hints.
/// The acceptance threshold is edit distance ≤ 2 or ≤ min(3, len/2),
/// whichever is higher.
pub fn nearest_name<'n>(
    names: impl Iterator<Item = &'n str>,
    target: &str,
) -> Option<&'n str> {
    let threshold = 2usize.max(3.min(target.len() / 2));

    names
        .map(|name| (levenshtein(name, target), name))
        .filter(|(distance, _)| *distance <= threshold)
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, name)| name)
}
