//! Lowering from the AST to the basic-block IR
//!
//! Pass 1 registers named types and resolves every function signature into
//! the function and method mapping indices. Pass 2 lowers each function
//! body. `main` is lowered last so the type table is complete when the
//! runtime type information globals are materialized at its entry.

pub mod builder;
pub mod expr;
pub mod management;
pub mod rtti;
pub mod stmt;

use crate::function::{IrFunction, IrFunctionTraits};
use crate::module::{IrGlobal, IrGlobalTraits, IrModule, TypeMapping};
use crate::pool::TypeId;
use crate::scope::ScopeTree;
use crate::types::IrTypeKind;
use builder::FuncBuilder;
use keel_common::{CompileError, CompileResult, CompilerContext};
use keel_parser::{Ast, TypeElem, TypeExpr};
use keel_resolver::{resolve_aliases, FuncIndex, MethodIndex, TypeTable};

/// Lower a parsed translation unit into an IR module.
pub fn lower(ctx: &mut CompilerContext, ast: &Ast) -> CompileResult<IrModule> {
    let mut lowerer = Lowerer {
        ctx,
        ast,
        module: IrModule::new(),
        type_table: TypeTable::new(),
    };

    lowerer.register_type_mappings()?;
    lowerer.lower_globals()?;
    lowerer.lower_function_skeletons()?;
    lowerer.lower_function_bodies()?;

    Ok(lowerer.module)
}

/// Shared lowering state for one translation unit.
pub struct Lowerer<'a> {
    pub ctx: &'a mut CompilerContext,
    pub ast: &'a Ast,
    pub module: IrModule,
    pub type_table: TypeTable<TypeId>,
}

impl<'a> Lowerer<'a> {
    /// Register primitives and struct types in the named-type map. Struct
    /// types are created as empty skeletons first so fields can point back
    /// at their own struct.
    fn register_type_mappings(&mut self) -> CompileResult<()> {
        let mut mappings = vec![
            TypeMapping { name: "bool".into(), ty: self.module.common.boolean },
            TypeMapping { name: "byte".into(), ty: self.module.pool.add_type(IrTypeKind::S8) },
            TypeMapping { name: "double".into(), ty: self.module.pool.add_type(IrTypeKind::Double) },
            TypeMapping { name: "float".into(), ty: self.module.pool.add_type(IrTypeKind::Float) },
            TypeMapping { name: "funcptr".into(), ty: self.module.common.funcptr },
            TypeMapping { name: "half".into(), ty: self.module.pool.add_type(IrTypeKind::Half) },
            TypeMapping { name: "int".into(), ty: self.module.common.s32 },
            TypeMapping { name: "long".into(), ty: self.module.pool.add_type(IrTypeKind::S64) },
            TypeMapping { name: "ptr".into(), ty: self.module.common.ubyte_ptr },
            TypeMapping { name: "short".into(), ty: self.module.pool.add_type(IrTypeKind::S16) },
            TypeMapping { name: "ubyte".into(), ty: self.module.common.ubyte },
            TypeMapping { name: "uint".into(), ty: self.module.pool.add_type(IrTypeKind::U32) },
            TypeMapping { name: "ulong".into(), ty: self.module.pool.add_type(IrTypeKind::U64) },
            TypeMapping { name: "ushort".into(), ty: self.module.pool.add_type(IrTypeKind::U16) },
            TypeMapping { name: "usize".into(), ty: self.module.common.usize_ty },
            TypeMapping { name: "void".into(), ty: self.module.common.void },
        ];

        for (index, structure) in self.ast.structs.iter().enumerate() {
            if self.ast.structs[..index].iter().any(|s| s.name == structure.name) {
                return Err(CompileError::resolve(format!(
                    "duplicate struct '{}'",
                    structure.name
                )));
            }
            let skeleton = self.module.pool.add_type(IrTypeKind::Structure {
                subtypes: Vec::new(),
                packed: structure.packed,
            });
            mappings.push(TypeMapping { name: structure.name.clone(), ty: skeleton });
        }

        self.module.set_type_map(mappings);

        // Fill the struct skeletons now that every name resolves.
        for structure in &self.ast.structs {
            let mut subtypes = Vec::with_capacity(structure.field_types.len());
            for field_type in &structure.field_types {
                subtypes.push(self.resolve_type(field_type, true)?);
            }
            let id = self
                .module
                .find_type(&structure.name)
                .expect("struct was registered above");
            self.module
                .pool
                .set_type_kind(id, IrTypeKind::Structure { subtypes, packed: structure.packed });
        }

        Ok(())
    }

    /// Resolve a written type to an IR type. When `record` is set, the
    /// written type is appended to the type table for later RTTI emission.
    pub fn resolve_type(&mut self, ty: &TypeExpr, record: bool) -> CompileResult<TypeId> {
        if record && !self.type_table.is_reduced() {
            let is_alias = ty
                .base_name()
                .map(|name| self.ast.find_alias(name).is_some())
                .unwrap_or(false);
            self.type_table.add(ty.clone(), is_alias);
        }

        let resolved = resolve_aliases(self.ast, ty)?;
        self.resolve_elements(&resolved)
    }

    fn resolve_elements(&mut self, ty: &TypeExpr) -> CompileResult<TypeId> {
        if ty.elements.is_empty() {
            return Ok(self.module.common.void);
        }

        let terminal_index = ty.elements.len() - 1;
        let mut current = match &ty.elements[terminal_index] {
            TypeElem::Base(name) => self.module.find_type(name).ok_or_else(|| {
                CompileError::resolve(format!("undeclared type '{}'", name))
            })?,
            TypeElem::Func(_) => self.module.common.funcptr,
            TypeElem::GenericInt => self
                .module
                .find_type("long")
                .expect("primitive types are always registered"),
            TypeElem::GenericFloat => self
                .module
                .find_type("double")
                .expect("primitive types are always registered"),
            other => {
                return Err(CompileError::type_error(format!(
                    "written type '{}' does not end in a base ({:?} cannot terminate a type)",
                    ty, other
                )));
            }
        };

        for element in ty.elements[..terminal_index].iter().rev() {
            current = match element {
                TypeElem::Pointer => self.module.pool.pointer_to(current),
                // Unsized arrays lower as pointers to their element type.
                TypeElem::Array => self.module.pool.pointer_to(current),
                TypeElem::FixedArray(length) => self
                    .module
                    .pool
                    .add_type(IrTypeKind::FixedArray { subtype: current, length: *length }),
                other => {
                    return Err(CompileError::type_error(format!(
                        "written type '{}' is malformed ({:?} cannot prefix a type)",
                        ty, other
                    )));
                }
            };
        }

        Ok(current)
    }

    fn lower_globals(&mut self) -> CompileResult<()> {
        for (index, global) in self.ast.globals.iter().enumerate() {
            if self.ast.globals[..index].iter().any(|g| g.name == global.name) {
                return Err(CompileError::resolve(format!(
                    "duplicate global variable '{}'",
                    global.name
                )));
            }
        }

        for global in &self.ast.globals {
            let ty = self.resolve_type(&global.ty, true)?;
            self.module.globals.push(IrGlobal {
                name: global.name.clone(),
                ty,
                traits: IrGlobalTraits { external: global.external },
            });
        }
        Ok(())
    }

    /// Pass 1: resolve every function signature and build the sorted
    /// function and method mapping indices.
    fn lower_function_skeletons(&mut self) -> CompileResult<()> {
        for func in &self.ast.funcs {
            let mut argument_types = Vec::with_capacity(func.arity());
            for arg_type in &func.arg_types {
                argument_types.push(self.resolve_type(arg_type, true)?);
            }

            // A function whose name is `main` and whose declared return is
            // void returns s32 under the hood.
            let return_type = if func.traits.main && func.return_type.is_void() {
                self.module.common.s32
            } else {
                self.resolve_type(&func.return_type, true)?
            };

            if !func.traits.foreign && func.arg_names.first().map(String::as_str) == Some("this")
            {
                let Some(receiver) = func.method_receiver() else {
                    return Err(CompileError::type_error(format!(
                        "type of 'this' in '{}' must be a pointer to a struct",
                        func.name
                    )));
                };
                if self.ast.find_struct(receiver).is_none() {
                    return Err(CompileError::resolve(format!(
                        "undeclared struct '{}' in method '{}'",
                        receiver, func.name
                    )));
                }
            }

            self.module.funcs.push(IrFunction {
                name: func.name.clone(),
                traits: IrFunctionTraits {
                    foreign: func.traits.foreign,
                    variadic: func.traits.variadic,
                    main: func.traits.main,
                    stdcall: func.traits.stdcall,
                },
                argument_types,
                return_type,
                basicblocks: Vec::new(),
                scopes: ScopeTree::new(),
                variable_count: 0,
            });
        }

        self.module.func_mappings = FuncIndex::build(self.ast);
        self.module.methods = MethodIndex::build(self.ast);
        Ok(())
    }

    /// Pass 2: lower function bodies. `main` goes last so the type table
    /// has seen every written type before the runtime type information is
    /// emitted at its entry.
    fn lower_function_bodies(&mut self) -> CompileResult<()> {
        let mut main_id = None;

        for (func_id, func) in self.ast.funcs.iter().enumerate() {
            if func.traits.foreign {
                continue;
            }
            if func.traits.main {
                main_id = Some(func_id);
                continue;
            }
            log::trace!("lowering function '{}'", func.name);
            FuncBuilder::run(self, func_id)?;
        }

        if let Some(func_id) = main_id {
            log::trace!("lowering function 'main'");
            FuncBuilder::run(self, func_id)?;
        }

        Ok(())
    }
}
