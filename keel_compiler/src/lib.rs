//! Translation-unit pipeline driver
//!
//! One translation unit owns its source buffer, token list, AST and IR
//! module, together with a marker of how far compilation got. The pipeline
//! is a straight line per unit; a failed stage halts the affected unit and
//! batching continues with the rest.

use keel_common::{CompileError, CompileResult, CompilerContext, SourceBuffer, UnitId};
use keel_ir::IrModule;
use keel_lexer::{pkg_read_file, pkg_write_file, Token};
use keel_parser::Ast;
use std::path::Path;

/// How far a translation unit's compilation has progressed. Owned data is
/// released stage-by-stage when the unit is dropped; the marker exists for
/// accessors, diagnostics and the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CompilationStage {
    None,
    TokenList,
    Ast,
    IrModule,
}

/// One source file together with everything derived from it.
#[derive(Debug)]
pub struct TranslationUnit {
    pub id: UnitId,
    pub filename: String,
    pub stage: CompilationStage,
    pub source: Option<SourceBuffer>,
    pub tokens: Option<Vec<Token>>,
    pub ast: Option<Ast>,
    pub ir: Option<IrModule>,
}

impl TranslationUnit {
    /// A unit starting from source text.
    pub fn from_source(id: UnitId, filename: impl Into<String>, text: impl Into<String>) -> Self {
        let filename = filename.into();
        Self {
            id,
            source: Some(SourceBuffer::new(filename.clone(), text, id)),
            filename,
            stage: CompilationStage::None,
            tokens: None,
            ast: None,
            ir: None,
        }
    }

    /// A unit starting from a pre-lexed package file.
    pub fn from_package(id: UnitId, path: impl AsRef<Path>) -> CompileResult<Self> {
        let path = path.as_ref();
        let tokens = pkg_read_file(path, id)?;
        Ok(Self {
            id,
            filename: path.display().to_string(),
            stage: CompilationStage::TokenList,
            source: None,
            tokens: Some(tokens),
            ast: None,
            ir: None,
        })
    }

    /// Run the lexer if the unit still holds raw source.
    pub fn tokenize(&mut self, ctx: &mut CompilerContext) -> CompileResult<()> {
        if self.stage >= CompilationStage::TokenList {
            return Ok(());
        }
        let source = self.source.as_ref().ok_or_else(|| {
            CompileError::internal("translation unit has neither source nor tokens")
        })?;
        log::debug!("tokenizing '{}'", self.filename);
        self.tokens = Some(keel_lexer::tokenize(ctx, source)?);
        self.stage = CompilationStage::TokenList;
        Ok(())
    }

    /// Run the parser over the unit's token list.
    pub fn parse(&mut self, ctx: &mut CompilerContext) -> CompileResult<()> {
        if self.stage >= CompilationStage::Ast {
            return Ok(());
        }
        self.tokenize(ctx)?;
        let tokens = self.tokens.clone().ok_or_else(|| {
            CompileError::internal("translation unit lost its token list")
        })?;
        log::debug!("parsing '{}'", self.filename);
        self.ast = Some(keel_parser::parse(ctx, tokens)?);
        self.stage = CompilationStage::Ast;
        Ok(())
    }

    /// Lower the unit's AST into an IR module.
    pub fn lower(&mut self, ctx: &mut CompilerContext) -> CompileResult<()> {
        if self.stage >= CompilationStage::IrModule {
            return Ok(());
        }
        self.parse(ctx)?;
        let ast = self.ast.as_ref().ok_or_else(|| {
            CompileError::internal("translation unit lost its AST")
        })?;
        log::debug!("lowering '{}'", self.filename);
        self.ir = Some(keel_ir::lower(ctx, ast)?);
        self.stage = CompilationStage::IrModule;
        Ok(())
    }

    /// Run every remaining stage.
    pub fn compile(&mut self, ctx: &mut CompilerContext) -> CompileResult<()> {
        self.lower(ctx)
    }

    /// Write the unit's token list as a pre-lexed package.
    pub fn write_package(&mut self, ctx: &mut CompilerContext, path: impl AsRef<Path>) -> CompileResult<()> {
        self.tokenize(ctx)?;
        let tokens = self.tokens.as_ref().ok_or_else(|| {
            CompileError::internal("translation unit lost its token list")
        })?;
        pkg_write_file(path, tokens)
    }

    /// The lowered module, once compilation reached it. This is the object
    /// handed to the code generation collaborator.
    pub fn ir_module(&self) -> Option<&IrModule> {
        self.ir.as_ref()
    }
}

/// Compile a batch of translation units. Each failed unit halts at its
/// first error; the batch continues through the remaining units.
pub fn compile_all(
    ctx: &mut CompilerContext,
    units: &mut [TranslationUnit],
) -> Vec<CompileResult<()>> {
    units
        .iter_mut()
        .map(|unit| {
            let result = unit.compile(ctx);
            if let Err(error) = &result {
                log::debug!("halting '{}': {}", unit.filename, error);
            }
            result
        })
        .collect()
}

/// Compile a single source string. Convenience entry point used by tests
/// and by collaborators that drive one unit at a time.
pub fn compile_source(
    ctx: &mut CompilerContext,
    filename: &str,
    text: &str,
) -> CompileResult<TranslationUnit> {
    let mut unit = TranslationUnit::from_source(0, filename, text);
    unit.compile(ctx)?;
    Ok(unit)
}
