//! Parser implementation
//!
//! Recursive descent over the token stream. Expressions are parsed in two
//! layers: `parse_primary_expr` handles the concrete part (literals, unary
//! prefixes, identifiers, postfix chains) and `parse_op_expr` handles
//! operator precedence. Statements are parsed per block; assignment
//! operators are only recognized at statement level.
//!
//! On error the parser reports a span-anchored diagnostic and stops; there
//! is no partial-AST recovery.

use crate::ast::*;
use crate::precedence::{token_precedence, Precedence};
use keel_common::{CompileError, CompileResult, CompilerContext, Span};
use keel_lexer::{Token, TokenKind};

/// Parse a token stream into an AST.
pub fn parse(ctx: &mut CompilerContext, tokens: Vec<Token>) -> CompileResult<Ast> {
    Parser::new(ctx, tokens).parse_program()
}

/// Tracks whether we are parsing the live branch of a meta conditional.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MetaBranch {
    /// Inside a live `#if` branch; a `#else` skips to `#end`.
    LiveThen,
    /// Inside a live `#else` branch; only `#end` remains.
    LiveElse,
}

/// Parser for the Keel language
pub struct Parser<'a> {
    ctx: &'a mut CompilerContext,
    tokens: Vec<Token>,
    current: usize,
    meta_stack: Vec<MetaBranch>,
}

impl<'a> Parser<'a> {
    pub fn new(ctx: &'a mut CompilerContext, tokens: Vec<Token>) -> Self {
        Self { ctx, tokens, current: 0, meta_stack: Vec::new() }
    }

    pub fn parse_program(&mut self) -> CompileResult<Ast> {
        let mut ast = Ast::new();

        loop {
            self.skip_newlines();
            if self.is_at_end() {
                break;
            }

            match self.current_kind() {
                TokenKind::KeywordFunc => {
                    let function = self.parse_function()?;
                    ast.funcs.push(function);
                }
                TokenKind::KeywordForeign => self.parse_foreign(&mut ast)?,
                TokenKind::KeywordPacked => {
                    self.advance();
                    if !self.check(&TokenKind::KeywordStruct) {
                        return self.fail("expected 'struct' after 'packed'");
                    }
                    let structure = self.parse_struct(true)?;
                    ast.structs.push(structure);
                }
                TokenKind::KeywordStruct => {
                    let structure = self.parse_struct(false)?;
                    ast.structs.push(structure);
                }
                TokenKind::KeywordAlias => {
                    let alias = self.parse_alias()?;
                    ast.aliases.push(alias);
                }
                TokenKind::KeywordImport => {
                    let import = self.parse_import()?;
                    ast.imports.push(import);
                }
                TokenKind::KeywordPragma => self.parse_pragma()?,
                TokenKind::KeywordEnum => {
                    let decl = self.parse_enum()?;
                    ast.enums.push(decl);
                }
                TokenKind::KeywordConst => {
                    let constant = self.parse_constant()?;
                    ast.constants.push(constant);
                }
                TokenKind::KeywordExternal => {
                    self.advance();
                    let global = self.parse_global(true)?;
                    ast.globals.push(global);
                }
                TokenKind::Hash => self.parse_meta_directive()?,
                TokenKind::Word(_) => {
                    let global = self.parse_global(false)?;
                    ast.globals.push(global);
                }
                _ => {
                    return self.fail(format!(
                        "expected declaration, got {}",
                        self.current_kind().name()
                    ));
                }
            }
        }

        Ok(ast)
    }

    // ------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------

    fn parse_function(&mut self) -> CompileResult<Function> {
        let span = self.current_span();
        self.expect(TokenKind::KeywordFunc)?;
        let name = self.expect_word()?;

        let mut arg_names = Vec::new();
        let mut arg_types = Vec::new();
        let mut arg_flows = Vec::new();
        let mut arg_type_traits = Vec::new();

        if self.match_token(&TokenKind::OpenParen) {
            loop {
                self.skip_newlines();
                if self.match_token(&TokenKind::CloseParen) {
                    break;
                }

                let flow = self.parse_flow();
                let arg_name = self.expect_word()?;
                let pod = self.match_token(&TokenKind::KeywordPod);
                let arg_type = self.parse_type()?;

                arg_names.push(arg_name);
                arg_types.push(arg_type);
                arg_flows.push(flow);
                arg_type_traits.push(ArgTraits { pod });

                self.skip_newlines();
                if !self.match_token(&TokenKind::Comma) {
                    self.expect(TokenKind::CloseParen)?;
                    break;
                }
            }
        }

        let return_type = if self.check(&TokenKind::OpenBrace) || self.check(&TokenKind::Newline)
        {
            TypeExpr::void(span)
        } else {
            self.parse_type()?
        };

        self.skip_newlines();
        let statements = self.parse_block()?;

        let traits = FunctionTraits { main: name == "main", ..FunctionTraits::default() };

        Ok(Function {
            name,
            arg_names,
            arg_types,
            arg_flows,
            arg_type_traits,
            return_type,
            traits,
            statements,
            span,
        })
    }

    fn parse_flow(&mut self) -> Flow {
        if self.match_token(&TokenKind::KeywordIn) {
            Flow::In
        } else if self.match_token(&TokenKind::KeywordOut) {
            Flow::Out
        } else if self.match_token(&TokenKind::KeywordInout) {
            Flow::InOut
        } else {
            Flow::In
        }
    }

    /// `foreign` introduces either a foreign function or a foreign library.
    fn parse_foreign(&mut self, ast: &mut Ast) -> CompileResult<()> {
        let span = self.current_span();
        self.expect(TokenKind::KeywordForeign)?;

        let stdcall = self.match_token(&TokenKind::KeywordStdcall);

        match self.current_kind().clone() {
            TokenKind::StringLit(name) | TokenKind::CStringLit(name) => {
                if stdcall {
                    return self.fail("expected foreign function name after 'stdcall'");
                }
                self.advance();
                ast.libraries.push(ForeignLibrary { name, is_framework: false });
                Ok(())
            }
            TokenKind::Word(name) => {
                self.advance();
                let function = self.parse_foreign_function(name, stdcall, span)?;
                ast.funcs.push(function);
                Ok(())
            }
            other => self.fail(format!(
                "expected foreign function or library name, got {}",
                other.name()
            )),
        }
    }

    fn parse_foreign_function(
        &mut self,
        name: String,
        stdcall: bool,
        span: Span,
    ) -> CompileResult<Function> {
        let mut arg_types = Vec::new();
        let mut variadic = false;

        self.expect(TokenKind::OpenParen)?;
        loop {
            self.skip_newlines();
            if self.match_token(&TokenKind::CloseParen) {
                break;
            }
            if self.match_token(&TokenKind::Ellipsis) {
                variadic = true;
                self.skip_newlines();
                self.expect(TokenKind::CloseParen)?;
                break;
            }

            arg_types.push(self.parse_type()?);

            self.skip_newlines();
            if !self.match_token(&TokenKind::Comma) {
                self.expect(TokenKind::CloseParen)?;
                break;
            }
        }

        let return_type = if self.starts_type() {
            self.parse_type()?
        } else {
            TypeExpr::void(span)
        };

        let arity = arg_types.len();
        Ok(Function {
            name,
            arg_names: vec![String::new(); arity],
            arg_types,
            arg_flows: vec![Flow::In; arity],
            arg_type_traits: vec![ArgTraits::default(); arity],
            return_type,
            traits: FunctionTraits {
                foreign: true,
                variadic,
                stdcall,
                main: false,
            },
            statements: Vec::new(),
            span,
        })
    }

    fn parse_struct(&mut self, packed: bool) -> CompileResult<Struct> {
        let span = self.current_span();
        self.expect(TokenKind::KeywordStruct)?;
        let name = self.expect_word()?;

        if is_reserved_type_name(&name) {
            return self.fail(format!("'{}' is a reserved type name", name));
        }

        let mut field_names = Vec::new();
        let mut field_types = Vec::new();

        self.expect(TokenKind::OpenParen)?;
        loop {
            self.skip_newlines();
            if self.match_token(&TokenKind::CloseParen) {
                break;
            }

            field_names.push(self.expect_word()?);
            field_types.push(self.parse_type()?);

            self.skip_newlines();
            if !self.match_token(&TokenKind::Comma) {
                self.skip_newlines();
                self.expect(TokenKind::CloseParen)?;
                break;
            }
        }

        Ok(Struct { name, field_names, field_types, packed, span })
    }

    fn parse_alias(&mut self) -> CompileResult<Alias> {
        let span = self.current_span();
        self.expect(TokenKind::KeywordAlias)?;
        let name = self.expect_word()?;

        if is_reserved_type_name(&name) {
            return self.fail(format!("'{}' is a reserved type name", name));
        }

        self.expect(TokenKind::Assign)?;
        let ty = self.parse_type()?;
        Ok(Alias { name, ty, span })
    }

    fn parse_import(&mut self) -> CompileResult<Import> {
        let span = self.current_span();
        self.expect(TokenKind::KeywordImport)?;

        match self.current_kind().clone() {
            TokenKind::StringLit(path) | TokenKind::CStringLit(path) | TokenKind::Word(path) => {
                self.advance();
                Ok(Import { path, span })
            }
            other => self.fail(format!("expected import target, got {}", other.name())),
        }
    }

    /// `pragma <name> [value]`. Unrecognized pragmas produce a warning.
    fn parse_pragma(&mut self) -> CompileResult<()> {
        let span = self.current_span();
        self.expect(TokenKind::KeywordPragma)?;
        let name = self.expect_word()?;

        let value = match self.current_kind().clone() {
            TokenKind::StringLit(text) | TokenKind::CStringLit(text) | TokenKind::Word(text) => {
                self.advance();
                Some(text)
            }
            _ => None,
        };

        match name.as_str() {
            "no_type_info" => self.ctx.flags.no_type_info = true,
            "project_name" | "optimization" => {
                // Recorded by the surrounding driver; nothing for the core.
                let _ = value;
            }
            other => {
                self.ctx
                    .diagnostics
                    .warning(format!("unrecognized pragma '{}'", other), span);
            }
        }
        Ok(())
    }

    fn parse_enum(&mut self) -> CompileResult<EnumDecl> {
        let span = self.current_span();
        self.expect(TokenKind::KeywordEnum)?;
        let name = self.expect_word()?;

        if is_reserved_type_name(&name) {
            return self.fail(format!("'{}' is a reserved type name", name));
        }

        let mut kinds = Vec::new();
        self.expect(TokenKind::OpenParen)?;
        loop {
            self.skip_newlines();
            if self.match_token(&TokenKind::CloseParen) {
                break;
            }
            kinds.push(self.expect_word()?);
            self.skip_newlines();
            if !self.match_token(&TokenKind::Comma) {
                self.skip_newlines();
                self.expect(TokenKind::CloseParen)?;
                break;
            }
        }

        Ok(EnumDecl { name, kinds, span })
    }

    fn parse_constant(&mut self) -> CompileResult<Constant> {
        let span = self.current_span();
        self.expect(TokenKind::KeywordConst)?;
        let name = self.expect_word()?;
        self.expect(TokenKind::Assign)?;
        let value = self.parse_expr()?;
        Ok(Constant { name, value, span })
    }

    fn parse_global(&mut self, external: bool) -> CompileResult<Global> {
        let span = self.current_span();
        let name = self.expect_word()?;
        let ty = self.parse_type()?;

        let initial = if self.match_token(&TokenKind::Assign) {
            if external {
                return self.fail("external global variables cannot have initializers");
            }
            Some(self.parse_expr()?)
        } else {
            None
        };

        Ok(Global { name, ty, initial, external, span })
    }

    // ------------------------------------------------------------------
    // Meta directives
    // ------------------------------------------------------------------

    fn parse_meta_directive(&mut self) -> CompileResult<()> {
        let span = self.current_span();
        self.expect(TokenKind::Hash)?;

        match self.current_kind().clone() {
            TokenKind::KeywordIf => {
                self.advance();
                let name = self.expect_word()?;
                if self.ctx.meta.lookup(&name) {
                    self.meta_stack.push(MetaBranch::LiveThen);
                } else if self.skip_meta_branch()? {
                    self.meta_stack.push(MetaBranch::LiveElse);
                }
                Ok(())
            }
            TokenKind::KeywordElse => {
                self.advance();
                match self.meta_stack.pop() {
                    Some(MetaBranch::LiveThen) => {
                        // The then-branch was live, so the else-branch dies.
                        self.skip_to_meta_end()?;
                        Ok(())
                    }
                    _ => self.fail("'#else' without matching '#if'"),
                }
            }
            TokenKind::Word(word) if word == "end" => {
                self.advance();
                match self.meta_stack.pop() {
                    Some(_) => Ok(()),
                    None => self.fail("'#end' without matching '#if'"),
                }
            }
            TokenKind::Word(word) if word == "define" => {
                self.advance();
                let name = self.expect_word()?;
                let value = if self.match_token(&TokenKind::KeywordTrue) {
                    true
                } else if self.match_token(&TokenKind::KeywordFalse) {
                    false
                } else {
                    return self.fail("expected 'true' or 'false' after '#define'");
                };
                self.ctx.meta.define(name, value);
                Ok(())
            }
            TokenKind::KeywordUndef => {
                self.advance();
                let name = self.expect_word()?;
                self.ctx.meta.undefine(&name);
                Ok(())
            }
            TokenKind::Word(word) if word == "print" => {
                self.advance();
                match self.current_kind().clone() {
                    TokenKind::StringLit(text) | TokenKind::CStringLit(text) => {
                        self.advance();
                        log::info!("#print: {}", text);
                        Ok(())
                    }
                    other => {
                        self.fail(format!("expected string after '#print', got {}", other.name()))
                    }
                }
            }
            TokenKind::Word(word) if word == "halt" => {
                self.advance();
                self.ctx.diagnostics.error("compilation halted by '#halt'", span);
                Err(CompileError::parse("compilation halted by '#halt'"))
            }
            other => self.fail(format!("unknown meta directive {}", other.name())),
        }
    }

    /// Skip a dead `#if` branch. Returns true when a matching `#else` was
    /// found (so the else-branch is live), false when `#end` closed the
    /// conditional directly.
    fn skip_meta_branch(&mut self) -> CompileResult<bool> {
        let mut depth = 0usize;
        loop {
            if self.is_at_end() {
                return self.fail("unterminated '#if' meta conditional");
            }
            if self.check(&TokenKind::Hash) {
                self.advance();
                match self.current_kind().clone() {
                    TokenKind::KeywordIf => {
                        depth += 1;
                        self.advance();
                    }
                    TokenKind::KeywordElse if depth == 0 => {
                        self.advance();
                        return Ok(true);
                    }
                    TokenKind::KeywordElse => self.advance(),
                    TokenKind::Word(word) if word == "end" => {
                        self.advance();
                        if depth == 0 {
                            return Ok(false);
                        }
                        depth -= 1;
                    }
                    _ => self.advance(),
                }
            } else {
                self.advance();
            }
        }
    }

    /// Skip tokens up to and including the matching `#end`.
    fn skip_to_meta_end(&mut self) -> CompileResult<()> {
        let mut depth = 0usize;
        loop {
            if self.is_at_end() {
                return self.fail("unterminated '#if' meta conditional");
            }
            if self.check(&TokenKind::Hash) {
                self.advance();
                match self.current_kind().clone() {
                    TokenKind::KeywordIf => {
                        depth += 1;
                        self.advance();
                    }
                    TokenKind::Word(word) if word == "end" => {
                        self.advance();
                        if depth == 0 {
                            return Ok(());
                        }
                        depth -= 1;
                    }
                    _ => self.advance(),
                }
            } else {
                self.advance();
            }
        }
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn parse_block(&mut self) -> CompileResult<Vec<Stmt>> {
        self.expect(TokenKind::OpenBrace)?;
        let mut statements = Vec::new();

        loop {
            self.skip_newlines();
            if self.match_token(&TokenKind::CloseBrace) {
                break;
            }
            if self.is_at_end() {
                return self.fail("unterminated block, expected '}'");
            }
            if self.check(&TokenKind::Hash) {
                self.parse_meta_directive()?;
                continue;
            }
            statements.push(self.parse_stmt()?);
        }

        Ok(statements)
    }

    fn parse_stmt(&mut self) -> CompileResult<Stmt> {
        let span = self.current_span();

        let kind = match self.current_kind() {
            TokenKind::KeywordReturn => {
                self.advance();
                if self.check(&TokenKind::Newline) || self.check(&TokenKind::CloseBrace) {
                    StmtKind::Return(None)
                } else {
                    StmtKind::Return(Some(self.parse_expr()?))
                }
            }
            TokenKind::KeywordIf => self.parse_conditional(false)?,
            TokenKind::KeywordUnless => self.parse_conditional(true)?,
            TokenKind::KeywordWhile => self.parse_loop(false)?,
            TokenKind::KeywordUntil => self.parse_loop(true)?,
            TokenKind::KeywordBreak => {
                self.advance();
                match self.current_kind().clone() {
                    TokenKind::Word(label) => {
                        self.advance();
                        StmtKind::BreakTo(label)
                    }
                    _ => StmtKind::Break,
                }
            }
            TokenKind::KeywordContinue => {
                self.advance();
                match self.current_kind().clone() {
                    TokenKind::Word(label) => {
                        self.advance();
                        StmtKind::ContinueTo(label)
                    }
                    _ => StmtKind::Continue,
                }
            }
            TokenKind::KeywordDefer => {
                self.advance();
                let inner = self.parse_stmt()?;
                if inner.kind.contains_return() {
                    return self.fail("'return' is not allowed inside 'defer'");
                }
                StmtKind::Defer(Box::new(inner))
            }
            TokenKind::KeywordDelete => {
                self.advance();
                StmtKind::Delete(self.parse_expr()?)
            }
            TokenKind::Word(_) => self.parse_word_stmt()?,
            TokenKind::Multiply => self.parse_expr_stmt()?,
            other => {
                return self.fail(format!(
                    "unexpected {} at start of statement",
                    other.name()
                ));
            }
        };

        Ok(Stmt::new(kind, span))
    }

    fn parse_conditional(&mut self, inverted: bool) -> CompileResult<StmtKind> {
        self.advance();
        let condition = self.parse_expr()?;
        self.skip_newlines();
        let body = self.parse_block()?;

        let checkpoint = self.current;
        self.skip_newlines();
        if self.match_token(&TokenKind::KeywordElse) {
            self.skip_newlines();
            let else_body = if self.check(&TokenKind::KeywordIf)
                || self.check(&TokenKind::KeywordUnless)
            {
                vec![self.parse_stmt()?]
            } else {
                self.parse_block()?
            };

            Ok(if inverted {
                StmtKind::UnlessElse { condition, body, else_body }
            } else {
                StmtKind::IfElse { condition, body, else_body }
            })
        } else {
            self.current = checkpoint;
            Ok(if inverted {
                StmtKind::Unless { condition, body }
            } else {
                StmtKind::If { condition, body }
            })
        }
    }

    fn parse_loop(&mut self, inverted: bool) -> CompileResult<StmtKind> {
        self.advance();

        let label = match (self.current_kind().clone(), self.peek_kind(1).clone()) {
            (TokenKind::Word(name), TokenKind::Colon) => {
                self.advance();
                self.advance();
                Some(name)
            }
            _ => None,
        };

        let condition = self.parse_expr()?;
        self.skip_newlines();
        let body = self.parse_block()?;

        Ok(if inverted {
            StmtKind::Until { label, condition, body }
        } else {
            StmtKind::While { label, condition, body }
        })
    }

    /// A statement starting with an identifier: either a variable
    /// declaration (`name <type> [= value]`) or an expression statement.
    fn parse_word_stmt(&mut self) -> CompileResult<StmtKind> {
        let starts_declaration = match self.peek_kind(1) {
            TokenKind::Word(_)
            | TokenKind::Multiply
            | TokenKind::GenericInt(_)
            | TokenKind::KeywordFunc
            | TokenKind::KeywordFuncptr => true,
            TokenKind::OpenBracket => matches!(self.peek_kind(2), TokenKind::CloseBracket),
            _ => false,
        };

        if starts_declaration {
            let name = self.expect_word()?;
            let ty = self.parse_type()?;

            let (value, undef) = if self.match_token(&TokenKind::Assign) {
                if self.match_token(&TokenKind::KeywordUndef) {
                    (None, true)
                } else {
                    (Some(self.parse_expr()?), false)
                }
            } else {
                (None, false)
            };

            Ok(StmtKind::Declare { name, ty, value, undef })
        } else {
            self.parse_expr_stmt()
        }
    }

    /// An expression in statement position. Only calls and assignments are
    /// legal here.
    fn parse_expr_stmt(&mut self) -> CompileResult<StmtKind> {
        let expr = self.parse_expr()?;

        let assign_op = match self.current_kind() {
            TokenKind::Assign => None,
            TokenKind::AddAssign => Some(BinaryOp::Add),
            TokenKind::SubtractAssign => Some(BinaryOp::Subtract),
            TokenKind::MultiplyAssign => Some(BinaryOp::Multiply),
            TokenKind::DivideAssign => Some(BinaryOp::Divide),
            TokenKind::ModulusAssign => Some(BinaryOp::Modulus),
            _ => {
                if expr.kind.is_statement_worthy() {
                    return Ok(StmtKind::Call(expr));
                }
                return self.fail("expression not allowed as statement");
            }
        };

        if !expr.kind.is_mutable() {
            return self.fail("cannot assign to this expression");
        }

        self.advance();
        let value = self.parse_expr()?;

        Ok(match assign_op {
            None => StmtKind::Assign { target: expr, value },
            Some(op) => StmtKind::CompoundAssign { op, target: expr, value },
        })
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    pub fn parse_expr(&mut self) -> CompileResult<Expr> {
        let left = self.parse_primary_expr()?;
        self.parse_op_expr(Precedence::UberLogic as u8, left)
    }

    /// Consume infix operators while their precedence is at least
    /// `min_prec`, recursing one level tighter on the right side.
    fn parse_op_expr(&mut self, min_prec: u8, mut left: Expr) -> CompileResult<Expr> {
        loop {
            if self.current_kind().terminates_expression() {
                break;
            }

            let precedence = token_precedence(self.current_kind());
            if precedence == Precedence::None || (precedence as u8) < min_prec {
                break;
            }

            let op = match self.current_kind() {
                TokenKind::Add => BinaryOp::Add,
                TokenKind::Subtract => BinaryOp::Subtract,
                TokenKind::Multiply => BinaryOp::Multiply,
                TokenKind::Divide => BinaryOp::Divide,
                TokenKind::Modulus => BinaryOp::Modulus,
                TokenKind::Equals => BinaryOp::Equals,
                TokenKind::NotEquals => BinaryOp::NotEquals,
                TokenKind::LessThan => BinaryOp::LessThan,
                TokenKind::GreaterThan => BinaryOp::GreaterThan,
                TokenKind::LessThanEq => BinaryOp::LessThanEq,
                TokenKind::GreaterThanEq => BinaryOp::GreaterThanEq,
                TokenKind::UberAnd | TokenKind::KeywordAnd => BinaryOp::And,
                TokenKind::UberOr | TokenKind::KeywordOr => BinaryOp::Or,
                other => {
                    return self.fail(format!("expected operator, got {}", other.name()));
                }
            };

            let span = left.span;
            self.advance();

            let right_primary = self.parse_primary_expr()?;
            let right = self.parse_op_expr(precedence as u8 + 1, right_primary)?;

            left = Expr::new(
                ExprKind::Binary { op, a: Box::new(left), b: Box::new(right) },
                span,
            );
        }

        Ok(left)
    }

    /// The concrete part of an expression, including postfix `[index]` and
    /// `.field` / `.method(...)` chains.
    fn parse_primary_expr(&mut self) -> CompileResult<Expr> {
        let span = self.current_span();

        let mut expr = match self.current_kind().clone() {
            TokenKind::GenericInt(value) => {
                self.advance();
                Expr::new(ExprKind::GenericInt(value), span)
            }
            TokenKind::GenericFloat(value) => {
                self.advance();
                Expr::new(ExprKind::GenericFloat(value), span)
            }
            TokenKind::ByteLit(value) => {
                self.advance();
                Expr::new(ExprKind::ByteLit(value), span)
            }
            TokenKind::UbyteLit(value) => {
                self.advance();
                Expr::new(ExprKind::UbyteLit(value), span)
            }
            TokenKind::ShortLit(value) => {
                self.advance();
                Expr::new(ExprKind::ShortLit(value), span)
            }
            TokenKind::UshortLit(value) => {
                self.advance();
                Expr::new(ExprKind::UshortLit(value), span)
            }
            TokenKind::IntLit(value) => {
                self.advance();
                Expr::new(ExprKind::IntLit(value), span)
            }
            TokenKind::UintLit(value) => {
                self.advance();
                Expr::new(ExprKind::UintLit(value), span)
            }
            TokenKind::LongLit(value) => {
                self.advance();
                Expr::new(ExprKind::LongLit(value), span)
            }
            TokenKind::UlongLit(value) => {
                self.advance();
                Expr::new(ExprKind::UlongLit(value), span)
            }
            TokenKind::FloatLit(value) => {
                self.advance();
                Expr::new(ExprKind::FloatLit(value), span)
            }
            TokenKind::DoubleLit(value) => {
                self.advance();
                Expr::new(ExprKind::DoubleLit(value), span)
            }
            TokenKind::KeywordTrue => {
                self.advance();
                Expr::new(ExprKind::BoolLit(true), span)
            }
            TokenKind::KeywordFalse => {
                self.advance();
                Expr::new(ExprKind::BoolLit(false), span)
            }
            TokenKind::KeywordNull => {
                self.advance();
                Expr::new(ExprKind::Null, span)
            }
            TokenKind::StringLit(text) => {
                self.advance();
                Expr::new(ExprKind::StringLit(text), span)
            }
            TokenKind::CStringLit(text) => {
                self.advance();
                Expr::new(ExprKind::CStringLit(text), span)
            }
            TokenKind::Word(name) => {
                self.advance();
                if self.check(&TokenKind::OpenParen) {
                    let args = self.parse_call_args()?;
                    Expr::new(ExprKind::Call { name, args }, span)
                } else {
                    Expr::new(ExprKind::Variable(name), span)
                }
            }
            TokenKind::OpenParen => {
                self.advance();
                self.skip_newlines();
                let inner = self.parse_expr()?;
                self.skip_newlines();
                self.expect(TokenKind::CloseParen)?;
                inner
            }
            TokenKind::Address => {
                self.advance();
                let operand = self.parse_primary_expr()?;
                if !operand.kind.is_mutable() {
                    return self.fail("cannot take the address of a non-l-value");
                }
                Expr::new(ExprKind::AddressOf(Box::new(operand)), span)
            }
            TokenKind::Multiply => {
                self.advance();
                let operand = self.parse_primary_expr()?;
                Expr::new(ExprKind::Dereference(Box::new(operand)), span)
            }
            TokenKind::Not => {
                self.advance();
                let operand = self.parse_primary_expr()?;
                Expr::new(ExprKind::Not(Box::new(operand)), span)
            }
            TokenKind::KeywordFunc => {
                self.advance();
                self.expect(TokenKind::Address)?;
                let name = self.expect_word()?;
                Expr::new(ExprKind::FuncAddress { name }, span)
            }
            TokenKind::KeywordCast => {
                self.advance();
                let to = self.parse_type()?;
                self.expect(TokenKind::OpenParen)?;
                self.skip_newlines();
                let value = self.parse_expr()?;
                self.skip_newlines();
                self.expect(TokenKind::CloseParen)?;
                Expr::new(ExprKind::Cast { to, value: Box::new(value) }, span)
            }
            TokenKind::KeywordSizeof => {
                self.advance();
                let ty = self.parse_type()?;
                Expr::new(ExprKind::Sizeof(ty), span)
            }
            TokenKind::KeywordNew => {
                self.advance();
                let ty = self.parse_type()?;
                let amount = if self.match_token(&TokenKind::Multiply) {
                    Some(Box::new(self.parse_primary_expr()?))
                } else {
                    None
                };
                Expr::new(ExprKind::New { ty, amount }, span)
            }
            other => {
                return self.fail(format!("unexpected {} in expression", other.name()));
            }
        };

        // Postfix chains attach left-associatively.
        loop {
            match self.current_kind() {
                TokenKind::OpenBracket => {
                    let chain_span = self.current_span();
                    self.advance();
                    let index = self.parse_expr()?;
                    self.expect(TokenKind::CloseBracket)?;
                    expr = Expr::new(
                        ExprKind::ArrayIndex {
                            value: Box::new(expr),
                            index: Box::new(index),
                        },
                        chain_span,
                    );
                }
                TokenKind::Member => {
                    let chain_span = self.current_span();
                    self.advance();
                    let field = self.expect_word()?;
                    if self.check(&TokenKind::OpenParen) {
                        let args = self.parse_call_args()?;
                        expr = Expr::new(
                            ExprKind::MethodCall {
                                value: Box::new(expr),
                                name: field,
                                args,
                            },
                            chain_span,
                        );
                    } else {
                        expr = Expr::new(
                            ExprKind::Member { value: Box::new(expr), field },
                            chain_span,
                        );
                    }
                }
                _ => break,
            }
        }

        Ok(expr)
    }

    fn parse_call_args(&mut self) -> CompileResult<Vec<Expr>> {
        self.expect(TokenKind::OpenParen)?;
        let mut args = Vec::new();

        loop {
            self.skip_newlines();
            if self.match_token(&TokenKind::CloseParen) {
                break;
            }
            args.push(self.parse_expr()?);
            self.skip_newlines();
            if !self.match_token(&TokenKind::Comma) {
                self.expect(TokenKind::CloseParen)?;
                break;
            }
        }

        Ok(args)
    }

    // ------------------------------------------------------------------
    // Types
    // ------------------------------------------------------------------

    /// Parse a written type into its element sequence. Elements are read
    /// left to right; `Base` and `Func` elements terminate the type.
    pub fn parse_type(&mut self) -> CompileResult<TypeExpr> {
        let span = self.current_span();
        let mut elements = smallvec::SmallVec::new();

        loop {
            match self.current_kind().clone() {
                TokenKind::Multiply => {
                    self.advance();
                    elements.push(TypeElem::Pointer);
                }
                TokenKind::OpenBracket => {
                    self.advance();
                    self.expect(TokenKind::CloseBracket)?;
                    elements.push(TypeElem::Array);
                }
                TokenKind::GenericInt(length) => {
                    if length < 0 {
                        return self.fail("fixed array length cannot be negative");
                    }
                    self.advance();
                    elements.push(TypeElem::FixedArray(length as u64));
                }
                TokenKind::KeywordFunc => {
                    elements.push(TypeElem::Func(self.parse_func_type_elem()?));
                    return Ok(TypeExpr::new(elements, span));
                }
                TokenKind::KeywordFuncptr => {
                    // The generic function pointer type.
                    self.advance();
                    elements.push(TypeElem::Base("funcptr".to_string()));
                    return Ok(TypeExpr::new(elements, span));
                }
                TokenKind::Word(name) => {
                    self.advance();
                    elements.push(TypeElem::Base(name));
                    return Ok(TypeExpr::new(elements, span));
                }
                other => {
                    return self.fail(format!("expected type, got {}", other.name()));
                }
            }
        }
    }

    fn parse_func_type_elem(&mut self) -> CompileResult<FuncTypeElem> {
        self.expect(TokenKind::KeywordFunc)?;
        self.expect(TokenKind::OpenParen)?;

        let mut arg_types = Vec::new();
        let mut arg_flows = Vec::new();
        let mut traits = FuncTypeTraits::default();

        loop {
            self.skip_newlines();
            if self.match_token(&TokenKind::CloseParen) {
                break;
            }
            if self.match_token(&TokenKind::Ellipsis) {
                traits.variadic = true;
                self.skip_newlines();
                self.expect(TokenKind::CloseParen)?;
                break;
            }

            arg_flows.push(self.parse_flow());
            arg_types.push(self.parse_type()?);

            self.skip_newlines();
            if !self.match_token(&TokenKind::Comma) {
                self.expect(TokenKind::CloseParen)?;
                break;
            }
        }

        let return_type = if self.starts_type() {
            self.parse_type()?
        } else {
            TypeExpr::void(self.current_span())
        };

        Ok(FuncTypeElem {
            arg_types,
            arg_flows,
            return_type: Box::new(return_type),
            traits,
        })
    }

    /// Whether the current token can begin a written type.
    fn starts_type(&self) -> bool {
        match self.current_kind() {
            TokenKind::Word(_)
            | TokenKind::Multiply
            | TokenKind::KeywordFunc
            | TokenKind::KeywordFuncptr
            | TokenKind::GenericInt(_) => true,
            TokenKind::OpenBracket => matches!(self.peek_kind(1), TokenKind::CloseBracket),
            _ => false,
        }
    }

    // ------------------------------------------------------------------
    // Token utilities
    // ------------------------------------------------------------------

    fn current_token(&self) -> &Token {
        let index = self.current.min(self.tokens.len().saturating_sub(1));
        &self.tokens[index]
    }

    fn current_kind(&self) -> &TokenKind {
        &self.current_token().value
    }

    fn current_span(&self) -> Span {
        self.current_token().span
    }

    fn peek_kind(&self, ahead: usize) -> &TokenKind {
        let index = (self.current + ahead).min(self.tokens.len().saturating_sub(1));
        &self.tokens[index].value
    }

    fn advance(&mut self) {
        if self.current < self.tokens.len() {
            self.current += 1;
        }
    }

    fn is_at_end(&self) -> bool {
        matches!(self.current_kind(), TokenKind::EndOfFile)
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.current_kind() == kind
    }

    fn match_token(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> CompileResult<()> {
        if self.match_token(&kind) {
            Ok(())
        } else {
            self.fail(format!(
                "expected {}, got {}",
                kind.name(),
                self.current_kind().name()
            ))
        }
    }

    fn expect_word(&mut self) -> CompileResult<String> {
        match self.current_kind().clone() {
            TokenKind::Word(name) => {
                self.advance();
                Ok(name)
            }
            other => self.fail(format!("expected identifier, got {}", other.name())),
        }
    }

    fn skip_newlines(&mut self) {
        while self.check(&TokenKind::Newline) {
            self.advance();
        }
    }

    fn fail<T>(&mut self, message: impl Into<String>) -> CompileResult<T> {
        let message = message.into();
        let span = self.current_span();
        self.ctx.diagnostics.error(message.clone(), span);
        Err(CompileError::parse(message))
    }
}
