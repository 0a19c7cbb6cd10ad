//! Statement nodes

use crate::ast::expr::{BinaryOp, Expr};
use crate::ast::types::TypeExpr;
use keel_common::Span;
use serde::{Deserialize, Serialize};

/// A statement node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

impl Stmt {
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Self { kind, span }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StmtKind {
    Return(Option<Expr>),
    /// A call (or method call) used as a statement
    Call(Expr),
    Declare {
        name: String,
        ty: TypeExpr,
        value: Option<Expr>,
        /// `= undef` skips zero initialization
        undef: bool,
    },
    Assign { target: Expr, value: Expr },
    CompoundAssign { op: BinaryOp, target: Expr, value: Expr },
    If { condition: Expr, body: Vec<Stmt> },
    IfElse { condition: Expr, body: Vec<Stmt>, else_body: Vec<Stmt> },
    Unless { condition: Expr, body: Vec<Stmt> },
    UnlessElse { condition: Expr, body: Vec<Stmt>, else_body: Vec<Stmt> },
    While { label: Option<String>, condition: Expr, body: Vec<Stmt> },
    Until { label: Option<String>, condition: Expr, body: Vec<Stmt> },
    Break,
    Continue,
    BreakTo(String),
    ContinueTo(String),
    Defer(Box<Stmt>),
    Delete(Expr),
}

impl StmtKind {
    /// Recursively check whether this statement contains a `return`.
    /// Used to reject `return` inside `defer` bodies.
    pub fn contains_return(&self) -> bool {
        match self {
            StmtKind::Return(_) => true,
            StmtKind::If { body, .. }
            | StmtKind::Unless { body, .. }
            | StmtKind::While { body, .. }
            | StmtKind::Until { body, .. } => body.iter().any(|s| s.kind.contains_return()),
            StmtKind::IfElse { body, else_body, .. }
            | StmtKind::UnlessElse { body, else_body, .. } => {
                body.iter().any(|s| s.kind.contains_return())
                    || else_body.iter().any(|s| s.kind.contains_return())
            }
            StmtKind::Defer(inner) => inner.kind.contains_return(),
            _ => false,
        }
    }
}
