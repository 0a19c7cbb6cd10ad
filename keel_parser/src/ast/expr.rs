//! Expression nodes

use crate::ast::types::TypeExpr;
use keel_common::Span;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulus,
    Equals,
    NotEquals,
    LessThan,
    GreaterThan,
    LessThanEq,
    GreaterThanEq,
    And,
    Or,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulus => "%",
            BinaryOp::Equals => "==",
            BinaryOp::NotEquals => "!=",
            BinaryOp::LessThan => "<",
            BinaryOp::GreaterThan => ">",
            BinaryOp::LessThanEq => "<=",
            BinaryOp::GreaterThanEq => ">=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        };
        write!(f, "{}", op)
    }
}

/// An expression node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExprKind {
    // Typed literals
    ByteLit(i64),
    UbyteLit(i64),
    ShortLit(i64),
    UshortLit(i64),
    IntLit(i64),
    UintLit(i64),
    LongLit(i64),
    UlongLit(i64),
    FloatLit(f64),
    DoubleLit(f64),
    BoolLit(bool),

    // Literals awaiting type context
    GenericInt(i64),
    GenericFloat(f64),

    StringLit(String),
    CStringLit(String),
    Null,

    /// Variable reference (resolved against locals, parameters, globals,
    /// enum kinds and constants during lowering)
    Variable(String),

    Call { name: String, args: Vec<Expr> },
    MethodCall { value: Box<Expr>, name: String, args: Vec<Expr> },
    Member { value: Box<Expr>, field: String },
    AddressOf(Box<Expr>),
    Dereference(Box<Expr>),
    ArrayIndex { value: Box<Expr>, index: Box<Expr> },
    Cast { to: TypeExpr, value: Box<Expr> },
    Sizeof(TypeExpr),
    /// Heap allocation with an optional element count
    New { ty: TypeExpr, amount: Option<Box<Expr>> },
    /// `func &name` — resolved by name only
    FuncAddress { name: String },
    Not(Box<Expr>),
    Binary { op: BinaryOp, a: Box<Expr>, b: Box<Expr> },
}

impl ExprKind {
    /// Whether this expression designates a memory location. The tag set of
    /// l-value-capable expressions is fixed: variable, dereference, member
    /// and array index (globals resolve through the variable tag).
    pub fn is_mutable(&self) -> bool {
        matches!(
            self,
            ExprKind::Variable(_)
                | ExprKind::Dereference(_)
                | ExprKind::Member { .. }
                | ExprKind::ArrayIndex { .. }
        )
    }

    /// Whether this expression is legal in statement position.
    pub fn is_statement_worthy(&self) -> bool {
        matches!(self, ExprKind::Call { .. } | ExprKind::MethodCall { .. })
    }
}
