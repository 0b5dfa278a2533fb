//! Shared syntax tree consumed by every analysis stage.
//!
//! The parser builds these nodes once; the semantic pass fills defaults
//! (`For.step`), after which the tree is read-only. Analyses receive context
//! as explicit arguments — children never point back at parents.

use crate::token::Span;

#[derive(Debug, PartialEq, Clone)]
pub enum Expr {
    Num(i64),
    Bool(bool),
    Var(String),
    Index {
        base: Box<Expr>,
        indices: Vec<Expr>,
    },
    Slice {
        base: Box<Expr>,
        lo: Box<Expr>,
        hi: Box<Expr>,
    },
    Member {
        base: Box<Expr>,
        field: String,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Bin {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
    Ceil(Box<Expr>),
    Floor(Box<Expr>),
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    IntDiv,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinOp {
    pub fn is_relational(self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinOp::And | BinOp::Or)
    }
}

/// Assignment target forms accepted by the parser.
#[derive(Debug, PartialEq, Clone)]
pub enum LValue {
    Var(String),
    Index { base: Box<LValue>, indices: Vec<Expr> },
    Member { base: Box<LValue>, field: String },
}

impl LValue {
    /// The variable at the root of the target chain.
    pub fn root_name(&self) -> &str {
        match self {
            LValue::Var(name) => name,
            LValue::Index { base, .. } | LValue::Member { base, .. } => base.root_name(),
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Option<Span>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Stmt {
    Assign {
        target: LValue,
        expr: Expr,
        span: Option<Span>,
    },
    For {
        var: String,
        start: Expr,
        end: Expr,
        /// `None` until the semantic pass fills the default of 1.
        step: Option<Expr>,
        inclusive: bool,
        body: Block,
        span: Option<Span>,
    },
    While {
        cond: Expr,
        body: Block,
        span: Option<Span>,
    },
    Repeat {
        body: Vec<Stmt>,
        until: Expr,
        span: Option<Span>,
    },
    If {
        cond: Expr,
        then_body: Block,
        else_body: Option<Block>,
        span: Option<Span>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
        span: Option<Span>,
    },
    Return {
        expr: Option<Expr>,
        span: Option<Span>,
    },
    /// Bare expression statement, e.g. an array declaration `A[1..n]`.
    /// Carries no cost.
    ExprStmt { expr: Expr, span: Option<Span> },
    /// `ClassName varname` — declarative only, carries no cost.
    ObjectDecl {
        class_name: String,
        var_name: String,
        span: Option<Span>,
    },
}

impl Stmt {
    pub fn span(&self) -> Option<Span> {
        match self {
            Stmt::Assign { span, .. }
            | Stmt::For { span, .. }
            | Stmt::While { span, .. }
            | Stmt::Repeat { span, .. }
            | Stmt::If { span, .. }
            | Stmt::Call { span, .. }
            | Stmt::Return { span, .. }
            | Stmt::ExprStmt { span, .. }
            | Stmt::ObjectDecl { span, .. } => *span,
        }
    }

    pub fn line(&self) -> usize {
        self.span().map(|s| s.line).unwrap_or(0)
    }
}

/// Procedure parameter: a name, optionally with slice bounds `A[lo..hi]`.
#[derive(Debug, PartialEq, Clone)]
pub struct Param {
    pub name: String,
    pub bounds: Option<(Expr, Expr)>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct Proc {
    pub name: String,
    pub params: Vec<Param>,
    pub body: Block,
    pub span: Option<Span>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct Class {
    pub name: String,
    pub attributes: Vec<String>,
    pub span: Option<Span>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Item {
    Class(Class),
    Proc(Proc),
    Stmt(Stmt),
}

#[derive(Debug, PartialEq, Clone)]
pub struct Program {
    pub body: Vec<Item>,
}

impl Program {
    /// Top-level statements outside any procedure (the implicit main program).
    pub fn main_stmts(&self) -> Vec<&Stmt> {
        self.body
            .iter()
            .filter_map(|item| match item {
                Item::Stmt(stmt) => Some(stmt),
                _ => None,
            })
            .collect()
    }

    pub fn procs(&self) -> Vec<&Proc> {
        self.body
            .iter()
            .filter_map(|item| match item {
                Item::Proc(proc) => Some(proc),
                _ => None,
            })
            .collect()
    }

    pub fn find_proc(&self, name: &str) -> Option<&Proc> {
        self.procs().into_iter().find(|p| p.name == name)
    }
}
