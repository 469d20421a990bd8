use std::fmt;

use crate::analyzer::{Intrinsic, RoutineId, Ty};
use crate::lexer::Position;

#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub pos: Position,
    /// Filled in by semantic analysis.
    pub ty: Option<Ty>,
}

impl Expr {
    pub fn new(kind: ExprKind, pos: Position) -> Self {
        Self {
            kind,
            pos,
            ty: None,
        }
    }

    /// Returns the designator if the expression can be stored into, i.e.
    /// it is a plain variable reference with optional selectors.
    pub fn as_designator(&self) -> Option<&Designator> {
        match &self.kind {
            ExprKind::Designator(d) => Some(d),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    Int(i64),
    Real(f64),
    Str(String),
    Char(char),
    Bool(bool),
    Designator(Designator),
    Call(Call),
    Unary(UnOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    /// Inserted by the analyzer where an integer meets a real.
    IntToReal(Box<Expr>),
    /// Inserted by the analyzer where a char value is used as a string.
    CharToStr(Box<Expr>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Plus,
    Not,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    IntDiv,
    Mod,
    And,
    Or,
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
}

impl BinOp {
    pub fn is_relational(&self) -> bool {
        matches!(
            self,
            BinOp::Equal
                | BinOp::NotEqual
                | BinOp::LessThan
                | BinOp::LessEqual
                | BinOp::GreaterThan
                | BinOp::GreaterEqual
        )
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::IntDiv => "div",
            BinOp::Mod => "mod",
            BinOp::And => "and",
            BinOp::Or => "or",
            BinOp::Equal => "=",
            BinOp::NotEqual => "<>",
            BinOp::LessThan => "<",
            BinOp::LessEqual => "<=",
            BinOp::GreaterThan => ">",
            BinOp::GreaterEqual => ">=",
        })
    }
}

impl fmt::Display for UnOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UnOp::Neg => "-",
            UnOp::Plus => "+",
            UnOp::Not => "not",
        })
    }
}

/// Where a variable lives, as seen by the code generator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Place {
    /// Global slot.
    Global(usize),
    /// Frame-relative slot of the current routine.
    Local(usize),
    /// Frame-relative slot holding the address of the variable.
    LocalRef(usize),
    /// Result slot of the function being compiled.
    Result,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Binding {
    pub place: Place,
    /// Type of the named variable, before any selector is applied.
    pub ty: Ty,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Selector {
    Index(Box<Expr>),
    Field { name: String, pos: Position },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Designator {
    pub name: String,
    pub selectors: Vec<Selector>,
    pub pos: Position,
    pub binding: Option<Binding>,
}

impl Designator {
    pub fn new(name: String, pos: Position) -> Self {
        Self {
            name,
            selectors: vec![],
            pos,
            binding: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Callee {
    Routine(RoutineId),
    Intrinsic(Intrinsic),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Call {
    pub name: String,
    pub args: Vec<Expr>,
    pub pos: Position,
    pub callee: Option<Callee>,
}

impl Call {
    pub fn new(name: String, args: Vec<Expr>, pos: Position) -> Self {
        Self {
            name,
            args,
            pos,
            callee: None,
        }
    }
}
