use crate::analyzer::RoutineId;
use crate::lexer::Position;

use super::{Call, Designator, Expr, Place};

#[derive(Clone, Debug, PartialEq)]
pub struct Ident {
    pub name: String,
    pub pos: Position,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Program {
    pub name: Ident,
    pub block: Block,
}

#[derive(Clone, Debug, PartialEq, Default)]
pub struct Block {
    /// Declarations in source order.
    pub decls: Vec<Decl>,
    pub body: Vec<Stmt>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Decl {
    Const(ConstDecl),
    Type(TypeDecl),
    Var(VarDecl),
    Routine(RoutineDecl),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ConstDecl {
    pub name: Ident,
    pub value: Expr,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TypeDecl {
    pub name: Ident,
    pub spec: TypeSpec,
}

#[derive(Clone, Debug, PartialEq)]
pub struct VarDecl {
    pub names: Vec<Ident>,
    pub spec: TypeSpec,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TypeSpec {
    Named(Ident),
    /// `array[a..b, c..d] of T`; several ranges mean nested arrays.
    Array {
        ranges: Vec<(Expr, Expr)>,
        elem: Box<TypeSpec>,
        pos: Position,
    },
    Record {
        fields: Vec<FieldDecl>,
        pos: Position,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldDecl {
    pub names: Vec<Ident>,
    pub spec: TypeSpec,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ParamDecl {
    pub names: Vec<Ident>,
    pub spec: TypeSpec,
    pub by_ref: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RoutineDecl {
    pub name: Ident,
    pub params: Vec<ParamDecl>,
    /// `Some` for functions.
    pub ret: Option<TypeSpec>,
    pub block: Block,
    pub id: Option<RoutineId>,
}

impl RoutineDecl {
    pub fn is_function(&self) -> bool {
        self.ret.is_some()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub pos: Position,
}

impl Stmt {
    pub fn new(kind: StmtKind, pos: Position) -> Self {
        Self { kind, pos }
    }

    pub fn empty(pos: Position) -> Self {
        Self::new(StmtKind::Empty, pos)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CaseArm {
    pub labels: Vec<Expr>,
    pub body: Stmt,
}

#[derive(Clone, Debug, PartialEq)]
pub enum StmtKind {
    Empty,
    Compound(Vec<Stmt>),
    Assign {
        target: Designator,
        value: Expr,
    },
    Call(Call),
    If {
        cond: Expr,
        then_stmt: Box<Stmt>,
        else_stmt: Option<Box<Stmt>>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    Repeat {
        body: Vec<Stmt>,
        cond: Expr,
    },
    For {
        var: Designator,
        start: Expr,
        end: Expr,
        downto: bool,
        body: Box<Stmt>,
        /// Hidden slot holding the final value, reserved by the analyzer.
        limit: Option<Place>,
    },
    Case {
        selector: Expr,
        arms: Vec<CaseArm>,
        default: Option<Vec<Stmt>>,
        /// Hidden slot holding the selector value, reserved by the analyzer.
        temp: Option<Place>,
    },
    Exit(Option<Expr>),
}
