//! Surface syntax tree. A program is a flat sequence of statements and
//! expressions; operator applications are kept as `Uniop`/`Binop` until IR
//! lowering rewrites them into plain applications.

use crate::lexer::Location;

pub type Tree = Vec<Node>;

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Stmt(Stmt),
    Expr(Expr),
}

impl Node {
    pub fn loc(&self) -> &Location {
        match self {
            Node::Stmt(stmt) => &stmt.loc,
            Node::Expr(expr) => &expr.loc,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: Box<str>,
    pub loc: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub loc: Location,
}

impl Expr {
    pub fn new(kind: ExprKind, loc: Location) -> Self {
        Self { kind, loc }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Num(Box<str>),
    Str(Box<str>),
    Symbol(Box<str>),
    Id(Box<str>),
    Uniop {
        op: Ident,
        expr: Box<Expr>,
    },
    Binop {
        op: Ident,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    App {
        fun: Box<Expr>,
        args: Vec<Expr>,
    },
    Lambda {
        params: Vec<Param>,
        body: Box<Expr>,
    },
    Cond {
        cond: Box<Expr>,
        pass: Box<Expr>,
        fail: Box<Expr>,
    },
    Let {
        bindings: Vec<Binding>,
        body: Box<Expr>,
    },
    Begin {
        head: Box<Expr>,
        tail: Vec<Expr>,
    },
}

/// A lambda parameter; the type annotation is carried for the external
/// checker and ignored by the generator.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Ident,
    pub ty: Option<Ident>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub name: Ident,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub loc: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Def { name: Ident, value: Expr },
    Module { name: Ident },
    Import { name: Ident },
}
