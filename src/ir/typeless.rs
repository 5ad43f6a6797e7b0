//! AST -> typeless IR. The tree keeps its shape except that `Uniop` and
//! `Binop` become applications of the operator's identifier, `true`/`false`
//! become boolean literals, and lambdas pick up their pointer labels.
//! `module`/`import` statements are consumed by the external resolver and
//! do not survive lowering.

use crate::lexer::Location;
use crate::parser::ast::{self, ExprKind, Node, StmtKind, Tree};

use super::Labels;

#[derive(Debug, Clone, PartialEq)]
pub struct Ir {
    pub kind: IrKind,
    pub loc: Location,
}

impl Ir {
    pub fn new(kind: IrKind, loc: Location) -> Self {
        Self { kind, loc }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IrKind {
    Num(Box<str>),
    Str(Box<str>),
    Bool(bool),
    Symbol(Box<str>),
    Id(Box<str>),
    App {
        fun: Box<Ir>,
        args: Vec<Ir>,
    },
    Cond {
        cond: Box<Ir>,
        pass: Box<Ir>,
        fail: Box<Ir>,
    },
    Let {
        bindings: Vec<Binding>,
        body: Box<Ir>,
    },
    Lambda {
        params: Vec<Param>,
        body: Box<Ir>,
        ptr: Box<str>,
    },
    Begin(Vec<Ir>),
    Def {
        name: Box<str>,
        value: Box<Ir>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Box<str>,
    pub loc: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub name: Box<str>,
    pub value: Ir,
    pub loc: Location,
}

pub fn lift(tree: &Tree, labels: &mut Labels) -> Vec<Ir> {
    tree.iter()
        .filter_map(|node| match node {
            Node::Stmt(stmt) => match &stmt.kind {
                StmtKind::Def { name, value } => Some(Ir::new(
                    IrKind::Def {
                        name: name.name.clone(),
                        value: Box::new(lift_expr(value, labels)),
                    },
                    stmt.loc.clone(),
                )),
                StmtKind::Module { .. } | StmtKind::Import { .. } => None,
            },
            Node::Expr(expr) => Some(lift_expr(expr, labels)),
        })
        .collect()
}

fn lift_expr(expr: &ast::Expr, labels: &mut Labels) -> Ir {
    let loc = expr.loc.clone();
    let kind = match &expr.kind {
        ExprKind::Num(lexeme) => IrKind::Num(lexeme.clone()),
        ExprKind::Str(value) => IrKind::Str(value.clone()),
        ExprKind::Symbol(name) => IrKind::Symbol(name.clone()),
        ExprKind::Id(name) => match name.as_ref() {
            "true" => IrKind::Bool(true),
            "false" => IrKind::Bool(false),
            _ => IrKind::Id(name.clone()),
        },
        ExprKind::Uniop { op, expr } => IrKind::App {
            fun: Box::new(Ir::new(IrKind::Id(op.name.clone()), op.loc.clone())),
            args: vec![lift_expr(expr, labels)],
        },
        ExprKind::Binop { op, lhs, rhs } => IrKind::App {
            fun: Box::new(Ir::new(IrKind::Id(op.name.clone()), op.loc.clone())),
            args: vec![lift_expr(lhs, labels), lift_expr(rhs, labels)],
        },
        ExprKind::App { fun, args } => IrKind::App {
            fun: Box::new(lift_expr(fun, labels)),
            args: args.iter().map(|arg| lift_expr(arg, labels)).collect(),
        },
        ExprKind::Lambda { params, body } => IrKind::Lambda {
            params: params
                .iter()
                .map(|p| Param {
                    name: p.name.name.clone(),
                    loc: p.name.loc.clone(),
                })
                .collect(),
            body: Box::new(lift_expr(body, labels)),
            ptr: labels.lambda(),
        },
        ExprKind::Cond { cond, pass, fail } => IrKind::Cond {
            cond: Box::new(lift_expr(cond, labels)),
            pass: Box::new(lift_expr(pass, labels)),
            fail: Box::new(lift_expr(fail, labels)),
        },
        ExprKind::Let { bindings, body } => IrKind::Let {
            bindings: bindings
                .iter()
                .map(|b| Binding {
                    name: b.name.name.clone(),
                    value: lift_expr(&b.value, labels),
                    loc: b.name.loc.clone(),
                })
                .collect(),
            body: Box::new(lift_expr(body, labels)),
        },
        ExprKind::Begin { head, tail } => {
            let mut exprs = Vec::with_capacity(1 + tail.len());
            exprs.push(lift_expr(head, labels));
            exprs.extend(tail.iter().map(|e| lift_expr(e, labels)));
            IrKind::Begin(exprs)
        }
    };
    Ir::new(kind, loc)
}

#[cfg(test)]
mod tests {
    use super::{lift, IrKind};
    use crate::ir::Labels;
    use crate::parser::parse;
    use assert2::{assert, check, let_assert};

    fn lower(src: &str) -> Vec<super::Ir> {
        let tree = parse("test.oat", src).unwrap();
        lift(&tree, &mut Labels::default())
    }

    #[test]
    fn binops_become_applications() {
        let ir = lower("1 + 2");
        let_assert!(IrKind::App { fun, args } = &ir[0].kind);
        check!(fun.kind == IrKind::Id(Box::from("+")));
        check!(args.len() == 2);
    }

    #[test]
    fn booleans_are_literals_not_identifiers() {
        let ir = lower("true");
        check!(ir[0].kind == IrKind::Bool(true));
    }

    #[test]
    fn lambdas_get_distinct_pointers() {
        let ir = lower("def f = func (x) = func (y) = y");
        let_assert!(IrKind::Def { value, .. } = &ir[0].kind);
        let_assert!(IrKind::Lambda { ptr: outer, body, .. } = &value.kind);
        let_assert!(IrKind::Lambda { ptr: inner, .. } = &body.kind);
        assert!(outer != inner);
        check!(outer.starts_with("lambda-"));
    }

    #[test]
    fn module_and_import_do_not_survive_lowering() {
        let ir = lower("module geometry\nimport prelude\n1");
        check!(ir.len() == 1);
    }
}
