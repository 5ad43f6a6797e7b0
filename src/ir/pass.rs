//! Dead-lambda elimination.
//!
//! A top-level `def` binding a lambda that no expression ever names is
//! dropped before code generation. Two known blind spots, kept on purpose:
//! shadowing is not tracked, and a lambda referenced only from another
//! unused lambda's body still counts as referenced, so chains of unused
//! lambdas survive. The pass runs once, not to a fixed point.

use std::collections::HashSet;

use super::typeless::{Ir, IrKind};

pub fn dead_lambdas(tree: Vec<Ir>) -> Vec<Ir> {
    let defined: HashSet<Box<str>> = tree
        .iter()
        .filter_map(|node| match &node.kind {
            IrKind::Def { name, value } if matches!(value.kind, IrKind::Lambda { .. }) => {
                Some(name.clone())
            }
            _ => None,
        })
        .collect();

    let mut referenced = HashSet::new();
    for node in &tree {
        match &node.kind {
            // a definition's own name is not a reference to itself
            IrKind::Def { value, .. } => collect_ids(value, &mut referenced),
            _ => collect_ids(node, &mut referenced),
        }
    }

    tree.into_iter()
        .filter(|node| match &node.kind {
            IrKind::Def { name, value } if matches!(value.kind, IrKind::Lambda { .. }) => {
                !defined.contains(name) || referenced.contains(name)
            }
            _ => true,
        })
        .collect()
}

fn collect_ids(ir: &Ir, out: &mut HashSet<Box<str>>) {
    match &ir.kind {
        IrKind::Id(name) => {
            out.insert(name.clone());
        }
        IrKind::Num(_) | IrKind::Str(_) | IrKind::Bool(_) | IrKind::Symbol(_) => {}
        IrKind::App { fun, args } => {
            collect_ids(fun, out);
            for arg in args {
                collect_ids(arg, out);
            }
        }
        IrKind::Cond { cond, pass, fail } => {
            collect_ids(cond, out);
            collect_ids(pass, out);
            collect_ids(fail, out);
        }
        IrKind::Let { bindings, body } => {
            for binding in bindings {
                collect_ids(&binding.value, out);
            }
            collect_ids(body, out);
        }
        IrKind::Lambda { body, .. } => collect_ids(body, out),
        IrKind::Begin(exprs) => {
            for expr in exprs {
                collect_ids(expr, out);
            }
        }
        IrKind::Def { value, .. } => collect_ids(value, out),
    }
}

#[cfg(test)]
mod tests {
    use super::dead_lambdas;
    use crate::ir::typeless::{lift, IrKind};
    use crate::ir::Labels;
    use crate::parser::parse;
    use assert2::{check, let_assert};

    fn prune(src: &str) -> Vec<super::Ir> {
        let tree = parse("test.oat", src).unwrap();
        dead_lambdas(lift(&tree, &mut Labels::default()))
    }

    fn names(tree: &[super::Ir]) -> Vec<&str> {
        tree.iter()
            .filter_map(|node| match &node.kind {
                IrKind::Def { name, .. } => Some(name.as_ref()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn unused_lambda_is_dropped() {
        let tree = prune("def unused(x) = x\ndef keep(x) = x\nkeep(1)");
        check!(names(&tree) == vec!["keep"]);
    }

    #[test]
    fn recursion_keeps_a_lambda_alive() {
        let tree = prune("def loop(n) = loop(n)");
        check!(names(&tree) == vec!["loop"]);
    }

    #[test]
    fn non_lambda_defs_are_untouched() {
        let tree = prune("def x = 5");
        check!(names(&tree) == vec!["x"]);
    }

    #[test]
    fn a_chain_of_unused_lambdas_survives_one_pass() {
        // b is only used by a, and a is unused; a goes, b stays
        let tree = prune("def a(x) = b(x)\ndef b(x) = x");
        let names = names(&tree);
        let_assert!([kept] = names.as_slice());
        check!(*kept == "b");
    }
}
