//! The operator table the expression parser reads. Building is pure: the
//! `with_*` constructors return a new table, so the top-level reader can
//! thread a fresh value through its fold as it consumes `operator`
//! declarations.

use std::collections::HashMap;

pub type Precedence = u8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fixity {
    Prefix,
    Infix,
    Postfix,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Syntax {
    prefix: HashMap<Box<str>, Precedence>,
    infix: HashMap<Box<str>, Precedence>,
    postfix: HashMap<Box<str>, Precedence>,
}

impl Default for Syntax {
    /// Only `+` is predefined; everything else arrives through `operator`
    /// declarations.
    fn default() -> Self {
        Self::empty().with_infix("+", 40)
    }
}

impl Syntax {
    pub fn empty() -> Self {
        Self {
            prefix: HashMap::new(),
            infix: HashMap::new(),
            postfix: HashMap::new(),
        }
    }

    pub fn with_prefix(mut self, name: &str, prec: Precedence) -> Self {
        self.prefix.insert(Box::from(name), prec);
        self
    }

    pub fn with_infix(mut self, name: &str, prec: Precedence) -> Self {
        self.infix.insert(Box::from(name), prec);
        self
    }

    pub fn with_postfix(mut self, name: &str, prec: Precedence) -> Self {
        self.postfix.insert(Box::from(name), prec);
        self
    }

    pub fn extended(self, fixity: Fixity, name: &str, prec: Precedence) -> Self {
        match fixity {
            Fixity::Prefix => self.with_prefix(name, prec),
            Fixity::Infix => self.with_infix(name, prec),
            Fixity::Postfix => self.with_postfix(name, prec),
        }
    }

    pub fn prefix(&self, name: &str) -> Option<Precedence> {
        self.prefix.get(name).copied()
    }

    pub fn infix(&self, name: &str) -> Option<Precedence> {
        self.infix.get(name).copied()
    }

    pub fn postfix(&self, name: &str) -> Option<Precedence> {
        self.postfix.get(name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::{Fixity, Syntax};
    use assert2::check;

    #[test]
    fn building_is_pure() {
        let base = Syntax::empty();
        let extended = base.clone().with_infix("*", 50);

        check!(base.infix("*") == None);
        check!(extended.infix("*") == Some(50));
    }

    #[test]
    fn fixities_are_independent_tables() {
        let sx = Syntax::empty()
            .extended(Fixity::Prefix, "-", 60)
            .extended(Fixity::Infix, "-", 30);

        check!(sx.prefix("-") == Some(60));
        check!(sx.infix("-") == Some(30));
        check!(sx.postfix("-") == None);
    }

    #[test]
    fn plus_is_the_only_default() {
        let sx = Syntax::default();
        check!(sx.infix("+") == Some(40));
        check!(sx.infix("-") == None);
        check!(sx.prefix("+") == None);
    }
}
