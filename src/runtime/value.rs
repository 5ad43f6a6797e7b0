//! Runtime values. Everything is copy-by-value: strings and symbols are
//! keys into the machine's interner, and `Id`/`Scope` hold interned labels
//! resolved through the code stream when they are called.

use lasso::Spur;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    I32(i32),
    True,
    False,
    Str(Spur),
    Symbol(Spur),
    /// A reference to a labeled location, usually a lambda entry.
    Id(Spur),
    /// Like [`Value::Id`] but produced when an expression hands back a
    /// lambda, so callers can tell a captured reference from a stored one.
    Scope(Spur),
}

impl Value {
    /// The machine's notion of falsity: `false` and zero.
    pub fn is_zero(&self) -> bool {
        matches!(self, Value::False | Value::I32(0))
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::I32(n) => Some(*n),
            _ => None,
        }
    }
}
