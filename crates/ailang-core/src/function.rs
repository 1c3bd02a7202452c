//! Closures: captured environment + parameter list + body, with an optional
//! self-name for recursion.

use std::sync::Arc;

use crate::core::CoreExpr;
use crate::namespace::Namespace;

#[derive(Debug)]
pub struct Closure {
    pub params: Vec<Arc<str>>,
    pub body: Arc<CoreExpr>,
    pub env: Arc<Namespace>,
    /// When set, references to this name inside `body` resolve to the
    /// closure itself, even before the outer `let`/`letrec` binding that
    /// owns it has been installed (supports recursive and mutually
    /// recursive functions without a separate fixpoint combinator).
    pub self_name: Option<Arc<str>>,
}

impl Closure {
    #[must_use]
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

/// A closure applied to fewer arguments than its arity: AILANG functions
/// curry implicitly, so an under-saturated call produces a
/// value rather than an error.
#[derive(Debug)]
pub struct PartialApp {
    pub closure: Arc<Closure>,
    pub supplied: Vec<crate::value::Value>,
}

impl PartialApp {
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.closure.arity() - self.supplied.len()
    }
}
