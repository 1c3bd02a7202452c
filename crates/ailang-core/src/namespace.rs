//! Lexical environments: the spine the evaluator walks to resolve a
//! variable, from the innermost scope outward to the module's top-level
//! bindings and finally to imported modules.

use std::sync::Arc;

use ahash::AHashMap;

use crate::value::Value;

/// One frame of the environment spine. Closures capture an `Arc<Namespace>`
/// so the capture is shared structurally rather than copied: closures
/// share the environment they captured.
#[derive(Debug, Default)]
pub struct Namespace {
    bindings: AHashMap<Arc<str>, Value>,
    /// `letrec` names: indirected through a [`Cell`] so sibling bindings can
    /// reference each other before every binding in the group has a value.
    cells: AHashMap<Arc<str>, Cell>,
    parent: Option<Arc<Namespace>>,
}

impl Namespace {
    #[must_use]
    pub fn root() -> Arc<Self> {
        Arc::new(Self::default())
    }

    #[must_use]
    pub fn child(parent: &Arc<Namespace>) -> Self {
        Self {
            bindings: AHashMap::new(),
            cells: AHashMap::new(),
            parent: Some(Arc::clone(parent)),
        }
    }

    pub fn bind(&mut self, name: Arc<str>, value: Value) {
        self.bindings.insert(name, value);
    }

    /// Reserves `name` as a `letrec` member, resolved lazily through `cell`
    /// once [`Cell::fill`] is called.
    pub fn bind_cell(&mut self, name: Arc<str>, cell: Cell) {
        self.cells.insert(name, cell);
    }

    /// Walks the spine from `self` outward; does not consult module bindings
    /// or imports — those are resolved by the evaluator once the spine is
    /// exhausted: look up in the environment spine, then in the module's
    /// bindings, then in imported modules.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(v) = self.bindings.get(name) {
            return Some(v.clone());
        }
        if let Some(cell) = self.cells.get(name) {
            return cell.get();
        }
        self.parent.as_ref().and_then(|p| p.lookup(name))
    }
}

/// A recursive binding cell: pre-allocated before its closure is evaluated,
/// filled in once the closure is constructed, so mutual `letrec` references
/// resolve through the cell rather than through value identity.
#[derive(Debug, Clone, Default)]
pub struct Cell(std::rc::Rc<std::cell::RefCell<Option<Value>>>);

impl Cell {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fill(&self, value: Value) {
        *self.0.borrow_mut() = Some(value);
    }

    #[must_use]
    pub fn get(&self) -> Option<Value> {
        self.0.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_walks_spine_to_outer_scope() {
        let root = Namespace::root();
        let mut outer = Namespace::child(&root);
        outer.bind(Arc::from("x"), Value::Int(1));
        let outer = Arc::new(outer);
        let inner = Namespace::child(&outer);
        assert!(matches!(inner.lookup("x"), Some(Value::Int(1))));
        assert!(inner.lookup("y").is_none());
    }

    #[test]
    fn inner_binding_shadows_outer() {
        let root = Namespace::root();
        let mut outer = Namespace::child(&root);
        outer.bind(Arc::from("x"), Value::Int(1));
        let outer = Arc::new(outer);
        let mut inner = Namespace::child(&outer);
        inner.bind(Arc::from("x"), Value::Int(2));
        assert!(matches!(inner.lookup("x"), Some(Value::Int(2))));
    }
}
