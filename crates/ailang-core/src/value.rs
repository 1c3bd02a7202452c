//! Runtime values. Every value is immutable after construction (spec
//! §3.3); records and ADTs produce new values on extension/update/restriction
//! rather than mutating in place.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::function::{Closure, PartialApp};

/// An immutable, structurally-shared runtime value.
#[derive(Debug, Clone)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    Bool(bool),
    Unit,
    /// Fixed-length heterogeneous sequence; represented as a plain vector
    /// since tuples have no extension/restriction operations to motivate
    /// structural sharing beyond `Arc`'s own clone-on-write.
    Tuple(Arc<[Value]>),
    /// Immutable label -> value mapping. `IndexMap` preserves left-to-right
    /// insertion order (spec's record-literal field evaluation order) while
    /// still supporting O(1) label lookup.
    Record(Arc<IndexMap<Arc<str>, Value, ahash::RandomState>>),
    /// ADT constructor application: tag plus ordered field values. Lists are
    /// represented as the two-constructor ADT `Nil`/`Cons` rather than a
    /// dedicated variant.
    Tagged { tag: Arc<str>, fields: Arc<[Value]> },
    Closure(Arc<Closure>),
    /// A closure under-applied relative to its arity (implicit currying).
    /// Applying further arguments either saturates the call or
    /// produces another `Partial`.
    Partial(Arc<PartialApp>),
    /// A class/type dictionary: method name -> implementation value (itself
    /// a closure or nested dictionary for superclass projection).
    Dictionary(Arc<IndexMap<Arc<str>, Value, ahash::RandomState>>),
    /// Opaque host-provided primitive with fixed arity and optional effect
    /// label (builtins: arithmetic, IO, FS, Clock, Net entry points).
    Builtin(Arc<crate::effect::Builtin>),
}

impl Value {
    #[must_use]
    pub fn unit() -> Self {
        Self::Unit
    }

    #[must_use]
    pub fn nil() -> Self {
        Self::Tagged {
            tag: Arc::from("Nil"),
            fields: Arc::from([]),
        }
    }

    #[must_use]
    pub fn cons(head: Value, tail: Value) -> Self {
        Self::Tagged {
            tag: Arc::from("Cons"),
            fields: Arc::from([head, tail]),
        }
    }

    pub fn list<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Value>,
        I::IntoIter: DoubleEndedIterator,
    {
        let mut result = Self::nil();
        for item in items.into_iter().rev() {
            result = Self::cons(item, result);
        }
        result
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Int(_) => "Int",
            Self::Float(_) => "Float",
            Self::Str(_) => "String",
            Self::Bool(_) => "Bool",
            Self::Unit => "Unit",
            Self::Tuple(_) => "Tuple",
            Self::Record(_) => "Record",
            Self::Tagged { .. } => "Tagged",
            Self::Closure(_) | Self::Partial(_) => "Function",
            Self::Dictionary(_) => "Dictionary",
            Self::Builtin(_) => "Builtin",
        }
    }

    /// Structural equality used by `Eq[Float]`'s `NaN == NaN` override and by
    /// the generic `==`/`!=` prim ops before dictionary elaboration resolves
    /// a user `Eq` instance.
    #[must_use]
    pub fn structural_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => {
                // Eq[Float] defines NaN == NaN as true to remain an equivalence
                // relation (resolved: treat -0.0 == +0.0 as equal too).
                (a.is_nan() && b.is_nan()) || a == b
            }
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Unit, Self::Unit) => true,
            (Self::Tuple(a), Self::Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.structural_eq(y))
            }
            (Self::Tagged { tag: t1, fields: f1 }, Self::Tagged { tag: t2, fields: f2 }) => {
                t1 == t2 && f1.len() == f2.len() && f1.iter().zip(f2.iter()).all(|(x, y)| x.structural_eq(y))
            }
            (Self::Record(a), Self::Record(b)) => {
                a.len() == b.len() && a.iter().all(|(k, v)| b.get(k).is_some_and(|v2| v.structural_eq(v2)))
            }
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(n) => write!(f, "{n}"),
            Self::Str(s) => write!(f, "{s}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Unit => f.write_str("()"),
            Self::Tuple(items) => {
                f.write_str("(")?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str(")")
            }
            Self::Record(fields) => {
                f.write_str("{")?;
                for (i, (k, v)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str("}")
            }
            Self::Tagged { tag, fields } => {
                if tag.as_ref() == "Nil" || tag.as_ref() == "Cons" {
                    return write_list(self, f);
                }
                write!(f, "{tag}")?;
                if !fields.is_empty() {
                    f.write_str("(")?;
                    for (i, v) in fields.iter().enumerate() {
                        if i > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{v}")?;
                    }
                    f.write_str(")")?;
                }
                Ok(())
            }
            Self::Closure(c) => write!(f, "<function/{}>", c.params.len()),
            Self::Partial(p) => write!(f, "<function/{} ({} supplied)>", p.closure.arity(), p.supplied.len()),
            Self::Dictionary(_) => f.write_str("<dictionary>"),
            Self::Builtin(b) => write!(f, "<builtin:{}>", b.name),
        }
    }
}

fn write_list(mut value: &Value, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("[")?;
    let mut first = true;
    loop {
        match value {
            Value::Tagged { tag, fields } if tag.as_ref() == "Cons" => {
                if !first {
                    f.write_str(", ")?;
                }
                first = false;
                write!(f, "{}", fields[0])?;
                value = &fields[1];
            }
            _ => break,
        }
    }
    f.write_str("]")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nan_equals_nan_under_structural_eq() {
        let nan = Value::Float(f64::NAN);
        assert!(nan.structural_eq(&Value::Float(f64::NAN)));
    }

    #[test]
    fn list_display_matches_bracket_notation() {
        let list = Value::list(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert_eq!(list.to_string(), "[1, 2, 3]");
    }
}
