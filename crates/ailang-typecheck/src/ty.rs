//! Types, rows, and schemes: the data model unification and inference
//! operate over (spec §3.2).
//!
//! Record rows and effect rows share one representation, [`OpenRow`],
//! parameterized over what a label carries: a [`Ty`] for records, `()` for
//! effects (an effect row only records which labels are present).

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::classes::ClassName;

pub type TyVarId = u32;
pub type RowVarId = u32;

/// A monomorphic or (pre-substitution) type. Variables are De Bruijn-free,
/// globally unique integers minted by [`crate::infer::Infer`]'s counters;
/// a [`Scheme`] closes over the ones that should be generalized.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Ty {
    Var(TyVarId),
    /// `Int`, `Float`, `String`, `Bool`, `Unit`, or a user ADT `T<args>`.
    Con(Arc<str>, Vec<Ty>),
    List(Box<Ty>),
    Tuple(Vec<Ty>),
    Arrow(Vec<Ty>, EffectRow, Box<Ty>),
    Record(RecordRow),
}

impl Ty {
    #[must_use]
    pub fn int() -> Self {
        Self::Con(Arc::from("Int"), vec![])
    }
    #[must_use]
    pub fn float() -> Self {
        Self::Con(Arc::from("Float"), vec![])
    }
    #[must_use]
    pub fn string() -> Self {
        Self::Con(Arc::from("String"), vec![])
    }
    #[must_use]
    pub fn bool() -> Self {
        Self::Con(Arc::from("Bool"), vec![])
    }
    #[must_use]
    pub fn unit() -> Self {
        Self::Con(Arc::from("Unit"), vec![])
    }

    /// The constructor name of a ground, non-variable type; used to key
    /// dictionary lookups (`Num.Int.add`) and to report `TC_NO_INSTANCE`.
    #[must_use]
    pub fn head_name(&self) -> Option<Arc<str>> {
        match self {
            Self::Con(name, _) => Some(Arc::clone(name)),
            Self::List(_) => Some(Arc::from("List")),
            Self::Tuple(_) => Some(Arc::from("Tuple")),
            Self::Record(_) => Some(Arc::from("Record")),
            Self::Arrow(..) | Self::Var(_) => None,
        }
    }

    #[must_use]
    pub fn is_var(&self) -> bool {
        matches!(self, Self::Var(_))
    }
}

/// A row: a finite map from label to `T`, plus an optional open tail
/// variable. `tail: None` is a closed row (subsumption stops here);
/// `tail: Some(v)` is open (more labels may be absorbed into `v`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OpenRow<T> {
    pub labels: BTreeMap<Arc<str>, T>,
    pub tail: Option<RowVarId>,
}

impl<T> OpenRow<T> {
    #[must_use]
    pub fn closed(labels: BTreeMap<Arc<str>, T>) -> Self {
        Self { labels, tail: None }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tail.is_none()
    }
}

pub type RecordRow = OpenRow<Ty>;
/// An effect row only needs label *presence*; `()` is the payload.
pub type EffectRow = OpenRow<()>;

impl EffectRow {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn single(label: &str) -> Self {
        let mut labels = BTreeMap::new();
        labels.insert(Arc::from(label), ());
        Self { labels, tail: None }
    }

    #[must_use]
    pub fn from_labels<I: IntoIterator<Item = Arc<str>>>(labels: I) -> Self {
        Self {
            labels: labels.into_iter().map(|l| (l, ())).collect(),
            tail: None,
        }
    }

    /// Sorted label list (rows are canonicalized by label for comparison,
    /// spec §3.2 invariant).
    #[must_use]
    pub fn sorted_labels(&self) -> Vec<Arc<str>> {
        self.labels.keys().cloned().collect()
    }

    /// Closed-row union, used to accumulate the ambient effect row across
    /// sequential/branching evaluation (inference never needs to union two
    /// *open* rows; unification is the only place tails are resolved).
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        let mut labels = self.labels.clone();
        labels.extend(other.labels.iter().map(|(k, v)| (k.clone(), *v)));
        Self {
            labels,
            tail: self.tail.or(other.tail),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty() && self.tail.is_none()
    }
}

/// A class constraint collected during inference, resolved (to a ground
/// dictionary) or defaulted before dictionary elaboration runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    pub class: ClassName,
    pub ty: Ty,
}

/// A quantified type: the variables/row-variables generalized over, the
/// constraints attached to them, and the body. Let-bound identifiers get a
/// `Scheme`; lambda-bound identifiers get a monotype, modeled here as a
/// `Scheme` with empty `vars`/`row_vars`/`constraints`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scheme {
    pub vars: Vec<TyVarId>,
    pub row_vars: Vec<RowVarId>,
    pub constraints: Vec<Constraint>,
    pub ty: Ty,
}

impl Scheme {
    #[must_use]
    pub fn monotype(ty: Ty) -> Self {
        Self {
            vars: Vec::new(),
            row_vars: Vec::new(),
            constraints: Vec::new(),
            ty,
        }
    }
}

/// Renders a type for diagnostics, in the `(t1,t2)->t3` shape §6 uses for
/// the interface JSON's `funcs[].type` field.
#[must_use]
pub fn render_ty(ty: &Ty) -> String {
    match ty {
        Ty::Var(v) => format!("t{v}"),
        Ty::Con(name, args) => {
            if args.is_empty() {
                name.to_string()
            } else {
                let args_str: Vec<String> = args.iter().map(render_ty).collect();
                format!("{name}<{}>", args_str.join(","))
            }
        }
        Ty::List(elem) => format!("[{}]", render_ty(elem)),
        Ty::Tuple(items) => {
            let parts: Vec<String> = items.iter().map(render_ty).collect();
            format!("({})", parts.join(","))
        }
        Ty::Arrow(params, _, ret) => {
            let parts: Vec<String> = params.iter().map(render_ty).collect();
            format!("({})->{}", parts.join(","), render_ty(ret))
        }
        Ty::Record(row) => {
            let mut parts: Vec<String> = row.labels.iter().map(|(k, v)| format!("{k}:{}", render_ty(v))).collect();
            if row.tail.is_some() {
                parts.push("..".to_owned());
            }
            format!("{{{}}}", parts.join(","))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_arrow_type() {
        let ty = Ty::Arrow(vec![Ty::int(), Ty::int()], EffectRow::empty(), Box::new(Ty::int()));
        assert_eq!(render_ty(&ty), "(Int,Int)->Int");
    }

    #[test]
    fn effect_row_union_is_label_set_union() {
        let a = EffectRow::single("IO");
        let b = EffectRow::single("Clock");
        let u = a.union(&b);
        assert_eq!(u.sorted_labels(), vec![Arc::from("Clock"), Arc::from("IO")]);
    }
}
