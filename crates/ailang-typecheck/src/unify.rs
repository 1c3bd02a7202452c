//! Unification over [`Ty`] and its two row flavors (spec §4.3's
//! constraint-solving core). A [`Subst`] accumulates bindings as
//! unification proceeds; callers apply it to finish with a fully resolved
//! type.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::TypeError;
use crate::ty::{EffectRow, OpenRow, RecordRow, RowVarId, Ty, TyVarId};

#[derive(Debug, Clone, Default)]
pub struct Subst {
    tys: BTreeMap<TyVarId, Ty>,
    record_rows: BTreeMap<RowVarId, RecordRow>,
    effect_rows: BTreeMap<RowVarId, EffectRow>,
}

impl Subst {
    #[must_use]
    pub fn apply_ty(&self, ty: &Ty) -> Ty {
        match ty {
            Ty::Var(v) => match self.tys.get(v) {
                Some(bound) if bound != ty => self.apply_ty(bound),
                _ => ty.clone(),
            },
            Ty::Con(name, args) => Ty::Con(Arc::clone(name), args.iter().map(|a| self.apply_ty(a)).collect()),
            Ty::List(elem) => Ty::List(Box::new(self.apply_ty(elem))),
            Ty::Tuple(items) => Ty::Tuple(items.iter().map(|t| self.apply_ty(t)).collect()),
            Ty::Arrow(params, effects, ret) => Ty::Arrow(
                params.iter().map(|p| self.apply_ty(p)).collect(),
                self.apply_effect_row(effects),
                Box::new(self.apply_ty(ret)),
            ),
            Ty::Record(row) => Ty::Record(self.apply_record_row(row)),
        }
    }

    #[must_use]
    pub fn apply_record_row(&self, row: &RecordRow) -> RecordRow {
        let mut labels: BTreeMap<Arc<str>, Ty> = row.labels.iter().map(|(k, v)| (k.clone(), self.apply_ty(v))).collect();
        match row.tail.and_then(|v| self.record_rows.get(&v)) {
            Some(resolved) => {
                let resolved = self.apply_record_row(resolved);
                labels.extend(resolved.labels);
                OpenRow { labels, tail: resolved.tail }
            }
            None => OpenRow { labels, tail: row.tail },
        }
    }

    #[must_use]
    pub fn apply_effect_row(&self, row: &EffectRow) -> EffectRow {
        let mut labels = row.labels.clone();
        match row.tail.and_then(|v| self.effect_rows.get(&v)) {
            Some(resolved) => {
                let resolved = self.apply_effect_row(resolved);
                labels.extend(resolved.labels.iter().map(|(k, v)| (k.clone(), *v)));
                OpenRow { labels, tail: resolved.tail }
            }
            None => OpenRow { labels, tail: row.tail },
        }
    }

    fn bind_ty(&mut self, v: TyVarId, ty: Ty) {
        self.tys.insert(v, ty);
    }

    fn bind_record_row(&mut self, v: RowVarId, row: RecordRow) {
        self.record_rows.insert(v, row);
    }

    fn bind_effect_row(&mut self, v: RowVarId, row: EffectRow) {
        self.effect_rows.insert(v, row);
    }
}

fn occurs_in_ty(v: TyVarId, ty: &Ty) -> bool {
    match ty {
        Ty::Var(w) => *w == v,
        Ty::Con(_, args) => args.iter().any(|a| occurs_in_ty(v, a)),
        Ty::List(elem) => occurs_in_ty(v, elem),
        Ty::Tuple(items) => items.iter().any(|t| occurs_in_ty(v, t)),
        Ty::Arrow(params, _, ret) => params.iter().any(|p| occurs_in_ty(v, p)) || occurs_in_ty(v, ret),
        Ty::Record(row) => row.labels.values().any(|t| occurs_in_ty(v, t)),
    }
}

/// Unifies two types, extending `subst` in place. Reports `TC_UNIFY_FAIL`
/// for shape mismatches and `TC_OCCURS_CHECK` for infinite types.
pub fn unify(subst: &mut Subst, a: &Ty, b: &Ty) -> Result<(), TypeError> {
    let a = subst.apply_ty(a);
    let b = subst.apply_ty(b);
    match (&a, &b) {
        (Ty::Var(v1), Ty::Var(v2)) if v1 == v2 => Ok(()),
        (Ty::Var(v), other) | (other, Ty::Var(v)) => {
            if occurs_in_ty(*v, other) {
                return Err(TypeError::OccursCheck {
                    var: format!("t{v}"),
                    ty: crate::ty::render_ty(other),
                });
            }
            subst.bind_ty(*v, other.clone());
            Ok(())
        }
        (Ty::Con(n1, a1), Ty::Con(n2, a2)) => {
            if n1 != n2 || a1.len() != a2.len() {
                return Err(mismatch(&a, &b));
            }
            for (x, y) in a1.iter().zip(a2.iter()) {
                unify(subst, x, y)?;
            }
            Ok(())
        }
        (Ty::List(e1), Ty::List(e2)) => unify(subst, e1, e2),
        (Ty::Tuple(i1), Ty::Tuple(i2)) => {
            if i1.len() != i2.len() {
                return Err(mismatch(&a, &b));
            }
            for (x, y) in i1.iter().zip(i2.iter()) {
                unify(subst, x, y)?;
            }
            Ok(())
        }
        (Ty::Arrow(p1, e1, r1), Ty::Arrow(p2, e2, r2)) => {
            if p1.len() != p2.len() {
                return Err(mismatch(&a, &b));
            }
            for (x, y) in p1.iter().zip(p2.iter()) {
                unify(subst, x, y)?;
            }
            unify_effect_row(subst, e1, e2)?;
            unify(subst, r1, r2)
        }
        (Ty::Record(r1), Ty::Record(r2)) => unify_record_row(subst, r1, r2),
        _ => Err(mismatch(&a, &b)),
    }
}

fn mismatch(a: &Ty, b: &Ty) -> TypeError {
    TypeError::UnifyFail {
        expected: crate::ty::render_ty(a),
        found: crate::ty::render_ty(b),
    }
}

/// Record-row unification (spec §3.2's row polymorphism): shared labels
/// unify their field types; labels present in only one row are absorbed
/// into the other row's tail, which must be open (`TC_ROW_MISSING_LABEL`
/// or `TC_ROW_EXTRA_LABEL` otherwise).
pub fn unify_record_row(subst: &mut Subst, a: &RecordRow, b: &RecordRow) -> Result<(), TypeError> {
    let a = subst.apply_record_row(a);
    let b = subst.apply_record_row(b);

    for (label, ty_a) in &a.labels {
        if let Some(ty_b) = b.labels.get(label) {
            unify(subst, ty_a, ty_b)?;
        }
    }

    let only_in_a: Vec<Arc<str>> = a.labels.keys().filter(|l| !b.labels.contains_key(*l)).cloned().collect();
    let only_in_b: Vec<Arc<str>> = b.labels.keys().filter(|l| !a.labels.contains_key(*l)).cloned().collect();

    if !only_in_a.is_empty() {
        match b.tail {
            Some(tail_var) => {
                let extra: BTreeMap<Arc<str>, crate::ty::Ty> =
                    only_in_a.iter().map(|l| (l.clone(), a.labels[l].clone())).collect();
                subst.bind_record_row(tail_var, OpenRow { labels: extra, tail: None });
            }
            None => {
                return Err(TypeError::RowMissingLabel {
                    label: only_in_a[0].to_string(),
                });
            }
        }
    }

    if !only_in_b.is_empty() {
        match a.tail {
            Some(tail_var) => {
                let extra: BTreeMap<Arc<str>, crate::ty::Ty> =
                    only_in_b.iter().map(|l| (l.clone(), b.labels[l].clone())).collect();
                subst.bind_record_row(tail_var, OpenRow { labels: extra, tail: None });
            }
            None => {
                return Err(TypeError::RowExtraLabel {
                    label: only_in_b[0].to_string(),
                });
            }
        }
    }

    if only_in_a.is_empty() && only_in_b.is_empty() {
        match (a.tail, b.tail) {
            (Some(v1), Some(v2)) if v1 != v2 => subst.bind_record_row(v1, OpenRow { labels: BTreeMap::new(), tail: Some(v2) }),
            _ => {}
        }
    }

    Ok(())
}

/// Effect-row unification. An ambient effect row unifies successfully when
/// one side's declared labels are a subset of the other's and the missing
/// side is open; a closed row missing a label the other side requires is
/// `TC_ROW_MISSING_LABEL` (spec §4.4's effect-containment check surfaces
/// this as "undeclared effect").
pub fn unify_effect_row(subst: &mut Subst, a: &EffectRow, b: &EffectRow) -> Result<(), TypeError> {
    let a = subst.apply_effect_row(a);
    let b = subst.apply_effect_row(b);

    let only_in_a: Vec<Arc<str>> = a.labels.keys().filter(|l| !b.labels.contains_key(*l)).cloned().collect();
    let only_in_b: Vec<Arc<str>> = b.labels.keys().filter(|l| !a.labels.contains_key(*l)).cloned().collect();

    if !only_in_a.is_empty() {
        match b.tail {
            Some(tail_var) => {
                let extra: BTreeMap<Arc<str>, ()> = only_in_a.iter().map(|l| (l.clone(), ())).collect();
                subst.bind_effect_row(tail_var, OpenRow { labels: extra, tail: None });
            }
            None => {
                return Err(TypeError::RowMissingLabel {
                    label: only_in_a[0].to_string(),
                });
            }
        }
    }

    if !only_in_b.is_empty() {
        match a.tail {
            Some(tail_var) => {
                let extra: BTreeMap<Arc<str>, ()> = only_in_b.iter().map(|l| (l.clone(), ())).collect();
                subst.bind_effect_row(tail_var, OpenRow { labels: extra, tail: None });
            }
            None => {
                return Err(TypeError::RowMissingLabel {
                    label: only_in_b[0].to_string(),
                });
            }
        }
    }

    if only_in_a.is_empty() && only_in_b.is_empty()
        && let (Some(v1), Some(v2)) = (a.tail, b.tail)
        && v1 != v2
    {
        subst.bind_effect_row(v1, OpenRow { labels: BTreeMap::new(), tail: Some(v2) });
    }

    Ok(())
}

/// Checks that `sub` (an ascribed/declared effect row) is contained in
/// `sup` (the row inference actually produced) without mutating `subst` —
/// used for the one-directional subsumption check on declared signatures
/// (spec §4.4), as opposed to the symmetric unification above.
#[must_use]
pub fn effect_row_subsumes(subst: &Subst, sup: &EffectRow, sub: &EffectRow) -> Option<Arc<str>> {
    let sup = subst.apply_effect_row(sup);
    let sub = subst.apply_effect_row(sub);
    for label in sub.labels.keys() {
        if !sup.labels.contains_key(label) && sup.tail.is_none() {
            return Some(label.clone());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unifies_equal_constructors() {
        let mut subst = Subst::default();
        assert!(unify(&mut subst, &Ty::int(), &Ty::int()).is_ok());
    }

    #[test]
    fn fails_on_constructor_mismatch() {
        let mut subst = Subst::default();
        assert!(unify(&mut subst, &Ty::int(), &Ty::string()).is_err());
    }

    #[test]
    fn binds_variable_to_concrete_type() {
        let mut subst = Subst::default();
        unify(&mut subst, &Ty::Var(0), &Ty::int()).unwrap();
        assert_eq!(subst.apply_ty(&Ty::Var(0)), Ty::int());
    }

    #[test]
    fn occurs_check_rejects_infinite_type() {
        let mut subst = Subst::default();
        let list_of_self = Ty::List(Box::new(Ty::Var(0)));
        let result = unify(&mut subst, &Ty::Var(0), &list_of_self);
        assert!(matches!(result, Err(TypeError::OccursCheck { .. })));
    }

    #[test]
    fn open_row_absorbs_extra_label_into_tail() {
        let mut subst = Subst::default();
        let mut labels_a = BTreeMap::new();
        labels_a.insert(Arc::from("x"), Ty::int());
        labels_a.insert(Arc::from("y"), Ty::string());
        let open_a = OpenRow { labels: labels_a, tail: None };

        let mut labels_b = BTreeMap::new();
        labels_b.insert(Arc::from("x"), Ty::int());
        let open_b = OpenRow { labels: labels_b, tail: Some(9) };

        assert!(unify_record_row(&mut subst, &open_a, &open_b).is_ok());
        let resolved = subst.apply_record_row(&OpenRow { labels: BTreeMap::new(), tail: Some(9) });
        assert!(resolved.labels.contains_key(&Arc::<str>::from("y")));
    }

    #[test]
    fn closed_row_missing_label_is_an_error() {
        let mut subst = Subst::default();
        let mut labels_a = BTreeMap::new();
        labels_a.insert(Arc::from("x"), Ty::int());
        labels_a.insert(Arc::from("y"), Ty::string());
        let open_a = OpenRow { labels: labels_a, tail: None };
        let mut labels_b = BTreeMap::new();
        labels_b.insert(Arc::from("x"), Ty::int());
        let open_b: RecordRow = OpenRow { labels: labels_b, tail: None };
        assert!(matches!(unify_record_row(&mut subst, &open_a, &open_b), Err(TypeError::RowMissingLabel { .. })));
    }
}
