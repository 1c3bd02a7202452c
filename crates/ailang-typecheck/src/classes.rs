//! The built-in type-class hierarchy (spec §3.2, §4.3). AILANG's surface
//! grammar has no `class`/`instance` declarations, so the set of classes
//! and their instances is fixed here rather than built up from a user
//! registry.

use std::sync::Arc;

use crate::ty::Ty;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString, serde::Serialize, serde::Deserialize)]
#[strum(serialize_all = "PascalCase")]
pub enum ClassName {
    Num,
    Integral,
    Fractional,
    Eq,
    Ord,
    Show,
    /// Not a surface-visible class — tracks the `++` placeholder's operand
    /// type (`String` or `List _`) until `dict_elab` picks the concrete
    /// `PrimOp`. Has no dictionary of its own.
    Concat,
}

impl ClassName {
    /// Direct superclasses, used to expand a constraint set before
    /// instance resolution (`Integral t` also demands `Num t`).
    #[must_use]
    pub fn superclasses(self) -> &'static [Self] {
        match self {
            Self::Integral | Self::Fractional => &[Self::Num],
            Self::Ord => &[Self::Eq],
            Self::Num | Self::Eq | Self::Show | Self::Concat => &[],
        }
    }

    /// Method names a dictionary for this class must provide, in the order
    /// `dict_elab` builds them (spec §4.3's dictionary-passing elaboration).
    #[must_use]
    pub fn methods(self) -> &'static [&'static str] {
        match self {
            Self::Num => &["add", "sub", "mul", "neg"],
            Self::Integral => &["div", "mod"],
            Self::Fractional => &["div"],
            Self::Eq => &["eq", "neq"],
            Self::Ord => &["lt", "lte", "gt", "gte"],
            Self::Show => &["show"],
            Self::Concat => &[],
        }
    }
}

/// Whether a ground type has a built-in instance of `class`. User ADTs get
/// `Eq`/`Ord`/`Show` for free via structural comparison/`Display`
/// (resolved open question: no per-ADT instance declarations exist, so
/// these three classes are satisfied structurally for any type, and
/// resolution never fails for them). `Num`/`Integral`/`Fractional` are
/// restricted to the two built-in numeric types.
#[must_use]
pub fn has_instance(class: ClassName, ty: &Ty) -> bool {
    match class {
        ClassName::Eq | ClassName::Ord | ClassName::Show => true,
        ClassName::Num => is_numeric(ty),
        ClassName::Integral => matches!(ty, Ty::Con(name, _) if name.as_ref() == "Int"),
        ClassName::Fractional => matches!(ty, Ty::Con(name, _) if name.as_ref() == "Float"),
        ClassName::Concat => matches!(ty, Ty::Con(name, _) if name.as_ref() == "String") || matches!(ty, Ty::List(_)),
    }
}

fn is_numeric(ty: &Ty) -> bool {
    matches!(ty, Ty::Con(name, _) if name.as_ref() == "Int" || name.as_ref() == "Float")
}

/// The default a still-ambiguous `Num`-family constraint resolves to when
/// generalization would otherwise leave a free variable dangling (spec
/// §4.3's numeric-defaulting rule: default to `Int` unless a `Fractional`
/// constraint on the same variable forces `Float`).
#[must_use]
pub fn default_numeric_ty(constraints_on_var: &[ClassName]) -> Ty {
    if constraints_on_var.contains(&ClassName::Fractional) {
        Ty::float()
    } else {
        Ty::int()
    }
}

/// Qualifies a method name the way dictionary lookups key into
/// [`ailang_core::eval::DictRegistry`]: `(module, class, type, method)`.
#[must_use]
pub fn dict_key(class: ClassName, ty_name: &str, method: &str) -> (Arc<str>, Arc<str>, Arc<str>, Arc<str>) {
    (
        Arc::from("$builtin"),
        Arc::from(class.to_string()),
        Arc::from(ty_name),
        Arc::from(method),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integral_implies_num_superclass() {
        assert_eq!(ClassName::Integral.superclasses(), &[ClassName::Num]);
    }

    #[test]
    fn int_has_integral_but_not_fractional_instance() {
        assert!(has_instance(ClassName::Integral, &Ty::int()));
        assert!(!has_instance(ClassName::Fractional, &Ty::int()));
    }

    #[test]
    fn structural_classes_hold_for_any_type() {
        let adt = Ty::Con(Arc::from("Shape"), vec![]);
        assert!(has_instance(ClassName::Eq, &adt));
        assert!(has_instance(ClassName::Show, &adt));
    }

    #[test]
    fn defaulting_prefers_int_unless_fractional_present() {
        assert_eq!(default_numeric_ty(&[ClassName::Num]), Ty::int());
        assert_eq!(default_numeric_ty(&[ClassName::Num, ClassName::Fractional]), Ty::float());
    }
}
