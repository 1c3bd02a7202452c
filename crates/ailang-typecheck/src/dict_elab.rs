//! Dictionary-passing elaboration (spec §4.3's closing pass): rewrites the
//! placeholder arithmetic `PrimOp`s the elaborator emits — always the `Int`
//! variant, since `elaborate.rs` has no type information yet — into the
//! variant the type checker actually resolved, expressed as an explicit
//! `let d = lookupDict(...) in d(args)` over [`CoreKind::DictLookup`] /
//! [`CoreKind::DictApply`]. Afterward, no `PrimOp` node carries an
//! unresolved type-directed choice; the testable property this pass
//! satisfies is exactly that.
//!
//! Comparison and equality `PrimOp`s (`EqGeneric`, `LtGeneric`, ...) and
//! `Neg`/`Not` are already fully polymorphic at the value level
//! ([`ailang_core::eval`]'s `structural_eq`/`compare_values` handle any
//! operand pair), so this pass leaves them untouched — `Eq`, `Ord`, and
//! `Show` have no per-type dictionary to look up. `StrConcat` is the one
//! exception: the elaborator always emits it as a placeholder for `++`
//! regardless of operand type (core.rs's `from_binop`), so this pass
//! rewrites it to `ListConcat` when the checker resolved a list operand —
//! a direct node swap rather than a dictionary lookup, since `Concat` has
//! no per-type dictionary either.

use std::sync::Arc;

use ahash::AHashMap;
use ailang_core::core::{Atom, CoreExpr, CoreKind, PrimOp};
use ailang_core::eval::DictRegistry;
use ailang_core::function::Closure;
use ailang_core::namespace::Namespace;
use ailang_core::span::{NodeId, Span};
use ailang_core::value::Value;

use crate::ty::Ty;

struct Elaborator<'a> {
    node_types: &'a AHashMap<NodeId, Ty>,
    counter: u32,
}

/// `(class, method)` for a placeholder `PrimOp`, or `None` if this op is
/// already type-agnostic and should pass through unchanged.
fn class_method(op: PrimOp) -> Option<(&'static str, &'static str)> {
    match op {
        PrimOp::IntAdd => Some(("Num", "add")),
        PrimOp::IntSub => Some(("Num", "sub")),
        PrimOp::IntMul => Some(("Num", "mul")),
        PrimOp::IntDiv => Some(("Num", "div")),
        PrimOp::IntMod => Some(("Integral", "mod")),
        _ => None,
    }
}

impl Elaborator<'_> {
    fn fresh_id(&mut self, span: &Span, tag: &str) -> NodeId {
        let id = NodeId::derive(&span.file, span.start, span.end, tag, &[self.counter]);
        self.counter += 1;
        id
    }

    fn rewrite(&mut self, core: &CoreExpr) -> CoreExpr {
        let kind = match &core.kind {
            CoreKind::Atom(_) => core.kind.clone(),
            CoreKind::Lambda { params, self_name, body } => CoreKind::Lambda {
                params: params.clone(),
                self_name: self_name.clone(),
                body: Box::new(self.rewrite(body)),
            },
            CoreKind::Apply { func, args } => CoreKind::Apply {
                func: Box::new(self.rewrite(func)),
                args: args.clone(),
            },
            CoreKind::Let { name, value, body } => CoreKind::Let {
                name: Arc::clone(name),
                value: Box::new(self.rewrite(value)),
                body: Box::new(self.rewrite(body)),
            },
            CoreKind::Letrec { bindings, body } => CoreKind::Letrec {
                bindings: bindings.iter().map(|(n, v)| (Arc::clone(n), self.rewrite(v))).collect(),
                body: Box::new(self.rewrite(body)),
            },
            CoreKind::If { cond, then_branch, else_branch } => CoreKind::If {
                cond: cond.clone(),
                then_branch: Box::new(self.rewrite(then_branch)),
                else_branch: Box::new(self.rewrite(else_branch)),
            },
            CoreKind::Match { scrutinee, clauses } => CoreKind::Match {
                scrutinee: scrutinee.clone(),
                clauses: clauses
                    .iter()
                    .map(|c| ailang_core::core::MatchClause {
                        pattern: c.pattern.clone(),
                        guard: c.guard.as_ref().map(|g| self.rewrite(g)),
                        body: self.rewrite(&c.body),
                    })
                    .collect(),
            },
            CoreKind::RecordLit(_)
            | CoreKind::RecordAccess { .. }
            | CoreKind::RecordExtend { .. }
            | CoreKind::RecordRestrict { .. }
            | CoreKind::Ctor { .. }
            | CoreKind::DictLookup { .. }
            | CoreKind::DictApply { .. } => core.kind.clone(),
            CoreKind::PrimOp { op, args } => {
                return self.rewrite_primop(core, *op, args);
            }
        };
        CoreExpr::new(core.id, core.span.clone(), kind)
    }

    fn rewrite_primop(&mut self, core: &CoreExpr, op: PrimOp, args: &[Atom]) -> CoreExpr {
        if op == PrimOp::StrConcat {
            let resolved_to_list = matches!(
                self.node_types.get(&core.id).and_then(|ty| ty.head_name()),
                Some(name) if name.as_ref() == "List"
            );
            if resolved_to_list {
                return CoreExpr::new(core.id, core.span.clone(), CoreKind::PrimOp { op: PrimOp::ListConcat, args: args.to_vec() });
            }
            return core.clone();
        }
        let Some((class, method)) = class_method(op) else {
            return core.clone();
        };
        let ty_name = match self.node_types.get(&core.id) {
            Some(ty) => ty.head_name().unwrap_or_else(|| Arc::from("Int")),
            None => Arc::from("Int"),
        };
        let dict_name: Arc<str> = Arc::from(format!("$dict{}", self.counter));
        let dict_id = self.fresh_id(&core.span, "DictLookup");
        let apply_id = self.fresh_id(&core.span, "DictApply");
        CoreExpr::new(
            core.id,
            core.span.clone(),
            CoreKind::Let {
                name: Arc::clone(&dict_name),
                value: Box::new(CoreExpr::new(
                    dict_id,
                    core.span.clone(),
                    CoreKind::DictLookup {
                        module: Arc::from("$builtin"),
                        class: Arc::from(class),
                        ty: ty_name,
                        method: Arc::from(method),
                    },
                )),
                body: Box::new(CoreExpr::new(
                    apply_id,
                    core.span.clone(),
                    CoreKind::DictApply { dict: Atom::Var(dict_name), args: args.to_vec() },
                )),
            },
        )
    }
}

/// Rewrites every module binding's body, replacing placeholder arithmetic
/// `PrimOp`s with dictionary dispatch resolved from `node_types` (produced
/// by [`crate::infer::typecheck_module`]).
#[must_use]
pub fn elaborate_bindings(
    bindings: &[(Arc<str>, CoreExpr, bool)],
    node_types: &AHashMap<NodeId, Ty>,
) -> Vec<(Arc<str>, CoreExpr, bool)> {
    let mut elaborator = Elaborator { node_types, counter: 0 };
    bindings.iter().map(|(name, core, exported)| (Arc::clone(name), elaborator.rewrite(core), *exported)).collect()
}

fn num_closure(op: PrimOp) -> Value {
    let body = CoreExpr::new(
        NodeId::derive("<dict>", 0, 0, "PrimOp", &[op as u32]),
        Span::unknown(),
        CoreKind::PrimOp { op, args: vec![Atom::Var(Arc::from("a")), Atom::Var(Arc::from("b"))] },
    );
    Value::Closure(Arc::new(Closure {
        params: vec![Arc::from("a"), Arc::from("b")],
        body: Arc::new(body),
        env: Namespace::root(),
        self_name: None,
    }))
}

/// Builds the fixed dictionary table backing every `DictLookup` this pass
/// can emit: one two-argument closure per `(class, type, method)` triple,
/// synthesized from the same `PrimOp`s the pre-dictionary evaluator already
/// implements (`eval::int_binop`/`float_binop`), so the dispatched behavior
/// is identical to the placeholder it replaces.
#[must_use]
pub fn builtin_dictionaries() -> DictRegistry {
    let mut dicts = DictRegistry::default();
    let entries: &[(&str, &str, &str, PrimOp)] = &[
        ("Num", "Int", "add", PrimOp::IntAdd),
        ("Num", "Int", "sub", PrimOp::IntSub),
        ("Num", "Int", "mul", PrimOp::IntMul),
        ("Num", "Int", "div", PrimOp::IntDiv),
        ("Num", "Float", "add", PrimOp::FloatAdd),
        ("Num", "Float", "sub", PrimOp::FloatSub),
        ("Num", "Float", "mul", PrimOp::FloatMul),
        ("Num", "Float", "div", PrimOp::FloatDiv),
        ("Integral", "Int", "mod", PrimOp::IntMod),
    ];
    for (class, ty, method, op) in entries {
        dicts.insert(
            (Arc::from("$builtin"), Arc::from(*class), Arc::from(*ty), Arc::from(*method)),
            num_closure(*op),
        );
    }
    dicts
}

#[cfg(test)]
mod tests {
    use super::*;
    use ailang_core::span::Span;

    fn int_add_node() -> CoreExpr {
        CoreExpr::new(
            NodeId::derive("t", 0, 1, "PrimOp", &[]),
            Span::unknown(),
            CoreKind::PrimOp { op: PrimOp::IntAdd, args: vec![Atom::Int(1), Atom::Int(2)] },
        )
    }

    #[test]
    fn rewrites_int_add_into_dict_dispatch() {
        let mut node_types = AHashMap::default();
        let core = int_add_node();
        node_types.insert(core.id, Ty::int());
        let bindings = vec![(Arc::from("x"), core, true)];
        let rewritten = elaborate_bindings(&bindings, &node_types);
        assert!(matches!(rewritten[0].1.kind, CoreKind::Let { .. }));
    }

    #[test]
    fn float_add_resolves_to_float_dictionary_key() {
        let mut node_types = AHashMap::default();
        let core = int_add_node();
        node_types.insert(core.id, Ty::float());
        let bindings = vec![(Arc::from("x"), core, true)];
        let rewritten = elaborate_bindings(&bindings, &node_types);
        let CoreKind::Let { value, .. } = &rewritten[0].1.kind else {
            panic!("expected Let");
        };
        let CoreKind::DictLookup { ty, .. } = &value.kind else {
            panic!("expected DictLookup");
        };
        assert_eq!(ty.as_ref(), "Float");
    }

    #[test]
    fn str_concat_resolved_to_string_passes_through_unchanged() {
        let mut node_types = AHashMap::default();
        let core = CoreExpr::new(
            NodeId::derive("t", 0, 1, "PrimOp", &[]),
            Span::unknown(),
            CoreKind::PrimOp {
                op: PrimOp::StrConcat,
                args: vec![Atom::Var(Arc::from("a")), Atom::Var(Arc::from("b"))],
            },
        );
        node_types.insert(core.id, Ty::string());
        let bindings = vec![(Arc::from("x"), core, true)];
        let rewritten = elaborate_bindings(&bindings, &node_types);
        assert!(matches!(rewritten[0].1.kind, CoreKind::PrimOp { op: PrimOp::StrConcat, .. }));
    }

    #[test]
    fn str_concat_resolved_to_list_rewrites_to_list_concat() {
        let mut node_types = AHashMap::default();
        let core = CoreExpr::new(
            NodeId::derive("t", 0, 1, "PrimOp", &[]),
            Span::unknown(),
            CoreKind::PrimOp {
                op: PrimOp::StrConcat,
                args: vec![Atom::Var(Arc::from("a")), Atom::Var(Arc::from("b"))],
            },
        );
        node_types.insert(core.id, Ty::List(Box::new(Ty::int())));
        let bindings = vec![(Arc::from("x"), core, true)];
        let rewritten = elaborate_bindings(&bindings, &node_types);
        assert!(matches!(rewritten[0].1.kind, CoreKind::PrimOp { op: PrimOp::ListConcat, .. }));
    }

    #[test]
    fn builtin_dictionaries_cover_every_emitted_key() {
        let dicts = builtin_dictionaries();
        assert!(dicts.contains_key(&(Arc::from("$builtin"), Arc::from("Num"), Arc::from("Float"), Arc::from("add"))));
        assert!(dicts.contains_key(&(Arc::from("$builtin"), Arc::from("Integral"), Arc::from("Int"), Arc::from("mod"))));
    }
}
