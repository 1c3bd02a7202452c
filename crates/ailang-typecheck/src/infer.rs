//! Hindley-Milner inference over elaborated Core (spec §4.3): let-polymorphism
//! with the value restriction, letrec-style mutual recursion at module scope,
//! row-polymorphic records, effect-row inference, and numeric defaulting.
//!
//! AILANG's surface grammar has no `class`/`instance` declarations (confirmed
//! by [`ailang_core::ast::Decl`]'s four fixed variants), so a function can
//! never be *written* with a `Num a =>` constraint — every `Num`/`Integral`
//! constraint this module collects is an artifact of typing `+`/`*`/`%` and
//! is always eligible for defaulting once inference finishes; there is no
//! user-facing polymorphic numeric function to preserve.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use ahash::AHashMap;
use ailang_core::ast::{self, Decl, Pattern, TypeExpr};
use ailang_core::core::{Atom, CoreExpr, CoreKind, PrimOp};
use ailang_core::elaborate::ElaboratedModule;
use ailang_core::error::PatternWarning;
use ailang_core::pattern::{self, Universe};
use ailang_core::span::NodeId;

use crate::classes::{self, ClassName};
use crate::error::TypeError;
use crate::ty::{Constraint, EffectRow, OpenRow, RecordRow, Scheme, Ty, TyVarId};
use crate::unify::{self, Subst};

/// Schemes visible from outside the module currently being checked: the
/// `$builtin` module's effectful primitives plus every already-checked
/// dependency's exports, keyed the same way `Atom::ModuleVar` is.
#[derive(Debug, Clone, Default)]
pub struct GlobalEnv {
    modules: AHashMap<Arc<str>, AHashMap<Arc<str>, Scheme>>,
}

impl GlobalEnv {
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut env = Self::default();
        let mut builtins = AHashMap::default();
        for (name, scheme) in builtin_schemes() {
            builtins.insert(name, scheme);
        }
        env.modules.insert(Arc::from(ailang_core::elaborate::BUILTIN_MODULE), builtins);
        env
    }

    pub fn insert_module<I: IntoIterator<Item = (Arc<str>, Scheme)>>(&mut self, path: &str, schemes: I) {
        let table = self.modules.entry(Arc::from(path)).or_default();
        for (name, scheme) in schemes {
            table.insert(name, scheme);
        }
    }

    #[must_use]
    pub fn lookup(&self, module: &str, name: &str) -> Option<&Scheme> {
        self.modules.get(module).and_then(|t| t.get(name))
    }
}

fn arrow(params: Vec<Ty>, effect: &str, ret: Ty) -> Scheme {
    Scheme::monotype(Ty::Arrow(params, EffectRow::single(effect), Box::new(ret)))
}

fn pure_arrow(params: Vec<Ty>, ret: Ty) -> Scheme {
    Scheme::monotype(Ty::Arrow(params, EffectRow::empty(), Box::new(ret)))
}

fn builtin_schemes() -> Vec<(Arc<str>, Scheme)> {
    let show_scheme = Scheme {
        vars: vec![0],
        row_vars: vec![],
        constraints: vec![],
        ty: Ty::Arrow(vec![Ty::Var(0)], EffectRow::empty(), Box::new(Ty::string())),
    };
    vec![
        (Arc::from("_io_print"), arrow(vec![Ty::string()], "IO", Ty::unit())),
        (Arc::from("_io_println"), arrow(vec![Ty::string()], "IO", Ty::unit())),
        (Arc::from("_io_readLine"), arrow(vec![], "IO", Ty::string())),
        (Arc::from("_fs_readFile"), arrow(vec![Ty::string()], "FS", Ty::string())),
        (Arc::from("_fs_writeFile"), arrow(vec![Ty::string(), Ty::string()], "FS", Ty::unit())),
        (Arc::from("_fs_exists"), arrow(vec![Ty::string()], "FS", Ty::bool())),
        (Arc::from("_clock_now"), arrow(vec![], "Clock", Ty::int())),
        (Arc::from("_clock_sleep"), arrow(vec![Ty::int()], "Clock", Ty::unit())),
        (Arc::from("_net_httpGet"), arrow(vec![Ty::string()], "Net", Ty::string())),
        (Arc::from("_net_httpPost"), arrow(vec![Ty::string(), Ty::string()], "Net", Ty::string())),
        // Simplified relative to the prose spec's richer request/response
        // record: no user-constructible record literal can describe method
        // or headers without first-class row defaults, so both sides of the
        // wire are plain strings (see DESIGN.md).
        (Arc::from("_net_httpRequest"), arrow(vec![Ty::string()], "Net", Ty::string())),
        (Arc::from("show"), show_scheme.clone()),
        (Arc::from("toString"), show_scheme),
    ]
}

/// A constructor's type as a function from field types to the (possibly
/// parametric) parent ADT type; reused verbatim for both `Ctor` application
/// typing and `Pattern::Ctor` typing.
type CtorEnv = AHashMap<Arc<str>, Scheme>;

/// ADT type name -> its constructors' names, in declaration order; feeds
/// `pattern::Universe::Adt` so `Match` exhaustiveness (spec §4.6) can report
/// the missing constructors by name instead of merely "not exhaustive".
fn build_adt_ctors(types: &[Decl]) -> AHashMap<Arc<str>, Vec<String>> {
    let mut out = AHashMap::default();
    for decl in types {
        if let Decl::TypeAdt { name, ctors, .. } = decl {
            out.insert(Arc::from(name.as_str()), ctors.iter().map(|c| c.name.clone()).collect());
        }
    }
    out
}

fn build_ctor_env(types: &[Decl]) -> CtorEnv {
    let mut ctors = CtorEnv::default();
    for decl in types {
        if let Decl::TypeAdt { name, params, ctors: cs, .. } = decl {
            let mut var_names: HashMap<String, TyVarId> = HashMap::new();
            let mut next = 0u32;
            let parent_vars: Vec<TyVarId> = params
                .iter()
                .map(|p| {
                    let id = next;
                    next += 1;
                    var_names.insert(p.clone(), id);
                    id
                })
                .collect();
            let parent_ty = Ty::Con(Arc::from(name.as_str()), parent_vars.iter().map(|v| Ty::Var(*v)).collect());
            for ctor in cs {
                let mut row_names: HashMap<String, u32> = HashMap::new();
                let field_tys: Vec<Ty> = ctor
                    .fields
                    .iter()
                    .map(|f| type_expr_to_ty(f, &mut var_names, &mut row_names, &mut next))
                    .collect();
                ctors.insert(
                    Arc::from(ctor.name.as_str()),
                    Scheme {
                        vars: parent_vars.clone(),
                        row_vars: vec![],
                        constraints: vec![],
                        ty: Ty::Arrow(field_tys, EffectRow::empty(), Box::new(parent_ty.clone())),
                    },
                );
            }
        }
    }
    ctors
}

fn type_expr_to_ty(
    te: &TypeExpr,
    var_names: &mut HashMap<String, TyVarId>,
    row_names: &mut HashMap<String, u32>,
    next: &mut u32,
) -> Ty {
    match te {
        TypeExpr::Con(name, args) => {
            Ty::Con(Arc::from(name.as_str()), args.iter().map(|a| type_expr_to_ty(a, var_names, row_names, next)).collect())
        }
        TypeExpr::Var(name) => {
            let id = *var_names.entry(name.clone()).or_insert_with(|| {
                let id = *next;
                *next += 1;
                id
            });
            Ty::Var(id)
        }
        TypeExpr::List(elem) => Ty::List(Box::new(type_expr_to_ty(elem, var_names, row_names, next))),
        TypeExpr::Tuple(items) => Ty::Tuple(items.iter().map(|t| type_expr_to_ty(t, var_names, row_names, next)).collect()),
        TypeExpr::Record { fields, tail } => {
            let labels: BTreeMap<Arc<str>, Ty> = fields
                .iter()
                .map(|(k, v)| (Arc::from(k.as_str()), type_expr_to_ty(v, var_names, row_names, next)))
                .collect();
            let tail_var = tail.as_ref().map(|name| {
                *row_names.entry(name.clone()).or_insert_with(|| {
                    let id = *next;
                    *next += 1;
                    id
                })
            });
            Ty::Record(OpenRow { labels, tail: tail_var })
        }
        TypeExpr::Arrow { params, effects, ret } => Ty::Arrow(
            params.iter().map(|p| type_expr_to_ty(p, var_names, row_names, next)).collect(),
            EffectRow::from_labels(effects.iter().map(|e| Arc::from(e.as_str()))),
            Box::new(type_expr_to_ty(ret, var_names, row_names, next)),
        ),
    }
}

/// Whether `core` is a syntactic value, i.e. safe to generalize under the
/// value restriction: a variable/literal, a constructor applied to already-
/// evaluated atoms, a record literal, or a lambda. Anything else (in
/// particular `Apply`) stays monomorphic.
fn is_syntactic_value(core: &CoreExpr) -> bool {
    matches!(core.kind, CoreKind::Atom(_) | CoreKind::Lambda { .. } | CoreKind::Ctor { .. } | CoreKind::RecordLit(_))
}

type Env = Vec<(Arc<str>, Scheme)>;

fn free_vars_of_ty(ty: &Ty, out: &mut std::collections::HashSet<TyVarId>) {
    match ty {
        Ty::Var(v) => {
            out.insert(*v);
        }
        Ty::Con(_, args) => args.iter().for_each(|a| free_vars_of_ty(a, out)),
        Ty::List(elem) => free_vars_of_ty(elem, out),
        Ty::Tuple(items) => items.iter().for_each(|t| free_vars_of_ty(t, out)),
        Ty::Arrow(params, _, ret) => {
            params.iter().for_each(|p| free_vars_of_ty(p, out));
            free_vars_of_ty(ret, out);
        }
        Ty::Record(row) => row.labels.values().for_each(|t| free_vars_of_ty(t, out)),
    }
}

fn free_row_vars_of_ty(ty: &Ty, out: &mut std::collections::HashSet<u32>) {
    match ty {
        Ty::Var(_) => {}
        Ty::Con(_, args) => args.iter().for_each(|a| free_row_vars_of_ty(a, out)),
        Ty::List(elem) => free_row_vars_of_ty(elem, out),
        Ty::Tuple(items) => items.iter().for_each(|t| free_row_vars_of_ty(t, out)),
        Ty::Arrow(params, effects, ret) => {
            params.iter().for_each(|p| free_row_vars_of_ty(p, out));
            if let Some(t) = effects.tail {
                out.insert(t);
            }
            free_row_vars_of_ty(ret, out);
        }
        Ty::Record(row) => {
            if let Some(t) = row.tail {
                out.insert(t);
            }
            row.labels.values().for_each(|t| free_row_vars_of_ty(t, out));
        }
    }
}

pub struct Infer<'a> {
    global: &'a GlobalEnv,
    ctors: CtorEnv,
    adt_ctors: AHashMap<Arc<str>, Vec<String>>,
    subst: Subst,
    next_ty: TyVarId,
    next_row: u32,
    constraints: Vec<Constraint>,
    node_types: AHashMap<NodeId, Ty>,
    warnings: Vec<PatternWarning>,
}

impl<'a> Infer<'a> {
    fn fresh_ty(&mut self) -> Ty {
        let id = self.next_ty;
        self.next_ty += 1;
        Ty::Var(id)
    }

    fn fresh_row_var(&mut self) -> u32 {
        let id = self.next_row;
        self.next_row += 1;
        id
    }

    fn fresh_effect_row(&mut self) -> EffectRow {
        OpenRow { labels: BTreeMap::new(), tail: Some(self.fresh_row_var()) }
    }

    fn unify(&mut self, a: &Ty, b: &Ty) -> Result<(), TypeError> {
        unify::unify(&mut self.subst, a, b)
    }

    /// Renames a scheme's bound variables to fresh ones, carrying its
    /// constraints along (spec §4.3's instantiation step).
    fn instantiate(&mut self, scheme: &Scheme) -> (Ty, Vec<Constraint>) {
        let mut ty_map: HashMap<TyVarId, TyVarId> = HashMap::new();
        for v in &scheme.vars {
            ty_map.insert(*v, { let id = self.next_ty; self.next_ty += 1; id });
        }
        let mut row_map: HashMap<u32, u32> = HashMap::new();
        for v in &scheme.row_vars {
            row_map.insert(*v, self.fresh_row_var());
        }
        (rename_ty(&scheme.ty, &ty_map, &row_map), scheme.constraints.iter().map(|c| Constraint {
            class: c.class,
            ty: rename_ty(&c.ty, &ty_map, &row_map),
        }).collect())
    }

    fn generalize(&mut self, env: &Env, ty: &Ty) -> Scheme {
        let resolved = self.subst.apply_ty(ty);
        let mut free = std::collections::HashSet::new();
        free_vars_of_ty(&resolved, &mut free);
        let mut free_rows = std::collections::HashSet::new();
        free_row_vars_of_ty(&resolved, &mut free_rows);

        let mut env_free = std::collections::HashSet::new();
        let mut env_free_rows = std::collections::HashSet::new();
        for (_, scheme) in env {
            let resolved_env_ty = self.subst.apply_ty(&scheme.ty);
            free_vars_of_ty(&resolved_env_ty, &mut env_free);
            free_row_vars_of_ty(&resolved_env_ty, &mut env_free_rows);
        }

        let vars: Vec<TyVarId> = free.difference(&env_free).copied().collect();
        let row_vars: Vec<u32> = free_rows.difference(&env_free_rows).copied().collect();
        Scheme { vars, row_vars, constraints: vec![], ty: resolved }
    }

    fn lookup(&mut self, env: &Env, module: Option<&str>, name: &str) -> Result<Ty, TypeError> {
        let scheme = match module {
            Some(m) => self.global.lookup(m, name).cloned().ok_or_else(|| TypeError::UnboundVariable { name: name.to_owned() })?,
            None => env
                .iter()
                .rev()
                .find(|(n, _)| n.as_ref() == name)
                .map(|(_, s)| s.clone())
                .ok_or_else(|| TypeError::UnboundVariable { name: name.to_owned() })?,
        };
        let (ty, constraints) = self.instantiate(&scheme);
        self.constraints.extend(constraints);
        Ok(ty)
    }

    fn infer_atom(&mut self, env: &Env, atom: &Atom) -> Result<Ty, TypeError> {
        match atom {
            Atom::Var(name) => self.lookup(env, None, name),
            Atom::ModuleVar { module, name } => self.lookup(env, Some(module), name),
            Atom::Int(_) => Ok(Ty::int()),
            Atom::Float(_) => Ok(Ty::float()),
            Atom::Str(_) => Ok(Ty::string()),
            Atom::Bool(_) => Ok(Ty::bool()),
            Atom::Unit => Ok(Ty::unit()),
        }
    }

    fn bind_pattern(&mut self, pattern: &Pattern, scrutinee: &Ty, env: &mut Env) -> Result<(), TypeError> {
        match pattern {
            Pattern::Wildcard(_) => Ok(()),
            Pattern::Var(name, _) => {
                env.push((Arc::from(name.as_str()), Scheme::monotype(scrutinee.clone())));
                Ok(())
            }
            Pattern::Int(_, _) => self.unify(scrutinee, &Ty::int()),
            Pattern::Float(_, _) => self.unify(scrutinee, &Ty::float()),
            Pattern::Str(_, _) => self.unify(scrutinee, &Ty::string()),
            Pattern::Bool(_, _) => self.unify(scrutinee, &Ty::bool()),
            Pattern::Ctor { name, args, .. } => {
                let scheme = self
                    .ctors
                    .get(name.as_str())
                    .cloned()
                    .ok_or_else(|| TypeError::UnknownType { name: name.clone() })?;
                let (ctor_ty, _) = self.instantiate(&scheme);
                let Ty::Arrow(field_tys, _, parent) = ctor_ty else {
                    return Err(TypeError::UnknownType { name: name.clone() });
                };
                self.unify(scrutinee, &parent)?;
                if field_tys.len() != args.len() {
                    return Err(TypeError::SignatureMismatch {
                        func: name.clone(),
                        declared: format!("{} field(s)", field_tys.len()),
                        inferred: format!("{} field(s)", args.len()),
                    });
                }
                for (field_ty, arg_pat) in field_tys.iter().zip(args.iter()) {
                    self.bind_pattern(arg_pat, field_ty, env)?;
                }
                Ok(())
            }
            Pattern::Tuple(items, _) => {
                let item_tys: Vec<Ty> = items.iter().map(|_| self.fresh_ty()).collect();
                self.unify(scrutinee, &Ty::Tuple(item_tys.clone()))?;
                for (ty, pat) in item_tys.iter().zip(items.iter()) {
                    self.bind_pattern(pat, ty, env)?;
                }
                Ok(())
            }
            Pattern::ListNil(_) => {
                let elem = self.fresh_ty();
                self.unify(scrutinee, &Ty::List(Box::new(elem)))
            }
            Pattern::ListCons { head, tail, .. } => {
                let elem = self.fresh_ty();
                self.unify(scrutinee, &Ty::List(Box::new(elem.clone())))?;
                self.bind_pattern(head, &elem, env)?;
                self.bind_pattern(tail, scrutinee, env)
            }
            Pattern::Record { fields, .. } => {
                let row_var = self.fresh_row_var();
                let labels: BTreeMap<Arc<str>, Ty> = fields.iter().map(|(k, _)| (Arc::from(k.as_str()), self.fresh_ty())).collect();
                self.unify(scrutinee, &Ty::Record(OpenRow { labels: labels.clone(), tail: Some(row_var) }))?;
                for (label, pat) in fields {
                    self.bind_pattern(pat, &labels[label.as_str()], env)?;
                }
                Ok(())
            }
        }
    }

    fn infer_expr(&mut self, env: &Env, core: &CoreExpr) -> Result<(Ty, EffectRow), TypeError> {
        match &core.kind {
            CoreKind::Atom(atom) => Ok((self.infer_atom(env, atom)?, EffectRow::empty())),
            CoreKind::Lambda { params, self_name, body } => {
                let param_tys: Vec<Ty> = params.iter().map(|_| self.fresh_ty()).collect();
                let mut inner = env.clone();
                for (name, ty) in params.iter().zip(param_tys.iter()) {
                    inner.push((Arc::clone(name), Scheme::monotype(ty.clone())));
                }
                let self_ty = self_name.as_ref().map(|_| self.fresh_ty());
                if let (Some(name), Some(ty)) = (self_name, &self_ty) {
                    inner.push((Arc::clone(name), Scheme::monotype(ty.clone())));
                }
                let (body_ty, body_eff) = self.infer_expr(&inner, body)?;
                let arrow_ty = Ty::Arrow(param_tys, body_eff, Box::new(body_ty));
                if let Some(ty) = self_ty {
                    self.unify(&ty, &arrow_ty)?;
                }
                Ok((arrow_ty, EffectRow::empty()))
            }
            CoreKind::Apply { func, args } => {
                let (func_ty, func_eff) = self.infer_expr(env, func)?;
                let mut arg_tys = Vec::with_capacity(args.len());
                for a in args {
                    arg_tys.push(self.infer_atom(env, a)?);
                }
                let ret = self.fresh_ty();
                let eff_var = self.fresh_row_var();
                let expected = Ty::Arrow(arg_tys, OpenRow { labels: BTreeMap::new(), tail: Some(eff_var) }, Box::new(ret.clone()));
                self.unify(&func_ty, &expected)?;
                let call_eff = self.subst.apply_effect_row(&OpenRow { labels: BTreeMap::new(), tail: Some(eff_var) });
                Ok((self.subst.apply_ty(&ret), func_eff.union(&call_eff)))
            }
            CoreKind::Let { name, value, body } => {
                let (value_ty, value_eff) = self.infer_expr(env, value)?;
                let scheme = if is_syntactic_value(value) {
                    self.generalize(env, &value_ty)
                } else {
                    Scheme::monotype(self.subst.apply_ty(&value_ty))
                };
                let mut inner = env.clone();
                inner.push((Arc::clone(name), scheme));
                let (body_ty, body_eff) = self.infer_expr(&inner, body)?;
                Ok((body_ty, value_eff.union(&body_eff)))
            }
            CoreKind::Letrec { bindings, body } => {
                let mut inner = env.clone();
                let placeholders: Vec<Ty> = bindings.iter().map(|_| self.fresh_ty()).collect();
                for ((name, _), ty) in bindings.iter().zip(placeholders.iter()) {
                    inner.push((Arc::clone(name), Scheme::monotype(ty.clone())));
                }
                let mut total_eff = EffectRow::empty();
                let mut inferred_tys = Vec::with_capacity(bindings.len());
                for (i, (_, value)) in bindings.iter().enumerate() {
                    let (ty, eff) = self.infer_expr(&inner, value)?;
                    self.unify(&placeholders[i], &ty)?;
                    total_eff = total_eff.union(&eff);
                    inferred_tys.push(ty);
                }
                inner.truncate(env.len());
                for ((name, value), ty) in bindings.iter().zip(inferred_tys.iter()) {
                    let scheme = if is_syntactic_value(value) {
                        self.generalize(&inner, ty)
                    } else {
                        Scheme::monotype(self.subst.apply_ty(ty))
                    };
                    inner.push((Arc::clone(name), scheme));
                }
                let (body_ty, body_eff) = self.infer_expr(&inner, body)?;
                Ok((body_ty, total_eff.union(&body_eff)))
            }
            CoreKind::If { cond, then_branch, else_branch } => {
                let cond_ty = self.infer_atom(env, cond)?;
                self.unify(&cond_ty, &Ty::bool())?;
                let (then_ty, then_eff) = self.infer_expr(env, then_branch)?;
                let (else_ty, else_eff) = self.infer_expr(env, else_branch)?;
                self.unify(&then_ty, &else_ty)?;
                Ok((self.subst.apply_ty(&then_ty), then_eff.union(&else_eff)))
            }
            CoreKind::Match { scrutinee, clauses } => {
                let scrutinee_ty = self.infer_atom(env, scrutinee)?;
                let result_ty = self.fresh_ty();
                let mut total_eff = EffectRow::empty();
                for clause in clauses {
                    let mut clause_env = env.clone();
                    self.bind_pattern(&clause.pattern, &scrutinee_ty, &mut clause_env)?;
                    if let Some(guard) = &clause.guard {
                        let (guard_ty, guard_eff) = self.infer_expr(&clause_env, guard)?;
                        self.unify(&guard_ty, &Ty::bool())?;
                        total_eff = total_eff.union(&guard_eff);
                    }
                    let (body_ty, body_eff) = self.infer_expr(&clause_env, &clause.body)?;
                    self.unify(&result_ty, &body_ty)?;
                    total_eff = total_eff.union(&body_eff);
                }
                self.check_match_exhaustive(&scrutinee_ty, clauses, &core.span);
                Ok((self.subst.apply_ty(&result_ty), total_eff))
            }
            CoreKind::RecordLit(fields) => {
                let mut labels = BTreeMap::new();
                for (label, atom) in fields {
                    labels.insert(Arc::clone(label), self.infer_atom(env, atom)?);
                }
                Ok((Ty::Record(OpenRow::closed(labels)), EffectRow::empty()))
            }
            CoreKind::RecordAccess { record, label } => {
                let record_ty = self.infer_atom(env, record)?;
                let field = self.fresh_ty();
                let row_var = self.fresh_row_var();
                let mut labels = BTreeMap::new();
                labels.insert(Arc::clone(label), field.clone());
                self.unify(&record_ty, &Ty::Record(OpenRow { labels, tail: Some(row_var) }))?;
                Ok((self.subst.apply_ty(&field), EffectRow::empty()))
            }
            CoreKind::RecordExtend { record, fields } => {
                let record_ty = self.infer_atom(env, record)?;
                let base_row = self.fresh_row_var();
                self.unify(&record_ty, &Ty::Record(OpenRow { labels: BTreeMap::new(), tail: Some(base_row) }))?;
                let mut labels = BTreeMap::new();
                for (label, atom) in fields {
                    labels.insert(Arc::clone(label), self.infer_atom(env, atom)?);
                }
                Ok((Ty::Record(OpenRow { labels, tail: Some(base_row) }), EffectRow::empty()))
            }
            CoreKind::RecordRestrict { record, labels } => {
                let record_ty = self.infer_atom(env, record)?;
                let base_row = self.fresh_row_var();
                let removed: BTreeMap<Arc<str>, Ty> = labels.iter().map(|l| (Arc::clone(l), self.fresh_ty())).collect();
                self.unify(&record_ty, &Ty::Record(OpenRow { labels: removed, tail: Some(base_row) }))?;
                Ok((Ty::Record(OpenRow { labels: BTreeMap::new(), tail: Some(base_row) }), EffectRow::empty()))
            }
            // List literals desugar to these two constructors (elaborate.rs)
            // rather than a dedicated Core list form, but they aren't a
            // declared ADT, so `self.ctors` never has a scheme for them —
            // built the same way `Pattern::ListNil`/`ListCons` type list
            // patterns, by constructing `Ty::List` directly.
            CoreKind::Ctor { name, args: _ } if name.as_ref() == "Nil" => {
                let elem = self.fresh_ty();
                Ok((Ty::List(Box::new(elem)), EffectRow::empty()))
            }
            CoreKind::Ctor { name, args } if name.as_ref() == "Cons" => {
                let elem = self.fresh_ty();
                let head_ty = self.infer_atom(env, &args[0])?;
                let tail_ty = self.infer_atom(env, &args[1])?;
                self.unify(&head_ty, &elem)?;
                self.unify(&tail_ty, &Ty::List(Box::new(elem.clone())))?;
                Ok((Ty::List(Box::new(elem)), EffectRow::empty()))
            }
            CoreKind::Ctor { name, args } => {
                let scheme = self
                    .ctors
                    .get(name.as_str())
                    .cloned()
                    .ok_or_else(|| TypeError::UnknownType { name: name.to_string() })?;
                let (ctor_ty, constraints) = self.instantiate(&scheme);
                self.constraints.extend(constraints);
                let Ty::Arrow(field_tys, _, parent) = ctor_ty else {
                    return Err(TypeError::UnknownType { name: name.to_string() });
                };
                for (field_ty, arg) in field_tys.iter().zip(args.iter()) {
                    let arg_ty = self.infer_atom(env, arg)?;
                    self.unify(field_ty, &arg_ty)?;
                }
                Ok((parent, EffectRow::empty()))
            }
            CoreKind::PrimOp { op, args } => self.infer_primop(env, core.id, *op, args),
            CoreKind::DictLookup { .. } | CoreKind::DictApply { .. } => {
                // Only produced by dictionary elaboration, which runs after
                // typechecking; never observed as input here.
                Ok((self.fresh_ty(), EffectRow::empty()))
            }
        }
    }

    fn infer_primop(&mut self, env: &Env, id: NodeId, op: PrimOp, args: &[Atom]) -> Result<(Ty, EffectRow), TypeError> {
        use PrimOp::{
            EqGeneric, FloatAdd, FloatDiv, FloatMul, FloatSub, GeGeneric, GtGeneric, IntAdd, IntDiv, IntMod, IntMul, IntSub, LeGeneric,
            LtGeneric, ListConcat, NeGeneric, Neg, Not, StrConcat,
        };
        let ty = match op {
            IntAdd | FloatAdd | IntSub | FloatSub | IntMul | FloatMul | IntDiv | FloatDiv => {
                let a = self.infer_atom(env, &args[0])?;
                let b = self.infer_atom(env, &args[1])?;
                let v = self.fresh_ty();
                self.unify(&a, &v)?;
                self.unify(&b, &v)?;
                self.constraints.push(Constraint { class: ClassName::Num, ty: v.clone() });
                self.node_types.insert(id, v.clone());
                v
            }
            IntMod => {
                let a = self.infer_atom(env, &args[0])?;
                let b = self.infer_atom(env, &args[1])?;
                let v = self.fresh_ty();
                self.unify(&a, &v)?;
                self.unify(&b, &v)?;
                self.constraints.push(Constraint { class: ClassName::Integral, ty: v.clone() });
                self.node_types.insert(id, v.clone());
                v
            }
            Neg => {
                let a = self.infer_atom(env, &args[0])?;
                self.constraints.push(Constraint { class: ClassName::Num, ty: a.clone() });
                self.node_types.insert(id, a.clone());
                a
            }
            Not => {
                let a = self.infer_atom(env, &args[0])?;
                self.unify(&a, &Ty::bool())?;
                Ty::bool()
            }
            // Placeholder like the arithmetic ops: `elaborate_binop` always
            // emits `StrConcat` for `++`, so it must accept either operand
            // type here rather than forcing `String`. `dict_elab` inspects
            // the resolved type afterward and rewrites the node to
            // `ListConcat` when it unified with a list.
            StrConcat => {
                let a = self.infer_atom(env, &args[0])?;
                let b = self.infer_atom(env, &args[1])?;
                self.unify(&a, &b)?;
                self.constraints.push(Constraint { class: ClassName::Concat, ty: a.clone() });
                self.node_types.insert(id, a.clone());
                a
            }
            ListConcat => {
                let a = self.infer_atom(env, &args[0])?;
                let b = self.infer_atom(env, &args[1])?;
                let elem = self.fresh_ty();
                self.unify(&a, &Ty::List(Box::new(elem.clone())))?;
                self.unify(&b, &Ty::List(Box::new(elem)))?;
                a
            }
            EqGeneric | NeGeneric | LtGeneric | LeGeneric | GtGeneric | GeGeneric => {
                let a = self.infer_atom(env, &args[0])?;
                let b = self.infer_atom(env, &args[1])?;
                self.unify(&a, &b)?;
                Ty::bool()
            }
        };
        Ok((ty, EffectRow::empty()))
    }

    /// Resolves the scrutinee's type against the ADT/`Bool`/open-type
    /// universe and records a `PAT_NON_EXHAUSTIVE` warning (spec §4.6, §8
    /// property 8) rather than erroring — exhaustiveness is a warning here,
    /// promotable to an error by caller policy per spec §7, and the runtime
    /// still enforces it with `RUN_NON_EXHAUSTIVE` if a gap is actually hit.
    fn check_match_exhaustive(&mut self, scrutinee_ty: &Ty, clauses: &[ailang_core::core::MatchClause], span: &ailang_core::span::Span) {
        let resolved = self.subst.apply_ty(scrutinee_ty);
        let patterns: Vec<Pattern> = clauses.iter().map(|c| c.pattern.clone()).collect();
        let universe = match resolved.head_name() {
            Some(name) if name.as_ref() == "Bool" => Universe::Bool,
            Some(name) => match self.adt_ctors.get(&name) {
                Some(ctors) => Universe::Adt(ctors),
                None => Universe::Open,
            },
            None => Universe::Open,
        };
        self.warnings.extend(pattern::check_exhaustive(&patterns, &universe, span));
    }

    /// Resolves every collected `Num`/`Integral` constraint: a constraint on
    /// an already-concrete type is checked against the fixed built-in
    /// instance set, and one still free is defaulted (spec §4.3's numeric
    /// defaulting — see the module doc comment for why this is always safe
    /// here rather than merely a fallback).
    fn resolve_constraints(&mut self) -> Vec<TypeError> {
        let mut errors = Vec::new();
        let constraints = std::mem::take(&mut self.constraints);
        for c in constraints {
            let resolved = self.subst.apply_ty(&c.ty);
            if let Ty::Var(v) = resolved {
                let default = if c.class == ClassName::Concat { Ty::string() } else { classes::default_numeric_ty(&[c.class]) };
                let _ = unify::unify(&mut self.subst, &Ty::Var(v), &default);
            } else if !classes::has_instance(c.class, &resolved) {
                errors.push(TypeError::NoInstance {
                    class: c.class.to_string(),
                    ty: crate::ty::render_ty(&resolved),
                });
            }
        }
        errors
    }
}

fn rename_ty(ty: &Ty, ty_map: &HashMap<TyVarId, TyVarId>, row_map: &HashMap<u32, u32>) -> Ty {
    match ty {
        Ty::Var(v) => Ty::Var(*ty_map.get(v).unwrap_or(v)),
        Ty::Con(name, args) => Ty::Con(Arc::clone(name), args.iter().map(|a| rename_ty(a, ty_map, row_map)).collect()),
        Ty::List(elem) => Ty::List(Box::new(rename_ty(elem, ty_map, row_map))),
        Ty::Tuple(items) => Ty::Tuple(items.iter().map(|t| rename_ty(t, ty_map, row_map)).collect()),
        Ty::Arrow(params, effects, ret) => Ty::Arrow(
            params.iter().map(|p| rename_ty(p, ty_map, row_map)).collect(),
            OpenRow { labels: effects.labels.clone(), tail: effects.tail.map(|t| *row_map.get(&t).unwrap_or(&t)) },
            Box::new(rename_ty(ret, ty_map, row_map)),
        ),
        Ty::Record(row) => Ty::Record(OpenRow {
            labels: row.labels.iter().map(|(k, v)| (k.clone(), rename_ty(v, ty_map, row_map))).collect(),
            tail: row.tail.map(|t| *row_map.get(&t).unwrap_or(&t)),
        }),
    }
}

/// The result of checking one module: its bindings (unchanged — dictionary
/// elaboration is a separate pass), the schemes to publish for dependents,
/// and the node-to-type map `dict_elab` uses to resolve arithmetic `PrimOp`s.
pub struct TypedModule {
    pub schemes: Vec<(Arc<str>, Scheme)>,
    pub node_types: AHashMap<NodeId, Ty>,
    pub warnings: Vec<PatternWarning>,
}

/// Checks one already-elaborated module against `global` (containing
/// builtins plus every already-checked dependency), following spec §4.3.
/// Errors are collected per top-level binding rather than aborting at the
/// first one, so a typo in one function doesn't hide errors in its siblings.
pub fn typecheck_module(elaborated: &ElaboratedModule, global: &GlobalEnv) -> Result<TypedModule, Vec<TypeError>> {
    let ctors = build_ctor_env(&elaborated.types);
    let adt_ctors = build_adt_ctors(&elaborated.types);
    let mut infer = Infer {
        global,
        ctors,
        adt_ctors,
        subst: Subst::default(),
        next_ty: 0,
        next_row: 0,
        constraints: Vec::new(),
        node_types: AHashMap::default(),
        warnings: Vec::new(),
    };

    let mut env: Env = Vec::new();
    let mut placeholders = Vec::with_capacity(elaborated.bindings.len());
    for (name, _, _) in &elaborated.bindings {
        let sig = elaborated.signatures.iter().find(|(n, _)| n == name).map(|(_, s)| s);
        let placeholder = match sig {
            Some(sig) => declared_arrow(sig),
            None => infer.fresh_ty(),
        };
        env.push((Arc::clone(name), Scheme::monotype(placeholder.clone())));
        placeholders.push(placeholder);
    }

    let mut errors = Vec::new();
    let mut schemes = Vec::new();

    for (i, (name, value, _exported)) in elaborated.bindings.iter().enumerate() {
        let sig = elaborated.signatures.iter().find(|(n, _)| n == name).map(|(_, s)| s);
        match infer.infer_expr(&env, value) {
            Ok((ty, eff)) => {
                if let Err(e) = infer.unify(&placeholders[i], &ty) {
                    errors.push(e);
                    continue;
                }
                if let Some(sig) = sig {
                    let declared_effects = EffectRow::from_labels(sig.effects.iter().map(|e| Arc::from(e.as_str())));
                    if let Some(label) = unify::effect_row_subsumes(&infer.subst, &declared_effects, &eff) {
                        errors.push(TypeError::UndeclaredEffect { label: label.to_string(), func: name.to_string() });
                    }
                }
                let resolved = infer.subst.apply_ty(&placeholders[i]);
                let scheme = if is_syntactic_value(value) {
                    infer.generalize(&env, &resolved)
                } else {
                    Scheme::monotype(resolved)
                };
                env[i].1 = scheme;
            }
            Err(e) => errors.push(e),
        }
    }

    errors.extend(infer.resolve_constraints());

    if !errors.is_empty() {
        return Err(errors);
    }

    for (name, _, exported) in &elaborated.bindings {
        if *exported
            && let Some((_, scheme)) = env.iter().find(|(n, _)| n == name)
        {
            schemes.push((Arc::clone(name), scheme.clone()));
        }
    }

    let node_types = infer.node_types.iter().map(|(id, ty)| (*id, infer.subst.apply_ty(ty))).collect();

    Ok(TypedModule { schemes, node_types, warnings: infer.warnings })
}

fn declared_arrow(sig: &ast::FuncSignature) -> Ty {
    let mut var_names = HashMap::new();
    let mut row_names = HashMap::new();
    let mut next = 1_000_000u32; // disjoint range from per-binding fresh counters, avoids accidental capture
    let params: Vec<Ty> = sig.params.iter().map(|(_, t)| type_expr_to_ty(t, &mut var_names, &mut row_names, &mut next)).collect();
    let ret = type_expr_to_ty(&sig.ret, &mut var_names, &mut row_names, &mut next);
    let effects = EffectRow::from_labels(sig.effects.iter().map(|e| Arc::from(e.as_str())));
    Ty::Arrow(params, effects, Box::new(ret))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ailang_core::elaborate::{Elaborator, ImportEnv};
    use ailang_core::{lexer, parser};

    fn check_source(src: &str) -> Result<TypedModule, Vec<TypeError>> {
        let tokens = lexer::lex(src, "test.ail").unwrap();
        let module = parser::parse(tokens).map_err(|_| vec![]).unwrap();
        let import_env = ImportEnv::new();
        let mut elaborator = Elaborator::new("test.ail", &import_env);
        let elaborated = elaborator.elaborate_module(&module).unwrap();
        let global = GlobalEnv::with_builtins();
        typecheck_module(&elaborated, &global)
    }

    #[test]
    fn infers_int_arithmetic() {
        let result = check_source("export let x = 1 + 2\n");
        assert!(result.is_ok());
    }

    #[test]
    fn infers_float_arithmetic_from_literals() {
        let result = check_source("export let x = 1.5 + 2.5\n");
        assert!(result.is_ok());
    }

    #[test]
    fn rejects_mismatched_arithmetic_operands() {
        let result = check_source("export let x = 1 + \"a\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn identity_function_generalizes() {
        let result = check_source("export let id = \\x . x\n");
        let typed = result.unwrap();
        let (_, scheme) = &typed.schemes[0];
        assert_eq!(scheme.vars.len(), 1);
    }

    #[test]
    fn mod_on_float_has_no_instance() {
        let result = check_source("export let x = 1.5 % 2.0\n");
        assert!(matches!(result, Err(errs) if errs.iter().any(|e| matches!(e, TypeError::NoInstance { .. }))));
    }

    #[test]
    fn non_exhaustive_bool_match_warns_with_witness() {
        let typed = check_source("export let x = match true with | true => 1\n").expect("typechecks");
        assert_eq!(typed.warnings.len(), 1);
        assert_eq!(typed.warnings[0].witnesses, vec!["false".to_owned()]);
    }

    #[test]
    fn exhaustive_adt_match_has_no_warning() {
        let result = check_source(
            "type Shape = Circle(Float) | Rect(Float, Float)\n\
             export let area = match Rect(3.0, 4.0) with | Circle(r) => r * r | Rect(w, h) => w * h\n",
        );
        let typed = result.expect("typechecks");
        assert!(typed.warnings.is_empty());
    }

    #[test]
    fn non_exhaustive_adt_match_reports_missing_ctor() {
        let result = check_source(
            "type Shape = Circle(Float) | Rect(Float, Float)\n\
             export let area = match Rect(3.0, 4.0) with | Circle(r) => r * r\n",
        );
        let typed = result.expect("typechecks");
        assert_eq!(typed.warnings.len(), 1);
        assert_eq!(typed.warnings[0].witnesses, vec!["Rect".to_owned()]);
    }
}
