//! Elaborator: `elaborate(surface, env) -> Core | ElabError`.
//!
//! Desugars the surface AST into Core ANF, assigning each node a stable
//! [`NodeId`] derived from `(filename, start, end, kind, child-path)`, and
//! resolving imported names to `Atom::ModuleVar` references.

use std::collections::HashSet;
use std::sync::Arc;

use crate::ast::{self, BinOp, Decl, Expr, Module, Pattern, UnOp};
use crate::core::{Atom, CoreExpr, CoreKind, MatchClause, PrimOp};
use crate::error::ElabError;
use crate::span::{NodeId, Span};

/// Declares which imported names resolve to which module, so the elaborator
/// can qualify free references instead of leaving them unbound.
#[derive(Debug, Clone, Default)]
pub struct ImportEnv {
    /// name -> exporting module path
    bindings: ahash::AHashMap<String, String>,
}

impl ImportEnv {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare(&mut self, name: impl Into<String>, module: impl Into<String>) {
        self.bindings.insert(name.into(), module.into());
    }

    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<&str> {
        self.bindings.get(name).map(String::as_str)
    }
}

pub struct Elaborator<'a> {
    file: Arc<str>,
    imports: &'a ImportEnv,
    /// Local names currently in scope (parameters, let-bindings); shadows imports.
    locals: Vec<HashSet<String>>,
    counter: u32,
}

pub struct ElaboratedModule {
    pub path: Option<String>,
    pub bindings: Vec<(Arc<str>, CoreExpr, bool)>, // (name, value, exported)
    pub types: Vec<ast::Decl>,
    /// Declared ascriptions for `func` bindings, keyed by the same name used
    /// in `bindings`; `let` bindings have no declared signature.
    pub signatures: Vec<(Arc<str>, ast::FuncSignature)>,
}

impl<'a> Elaborator<'a> {
    #[must_use]
    pub fn new(file: &str, imports: &'a ImportEnv) -> Self {
        Self {
            file: Arc::from(file),
            imports,
            locals: vec![HashSet::new()],
            counter: 0,
        }
    }

    pub fn elaborate_module(&mut self, module: &Module) -> Result<ElaboratedModule, ElabError> {
        let mut exports = HashSet::new();
        let mut bindings = Vec::new();
        let mut types = Vec::new();
        let mut signatures = Vec::new();

        for decl in &module.decls {
            match decl {
                Decl::Func {
                    name,
                    params,
                    ret,
                    effects,
                    body,
                    exported,
                    span,
                } => {
                    if !exports.insert(name.clone()) && *exported {
                        return Err(ElabError::new(
                            "ELB_DUPLICATE_EXPORT",
                            format!("'{name}' is exported more than once"),
                            span.clone(),
                        ));
                    }
                    self.push_scope();
                    for (p, _) in params {
                        self.declare_local(p);
                    }
                    let core_body = self.elaborate_expr(body)?;
                    self.pop_scope();
                    let param_names: Vec<Arc<str>> = params.iter().map(|(p, _)| Arc::from(p.as_str())).collect();
                    let lambda = CoreExpr::new(
                        self.node_id(span, "Lambda", &[]),
                        span.clone(),
                        CoreKind::Lambda {
                            params: param_names,
                            self_name: Some(Arc::from(name.as_str())),
                            body: Box::new(core_body),
                        },
                    );
                    bindings.push((Arc::from(name.as_str()), lambda, *exported));
                    signatures.push((
                        Arc::from(name.as_str()),
                        ast::FuncSignature {
                            params: params.clone(),
                            ret: ret.clone(),
                            effects: effects.clone(),
                        },
                    ));
                }
                Decl::Let {
                    name,
                    value,
                    exported,
                    span,
                } => {
                    if !exports.insert(name.clone()) && *exported {
                        return Err(ElabError::new(
                            "ELB_DUPLICATE_EXPORT",
                            format!("'{name}' is exported more than once"),
                            span.clone(),
                        ));
                    }
                    let core_value = self.elaborate_expr(value)?;
                    bindings.push((Arc::from(name.as_str()), core_value, *exported));
                }
                Decl::TypeAdt { .. } | Decl::TypeRecord { .. } => types.push(decl.clone()),
            }
        }

        if let Some(script_expr) = &module.script_expr {
            let core_value = self.elaborate_expr(script_expr)?;
            bindings.push((Arc::from("it"), core_value, false));
        }

        Ok(ElaboratedModule {
            path: module.path.clone(),
            bindings,
            types,
            signatures,
        })
    }

    fn push_scope(&mut self) {
        self.locals.push(HashSet::new());
    }

    fn pop_scope(&mut self) {
        self.locals.pop();
    }

    fn declare_local(&mut self, name: &str) {
        self.locals.last_mut().expect("at least one scope").insert(name.to_owned());
    }

    fn is_local(&self, name: &str) -> bool {
        self.locals.iter().any(|scope| scope.contains(name))
    }

    fn node_id(&mut self, span: &Span, kind: &str, child_path: &[u32]) -> NodeId {
        self.counter += 1;
        NodeId::derive(&self.file, span.start, span.end, kind, child_path)
    }

    fn fresh_name(&mut self) -> Arc<str> {
        self.counter += 1;
        Arc::from(format!("$t{}", self.counter))
    }

    fn resolve_var(&self, name: &str) -> Atom {
        if self.is_local(name) {
            Atom::Var(Arc::from(name))
        } else if let Some(module) = self.imports.resolve(name) {
            Atom::ModuleVar {
                module: Arc::from(module),
                name: Arc::from(name),
            }
        } else if is_builtin(name) {
            // Builtins live in the synthetic `$builtin` module auto-visible
            // to every module, populated by
            // `crate::eval::builtin_module_table` before module init runs.
            Atom::ModuleVar {
                module: Arc::from(BUILTIN_MODULE),
                name: Arc::from(name),
            }
        } else {
            Atom::Var(Arc::from(name))
        }
    }

    /// Elaborates `expr` to a Core expression that may itself be compound;
    /// callers needing an atom should go through [`Self::elaborate_atom`].
    fn elaborate_expr(&mut self, expr: &Expr) -> Result<CoreExpr, ElabError> {
        let span = expr.span().clone();
        match expr {
            Expr::Int(n, _) => Ok(self.atom_expr(Atom::Int(*n), span, "Int")),
            Expr::Float(n, _) => Ok(self.atom_expr(Atom::Float(*n), span, "Float")),
            Expr::Str(s, _) => Ok(self.atom_expr(Atom::Str(Arc::from(s.as_str())), span, "Str")),
            Expr::Bool(b, _) => Ok(self.atom_expr(Atom::Bool(*b), span, "Bool")),
            Expr::Unit(_) => Ok(self.atom_expr(Atom::Unit, span, "Unit")),
            Expr::Var(name, _) => {
                if !self.is_local(name) && self.imports.resolve(name).is_none() && !is_builtin(name) {
                    return Err(ElabError::new(
                        "ELB_UNBOUND",
                        format!("unbound name '{name}'"),
                        span,
                    ));
                }
                Ok(self.atom_expr(self.resolve_var(name), span, "Var"))
            }
            Expr::Lambda { params, body, .. } => {
                self.push_scope();
                for p in params {
                    self.declare_local(p);
                }
                let core_body = self.elaborate_expr(body)?;
                self.pop_scope();
                let id = self.node_id(&span, "Lambda", &[]);
                Ok(CoreExpr::new(
                    id,
                    span,
                    CoreKind::Lambda {
                        params: params.iter().map(|p| Arc::from(p.as_str())).collect(),
                        self_name: None,
                        body: Box::new(core_body),
                    },
                ))
            }
            Expr::Apply { func, args, .. } => self.elaborate_apply(func, args, span),
            Expr::BinOp { op, lhs, rhs, .. } => self.elaborate_binop(*op, lhs, rhs, span),
            Expr::UnOp { op, operand, .. } => self.elaborate_unop(*op, operand, span),
            Expr::Let { name, value, body, .. } => {
                let core_value = self.elaborate_expr(value)?;
                self.push_scope();
                self.declare_local(name);
                let core_body = self.elaborate_expr(body)?;
                self.pop_scope();
                let id = self.node_id(&span, "Let", &[]);
                Ok(CoreExpr::new(
                    id,
                    span,
                    CoreKind::Let {
                        name: Arc::from(name.as_str()),
                        value: Box::new(core_value),
                        body: Box::new(core_body),
                    },
                ))
            }
            Expr::Letrec { bindings, body, .. } => {
                self.push_scope();
                for (name, _) in bindings {
                    self.declare_local(name);
                }
                let mut core_bindings = Vec::new();
                for (name, value) in bindings {
                    let mut core_value = self.elaborate_expr(value)?;
                    if let CoreKind::Lambda { self_name, .. } = &mut core_value.kind {
                        *self_name = Some(Arc::from(name.as_str()));
                    }
                    core_bindings.push((Arc::from(name.as_str()), core_value));
                }
                let core_body = self.elaborate_expr(body)?;
                self.pop_scope();
                let id = self.node_id(&span, "Letrec", &[]);
                Ok(CoreExpr::new(
                    id,
                    span,
                    CoreKind::Letrec {
                        bindings: core_bindings,
                        body: Box::new(core_body),
                    },
                ))
            }
            Expr::If {
                cond,
                then_branch,
                else_branch,
                ..
            } => {
                let (cond_atom, mut binder) = self.elaborate_atom(cond)?;
                let then_core = self.elaborate_expr(then_branch)?;
                let else_core = self.elaborate_expr(else_branch)?;
                let id = self.node_id(&span, "If", &[]);
                let if_expr = CoreExpr::new(
                    id,
                    span.clone(),
                    CoreKind::If {
                        cond: cond_atom,
                        then_branch: Box::new(then_core),
                        else_branch: Box::new(else_core),
                    },
                );
                Ok(binder.wrap(if_expr, &span, self))
            }
            Expr::Match { scrutinee, clauses, .. } => {
                let (scrutinee_atom, mut binder) = self.elaborate_atom(scrutinee)?;
                let mut core_clauses = Vec::new();
                for clause in clauses {
                    self.push_scope();
                    self.declare_pattern_locals(&clause.pattern);
                    let guard = clause.guard.as_ref().map(|g| self.elaborate_expr(g)).transpose()?;
                    let body = self.elaborate_expr(&clause.body)?;
                    self.pop_scope();
                    core_clauses.push(MatchClause {
                        pattern: clause.pattern.clone(),
                        guard,
                        body,
                    });
                }
                let id = self.node_id(&span, "Match", &[]);
                let match_expr = CoreExpr::new(
                    id,
                    span.clone(),
                    CoreKind::Match {
                        scrutinee: scrutinee_atom,
                        clauses: core_clauses,
                    },
                );
                Ok(binder.wrap(match_expr, &span, self))
            }
            Expr::Tuple(items, _) => {
                // desugars to a `Tuple` constructor application over ANF-bound atoms
                let (atoms, binder) = self.elaborate_atoms(items)?;
                let id = self.node_id(&span, "Tuple", &[]);
                let expr = CoreExpr::new(id, span.clone(), CoreKind::Ctor {
                    name: Arc::from("Tuple"),
                    args: atoms,
                });
                Ok(binder.wrap_owned(expr, &span, self))
            }
            Expr::List(items, _) => {
                let mut result = self.atom_expr(Atom::Unit, span.clone(), "Nil");
                let id = self.node_id(&span, "Nil", &[]);
                result = CoreExpr::new(id, span.clone(), CoreKind::Ctor {
                    name: Arc::from("Nil"),
                    args: vec![],
                });
                for (i, item) in items.iter().enumerate().rev() {
                    let (atom, binder) = self.elaborate_atom(item)?;
                    let cons_id = self.node_id(&span, "Cons", &[i as u32]);
                    let tail_name = self.fresh_name();
                    let tail_let_id = self.node_id(&span, "ConsTailLet", &[i as u32]);
                    let cons = CoreExpr::new(
                        cons_id,
                        span.clone(),
                        CoreKind::Ctor {
                            name: Arc::from("Cons"),
                            args: vec![atom, Atom::Var(tail_name.clone())],
                        },
                    );
                    let with_tail = CoreExpr::new(
                        tail_let_id,
                        span.clone(),
                        CoreKind::Let {
                            name: tail_name,
                            value: Box::new(result),
                            body: Box::new(cons),
                        },
                    );
                    result = binder.wrap_owned(with_tail, &span, self);
                }
                Ok(result)
            }
            Expr::RecordLit(fields, _) => {
                let names: Vec<&str> = fields.iter().map(|(n, _)| n.as_str()).collect();
                let exprs: Vec<&Expr> = fields.iter().map(|(_, e)| e).collect();
                let (atoms, binder) = self.elaborate_atoms(&exprs.into_iter().cloned().collect::<Vec<_>>())?;
                let pairs = names.iter().map(|n| Arc::from(*n)).zip(atoms).collect();
                let id = self.node_id(&span, "RecordLit", &[]);
                let expr = CoreExpr::new(id, span.clone(), CoreKind::RecordLit(pairs));
                Ok(binder.wrap_owned(expr, &span, self))
            }
            Expr::RecordAccess { record, label, .. } => {
                let (atom, binder) = self.elaborate_atom(record)?;
                let id = self.node_id(&span, "RecordAccess", &[]);
                let expr = CoreExpr::new(
                    id,
                    span.clone(),
                    CoreKind::RecordAccess {
                        record: atom,
                        label: Arc::from(label.as_str()),
                    },
                );
                Ok(binder.wrap(expr, &span, self))
            }
            Expr::RecordExtend { record, fields, .. } => {
                let (record_atom, mut binder) = self.elaborate_atom(record)?;
                let mut pairs = Vec::new();
                for (name, value) in fields {
                    let (atom, mut b) = self.elaborate_atom(value)?;
                    pairs.push((Arc::from(name.as_str()), atom));
                    binder.absorb(&mut b);
                }
                let id = self.node_id(&span, "RecordExtend", &[]);
                let expr = CoreExpr::new(id, span.clone(), CoreKind::RecordExtend {
                    record: record_atom,
                    fields: pairs,
                });
                Ok(binder.wrap(expr, &span, self))
            }
            Expr::RecordUpdate { record, fields, .. } => {
                // `{r with f: v}` desugars to extension: construction copying
                // unchanged fields is the evaluator's job at `RecordExtend`
                // time (it overwrites existing labels in place).
                let (record_atom, mut binder) = self.elaborate_atom(record)?;
                let mut pairs = Vec::new();
                for (name, value) in fields {
                    let (atom, mut b) = self.elaborate_atom(value)?;
                    pairs.push((Arc::from(name.as_str()), atom));
                    binder.absorb(&mut b);
                }
                let id = self.node_id(&span, "RecordExtend", &[]);
                let expr = CoreExpr::new(id, span.clone(), CoreKind::RecordExtend {
                    record: record_atom,
                    fields: pairs,
                });
                Ok(binder.wrap(expr, &span, self))
            }
            Expr::RecordRestrict { record, labels, .. } => {
                let (atom, binder) = self.elaborate_atom(record)?;
                let id = self.node_id(&span, "RecordRestrict", &[]);
                let expr = CoreExpr::new(
                    id,
                    span.clone(),
                    CoreKind::RecordRestrict {
                        record: atom,
                        labels: labels.iter().map(|l| Arc::from(l.as_str())).collect(),
                    },
                );
                Ok(binder.wrap(expr, &span, self))
            }
            Expr::Ctor { name, args, .. } => {
                let (atoms, binder) = self.elaborate_atoms(args)?;
                let id = self.node_id(&span, "Ctor", &[]);
                let expr = CoreExpr::new(id, span.clone(), CoreKind::Ctor {
                    name: Arc::from(name.as_str()),
                    args: atoms,
                });
                Ok(binder.wrap_owned(expr, &span, self))
            }
            Expr::Annotate { expr: inner, .. } => self.elaborate_expr(inner),
            Expr::Block { stmts, result, .. } => {
                let mut body_expr = result.as_ref().clone();
                for stmt in stmts.iter().rev() {
                    body_expr = Expr::Let {
                        name: "_".into(),
                        value: Box::new(stmt.clone()),
                        body: Box::new(body_expr),
                        span: span.clone(),
                    };
                }
                self.elaborate_expr(&body_expr)
            }
        }
    }

    fn elaborate_apply(&mut self, func: &Expr, args: &[Expr], span: Span) -> Result<CoreExpr, ElabError> {
        let core_func = self.elaborate_expr(func)?;
        let (atoms, mut binder) = self.elaborate_atoms(args)?;
        let func_name = self.fresh_name();
        let func_let_id = self.node_id(&span, "ApplyFuncLet", &[]);
        let apply_id = self.node_id(&span, "Apply", &[]);
        let apply = CoreExpr::new(
            apply_id,
            span.clone(),
            CoreKind::Apply {
                func: Box::new(CoreExpr::new(
                    func_let_id,
                    span.clone(),
                    CoreKind::Atom(Atom::Var(func_name.clone())),
                )),
                args: atoms,
            },
        );
        let with_func = CoreExpr::new(
            func_let_id,
            span.clone(),
            CoreKind::Let {
                name: func_name,
                value: Box::new(core_func),
                body: Box::new(apply),
            },
        );
        Ok(binder.wrap_owned(with_func, &span, self))
    }

    fn elaborate_binop(&mut self, op: BinOp, lhs: &Expr, rhs: &Expr, span: Span) -> Result<CoreExpr, ElabError> {
        if matches!(op, BinOp::And | BinOp::Or) {
            // short-circuiting: desugar to `if`
            let surrogate = match op {
                BinOp::And => Expr::If {
                    cond: Box::new(lhs.clone()),
                    then_branch: Box::new(rhs.clone()),
                    else_branch: Box::new(Expr::Bool(false, span.clone())),
                    span: span.clone(),
                },
                BinOp::Or => Expr::If {
                    cond: Box::new(lhs.clone()),
                    then_branch: Box::new(Expr::Bool(true, span.clone())),
                    else_branch: Box::new(rhs.clone()),
                    span: span.clone(),
                },
                _ => unreachable!("guarded by outer match"),
            };
            return self.elaborate_expr(&surrogate);
        }
        let (lhs_atom, mut binder) = self.elaborate_atom(lhs)?;
        let (rhs_atom, mut rbinder) = self.elaborate_atom(rhs)?;
        binder.absorb(&mut rbinder);
        // Defaulting between int/float prim ops is resolved later by the type
        // checker via dictionary elaboration; the elaborator picks the integer
        // variant as a placeholder primitive that dictionary elaboration may
        // replace with a type-class dispatch for non-Int/Int operands.
        let prim = PrimOp::from_binop(op, false).unwrap_or(PrimOp::EqGeneric);
        let id = self.node_id(&span, "PrimOp", &[]);
        let expr = CoreExpr::new(
            id,
            span.clone(),
            CoreKind::PrimOp {
                op: prim,
                args: vec![lhs_atom, rhs_atom],
            },
        );
        Ok(binder.wrap(expr, &span, self))
    }

    fn elaborate_unop(&mut self, op: UnOp, operand: &Expr, span: Span) -> Result<CoreExpr, ElabError> {
        let (atom, binder) = self.elaborate_atom(operand)?;
        let prim = PrimOp::from_unop(op);
        let id = self.node_id(&span, "PrimOp", &[]);
        let expr = CoreExpr::new(
            id,
            span.clone(),
            CoreKind::PrimOp {
                op: prim,
                args: vec![atom],
            },
        );
        Ok(binder.wrap(expr, &span, self))
    }

    fn declare_pattern_locals(&mut self, pattern: &Pattern) {
        match pattern {
            Pattern::Var(name, _) => self.declare_local(name),
            Pattern::Ctor { args, .. } | Pattern::Tuple(args, _) => {
                for a in args {
                    self.declare_pattern_locals(a);
                }
            }
            Pattern::ListCons { head, tail, .. } => {
                self.declare_pattern_locals(head);
                self.declare_pattern_locals(tail);
            }
            Pattern::Record { fields, .. } => {
                for (_, p) in fields {
                    self.declare_pattern_locals(p);
                }
            }
            Pattern::Wildcard(_)
            | Pattern::Int(_, _)
            | Pattern::Float(_, _)
            | Pattern::Str(_, _)
            | Pattern::Bool(_, _)
            | Pattern::ListNil(_) => {}
        }
    }

    fn atom_expr(&mut self, atom: Atom, span: Span, kind: &str) -> CoreExpr {
        let id = self.node_id(&span, kind, &[]);
        CoreExpr::new(id, span, CoreKind::Atom(atom))
    }

    /// Elaborates `expr`; if it is already an atom, returns it directly,
    /// otherwise binds it to a fresh name and returns that name as the atom,
    /// with a [`Binder`] the caller uses to wrap the final expression in the
    /// necessary `let`.
    fn elaborate_atom(&mut self, expr: &Expr) -> Result<(Atom, Binder), ElabError> {
        if let Expr::Var(name, _) = expr {
            if !self.is_local(name) && self.imports.resolve(name).is_none() && !is_builtin(name) {
                return Err(ElabError::new(
                    "ELB_UNBOUND",
                    format!("unbound name '{name}'"),
                    expr.span().clone(),
                ));
            }
            return Ok((self.resolve_var(name), Binder::none()));
        }
        if let Expr::Int(n, _) = expr {
            return Ok((Atom::Int(*n), Binder::none()));
        }
        if let Expr::Float(n, _) = expr {
            return Ok((Atom::Float(*n), Binder::none()));
        }
        if let Expr::Str(s, _) = expr {
            return Ok((Atom::Str(Arc::from(s.as_str())), Binder::none()));
        }
        if let Expr::Bool(b, _) = expr {
            return Ok((Atom::Bool(*b), Binder::none()));
        }
        if let Expr::Unit(_) = expr {
            return Ok((Atom::Unit, Binder::none()));
        }
        let core = self.elaborate_expr(expr)?;
        let name = self.fresh_name();
        Ok((Atom::Var(name.clone()), Binder::one(name, core)))
    }

    fn elaborate_atoms(&mut self, exprs: &[Expr]) -> Result<(Vec<Atom>, Binder), ElabError> {
        let mut atoms = Vec::with_capacity(exprs.len());
        let mut binder = Binder::none();
        for e in exprs {
            let (atom, mut b) = self.elaborate_atom(e)?;
            atoms.push(atom);
            binder.absorb(&mut b);
        }
        Ok((atoms, binder))
    }
}

/// Accumulates the ANF `let`-bindings needed to normalize a compound
/// sub-expression into an atom, applied innermost-first when `wrap` is
/// called on the final expression.
#[derive(Default)]
struct Binder {
    bound: Vec<(Arc<str>, CoreExpr)>,
}

impl Binder {
    fn none() -> Self {
        Self { bound: Vec::new() }
    }

    fn one(name: Arc<str>, value: CoreExpr) -> Self {
        Self {
            bound: vec![(name, value)],
        }
    }

    fn absorb(&mut self, other: &mut Self) {
        self.bound.append(&mut other.bound);
    }

    fn wrap(&mut self, inner: CoreExpr, span: &Span, elab: &mut Elaborator<'_>) -> CoreExpr {
        self.wrap_owned(inner, span, elab)
    }

    fn wrap_owned(&mut self, inner: CoreExpr, span: &Span, elab: &mut Elaborator<'_>) -> CoreExpr {
        let mut result = inner;
        for (name, value) in self.bound.drain(..).rev() {
            let id = elab.node_id(span, "LetBind", &[]);
            result = CoreExpr::new(
                id,
                span.clone(),
                CoreKind::Let {
                    name,
                    value: Box::new(value),
                    body: Box::new(result),
                },
            );
        }
        result
    }
}

/// Name of the synthetic module every builtin primitive is addressed
/// through; never a legal user module path (leading `$`).
pub const BUILTIN_MODULE: &str = "$builtin";

/// Builtins auto-visible to every module (the `$builtin` module of §4.3).
pub fn is_builtin(name: &str) -> bool {
    matches!(
        name,
        "_io_print"
            | "_io_println"
            | "_io_readLine"
            | "_fs_readFile"
            | "_fs_writeFile"
            | "_fs_exists"
            | "_clock_now"
            | "_clock_sleep"
            | "_net_httpGet"
            | "_net_httpPost"
            | "_net_httpRequest"
            | "show"
            | "toString"
    )
}
