//! The tree-walking evaluator: `eval(core, env, ctx) -> Value | RuntimeError`.
//!
//! Module initialization runs each loaded module's top-level bindings as one
//! `letrec` group so later bindings may reference earlier ones and vice
//! versa, then exposes the group as that module's binding table for
//! `Atom::ModuleVar` resolution by dependents.

use std::cmp::Ordering;
use std::sync::Arc;

use ahash::AHashMap;
use indexmap::IndexMap;

use crate::capability::CapabilitySet;
use crate::core::{Atom, CoreExpr, CoreKind, PrimOp};
use crate::effect::{self, EffectConfig, PrintWriter};
use crate::error::RuntimeError;
use crate::function::{Closure, PartialApp};
use crate::module::LoadedModule;
use crate::namespace::{Cell, Namespace};
use crate::pattern::{compile_match, DecisionTree};
use crate::resource::ResourceTracker;
use crate::tracer::EvalTracer;
use crate::value::Value;

/// A module's public and private top-level bindings once initialized.
pub type ModuleTable = AHashMap<Arc<str>, Value>;

/// Dictionary registry populated by the (not yet run, in this crate)
/// dictionary elaboration pass: `(module, class, type, method) -> implementation`.
pub type DictRegistry = AHashMap<(Arc<str>, Arc<str>, Arc<str>, Arc<str>), Value>;

pub struct EvalCtx<'a> {
    pub modules: &'a AHashMap<String, ModuleTable>,
    pub dicts: &'a DictRegistry,
    pub caps: &'a CapabilitySet,
    pub effect_config: &'a EffectConfig,
    pub print: &'a mut dyn PrintWriter,
    pub tracker: &'a mut dyn ResourceTracker,
    pub tracer: &'a mut dyn EvalTracer,
}

/// Builds the synthetic `$builtin` module: every name
/// `elaborate::is_builtin` recognizes, bound to a [`Value::Builtin`] with
/// the effect label the runtime dispatches through, or `None` for the two
/// pure builtins (`show`/`toString`).
#[must_use]
pub fn builtin_module_table() -> ModuleTable {
    const ENTRIES: &[(&str, Option<(&'static str, &'static str)>)] = &[
        ("_io_print", Some(("IO", "print"))),
        ("_io_println", Some(("IO", "println"))),
        ("_io_readLine", Some(("IO", "readLine"))),
        ("_fs_readFile", Some(("FS", "readFile"))),
        ("_fs_writeFile", Some(("FS", "writeFile"))),
        ("_fs_exists", Some(("FS", "exists"))),
        ("_clock_now", Some(("Clock", "now"))),
        ("_clock_sleep", Some(("Clock", "sleep"))),
        ("_net_httpGet", Some(("Net", "httpGet"))),
        ("_net_httpPost", Some(("Net", "httpPost"))),
        ("_net_httpRequest", Some(("Net", "httpRequest"))),
        ("show", None),
        ("toString", None),
    ];
    let mut table = ModuleTable::default();
    for (name, effect) in ENTRIES {
        table.insert(
            Arc::from(*name),
            Value::Builtin(Arc::new(crate::effect::Builtin {
                name: Arc::from(*name),
                effect: *effect,
            })),
        );
    }
    table
}

/// Initializes every loaded module in dependency order, returning a table
/// from module path to its binding table. Each module's bindings are
/// mutually recursive with each other: a module's top-level declarations
/// form a single recursive scope.
pub fn init_modules(loaded: &[Arc<LoadedModule>], ctx: &mut EvalCtx<'_>) -> Result<AHashMap<String, ModuleTable>, RuntimeError> {
    let mut modules: AHashMap<String, ModuleTable> = AHashMap::new();
    modules.insert(crate::elaborate::BUILTIN_MODULE.to_owned(), builtin_module_table());
    for module in loaded {
        ctx.tracer.on_module_init(&module.path);
        let root = Namespace::root();
        let mut scope = Namespace::child(&root);
        let mut cells = Vec::with_capacity(module.elaborated.bindings.len());
        for (name, _, _) in &module.elaborated.bindings {
            let cell = Cell::new();
            scope.bind_cell(Arc::clone(name), cell.clone());
            cells.push(cell);
        }
        let scope = Arc::new(scope);

        let mut table = ModuleTable::default();
        for ((name, body, exported), cell) in module.elaborated.bindings.iter().zip(cells.iter()) {
            let value = eval_expr(body, &scope, &modules, ctx)?;
            cell.fill(value.clone());
            // Intra-module references resolve through `cells`, never through
            // `table` — only exports need publishing for `Atom::ModuleVar`
            // lookups from dependents.
            if *exported {
                table.insert(Arc::clone(name), value);
            }
        }
        modules.insert(module.path.clone(), table);
    }
    Ok(modules)
}

/// Invokes a module's exported `main`-style entry point with already-decoded
/// argument values; CLI JSON argument decoding happens before this call.
pub fn invoke_entry(
    entry: &Value,
    args: Vec<Value>,
    modules: &AHashMap<String, ModuleTable>,
    ctx: &mut EvalCtx<'_>,
) -> Result<Value, RuntimeError> {
    apply_value(entry.clone(), args, &crate::span::Span::unknown(), modules, ctx)
}

pub fn eval_expr(
    core: &CoreExpr,
    env: &Arc<Namespace>,
    modules: &AHashMap<String, ModuleTable>,
    ctx: &mut EvalCtx<'_>,
) -> Result<Value, RuntimeError> {
    match &core.kind {
        CoreKind::Atom(atom) => eval_atom(atom, env, modules, &core.span),
        CoreKind::Lambda { params, self_name, body } => Ok(Value::Closure(Arc::new(Closure {
            params: params.clone(),
            body: Arc::new((**body).clone()),
            env: Arc::clone(env),
            self_name: self_name.clone(),
        }))),
        CoreKind::Apply { func, args } => {
            let func_value = eval_expr(func, env, modules, ctx)?;
            let mut arg_values = Vec::with_capacity(args.len());
            for a in args {
                arg_values.push(eval_atom(a, env, modules, &core.span)?);
            }
            apply_value(func_value, arg_values, &core.span, modules, ctx)
        }
        CoreKind::Let { name, value, body } => {
            let v = eval_expr(value, env, modules, ctx)?;
            let mut child = Namespace::child(env);
            child.bind(Arc::clone(name), v);
            eval_expr(body, &Arc::new(child), modules, ctx)
        }
        CoreKind::Letrec { bindings, body } => {
            let mut child = Namespace::child(env);
            let mut cells = Vec::with_capacity(bindings.len());
            for (name, _) in bindings {
                let cell = Cell::new();
                child.bind_cell(Arc::clone(name), cell.clone());
                cells.push(cell);
            }
            let child = Arc::new(child);
            for ((_, value_expr), cell) in bindings.iter().zip(cells.iter()) {
                let v = eval_expr(value_expr, &child, modules, ctx)?;
                cell.fill(v);
            }
            eval_expr(body, &child, modules, ctx)
        }
        CoreKind::If { cond, then_branch, else_branch } => {
            let cond_value = eval_atom(cond, env, modules, &core.span)?;
            match cond_value {
                Value::Bool(true) => eval_expr(then_branch, env, modules, ctx),
                Value::Bool(false) => eval_expr(else_branch, env, modules, ctx),
                other => Err(RuntimeError::TypeMismatch {
                    span: core.span.clone(),
                    expected: "Bool",
                    found: other.type_name(),
                }),
            }
        }
        CoreKind::Match { scrutinee, clauses } => {
            let scrutinee_value = eval_atom(scrutinee, env, modules, &core.span)?;
            ctx.tracer.on_match(&scrutinee_value, &core.span);
            let patterns: Vec<crate::ast::Pattern> = clauses.iter().map(|c| c.pattern.clone()).collect();
            let tree = compile_match(&patterns);
            eval_decision_tree(&tree, clauses, &scrutinee_value, env, modules, ctx, &core.span)
        }
        CoreKind::RecordLit(fields) => {
            let mut map: IndexMap<Arc<str>, Value, ahash::RandomState> = IndexMap::default();
            for (label, atom) in fields {
                map.insert(Arc::clone(label), eval_atom(atom, env, modules, &core.span)?);
            }
            Ok(Value::Record(Arc::new(map)))
        }
        CoreKind::RecordAccess { record, label } => {
            let v = eval_atom(record, env, modules, &core.span)?;
            match &v {
                Value::Record(fields) => fields.get(label.as_ref()).cloned().ok_or_else(|| RuntimeError::MalformedValue {
                    span: core.span.clone(),
                    message: format!("record has no field '{label}'"),
                }),
                other => Err(RuntimeError::TypeMismatch {
                    span: core.span.clone(),
                    expected: "Record",
                    found: other.type_name(),
                }),
            }
        }
        CoreKind::RecordExtend { record, fields } => {
            let v = eval_atom(record, env, modules, &core.span)?;
            let Value::Record(base) = &v else {
                return Err(RuntimeError::TypeMismatch {
                    span: core.span.clone(),
                    expected: "Record",
                    found: v.type_name(),
                });
            };
            let mut map = (**base).clone();
            for (label, atom) in fields {
                let value = eval_atom(atom, env, modules, &core.span)?;
                map.insert(Arc::clone(label), value);
            }
            Ok(Value::Record(Arc::new(map)))
        }
        CoreKind::RecordRestrict { record, labels } => {
            let v = eval_atom(record, env, modules, &core.span)?;
            let Value::Record(base) = &v else {
                return Err(RuntimeError::TypeMismatch {
                    span: core.span.clone(),
                    expected: "Record",
                    found: v.type_name(),
                });
            };
            let mut map = (**base).clone();
            for label in labels {
                map.shift_remove(label.as_ref());
            }
            Ok(Value::Record(Arc::new(map)))
        }
        CoreKind::Ctor { name, args } => {
            let mut fields = Vec::with_capacity(args.len());
            for a in args {
                fields.push(eval_atom(a, env, modules, &core.span)?);
            }
            Ok(Value::Tagged {
                tag: Arc::clone(name),
                fields: Arc::from(fields),
            })
        }
        CoreKind::PrimOp { op, args } => {
            let mut values = Vec::with_capacity(args.len());
            for a in args {
                values.push(eval_atom(a, env, modules, &core.span)?);
            }
            eval_primop(*op, &values, &core.span)
        }
        CoreKind::DictLookup { module, class, ty, method } => ctx
            .dicts
            .get(&(Arc::clone(module), Arc::clone(class), Arc::clone(ty), Arc::clone(method)))
            .cloned()
            .ok_or_else(|| RuntimeError::DictionaryNotFound {
                span: core.span.clone(),
                key: format!("{class}[{ty}].{method}"),
            }),
        CoreKind::DictApply { dict, args } => {
            let dict_value = eval_atom(dict, env, modules, &core.span)?;
            let mut arg_values = Vec::with_capacity(args.len());
            for a in args {
                arg_values.push(eval_atom(a, env, modules, &core.span)?);
            }
            apply_value(dict_value, arg_values, &core.span, modules, ctx)
        }
    }
}

fn eval_decision_tree(
    tree: &DecisionTree,
    clauses: &[crate::core::MatchClause],
    scrutinee: &Value,
    env: &Arc<Namespace>,
    modules: &AHashMap<String, ModuleTable>,
    ctx: &mut EvalCtx<'_>,
    span: &crate::span::Span,
) -> Result<Value, RuntimeError> {
    match tree {
        DecisionTree::Fail => Err(RuntimeError::NonExhaustiveMatch {
            span: span.clone(),
            value: scrutinee.to_string(),
        }),
        DecisionTree::Leaf { clause_index, next } => {
            let clause = &clauses[*clause_index];
            let mut bindings = Vec::new();
            if match_pattern(&clause.pattern, scrutinee, &mut bindings) {
                let mut child = Namespace::child(env);
                for (name, value) in &bindings {
                    child.bind(Arc::from(name.as_str()), value.clone());
                }
                let child = Arc::new(child);
                if let Some(guard) = &clause.guard {
                    match eval_expr(guard, &child, modules, ctx)? {
                        Value::Bool(true) => return eval_expr(&clause.body, &child, modules, ctx),
                        Value::Bool(false) => {}
                        other => {
                            return Err(RuntimeError::TypeMismatch {
                                span: span.clone(),
                                expected: "Bool",
                                found: other.type_name(),
                            });
                        }
                    }
                } else {
                    return eval_expr(&clause.body, &child, modules, ctx);
                }
            }
            match next {
                Some(next_tree) => eval_decision_tree(next_tree, clauses, scrutinee, env, modules, ctx, span),
                None => Err(RuntimeError::NonExhaustiveMatch {
                    span: span.clone(),
                    value: scrutinee.to_string(),
                }),
            }
        }
    }
}

/// Structurally matches `pattern` against `value`, accumulating variable
/// bindings. Mirrors the shape `pattern::pattern_bound_names` declares.
fn match_pattern(pattern: &crate::ast::Pattern, value: &Value, bindings: &mut Vec<(String, Value)>) -> bool {
    use crate::ast::Pattern;
    match pattern {
        Pattern::Wildcard(_) => true,
        Pattern::Var(name, _) => {
            bindings.push((name.clone(), value.clone()));
            true
        }
        Pattern::Int(n, _) => matches!(value, Value::Int(v) if v == n),
        Pattern::Float(n, _) => matches!(value, Value::Float(v) if v == n),
        Pattern::Str(s, _) => matches!(value, Value::Str(v) if v.as_ref() == s.as_str()),
        Pattern::Bool(b, _) => matches!(value, Value::Bool(v) if v == b),
        Pattern::Ctor { name, args, .. } => match value {
            Value::Tagged { tag, fields } if tag.as_ref() == name => {
                args.len() == fields.len() && args.iter().zip(fields.iter()).all(|(p, v)| match_pattern(p, v, bindings))
            }
            _ => false,
        },
        Pattern::Tuple(pats, _) => match value {
            Value::Tuple(vals) => pats.len() == vals.len() && pats.iter().zip(vals.iter()).all(|(p, v)| match_pattern(p, v, bindings)),
            _ => false,
        },
        Pattern::ListNil(_) => matches!(value, Value::Tagged { tag, .. } if tag.as_ref() == "Nil"),
        Pattern::ListCons { head, tail, .. } => match value {
            Value::Tagged { tag, fields } if tag.as_ref() == "Cons" => {
                match_pattern(head, &fields[0], bindings) && match_pattern(tail, &fields[1], bindings)
            }
            _ => false,
        },
        Pattern::Record { fields, .. } => match value {
            Value::Record(map) => fields.iter().all(|(label, p)| map.get(label.as_str()).is_some_and(|v| match_pattern(p, v, bindings))),
            _ => false,
        },
    }
}

fn eval_atom(
    atom: &Atom,
    env: &Arc<Namespace>,
    modules: &AHashMap<String, ModuleTable>,
    span: &crate::span::Span,
) -> Result<Value, RuntimeError> {
    match atom {
        Atom::Var(name) => env.lookup(name).ok_or_else(|| RuntimeError::UnboundVariable {
            span: span.clone(),
            name: name.to_string(),
        }),
        Atom::ModuleVar { module, name } => modules
            .get(module.as_ref())
            .and_then(|table| table.get(name))
            .cloned()
            .ok_or_else(|| RuntimeError::UnboundVariable {
                span: span.clone(),
                name: format!("{module}.{name}"),
            }),
        Atom::Int(n) => Ok(Value::Int(*n)),
        Atom::Float(n) => Ok(Value::Float(*n)),
        Atom::Str(s) => Ok(Value::Str(Arc::clone(s))),
        Atom::Bool(b) => Ok(Value::Bool(*b)),
        Atom::Unit => Ok(Value::Unit),
    }
}

fn apply_value(
    func: Value,
    args: Vec<Value>,
    span: &crate::span::Span,
    modules: &AHashMap<String, ModuleTable>,
    ctx: &mut EvalCtx<'_>,
) -> Result<Value, RuntimeError> {
    ctx.tracker.enter_call().map_err(|_| RuntimeError::StackOverflow { span: span.clone() })?;
    let result = apply_value_inner(func, args, span, modules, ctx);
    ctx.tracker.exit_call();
    result
}

fn apply_value_inner(
    func: Value,
    mut args: Vec<Value>,
    span: &crate::span::Span,
    modules: &AHashMap<String, ModuleTable>,
    ctx: &mut EvalCtx<'_>,
) -> Result<Value, RuntimeError> {
    match func {
        Value::Closure(closure) => {
            ctx.tracer.on_call("<closure>", &args, span);
            if args.len() < closure.arity() {
                return Ok(Value::Partial(Arc::new(PartialApp { closure, supplied: args })));
            }
            let extra = args.split_off(closure.arity());
            let mut scope = Namespace::child(&closure.env);
            for (param, value) in closure.params.iter().zip(args.into_iter()) {
                scope.bind(Arc::clone(param), value);
            }
            if let Some(self_name) = &closure.self_name {
                scope.bind(Arc::clone(self_name), Value::Closure(Arc::clone(&closure)));
            }
            let scope = Arc::new(scope);
            let result = eval_expr(&closure.body, &scope, modules, ctx)?;
            ctx.tracer.on_return("<closure>", &result);
            if extra.is_empty() {
                Ok(result)
            } else {
                apply_value_inner(result, extra, span, modules, ctx)
            }
        }
        Value::Partial(partial) => {
            let mut all_args = partial.supplied.clone();
            all_args.append(&mut args);
            apply_value_inner(Value::Closure(Arc::clone(&partial.closure)), all_args, span, modules, ctx)
        }
        Value::Builtin(builtin) => {
            let result = match builtin.effect {
                Some((effect_name, op_name)) => {
                    ctx.tracer.on_effect_dispatch(effect_name, op_name, span);
                    effect::invoke_effect(effect_name, op_name, &args, ctx.caps, ctx.effect_config, ctx.print, span)?
                }
                None => eval_pure_builtin(&builtin.name, &args, span)?,
            };
            Ok(result)
        }
        other => Err(RuntimeError::TypeMismatch {
            span: span.clone(),
            expected: "Function",
            found: other.type_name(),
        }),
    }
}

/// `show`/`toString`: the only pure builtins not modeled as effect ops.
fn eval_pure_builtin(name: &str, args: &[Value], span: &crate::span::Span) -> Result<Value, RuntimeError> {
    match name {
        "show" | "toString" => {
            let v = args.first().ok_or_else(|| RuntimeError::ArityMismatch {
                span: span.clone(),
                expected: 1,
                found: args.len(),
            })?;
            Ok(Value::Str(Arc::from(v.to_string())))
        }
        _ => Err(RuntimeError::MalformedValue {
            span: span.clone(),
            message: format!("unknown builtin '{name}'"),
        }),
    }
}

fn eval_primop(op: PrimOp, args: &[Value], span: &crate::span::Span) -> Result<Value, RuntimeError> {
    use PrimOp::{
        EqGeneric, FloatAdd, FloatDiv, FloatMul, FloatSub, GeGeneric, GtGeneric, IntAdd, IntDiv, IntMod, IntMul, IntSub, LeGeneric,
        LtGeneric, NeGeneric, Neg, Not, StrConcat,
    };
    match op {
        IntAdd | IntSub | IntMul | IntDiv | IntMod => int_binop(op, args, span),
        FloatAdd | FloatSub | FloatMul | FloatDiv => float_binop(op, args, span),
        Neg => match args {
            [Value::Int(n)] => Ok(Value::Int(-n)),
            [Value::Float(n)] => Ok(Value::Float(-n)),
            _ => Err(type_error_unary("Int or Float", args, span)),
        },
        Not => match args {
            [Value::Bool(b)] => Ok(Value::Bool(!b)),
            _ => Err(type_error_unary("Bool", args, span)),
        },
        StrConcat => match args {
            [Value::Str(a), Value::Str(b)] => Ok(Value::Str(Arc::from(format!("{a}{b}")))),
            _ => Err(type_error_binary("String", args, span)),
        },
        PrimOp::ListConcat => concat_lists(args, span),
        EqGeneric => Ok(Value::Bool(args[0].structural_eq(&args[1]))),
        NeGeneric => Ok(Value::Bool(!args[0].structural_eq(&args[1]))),
        LtGeneric | LeGeneric | GtGeneric | GeGeneric => {
            let ord = compare_values(&args[0], &args[1]).ok_or_else(|| RuntimeError::MalformedValue {
                span: span.clone(),
                message: "values are not orderable".to_owned(),
            })?;
            Ok(Value::Bool(match op {
                LtGeneric => ord == Ordering::Less,
                LeGeneric => ord != Ordering::Greater,
                GtGeneric => ord == Ordering::Greater,
                GeGeneric => ord != Ordering::Less,
                _ => unreachable!("guarded by outer match"),
            }))
        }
    }
}

fn int_binop(op: PrimOp, args: &[Value], span: &crate::span::Span) -> Result<Value, RuntimeError> {
    let [Value::Int(a), Value::Int(b)] = args else {
        return Err(type_error_binary("Int", args, span));
    };
    match op {
        PrimOp::IntAdd => Ok(Value::Int(a.wrapping_add(*b))),
        PrimOp::IntSub => Ok(Value::Int(a.wrapping_sub(*b))),
        PrimOp::IntMul => Ok(Value::Int(a.wrapping_mul(*b))),
        PrimOp::IntDiv => {
            if *b == 0 {
                Err(RuntimeError::DivisionByZero { span: span.clone() })
            } else {
                Ok(Value::Int(a.wrapping_div(*b)))
            }
        }
        PrimOp::IntMod => {
            if *b == 0 {
                Err(RuntimeError::DivisionByZero { span: span.clone() })
            } else {
                Ok(Value::Int(a.rem_euclid(*b)))
            }
        }
        _ => unreachable!("guarded by caller"),
    }
}

fn float_binop(op: PrimOp, args: &[Value], span: &crate::span::Span) -> Result<Value, RuntimeError> {
    let [Value::Float(a), Value::Float(b)] = args else {
        return Err(type_error_binary("Float", args, span));
    };
    match op {
        PrimOp::FloatAdd => Ok(Value::Float(a + b)),
        PrimOp::FloatSub => Ok(Value::Float(a - b)),
        PrimOp::FloatMul => Ok(Value::Float(a * b)),
        PrimOp::FloatDiv => Ok(Value::Float(a / b)),
        _ => unreachable!("guarded by caller"),
    }
}

fn concat_lists(args: &[Value], span: &crate::span::Span) -> Result<Value, RuntimeError> {
    let [a, b] = args else {
        return Err(type_error_binary("Tagged", args, span));
    };
    let mut items = Vec::new();
    let mut cur = a;
    loop {
        match cur {
            Value::Tagged { tag, fields } if tag.as_ref() == "Cons" => {
                items.push(fields[0].clone());
                cur = &fields[1];
            }
            Value::Tagged { tag, .. } if tag.as_ref() == "Nil" => break,
            other => return Err(type_error_unary("list", std::slice::from_ref(other), span)),
        }
    }
    let mut result = b.clone();
    for item in items.into_iter().rev() {
        result = Value::cons(item, result);
    }
    Ok(result)
}

fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x.partial_cmp(y),
        (Value::Float(x), Value::Float(y)) => x.partial_cmp(y),
        (Value::Str(x), Value::Str(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => x.partial_cmp(y),
        _ => None,
    }
}

fn type_error_binary(expected: &'static str, args: &[Value], span: &crate::span::Span) -> RuntimeError {
    let found = args.first().map_or("<missing>", Value::type_name);
    RuntimeError::TypeMismatch {
        span: span.clone(),
        expected,
        found,
    }
}

fn type_error_unary(expected: &'static str, args: &[Value], span: &crate::span::Span) -> RuntimeError {
    type_error_binary(expected, args, span)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::CapabilitySet;
    use crate::effect::{EffectConfig, NoPrint};
    use crate::resource::LimitedTracker;
    use crate::span::{NodeId, Span};
    use crate::tracer::NoopTracer;

    fn unit_ctx<'a>(
        modules: &'a AHashMap<String, ModuleTable>,
        dicts: &'a DictRegistry,
        caps: &'a CapabilitySet,
        effect_config: &'a EffectConfig,
        print: &'a mut NoPrint,
        tracker: &'a mut LimitedTracker,
        tracer: &'a mut NoopTracer,
    ) -> EvalCtx<'a> {
        EvalCtx {
            modules,
            dicts,
            caps,
            effect_config,
            print,
            tracker,
            tracer,
        }
    }

    fn atom_expr(atom: Atom) -> CoreExpr {
        CoreExpr::new(NodeId::derive("t", 0, 0, "Atom", &[]), Span::unknown(), CoreKind::Atom(atom))
    }

    #[test]
    fn arithmetic_primop_adds_ints() {
        let span = Span::unknown();
        let result = eval_primop(PrimOp::IntAdd, &[Value::Int(2), Value::Int(3)], &span).unwrap();
        assert!(matches!(result, Value::Int(5)));
    }

    #[test]
    fn division_by_zero_is_reported() {
        let span = Span::unknown();
        let result = eval_primop(PrimOp::IntDiv, &[Value::Int(1), Value::Int(0)], &span);
        assert!(matches!(result, Err(RuntimeError::DivisionByZero { .. })));
    }

    #[test]
    fn lambda_evaluates_to_closure_and_applies() {
        let modules = AHashMap::default();
        let dicts = DictRegistry::default();
        let caps = CapabilitySet::none();
        let config = EffectConfig::default();
        let mut print = NoPrint;
        let mut tracker = LimitedTracker::new(100);
        let mut tracer = NoopTracer;
        let mut ctx = unit_ctx(&modules, &dicts, &caps, &config, &mut print, &mut tracker, &mut tracer);

        let body = atom_expr(Atom::Int(7));
        let lambda = CoreExpr::new(
            NodeId::derive("t", 0, 0, "Lambda", &[]),
            Span::unknown(),
            CoreKind::Lambda {
                params: vec![],
                self_name: None,
                body: Box::new(body),
            },
        );
        let env = Namespace::root();
        let closure_value = eval_expr(&lambda, &env, &modules, &mut ctx).unwrap();
        let result = apply_value(closure_value, vec![], &Span::unknown(), &modules, &mut ctx).unwrap();
        assert!(matches!(result, Value::Int(7)));
    }

    #[test]
    fn partial_application_curries_until_saturated() {
        let modules = AHashMap::default();
        let dicts = DictRegistry::default();
        let caps = CapabilitySet::none();
        let config = EffectConfig::default();
        let mut print = NoPrint;
        let mut tracker = LimitedTracker::new(100);
        let mut tracer = NoopTracer;
        let mut ctx = unit_ctx(&modules, &dicts, &caps, &config, &mut print, &mut tracker, &mut tracer);

        let body = CoreExpr::new(
            NodeId::derive("t", 0, 0, "PrimOp", &[]),
            Span::unknown(),
            CoreKind::PrimOp {
                op: PrimOp::IntAdd,
                args: vec![Atom::Var(Arc::from("a")), Atom::Var(Arc::from("b"))],
            },
        );
        let lambda = CoreExpr::new(
            NodeId::derive("t", 0, 0, "Lambda", &[]),
            Span::unknown(),
            CoreKind::Lambda {
                params: vec![Arc::from("a"), Arc::from("b")],
                self_name: None,
                body: Box::new(body),
            },
        );
        let env = Namespace::root();
        let closure_value = eval_expr(&lambda, &env, &modules, &mut ctx).unwrap();
        let partial = apply_value(closure_value, vec![Value::Int(1)], &Span::unknown(), &modules, &mut ctx).unwrap();
        assert!(matches!(partial, Value::Partial(_)));
        let result = apply_value(partial, vec![Value::Int(2)], &Span::unknown(), &modules, &mut ctx).unwrap();
        assert!(matches!(result, Value::Int(3)));
    }
}
