//! Persistent REPL session support.
//!
//! `ReplSession` keeps interpreter state across `eval_line()` calls so
//! interactive snippets can share `let`-bound names with earlier input, the
//! way module-level `letrec` bindings share scope within a single module
//! Each accepted line extends the session's scratch namespace;
//! a parse/elab/runtime error leaves previously bound names untouched.

use std::sync::Arc;

use ahash::AHashMap;

use crate::capability::CapabilitySet;
use crate::effect::{EffectConfig, PrintWriter};
use crate::elaborate::{ImportEnv, Elaborator};
use crate::error::AilangError;
use crate::eval::{DictRegistry, EvalCtx, ModuleTable};
use crate::lexer;
use crate::namespace::Namespace;
use crate::parser;
use crate::resource::{LimitedTracker, ResourceTracker};
use crate::tracer::{EvalTracer, NoopTracer, RecordingTracer};
use crate::value::Value;

const REPL_FILE: &str = "<repl>";

/// One accepted top-level binding, replayed in order to rebuild `scope`
/// whenever the session needs a fresh namespace (e.g. after `:reset`).
struct ReplBinding {
    name: Arc<str>,
    value: Value,
}

pub struct ReplSession {
    modules: AHashMap<String, ModuleTable>,
    dicts: DictRegistry,
    caps: CapabilitySet,
    effect_config: EffectConfig,
    bindings: Vec<ReplBinding>,
    tracer: RecordingTracer,
    tracing_enabled: bool,
}

impl Default for ReplSession {
    fn default() -> Self {
        Self::new(CapabilitySet::none(), EffectConfig::default())
    }
}

impl ReplSession {
    #[must_use]
    pub fn new(caps: CapabilitySet, effect_config: EffectConfig) -> Self {
        let mut modules = AHashMap::new();
        modules.insert(
            crate::elaborate::BUILTIN_MODULE.to_owned(),
            crate::eval::builtin_module_table(),
        );
        Self {
            modules,
            dicts: DictRegistry::default(),
            caps,
            effect_config,
            bindings: Vec::new(),
            tracer: RecordingTracer::new(),
            tracing_enabled: false,
        }
    }

    pub fn set_tracing(&mut self, enabled: bool) {
        self.tracing_enabled = enabled;
    }

    #[must_use]
    pub fn trace_lines(&self) -> Vec<String> {
        self.tracer.lines()
    }

    fn rebuild_scope(&self) -> Arc<Namespace> {
        let root = Namespace::root();
        let mut scope = Namespace::child(&root);
        for binding in &self.bindings {
            scope.bind(Arc::clone(&binding.name), binding.value.clone());
        }
        Arc::new(scope)
    }

    /// Evaluates one line of input against the accumulated session state.
    /// A bare expression (`1 + 1`) parses as a single-binding module whose
    /// synthetic name is `it`; its rendered value is returned. A `let`/`func`
    /// declaration extends the session without producing printable output
    /// beyond the bound name.
    pub fn eval_line(&mut self, source: &str, print: &mut dyn PrintWriter) -> Result<String, AilangError> {
        let tokens = lexer::lex(source, REPL_FILE)?;
        let module = parser::parse(tokens).map_err(|mut errs| AilangError::Parse(errs.remove(0)))?;

        let import_env = ImportEnv::new();
        let mut elaborator = Elaborator::new(REPL_FILE, &import_env);
        let elaborated = elaborator.elaborate_module(&module)?;

        let mut rendered = String::new();
        for (name, core, _) in &elaborated.bindings {
            let value = self.run(core, print)?;
            rendered = value.to_string();
            self.bindings.push(ReplBinding {
                name: Arc::clone(name),
                value,
            });
        }
        Ok(rendered)
    }

    fn run(&mut self, core: &crate::core::CoreExpr, print: &mut dyn PrintWriter) -> Result<Value, AilangError> {
        let scope = self.rebuild_scope();
        let mut tracker = LimitedTracker::new(crate::resource::DEFAULT_MAX_RECURSION_DEPTH);
        let mut noop = NoopTracer;
        let caps = &self.caps;
        let effect_config = &self.effect_config;
        let modules = &self.modules;
        let dicts = &self.dicts;
        let tracker_ref: &mut dyn ResourceTracker = &mut tracker;
        let value = if self.tracing_enabled {
            let mut ctx = EvalCtx {
                modules,
                dicts,
                caps,
                effect_config,
                print,
                tracker: tracker_ref,
                tracer: &mut self.tracer,
            };
            crate::eval::eval_expr(core, &scope, modules, &mut ctx)
        } else {
            let tracer_ref: &mut dyn EvalTracer = &mut noop;
            let mut ctx = EvalCtx {
                modules,
                dicts,
                caps,
                effect_config,
                print,
                tracker: tracker_ref,
                tracer: tracer_ref,
            };
            crate::eval::eval_expr(core, &scope, modules, &mut ctx)
        };
        value.map_err(AilangError::from)
    }

    /// A point-in-time snapshot of bound names and their rendered values,
    /// used by the `:save`/`:load` REPL commands. Values themselves are not
    /// re-parseable, so a snapshot only restores a cosmetic listing of what
    /// was bound, not live state — live state restoration would need
    /// `Value` to round-trip through serde, which it does not since
    /// closures capture a `Namespace` that borrows into the session.
    #[must_use]
    pub fn snapshot_names(&self) -> Vec<(String, String)> {
        self.bindings.iter().map(|b| (b.name.to_string(), b.value.to_string())).collect()
    }

    pub fn reset(&mut self) {
        self.bindings.clear();
        self.tracer = RecordingTracer::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::NoPrint;

    #[test]
    fn session_remembers_let_bindings_across_lines() {
        let mut session = ReplSession::default();
        let mut print = NoPrint;
        session.eval_line("let x = 40", &mut print).unwrap();
        let result = session.eval_line("x + 2", &mut print).unwrap();
        assert_eq!(result, "42");
    }

    #[test]
    fn reset_clears_bound_names() {
        let mut session = ReplSession::default();
        let mut print = NoPrint;
        session.eval_line("let x = 1", &mut print).unwrap();
        session.reset();
        let result = session.eval_line("x", &mut print);
        assert!(result.is_err());
    }
}
