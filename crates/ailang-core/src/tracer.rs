//! Evaluation tracing, generalized from the teacher's bytecode-VM-parameterized
//! `VmTracer` trait down to the four boundaries a tree-walking evaluator
//! actually crosses: module init, call, match, and effect dispatch.
//!
//! `NoopTracer` is the zero-cost default (every method inlines to nothing);
//! `StderrTracer` prints a human trace; `RecordingTracer` accumulates an
//! in-memory event vector consumed by tests and the REPL's `:trace` command.

use std::fmt;

use crate::span::Span;
use crate::value::Value;

#[derive(Debug, Clone)]
pub enum TraceEvent {
    ModuleInit { path: String },
    Call { name: String, args: Vec<String>, span: Span },
    Return { name: String, result: String },
    Match { scrutinee: String, span: Span },
    EffectDispatch { effect: String, op: String, span: Span },
}

impl fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ModuleInit { path } => write!(f, "init {path}"),
            Self::Call { name, args, span } => write!(f, "call {name}({}) at {span}", args.join(", ")),
            Self::Return { name, result } => write!(f, "return {name} -> {result}"),
            Self::Match { scrutinee, span } => write!(f, "match {scrutinee} at {span}"),
            Self::EffectDispatch { effect, op, span } => write!(f, "effect {effect}.{op} at {span}"),
        }
    }
}

/// Instrumentation hooks the evaluator calls at each traceable boundary.
/// Every method has a no-op default so implementors only override what they
/// care about.
pub trait EvalTracer {
    fn on_module_init(&mut self, _path: &str) {}
    fn on_call(&mut self, _name: &str, _args: &[Value], _span: &Span) {}
    fn on_return(&mut self, _name: &str, _result: &Value) {}
    fn on_match(&mut self, _scrutinee: &Value, _span: &Span) {}
    fn on_effect_dispatch(&mut self, _effect: &str, _op: &str, _span: &Span) {}
}

#[derive(Debug, Default)]
pub struct NoopTracer;

impl EvalTracer for NoopTracer {}

#[derive(Debug, Default)]
pub struct StderrTracer;

impl EvalTracer for StderrTracer {
    fn on_module_init(&mut self, path: &str) {
        eprintln!("{}", TraceEvent::ModuleInit { path: path.to_owned() });
    }

    fn on_call(&mut self, name: &str, args: &[Value], span: &Span) {
        eprintln!(
            "{}",
            TraceEvent::Call {
                name: name.to_owned(),
                args: args.iter().map(Value::to_string).collect(),
                span: span.clone(),
            }
        );
    }

    fn on_return(&mut self, name: &str, result: &Value) {
        eprintln!(
            "{}",
            TraceEvent::Return {
                name: name.to_owned(),
                result: result.to_string(),
            }
        );
    }

    fn on_match(&mut self, scrutinee: &Value, span: &Span) {
        eprintln!(
            "{}",
            TraceEvent::Match {
                scrutinee: scrutinee.to_string(),
                span: span.clone(),
            }
        );
    }

    fn on_effect_dispatch(&mut self, effect: &str, op: &str, span: &Span) {
        eprintln!(
            "{}",
            TraceEvent::EffectDispatch {
                effect: effect.to_owned(),
                op: op.to_owned(),
                span: span.clone(),
            }
        );
    }
}

/// Accumulates every event in order. Used by the REPL's `:trace` command and
/// by tests asserting call order (e.g. evaluation order of record-literal
/// fields, short-circuit operators).
#[derive(Debug, Default)]
pub struct RecordingTracer {
    pub events: Vec<TraceEvent>,
}

impl RecordingTracer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.events.iter().map(TraceEvent::to_string).collect()
    }
}

impl EvalTracer for RecordingTracer {
    fn on_module_init(&mut self, path: &str) {
        self.events.push(TraceEvent::ModuleInit { path: path.to_owned() });
    }

    fn on_call(&mut self, name: &str, args: &[Value], span: &Span) {
        self.events.push(TraceEvent::Call {
            name: name.to_owned(),
            args: args.iter().map(Value::to_string).collect(),
            span: span.clone(),
        });
    }

    fn on_return(&mut self, name: &str, result: &Value) {
        self.events.push(TraceEvent::Return {
            name: name.to_owned(),
            result: result.to_string(),
        });
    }

    fn on_match(&mut self, scrutinee: &Value, span: &Span) {
        self.events.push(TraceEvent::Match {
            scrutinee: scrutinee.to_string(),
            span: span.clone(),
        });
    }

    fn on_effect_dispatch(&mut self, effect: &str, op: &str, span: &Span) {
        self.events.push(TraceEvent::EffectDispatch {
            effect: effect.to_owned(),
            op: op.to_owned(),
            span: span.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_tracer_preserves_call_order() {
        let mut tracer = RecordingTracer::new();
        tracer.on_call("f", &[Value::Int(1)], &Span::unknown());
        tracer.on_call("g", &[], &Span::unknown());
        tracer.on_return("g", &Value::Unit);
        tracer.on_return("f", &Value::Int(2));
        assert_eq!(tracer.events.len(), 4);
        assert!(matches!(tracer.events[0], TraceEvent::Call { ref name, .. } if name == "f"));
        assert!(matches!(tracer.events[3], TraceEvent::Return { ref name, .. } if name == "f"));
    }
}
