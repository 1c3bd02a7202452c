#![doc = include_str!("../../../README.md")]
#![expect(clippy::cast_possible_truncation, reason = "numeric narrowing is checked")]
#![expect(clippy::cast_sign_loss, reason = "sign-changing casts are intentional")]
#![expect(clippy::cast_possible_wrap, reason = "Int wraparound is two's-complement by spec")]

pub mod args;
pub mod ast;
pub mod capability;
pub mod core;
pub mod effect;
pub mod elaborate;
pub mod error;
pub mod eval;
pub mod function;
pub mod lexer;
pub mod module;
pub mod namespace;
pub mod parser;
pub mod pattern;
pub mod repl;
pub mod resource;
pub mod span;
pub mod token;
pub mod tracer;
pub mod value;

pub use crate::{
    capability::{Capability, CapabilitySet},
    effect::{CollectPrint, EffectConfig, NoPrint, PrintWriter, StdPrint},
    error::{AilangError, Diagnostic},
    eval::{DictRegistry, EvalCtx, ModuleTable, builtin_module_table},
    module::{FsSourceProvider, LoadedModule, MemorySourceProvider, ModuleInterface, ModuleLoader, SourceProvider},
    repl::ReplSession,
    resource::{DEFAULT_MAX_RECURSION_DEPTH, LimitedTracker, NoLimitTracker, ResourceError, ResourceTracker},
    tracer::{EvalTracer, NoopTracer, RecordingTracer, StderrTracer, TraceEvent},
    value::Value,
};
