//! Hindley-Milner type inference, the fixed type-class set, row
//! polymorphism, and dictionary-passing elaboration over [`ailang_core`]'s
//! Core ANF.
//!
//! The pipeline mirrors the teacher's own type-checker/compiler split: parse
//! and elaborate produce Core with placeholder `PrimOp`s and no type
//! information; [`typecheck`] runs inference (`infer`), resolving every
//! ambiguous numeric constraint by defaulting, then rewrites the Core
//! (`dict_elab`) so arithmetic dispatches through an explicit dictionary
//! instead of a type-directed guess made before any types were known.

pub mod classes;
pub mod dict_elab;
pub mod error;
pub mod infer;
pub mod ty;
pub mod unify;

use std::sync::Arc;

use ailang_core::core::CoreExpr;
use ailang_core::elaborate::ElaboratedModule;
use ailang_core::error::PatternWarning;

pub use error::TypeError;
pub use infer::{typecheck_module, GlobalEnv, TypedModule};

/// A module after both inference and dictionary elaboration: the schemes to
/// publish for dependents, plus bindings with every placeholder arithmetic
/// `PrimOp` resolved to a concrete dictionary dispatch, plus any
/// non-exhaustiveness warnings collected along the way.
pub struct CheckedModule {
    pub schemes: Vec<(Arc<str>, ty::Scheme)>,
    pub bindings: Vec<(Arc<str>, CoreExpr, bool)>,
    pub warnings: Vec<PatternWarning>,
}

/// Runs inference followed by dictionary elaboration over one already
/// elaborated module. This is the entry point `ailang-cli`'s `check`/`run`
/// subcommands call; `global` carries builtins plus every dependency this
/// module imports, already checked.
pub fn typecheck(elaborated: &ElaboratedModule, global: &GlobalEnv) -> Result<CheckedModule, Vec<TypeError>> {
    let typed = typecheck_module(elaborated, global)?;
    let bindings = dict_elab::elaborate_bindings(&elaborated.bindings, &typed.node_types);
    Ok(CheckedModule { schemes: typed.schemes, bindings, warnings: typed.warnings })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ailang_core::elaborate::{Elaborator, ImportEnv};
    use ailang_core::{lexer, parser};

    fn check(src: &str) -> Result<CheckedModule, Vec<TypeError>> {
        let tokens = lexer::lex(src, "t.ail").unwrap();
        let module = parser::parse(tokens).unwrap();
        let import_env = ImportEnv::new();
        let mut elaborator = Elaborator::new("t.ail", &import_env);
        let elaborated = elaborator.elaborate_module(&module).unwrap();
        typecheck(&elaborated, &GlobalEnv::with_builtins())
    }

    #[test]
    fn arithmetic_elaborates_into_dictionary_dispatch() {
        let checked = check("export let answer = 1 + 2\n").expect("typechecks");
        let (_, body, _) = checked.bindings.iter().find(|(n, _, _)| n.as_ref() == "answer").unwrap();
        assert!(matches!(body.kind, ailang_core::core::CoreKind::Let { .. }));
    }

    #[test]
    fn rejects_mismatched_arithmetic_operands() {
        let result = check("export let bad = 1 + \"x\"\n");
        assert!(result.is_err());
    }
}
