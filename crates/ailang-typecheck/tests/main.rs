//! End-to-end pipeline tests: lex -> parse -> elaborate -> typecheck ->
//! dictionary elaboration -> module init -> evaluation, driven through
//! in-memory modules the way the CLI's `run` subcommand does.

use std::collections::HashMap;
use std::sync::Arc;

use ahash::AHashMap;
use ailang_core::capability::{Capability, CapabilitySet};
use ailang_core::effect::{CollectPrint, EffectConfig};
use ailang_core::elaborate::ElaboratedModule;
use ailang_core::error::RuntimeError;
use ailang_core::eval::{self, DictRegistry, EvalCtx};
use ailang_core::module::{LoadedModule, MemorySourceProvider, ModuleLoader};
use ailang_core::resource::LimitedTracker;
use ailang_core::tracer::NoopTracer;
use ailang_core::value::Value;
use ailang_typecheck::{dict_elab, typecheck, GlobalEnv, TypeError};

/// Loads, typechecks and dictionary-elaborates a single import-free source
/// file, then evaluates `entry` with no arguments under `caps`. Returns the
/// result plus whatever was written through `IO.print`/`println`.
fn run_entry(src: &str, entry: &str, caps: CapabilitySet) -> Result<(Value, String), RuntimeError> {
    let mut files = HashMap::new();
    files.insert("main".to_owned(), src.to_owned());
    let provider = MemorySourceProvider { files };
    let loaded = ModuleLoader::new(&provider).load("main").expect("module loads");

    let global = GlobalEnv::with_builtins();
    let checked = typecheck(&loaded[0].elaborated, &global).expect("typechecks");

    let reloaded = Arc::new(LoadedModule {
        path: loaded[0].path.clone(),
        elaborated: ElaboratedModule {
            path: loaded[0].elaborated.path.clone(),
            bindings: checked.bindings,
            types: loaded[0].elaborated.types.clone(),
            signatures: loaded[0].elaborated.signatures.clone(),
        },
        interface: loaded[0].interface.clone(),
    });

    let dicts: DictRegistry = dict_elab::builtin_dictionaries();
    let effect_config = EffectConfig::default();
    let mut print = CollectPrint::default();
    let mut tracker = LimitedTracker::new(4096);
    let mut tracer = NoopTracer;

    let empty_modules: AHashMap<String, eval::ModuleTable> = AHashMap::new();
    let mut ctx = EvalCtx {
        modules: &empty_modules,
        dicts: &dicts,
        caps: &caps,
        effect_config: &effect_config,
        print: &mut print,
        tracker: &mut tracker,
        tracer: &mut tracer,
    };
    let modules = eval::init_modules(std::slice::from_ref(&reloaded), &mut ctx)?;

    let mut ctx = EvalCtx {
        modules: &modules,
        dicts: &dicts,
        caps: &caps,
        effect_config: &effect_config,
        print: &mut print,
        tracker: &mut tracker,
        tracer: &mut tracer,
    };
    let entry_value = modules
        .get(&reloaded.path)
        .and_then(|table| table.get(entry))
        .unwrap_or_else(|| panic!("`{entry}` is not exported"))
        .clone();
    let result = eval::invoke_entry(&entry_value, vec![], &modules, &mut ctx)?;
    Ok((result, print.0))
}

fn typecheck_only(src: &str) -> Result<(), Vec<TypeError>> {
    let mut files = HashMap::new();
    files.insert("main".to_owned(), src.to_owned());
    let provider = MemorySourceProvider { files };
    let loaded = ModuleLoader::new(&provider).load("main").expect("module loads");
    let global = GlobalEnv::with_builtins();
    typecheck(&loaded[0].elaborated, &global).map(|_| ())
}

/// Scenario A (spec recursion): factorial computed via a self-recursive
/// function binding.
#[test]
fn scenario_a_recursive_factorial() {
    let src = "\
export func fact(n: Int) -> Int { if n == 0 then 1 else n * fact(n - 1) }
export func it() -> Int { fact(5) }
";
    let (result, _) = run_entry(src, "it", CapabilitySet::none()).expect("evaluates");
    assert!(matches!(result, Value::Int(120)), "expected 120, got {result:?}");
}

/// Scenario B (spec mutual recursion): even/odd defined in terms of each
/// other inside one module-level recursive scope.
#[test]
fn scenario_b_mutual_recursion_even_odd() {
    let src = "\
func isEven(n: Int) -> Bool { if n == 0 then true else isOdd(n - 1) }
func isOdd(n: Int) -> Bool { if n == 0 then false else isEven(n - 1) }
export func it() -> Bool { isEven(10) }
";
    let (result, _) = run_entry(src, "it", CapabilitySet::none()).expect("evaluates");
    assert!(matches!(result, Value::Bool(true)));
}

/// Scenario C (spec record extension): extending a base record with a new
/// field and reading it back.
#[test]
fn scenario_c_record_extension_reads_new_field() {
    let src = "\
export func it() -> String {
  let base = {name: \"Ada\"} in
  let extended = {base | dept: \"Engineering\"} in
  extended.dept
}
";
    let (result, _) = run_entry(src, "it", CapabilitySet::none()).expect("evaluates");
    assert!(matches!(&result, Value::Str(s) if s.as_ref() == "Engineering"));
}

/// Scenario D (spec pattern match with guard): a guarded `Shape` match picks
/// the unguarded `Rect` clause for a rectangle.
#[test]
fn scenario_d_pattern_match_with_guard() {
    let src = "\
type Shape = Circle(Float) | Rect(Float, Float)
func area(s: Shape) -> Float {
  match s with
  | Circle(r) if r > 0.0 => 3.0 * r * r
  | Circle(_) => 0.0
  | Rect(w, h) => w * h
}
export func it() -> Float { area(Rect(3.0, 4.0)) }
";
    let (result, _) = run_entry(src, "it", CapabilitySet::none()).expect("evaluates");
    assert!(matches!(result, Value::Float(f) if (f - 12.0).abs() < f64::EPSILON));
}

/// Scenario E (spec effect + capability): `IO.println` runs when `IO` is
/// granted, and fails closed with `EFFECT_CAP_MISSING` before any output is
/// produced when it is not.
#[test]
fn scenario_e_effect_runs_with_capability_granted() {
    let src = "export func it() -> Unit ! {IO} { _io_println(\"hello\") }\n";
    let (_, printed) = run_entry(src, "it", CapabilitySet::new(vec![Capability::Io])).expect("evaluates");
    assert_eq!(printed, "hello\n");
}

#[test]
fn scenario_e_effect_denied_without_capability() {
    let src = "export func it() -> Unit ! {IO} { _io_println(\"hello\") }\n";
    let err = run_entry(src, "it", CapabilitySet::none()).expect_err("capability missing");
    assert!(matches!(err, RuntimeError::CapabilityMissing { ref label, .. } if label == "IO"));
    assert_eq!(err.to_diagnostic().code, "EFFECT_CAP_MISSING");
}

/// Scenario F (spec integral modulo / numeric defaulting): `Int` modulo
/// defaults and evaluates; `Float` modulo has no `Integral` instance and is
/// rejected at type-check time, never reaching the evaluator.
#[test]
fn scenario_f_integral_modulo_on_int_evaluates() {
    let (result, _) = run_entry("export func it() -> Int { 5 % 3 }\n", "it", CapabilitySet::none()).expect("evaluates");
    assert!(matches!(result, Value::Int(2)));
}

#[test]
fn scenario_f_float_modulo_has_no_instance() {
    let errors = typecheck_only("export func it() -> Float { 5.0 % 3.0 }\n").expect_err("rejected before evaluation");
    assert!(errors.iter().any(|e| matches!(e, TypeError::NoInstance { class, .. } if class == "Integral")));
}

/// Scenario G (spec non-exhaustive match): a `Bool` match missing the
/// `false` arm is accepted with a `PAT_NON_EXHAUSTIVE` warning naming the
/// missing witness, not a hard type error.
#[test]
fn scenario_g_non_exhaustive_bool_match_warns_with_witness() {
    let src = "export func describe(b: Bool) -> String { match b with | true => \"yes\" }\n";
    let mut files = HashMap::new();
    files.insert("main".to_owned(), src.to_owned());
    let provider = MemorySourceProvider { files };
    let loaded = ModuleLoader::new(&provider).load("main").expect("module loads");
    let global = GlobalEnv::with_builtins();
    let checked = typecheck(&loaded[0].elaborated, &global).expect("typechecks despite non-exhaustiveness");
    assert!(
        checked
            .warnings
            .iter()
            .any(|w| w.code == "PAT_NON_EXHAUSTIVE" && w.witnesses.iter().any(|w| w == "false"))
    );
}

/// A module importing another sees its export, and the loader orders the
/// dependency's initialization before the dependent's.
#[test]
fn module_graph_links_dependency_before_dependent() {
    let mut files = HashMap::new();
    files.insert("lib".to_owned(), "export let base = 10\n".to_owned());
    files.insert("main".to_owned(), "import lib\nexport func it() -> Int { base + 1 }\n".to_owned());
    let provider = MemorySourceProvider { files };
    let loaded = ModuleLoader::new(&provider).load("main").expect("loads with dependency first");
    assert_eq!(loaded[0].path, "lib");
    assert_eq!(loaded[1].path, "main");

    let global = GlobalEnv::with_builtins();
    let lib_checked = typecheck(&loaded[0].elaborated, &global).expect("lib typechecks");
    let mut global_with_lib = GlobalEnv::with_builtins();
    global_with_lib.insert_module("lib", lib_checked.schemes.clone());
    let main_checked = typecheck(&loaded[1].elaborated, &global_with_lib).expect("main typechecks against lib's interface");
    assert!(main_checked.schemes.iter().any(|(n, _)| n.as_ref() == "it"));
}

/// Dictionary elaboration resolves the same surface `+` to different
/// dictionaries depending on the inferred type, exercised end to end rather
/// than against a synthetic `CoreExpr` as the unit tests do.
#[test]
fn dictionary_elaboration_picks_float_dict_for_float_literals() {
    let (result, _) = run_entry("export func it() -> Float { 1.5 + 2.5 }\n", "it", CapabilitySet::none()).expect("evaluates");
    assert!(matches!(result, Value::Float(f) if (f - 4.0).abs() < f64::EPSILON));
}

/// `NaN == NaN` is `true` under `Eq[Float]`, and `-0.0 == 0.0` is treated as
/// equal too, per the resolved Open Question in DESIGN.md.
#[test]
fn eq_float_resolves_nan_and_negative_zero_as_equal() {
    let src = "export func it() -> (Bool, Bool) { (0.0 / 0.0 == 0.0 / 0.0, 0.0 - 0.0 == 0.0) }\n";
    let (result, _) = run_entry(src, "it", CapabilitySet::none()).expect("evaluates");
    let Value::Tuple(items) = result else { panic!("expected a tuple, got {result:?}") };
    assert!(matches!(items[0], Value::Bool(true)));
    assert!(matches!(items[1], Value::Bool(true)));
}

/// `++` on strings still resolves to `StrConcat`, the placeholder's default.
#[test]
fn concat_resolves_to_str_concat_for_string_operands() {
    let (result, _) = run_entry("export func it() -> String { \"foo\" ++ \"bar\" }\n", "it", CapabilitySet::none()).expect("evaluates");
    assert!(matches!(&result, Value::Str(s) if s.as_ref() == "foobar"));
}

/// `++` on list operands type-checks (`[1] ++ [2]` does not reject with
/// `TC_UNIFY_FAIL` the way it used to when `StrConcat` forced both sides to
/// `String`) and dispatches to `ListConcat` at the evaluator.
#[test]
fn concat_resolves_to_list_concat_for_list_operands() {
    let (result, _) = run_entry("export func it() -> [Int] { [1] ++ [2] }\n", "it", CapabilitySet::none()).expect("evaluates");
    assert_eq!(result.to_string(), "[1, 2]");
}
