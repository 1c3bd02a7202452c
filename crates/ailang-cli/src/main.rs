//! `ailang`: the command-line entry point over [`ailang_core`]/[`ailang_typecheck`].
//!
//! Subcommands mirror spec §6's external interface: `run` loads, type-checks
//! and evaluates a module's entry function; `check` stops after type
//! checking; `iface` emits the canonical interface JSON for a module. Flags
//! are parsed by hand from `env::args()`, following the teacher's own
//! `main.rs` rather than pulling in an argument-parsing crate the workspace
//! has never depended on.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::{env, fs};

use ahash::AHashMap;
use sha2::{Digest, Sha256};

use ailang_core::args::{self, AdtRegistry};
use ailang_core::capability::CapabilitySet;
use ailang_core::effect::{EffectConfig, NoPrint, PrintWriter, StdPrint};
use ailang_core::elaborate::ElaboratedModule;
use ailang_core::error::{AilangError, Diagnostic, RuntimeError};
use ailang_core::eval::{self, DictRegistry, EvalCtx, ModuleTable};
use ailang_core::module::{FsSourceProvider, LoadedModule, ModuleLoader};
use ailang_core::resource::{DEFAULT_MAX_RECURSION_DEPTH, LimitedTracker, ResourceTracker};
use ailang_core::span::Span;
use ailang_core::tracer::{EvalTracer, NoopTracer, StderrTracer};
use ailang_core::value::Value;
use ailang_typecheck::dict_elab;
use ailang_typecheck::ty::Ty;
use ailang_typecheck::{CheckedModule, GlobalEnv, TypeError};

fn main() -> ExitCode {
    let argv: Vec<String> = env::args().collect();
    let Some(sub) = argv.get(1) else {
        print_usage();
        return ExitCode::FAILURE;
    };

    match sub.as_str() {
        "run" => run_command(&argv[2..]),
        "check" => check_command(&argv[2..]),
        "iface" => iface_command(&argv[2..]),
        "repl" => repl_command(),
        "help" | "--help" | "-h" => {
            print_usage();
            ExitCode::SUCCESS
        }
        other => {
            eprintln!("unknown subcommand '{other}'");
            print_usage();
            ExitCode::FAILURE
        }
    }
}

fn print_usage() {
    eprintln!(
        "usage:\n  \
         ailang run <file> [--entry NAME] [--arg JSON] [--caps LIST] [--seed N] \
         [--fs-root DIR] [--net-allow HOSTS] [--net-timeout MS] [--no-print] [--debug]\n  \
         ailang check <file>\n  \
         ailang iface <module> [--export NAME] [--digest]\n  \
         ailang repl"
    );
}

/// Flags shared by `run`/`check`, parsed in one hand-rolled pass rather than
/// pulling a CLI-argument crate into a workspace that has never depended on
/// one.
struct RunFlags {
    path: String,
    entry: String,
    arg_json: String,
    caps: String,
    seed: Option<u64>,
    fs_root: Option<PathBuf>,
    net_allow: Vec<String>,
    net_timeout_ms: u64,
    no_print: bool,
    debug: bool,
}

impl RunFlags {
    fn parse(rest: &[String]) -> Result<Self, String> {
        let mut path = None;
        let mut entry = "main".to_owned();
        let mut arg_json = "null".to_owned();
        let mut caps = String::new();
        let mut seed = None;
        let mut fs_root = None;
        let mut net_allow = Vec::new();
        let mut net_timeout_ms = 10_000;
        let mut no_print = false;
        let mut debug = false;

        let mut i = 0;
        while i < rest.len() {
            let arg = &rest[i];
            match arg.as_str() {
                "--entry" => {
                    i += 1;
                    entry = rest.get(i).ok_or("--entry requires a value")?.clone();
                }
                "--arg" => {
                    i += 1;
                    arg_json = rest.get(i).ok_or("--arg requires a value")?.clone();
                }
                "--caps" => {
                    i += 1;
                    caps = rest.get(i).ok_or("--caps requires a value")?.clone();
                }
                "--seed" => {
                    i += 1;
                    let raw = rest.get(i).ok_or("--seed requires a value")?;
                    seed = Some(raw.parse::<u64>().map_err(|_| format!("invalid --seed '{raw}'"))?);
                }
                "--fs-root" => {
                    i += 1;
                    fs_root = Some(PathBuf::from(rest.get(i).ok_or("--fs-root requires a value")?));
                }
                "--net-allow" => {
                    i += 1;
                    let raw = rest.get(i).ok_or("--net-allow requires a value")?;
                    net_allow = raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_owned).collect();
                }
                "--net-timeout" => {
                    i += 1;
                    let raw = rest.get(i).ok_or("--net-timeout requires a value")?;
                    net_timeout_ms = raw.parse::<u64>().map_err(|_| format!("invalid --net-timeout '{raw}'"))?;
                }
                "--no-print" => no_print = true,
                "--debug" => debug = true,
                other if path.is_none() => path = Some(other.to_owned()),
                other => return Err(format!("unexpected argument '{other}'")),
            }
            i += 1;
        }

        Ok(Self {
            path: path.ok_or("missing <file> argument")?,
            entry,
            arg_json,
            caps,
            seed,
            fs_root,
            net_allow,
            net_timeout_ms,
            no_print,
            debug,
        })
    }
}

/// Strips a trailing `.ail` extension and a leading `./`, turning a
/// filesystem-shaped CLI argument into the project-root-relative module path
/// [`ModuleLoader`]/[`FsSourceProvider`] expect (spec §6: "path derived from
/// the project root plus the file's relative path, stripped of extension").
fn module_path_for(arg: &str) -> String {
    let stripped = arg.strip_suffix(".ail").unwrap_or(arg);
    stripped.trim_start_matches("./").to_owned()
}

fn provider_for(project_root: PathBuf) -> FsSourceProvider {
    let std_root = project_root.join("std");
    FsSourceProvider {
        std_root: std_root.is_dir().then_some(std_root),
        project_root,
    }
}

fn print_diagnostic(d: &Diagnostic) {
    let json = serde_json::to_string(d).unwrap_or_else(|_| d.to_string());
    eprintln!("{json}");
}

fn print_type_errors(errors: &[TypeError]) {
    for e in errors {
        print_diagnostic(&e.to_diagnostic());
    }
}

/// Loads every module reachable from `entry_path` and type-checks them in
/// dependency order, growing one [`GlobalEnv`] as each dependency's exported
/// schemes become visible to its dependents.
fn load_and_check(
    entry_path: &str,
    provider: &FsSourceProvider,
) -> Result<(Vec<Arc<LoadedModule>>, Vec<CheckedModule>), ExitCode> {
    let loaded = ModuleLoader::new(provider).load(entry_path).map_err(|e| {
        print_diagnostic(&e.to_diagnostic());
        ExitCode::FAILURE
    })?;

    let mut global = GlobalEnv::with_builtins();
    let mut checked = Vec::with_capacity(loaded.len());
    for module in &loaded {
        match ailang_typecheck::typecheck(&module.elaborated, &global) {
            Ok(result) => {
                global.insert_module(&module.path, result.schemes.clone());
                for warning in &result.warnings {
                    print_diagnostic(&warning.to_diagnostic());
                }
                checked.push(result);
            }
            Err(errors) => {
                print_type_errors(&errors);
                return Err(ExitCode::FAILURE);
            }
        }
    }
    Ok((loaded, checked))
}

fn check_command(rest: &[String]) -> ExitCode {
    let flags = match RunFlags::parse(rest) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    let project_root = env::current_dir().unwrap_or_default();
    let provider = provider_for(project_root);
    let entry_path = module_path_for(&flags.path);

    match load_and_check(&entry_path, &provider) {
        Ok(_) => {
            println!("{{\"ok\":true}}");
            ExitCode::SUCCESS
        }
        Err(code) => code,
    }
}

fn run_command(rest: &[String]) -> ExitCode {
    let flags = match RunFlags::parse(rest) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    let project_root = env::current_dir().unwrap_or_default();
    let provider = provider_for(project_root);
    let entry_path = module_path_for(&flags.path);

    let (loaded, checked) = match load_and_check(&entry_path, &provider) {
        Ok(pair) => pair,
        Err(code) => return code,
    };

    // Re-elaborate every module's bindings with the dictionary dispatch
    // `ailang_typecheck::typecheck` already resolved, keeping each module's
    // declared types/signatures and interface untouched.
    let runtime_loaded: Vec<Arc<LoadedModule>> = loaded
        .iter()
        .zip(checked.iter())
        .map(|(module, result)| {
            Arc::new(LoadedModule {
                path: module.path.clone(),
                elaborated: ElaboratedModule {
                    path: module.elaborated.path.clone(),
                    bindings: result.bindings.clone(),
                    types: module.elaborated.types.clone(),
                    signatures: module.elaborated.signatures.clone(),
                },
                interface: module.interface.clone(),
            })
        })
        .collect();

    let dicts: DictRegistry = dict_elab::builtin_dictionaries();
    let caps = CapabilitySet::parse_list(&flags.caps);
    let effect_config = EffectConfig {
        fs_root: flags.fs_root.clone(),
        net_allow_hosts: flags.net_allow.clone(),
        net_timeout_ms: flags.net_timeout_ms,
        deterministic_seed: flags.seed,
    };

    let mut std_print = StdPrint;
    let mut no_print_sink = NoPrint;
    let print: &mut dyn PrintWriter = if flags.no_print { &mut no_print_sink } else { &mut std_print };

    let mut limited = LimitedTracker::new(DEFAULT_MAX_RECURSION_DEPTH);
    let tracker: &mut dyn ResourceTracker = &mut limited;

    let mut stderr_tracer = StderrTracer;
    let mut noop_tracer = NoopTracer;
    let tracer: &mut dyn EvalTracer = if flags.debug { &mut stderr_tracer } else { &mut noop_tracer };

    let empty_modules: AHashMap<String, ModuleTable> = AHashMap::new();
    let modules_table = {
        let mut ctx = EvalCtx {
            modules: &empty_modules,
            dicts: &dicts,
            caps: &caps,
            effect_config: &effect_config,
            print,
            tracker,
            tracer,
        };
        match eval::init_modules(&runtime_loaded, &mut ctx) {
            Ok(m) => m,
            Err(e) => {
                print_diagnostic(&e.to_diagnostic());
                return ExitCode::FAILURE;
            }
        }
    };

    let Some(entry_module) = runtime_loaded.last() else {
        eprintln!("no module loaded");
        return ExitCode::FAILURE;
    };
    let entry_value = modules_table.get(&entry_module.path).and_then(|table| table.get(flags.entry.as_str()));
    let Some(entry_value) = entry_value else {
        print_diagnostic(
            &RuntimeError::UnboundVariable { span: Span::unknown(), name: flags.entry.clone() }.to_diagnostic(),
        );
        return ExitCode::FAILURE;
    };

    let arity = match entry_value {
        Value::Closure(c) => c.arity(),
        _ => 0,
    };

    let call_args = match arity {
        0 => Vec::new(),
        1 => {
            let json: serde_json::Value = match serde_json::from_str(&flags.arg_json) {
                Ok(v) => v,
                Err(e) => {
                    eprintln!("invalid --arg JSON: {e}");
                    return ExitCode::FAILURE;
                }
            };
            let param_ty = entry_module
                .elaborated
                .signatures
                .iter()
                .find(|(name, _)| name.as_ref() == flags.entry)
                .and_then(|(_, sig)| sig.params.first())
                .map(|(_, ty)| ty.clone());
            let mut adts: AdtRegistry = AdtRegistry::new();
            for module in &runtime_loaded {
                adts.extend(args::build_adt_registry(&module.elaborated.types));
            }
            let decoded = match param_ty {
                Some(ty) => args::decode(&json, &ty, "arg", &adts),
                None => args::decode(
                    &json,
                    &ailang_core::ast::TypeExpr::Var("a".to_owned()),
                    "arg",
                    &adts,
                ),
            };
            match decoded {
                Ok(v) => vec![v],
                Err(e) => {
                    eprintln!("argument decode error: {e}");
                    return ExitCode::FAILURE;
                }
            }
        }
        _ => {
            eprintln!("entry '{}' must take 0 or 1 parameter, found {arity}", flags.entry);
            return ExitCode::FAILURE;
        }
    };

    let entry_value = entry_value.clone();
    let result = {
        let mut std_print = StdPrint;
        let mut no_print_sink = NoPrint;
        let print: &mut dyn PrintWriter = if flags.no_print { &mut no_print_sink } else { &mut std_print };
        let mut limited = LimitedTracker::new(DEFAULT_MAX_RECURSION_DEPTH);
        let tracker: &mut dyn ResourceTracker = &mut limited;
        let mut stderr_tracer = StderrTracer;
        let mut noop_tracer = NoopTracer;
        let tracer: &mut dyn EvalTracer = if flags.debug { &mut stderr_tracer } else { &mut noop_tracer };
        let mut ctx = EvalCtx {
            modules: &modules_table,
            dicts: &dicts,
            caps: &caps,
            effect_config: &effect_config,
            print,
            tracker,
            tracer,
        };
        eval::invoke_entry(&entry_value, call_args, &modules_table, &mut ctx)
    };

    match result {
        Ok(value) => {
            if !flags.no_print {
                println!("{value}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            print_diagnostic(&e.to_diagnostic());
            ExitCode::FAILURE
        }
    }
}

struct IfaceFlags {
    path: String,
    export: Option<String>,
    digest: bool,
}

impl IfaceFlags {
    fn parse(rest: &[String]) -> Result<Self, String> {
        let mut path = None;
        let mut export = None;
        let mut digest = false;
        let mut i = 0;
        while i < rest.len() {
            match rest[i].as_str() {
                "--export" => {
                    i += 1;
                    export = Some(rest.get(i).ok_or("--export requires a value")?.clone());
                }
                "--digest" => digest = true,
                other if path.is_none() => path = Some(other.to_owned()),
                other => return Err(format!("unexpected argument '{other}'")),
            }
            i += 1;
        }
        Ok(Self { path: path.ok_or("missing <module> argument")?, export, digest })
    }
}

fn iface_command(rest: &[String]) -> ExitCode {
    let flags = match IfaceFlags::parse(rest) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    let project_root = env::current_dir().unwrap_or_default();
    let provider = provider_for(project_root);
    let module_path = module_path_for(&flags.path);

    let (loaded, checked) = match load_and_check(&module_path, &provider) {
        Ok(pair) => pair,
        Err(code) => return code,
    };

    let Some((target_idx, target)) = loaded.iter().enumerate().find(|(_, m)| m.path == module_path) else {
        eprintln!("module '{module_path}' was not loaded");
        return ExitCode::FAILURE;
    };
    let target_checked = &checked[target_idx];

    if let Some(name) = &flags.export
        && !ailang_core::module::has_export(&target.elaborated.types, name)
        && !target_checked.schemes.iter().any(|(n, _)| n.as_ref() == name)
    {
        eprintln!("module '{module_path}' does not export '{name}'");
        return ExitCode::FAILURE;
    }

    let json = build_interface_json(&target.elaborated, target_checked, &module_path, flags.export.as_deref());
    let rendered = serde_json::to_string(&json).unwrap_or_default();

    if flags.digest {
        let mut hasher = Sha256::new();
        hasher.update(rendered.as_bytes());
        println!("{:x}", hasher.finalize());
    } else {
        println!("{rendered}");
    }
    ExitCode::SUCCESS
}

/// Builds spec §6's canonical interface JSON: sorted top-level keys
/// (`ctors`, `funcs`, `module`, `types`), each entry's fields sorted the same
/// way, type variables canonicalized to `a, b, c, …`, and effect rows sorted
/// alphabetically.
fn build_interface_json(
    elaborated: &ElaboratedModule,
    checked: &CheckedModule,
    module_path: &str,
    export_filter: Option<&str>,
) -> serde_json::Value {
    let mut types_json = Vec::new();
    let mut ctors_json = Vec::new();
    for decl in &elaborated.types {
        if let ailang_core::ast::Decl::TypeAdt { name, params, ctors, exported, .. } = decl {
            if !*exported {
                continue;
            }
            if let Some(filter) = export_filter
                && filter != name
            {
                continue;
            }
            let ctor_names: Vec<&str> = ctors.iter().map(|c| c.name.as_str()).collect();
            types_json.push(serde_json::json!({
                "ctors": ctor_names,
                "name": name,
                "params": params,
            }));
            for ctor in ctors {
                let fields: Vec<String> = ctor.fields.iter().map(render_type_expr).collect();
                ctors_json.push(serde_json::json!({
                    "fields": fields,
                    "name": ctor.name,
                    "type": name,
                }));
            }
        }
    }

    let mut funcs_json = Vec::new();
    for (name, scheme) in &checked.schemes {
        if let Some(filter) = export_filter
            && filter != name.as_ref()
        {
            continue;
        }
        let effects = match &scheme.ty {
            Ty::Arrow(_, eff, _) => eff.sorted_labels().iter().map(ToString::to_string).collect(),
            _ => Vec::new(),
        };
        funcs_json.push(serde_json::json!({
            "effects": effects,
            "name": name.as_ref(),
            "type": render_canonical_ty(&scheme.ty),
        }));
    }

    serde_json::json!({
        "ctors": ctors_json,
        "funcs": funcs_json,
        "module": module_path,
        "types": types_json,
    })
}

fn render_type_expr(te: &ailang_core::ast::TypeExpr) -> String {
    use ailang_core::ast::TypeExpr;
    match te {
        TypeExpr::Con(name, args) => {
            if args.is_empty() {
                name.clone()
            } else {
                let parts: Vec<String> = args.iter().map(render_type_expr).collect();
                format!("{name}<{}>", parts.join(","))
            }
        }
        TypeExpr::Var(name) => name.clone(),
        TypeExpr::List(elem) => format!("[{}]", render_type_expr(elem)),
        TypeExpr::Tuple(items) => {
            let parts: Vec<String> = items.iter().map(render_type_expr).collect();
            format!("({})", parts.join(","))
        }
        TypeExpr::Record { fields, tail } => {
            let mut parts: Vec<String> = fields.iter().map(|(k, v)| format!("{k}:{}", render_type_expr(v))).collect();
            if tail.is_some() {
                parts.push("..".to_owned());
            }
            format!("{{{}}}", parts.join(","))
        }
        TypeExpr::Arrow { params, ret, .. } => {
            let parts: Vec<String> = params.iter().map(render_type_expr).collect();
            format!("({})->{}", parts.join(","), render_type_expr(ret))
        }
    }
}

/// Renders a [`Ty`] the way [`ailang_typecheck::ty::render_ty`] does, except
/// type variables are canonicalized to `a, b, c, …` in order of first
/// appearance rather than printed as their internal `t{id}` counter — the
/// shape spec §6's interface JSON requires, which the internal renderer
/// (used for diagnostics, where raw ids double as stable cross-error
/// identifiers) deliberately doesn't produce.
fn render_canonical_ty(ty: &Ty) -> String {
    let mut order = Vec::new();
    collect_vars(ty, &mut order);
    let names: HashMap<u32, String> =
        order.iter().enumerate().map(|(i, v)| (*v, canonical_name(i))).collect();
    render_with_names(ty, &names)
}

fn canonical_name(i: usize) -> String {
    let letter = (b'a' + (i % 26) as u8) as char;
    if i < 26 {
        letter.to_string()
    } else {
        format!("{letter}{}", i / 26)
    }
}

fn collect_vars(ty: &Ty, out: &mut Vec<u32>) {
    match ty {
        Ty::Var(v) => {
            if !out.contains(v) {
                out.push(*v);
            }
        }
        Ty::Con(_, args) => args.iter().for_each(|a| collect_vars(a, out)),
        Ty::List(elem) => collect_vars(elem, out),
        Ty::Tuple(items) => items.iter().for_each(|t| collect_vars(t, out)),
        Ty::Arrow(params, _, ret) => {
            params.iter().for_each(|p| collect_vars(p, out));
            collect_vars(ret, out);
        }
        Ty::Record(row) => row.labels.values().for_each(|v| collect_vars(v, out)),
    }
}

fn render_with_names(ty: &Ty, names: &HashMap<u32, String>) -> String {
    match ty {
        Ty::Var(v) => names.get(v).cloned().unwrap_or_else(|| format!("t{v}")),
        Ty::Con(name, args) => {
            if args.is_empty() {
                name.to_string()
            } else {
                let parts: Vec<String> = args.iter().map(|a| render_with_names(a, names)).collect();
                format!("{name}<{}>", parts.join(","))
            }
        }
        Ty::List(elem) => format!("[{}]", render_with_names(elem, names)),
        Ty::Tuple(items) => {
            let parts: Vec<String> = items.iter().map(|t| render_with_names(t, names)).collect();
            format!("({})", parts.join(","))
        }
        Ty::Arrow(params, _, ret) => {
            let parts: Vec<String> = params.iter().map(|p| render_with_names(p, names)).collect();
            format!("({})->{}", parts.join(","), render_with_names(ret, names))
        }
        Ty::Record(row) => {
            let mut parts: Vec<String> =
                row.labels.iter().map(|(k, v)| format!("{k}:{}", render_with_names(v, names))).collect();
            if row.tail.is_some() {
                parts.push("..".to_owned());
            }
            format!("{{{}}}", parts.join(","))
        }
    }
}

/// A minimal line-oriented REPL over [`ailang_core::repl::ReplSession`]: no
/// capabilities granted by default, matching `run`'s "deny by default"
/// posture (spec §4.9) until a future `:caps` command exists to grant them
/// interactively.
fn repl_command() -> ExitCode {
    use std::io::{BufRead, Write};

    let mut session = ailang_core::repl::ReplSession::default();
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    let mut print = StdPrint;

    loop {
        print!("ailang> ");
        let _ = stdout.flush();
        let mut line = String::new();
        if stdin.lock().read_line(&mut line).unwrap_or(0) == 0 {
            break;
        }
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        if line == ":quit" || line == ":q" {
            break;
        }
        if line == ":reset" {
            session.reset();
            continue;
        }
        match session.eval_line(line, &mut print) {
            Ok(rendered) => println!("{rendered}"),
            Err(err) => print_diagnostic(&ailang_error_diagnostic(&err)),
        }
    }
    ExitCode::SUCCESS
}

fn ailang_error_diagnostic(err: &AilangError) -> Diagnostic {
    err.to_diagnostic()
}
