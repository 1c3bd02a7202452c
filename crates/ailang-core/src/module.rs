//! Module loader and linker: path resolution, topological loading, cycle
//! detection, and interface digesting.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::ast::Decl;
use crate::elaborate::{ElaboratedModule, Elaborator, ImportEnv};
use crate::error::LoaderError;
use crate::lexer;
use crate::parser;

/// Resolves a module path to source text. The filesystem-backed
/// implementation (`FsSourceProvider`) is the default; tests and the REPL
/// substitute an in-memory map so module graphs can be built without
/// touching disk.
pub trait SourceProvider {
    fn read(&self, resolved_path: &str) -> std::io::Result<String>;
}

#[derive(Debug, Default)]
pub struct FsSourceProvider {
    pub std_root: Option<PathBuf>,
    pub project_root: PathBuf,
}

impl SourceProvider for FsSourceProvider {
    fn read(&self, resolved_path: &str) -> std::io::Result<String> {
        std::fs::read_to_string(self.to_fs_path(resolved_path))
    }
}

impl FsSourceProvider {
    fn to_fs_path(&self, resolved_path: &str) -> PathBuf {
        if let Some(rest) = resolved_path.strip_prefix("std/")
            && let Some(root) = &self.std_root
        {
            return root.join(rest).with_extension("ail");
        }
        self.project_root.join(resolved_path).with_extension("ail")
    }
}

/// An in-memory source set, keyed by resolved module path without extension.
#[derive(Debug, Default, Clone)]
pub struct MemorySourceProvider {
    pub files: HashMap<String, String>,
}

impl SourceProvider for MemorySourceProvider {
    fn read(&self, resolved_path: &str) -> std::io::Result<String> {
        self.files
            .get(resolved_path)
            .cloned()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, resolved_path.to_owned()))
    }
}

/// Resolves an import path relative to the importing module:
/// `std/*` paths are absolute into the standard library root, paths starting
/// with `./` or `../` are relative to the importing file, anything else is
/// relative to the project root.
#[must_use]
pub fn resolve_path(from: &str, import: &str) -> String {
    if import.starts_with("std/") {
        return import.to_owned();
    }
    if let Some(rest) = import.strip_prefix("./") {
        return join_relative(from, rest);
    }
    if let Some(rest) = import.strip_prefix("../") {
        return join_relative_up(from, rest);
    }
    import.to_owned()
}

fn join_relative(from: &str, rest: &str) -> String {
    let dir = Path::new(from).parent().map(Path::to_owned).unwrap_or_default();
    normalize(&dir.join(rest))
}

fn join_relative_up(from: &str, rest: &str) -> String {
    let dir = Path::new(from).parent().and_then(Path::parent).map(Path::to_owned).unwrap_or_default();
    normalize(&dir.join(rest))
}

fn normalize(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// A fully loaded and elaborated module plus its computed interface digest.
pub struct LoadedModule {
    pub path: String,
    pub elaborated: ElaboratedModule,
    pub interface: ModuleInterface,
}

/// The canonical, serializable description of a module's exported surface
/// sorted export names so two loads of
/// identical source produce byte-identical JSON, hashed with SHA-256 for a
/// stable digest used to detect whether a dependency's public surface
/// changed between builds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleInterface {
    pub path: String,
    pub exports: Vec<String>,
    pub digest: String,
}

impl ModuleInterface {
    fn build(path: &str, elaborated: &ElaboratedModule) -> Self {
        let mut exports: Vec<String> = elaborated
            .bindings
            .iter()
            .filter(|(_, _, exported)| *exported)
            .map(|(name, _, _)| name.to_string())
            .collect();
        exports.sort_unstable();

        let mut hasher = Sha256::new();
        hasher.update(path.as_bytes());
        for name in &exports {
            hasher.update(name.as_bytes());
        }
        let digest = format!("{:x}", hasher.finalize());

        Self {
            path: path.to_owned(),
            exports,
            digest,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VisitState {
    InProgress,
    Done,
}

/// Loads a module graph from an entry path: resolves imports, detects
/// cycles via tri-color DFS, and elaborates each module exactly once in
/// dependency order. Modules are loaded and linked in topological order;
/// a cycle is `LDR_CYCLE`, never a deadlock or silent truncation.
pub struct ModuleLoader<'a> {
    provider: &'a dyn SourceProvider,
    state: HashMap<String, VisitState>,
    stack: Vec<String>,
    loaded: HashMap<String, Arc<LoadedModule>>,
    order: Vec<String>,
}

impl<'a> ModuleLoader<'a> {
    #[must_use]
    pub fn new(provider: &'a dyn SourceProvider) -> Self {
        Self {
            provider,
            state: HashMap::new(),
            stack: Vec::new(),
            loaded: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Loads `entry_path` and every module it transitively imports, returning
    /// them in topological (dependency-first) order.
    pub fn load(mut self, entry_path: &str) -> Result<Vec<Arc<LoadedModule>>, LoaderError> {
        self.visit(entry_path)?;
        Ok(self.order.iter().map(|p| Arc::clone(&self.loaded[p])).collect())
    }

    fn visit(&mut self, path: &str) -> Result<(), LoaderError> {
        match self.state.get(path) {
            Some(VisitState::Done) => return Ok(()),
            Some(VisitState::InProgress) => {
                let mut members: Vec<String> = self.stack.clone();
                members.push(path.to_owned());
                let cycle_start = members.iter().position(|m| m == path).unwrap_or(0);
                return Err(LoaderError::Cycle {
                    members: members[cycle_start..].to_vec(),
                });
            }
            None => {}
        }

        self.state.insert(path.to_owned(), VisitState::InProgress);
        self.stack.push(path.to_owned());

        let source = self.provider.read(path).map_err(|_| LoaderError::NotFound {
            path: path.to_owned(),
            from: crate::span::Span::unknown(),
        })?;

        let tokens = lexer::lex(&source, path).map_err(|e| LoaderError::NotFound {
            path: format!("{path} ({e})"),
            from: crate::span::Span::unknown(),
        })?;
        let ast_module = parser::parse(tokens).map_err(|errs| LoaderError::NotFound {
            path: format!("{path} ({} parse errors)", errs.len()),
            from: crate::span::Span::unknown(),
        })?;

        let mut import_env = ImportEnv::new();
        for import in &ast_module.imports {
            let resolved = resolve_path(path, &import.path);
            self.visit(&resolved)?;
            let loaded = &self.loaded[&resolved];
            let names: Vec<String> = match &import.names {
                Some(names) => names.clone(),
                None => loaded.interface.exports.clone(),
            };
            for name in &names {
                import_env.declare(name.clone(), resolved.clone());
            }
        }

        let mut elaborator = Elaborator::new(path, &import_env);
        let elaborated = elaborator
            .elaborate_module(&ast_module)
            .map_err(|e| LoaderError::NotFound {
                path: format!("{path} ({e})"),
                from: crate::span::Span::unknown(),
            })?;

        let interface = ModuleInterface::build(path, &elaborated);
        self.loaded.insert(
            path.to_owned(),
            Arc::new(LoadedModule {
                path: path.to_owned(),
                elaborated,
                interface,
            }),
        );
        self.order.push(path.to_owned());
        self.state.insert(path.to_owned(), VisitState::Done);
        self.stack.pop();
        Ok(())
    }
}

/// True when `decls` contains an exported declaration named `name`; used by
/// the CLI's `iface` subcommand to validate `--export` filters before
/// printing.
#[must_use]
pub fn has_export(decls: &[Decl], name: &str) -> bool {
    decls.iter().any(|d| match d {
        Decl::Func { name: n, exported, .. } | Decl::Let { name: n, exported, .. } => n == name && *exported,
        Decl::TypeAdt { name: n, exported, .. } | Decl::TypeRecord { name: n, exported, .. } => {
            n == name && *exported
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_relative_import_joins_directory() {
        assert_eq!(resolve_path("app/main", "./util"), "app/util");
    }

    #[test]
    fn resolve_std_import_is_absolute() {
        assert_eq!(resolve_path("app/main", "std/list"), "std/list");
    }

    #[test]
    fn load_detects_direct_cycle() {
        let mut files = HashMap::new();
        files.insert("a".to_owned(), "import b\nlet x = 1\n".to_owned());
        files.insert("b".to_owned(), "import a\nlet y = 2\n".to_owned());
        let provider = MemorySourceProvider { files };
        let loader = ModuleLoader::new(&provider);
        let result = loader.load("a");
        assert!(matches!(result, Err(LoaderError::Cycle { .. })));
    }

    #[test]
    fn load_orders_dependencies_before_dependents() {
        let mut files = HashMap::new();
        files.insert("lib".to_owned(), "export let x = 1\n".to_owned());
        files.insert("app".to_owned(), "import lib\nlet y = x\n".to_owned());
        let provider = MemorySourceProvider { files };
        let loader = ModuleLoader::new(&provider);
        let loaded = loader.load("app").unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].path, "lib");
        assert_eq!(loaded[1].path, "app");
    }
}
