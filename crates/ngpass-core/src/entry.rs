//! Bootstrap entry resolution.
//!
//! Finds the single `bootstrapModule(X)` / `bootstrapModuleFactory(X)` call
//! in an application's main file and follows `X` through imports, re-exports
//! and directory indexes to the file that declares the class.

use crate::error::Error;
use crate::host::{resolve_source_file, CompilerHost};
use crate::paths::{dot_relative, strip_source_extension, to_slash};
use crate::program::SourceUnit;
use crate::syntax::{CallArgument, ExportClause, ImportKind, ModuleSyntax};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace};

/// Method names recognized as bootstrap calls.
pub const BOOTSTRAP_METHODS: &[&str] = &["bootstrapModule", "bootstrapModuleFactory"];

/// Where the application's root module lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryReference {
    /// Declaring file, without its extension.
    pub module_path: PathBuf,
    pub symbol_name: String,
}

impl EntryReference {
    /// Render as `./relative/path#Symbol` against `base_dir`.
    #[must_use]
    pub fn relative_to(&self, base_dir: &Path) -> String {
        format!("{}#{}", dot_relative(base_dir, &self.module_path), self.symbol_name)
    }
}

impl fmt::Display for EntryReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", to_slash(&self.module_path), self.symbol_name)
    }
}

/// Resolve the bootstrap entry of `main_file`.
///
/// # Errors
/// - `FileNotFound` if the main file cannot be read
/// - `AmbiguousBootstrap` unless exactly one bootstrap call passes a bare identifier
/// - `UnresolvedSymbol` if that identifier cannot be traced to a class declaration
pub fn resolve_bootstrap_entry<H: CompilerHost + ?Sized>(
    host: &H,
    main_file: &Path,
) -> Result<EntryReference, Error> {
    let main = host.canonical_file_name(main_file);
    let mut resolver = SymbolResolver::new(host);
    let unit = resolver.unit(&main).ok_or_else(|| Error::FileNotFound {
        path: main_file.to_path_buf(),
    })?;

    let candidates: Vec<&str> = unit
        .syntax()
        .calls
        .iter()
        .filter(|call| BOOTSTRAP_METHODS.contains(&call.method.as_str()))
        .filter_map(|call| match &call.first_argument {
            Some(CallArgument::Identifier(name)) => Some(name.as_str()),
            _ => None,
        })
        .collect();
    let [symbol] = candidates.as_slice() else {
        return Err(Error::AmbiguousBootstrap {
            main: main_file.to_path_buf(),
            found: candidates.len(),
        });
    };
    debug!(main = %main.display(), symbol, "found bootstrap call");

    let (leaf, symbol_name) =
        resolver
            .import_lookup(&unit, symbol)
            .ok_or_else(|| Error::UnresolvedSymbol {
                main: main_file.to_path_buf(),
                symbol: (*symbol).to_string(),
            })?;
    debug!(leaf = %leaf.display(), symbol = %symbol_name, "resolved bootstrap entry");

    Ok(EntryReference {
        module_path: strip_source_extension(&leaf),
        symbol_name,
    })
}

/// Class named `name` declared in the file, following `default` to the
/// default-exported class.
fn declared_class(syntax: &ModuleSyntax, name: &str) -> Option<String> {
    if syntax.declares_class(name) {
        return Some(name.to_string());
    }
    if name != "default" {
        return None;
    }
    if let Some(decl) = syntax.declarations.iter().find(|d| d.default_export) {
        return syntax.declares_class(&decl.name).then(|| decl.name.clone());
    }
    syntax
        .local_export_target("default")
        .filter(|target| syntax.declares_class(target))
        .map(str::to_string)
}

/// Per-call resolver with a parse cache keyed by canonical path.
struct SymbolResolver<'h, H: ?Sized> {
    host: &'h H,
    units: FxHashMap<PathBuf, Option<Arc<SourceUnit>>>,
}

impl<'h, H: CompilerHost + ?Sized> SymbolResolver<'h, H> {
    fn new(host: &'h H) -> Self {
        Self {
            host,
            units: FxHashMap::default(),
        }
    }

    fn unit(&mut self, path: &Path) -> Option<Arc<SourceUnit>> {
        let host = self.host;
        self.units
            .entry(path.to_path_buf())
            .or_insert_with(|| {
                host.read_file(path)
                    .map(|text| Arc::new(SourceUnit::parse(path, text)))
            })
            .clone()
    }

    fn resolve(&self, specifier: &str, from: &Path) -> Option<PathBuf> {
        let resolved = self.host.resolve_module(specifier, from);
        if resolved.is_none() {
            trace!(specifier, from = %from.display(), "skipping unresolvable specifier");
        }
        resolved.map(|path| self.host.canonical_file_name(&path))
    }

    /// Find the import in `main` that brings `symbol` into scope and follow it.
    fn import_lookup(&mut self, main: &SourceUnit, symbol: &str) -> Option<(PathBuf, String)> {
        for decl in &main.syntax().imports {
            if decl.bindings.is_empty() {
                continue;
            }
            let Some(module) = self.resolve(&decl.specifier, main.path()) else {
                continue;
            };
            for binding in decl.bindings.iter().filter(|b| b.local_name == symbol) {
                match binding.kind {
                    ImportKind::Namespace => {
                        let file = resolve_source_file(self.host, &module).unwrap_or(module);
                        return Some((file, symbol.to_string()));
                    }
                    ImportKind::Named | ImportKind::Default => {
                        let mut visited = FxHashSet::default();
                        let found = self.export_lookup(&module, &binding.original_name, &mut visited);
                        if found.is_some() {
                            return found;
                        }
                    }
                }
            }
        }
        None
    }

    /// Find the file declaring class `name` as exported from `module`.
    ///
    /// A directory stands for its index file. Each `(file, name)` pair is
    /// visited once, so cyclic re-exports terminate.
    fn export_lookup(
        &mut self,
        module: &Path,
        name: &str,
        visited: &mut FxHashSet<(PathBuf, String)>,
    ) -> Option<(PathBuf, String)> {
        let file = resolve_source_file(self.host, module)?;
        if !visited.insert((file.clone(), name.to_string())) {
            trace!(file = %file.display(), name, "export lookup revisit");
            return None;
        }
        let unit = self.unit(&file)?;
        if let Some(class) = declared_class(unit.syntax(), name) {
            return Some((file, class));
        }

        for export in &unit.syntax().exports {
            let Some(specifier) = &export.specifier else {
                continue;
            };
            let Some(target) = self.resolve(specifier, &file) else {
                continue;
            };
            match &export.clause {
                ExportClause::All => {
                    let found = self.export_lookup(&target, name, visited);
                    if found.is_some() {
                        return found;
                    }
                }
                ExportClause::Namespace(_) => {}
                ExportClause::Named(bindings) => {
                    for binding in bindings.iter().filter(|b| b.exported_name == name) {
                        if self.host.is_directory(&target) {
                            let found = self.export_lookup(&target, &binding.original_name, visited);
                            if found.is_some() {
                                return found;
                            }
                            continue;
                        }
                        let Some(source) = self.unit(&target) else {
                            continue;
                        };
                        if let Some(class) = declared_class(source.syntax(), &binding.original_name) {
                            return Some((target, class));
                        }
                    }
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;

    const MAIN: &str = "/p/src/main.ts";

    fn main_with(import: &str) -> String {
        format!(
            "import {{ platformBrowserDynamic }} from '@angular/platform-browser-dynamic';\n{import}\n\nplatformBrowserDynamic().bootstrapModule(AppModule);\n"
        )
    }

    #[test]
    fn test_direct_import() {
        let host = MemoryHost::new()
            .with_file(MAIN, main_with("import { AppModule } from './app/app.module';"))
            .with_file("/p/src/app/app.module.ts", "@NgModule({})\nexport class AppModule {}\n");
        let entry = resolve_bootstrap_entry(&host, Path::new(MAIN)).unwrap();
        assert_eq!(entry.module_path, PathBuf::from("/p/src/app/app.module"));
        assert_eq!(entry.symbol_name, "AppModule");
        assert_eq!(entry.to_string(), "/p/src/app/app.module#AppModule");
        assert_eq!(entry.relative_to(Path::new("/p/src")), "./app/app.module#AppModule");
    }

    #[test]
    fn test_nested_directory_indexes() {
        let host = MemoryHost::new()
            .with_file(MAIN, main_with("import { AppModule } from './app';"))
            .with_file("/p/src/app/index.ts", "export { AppModule } from './core';\n")
            .with_file("/p/src/app/core/index.ts", "export * from './app.module';\n")
            .with_file("/p/src/app/core/app.module.ts", "export class AppModule {}\n");
        let entry = resolve_bootstrap_entry(&host, Path::new(MAIN)).unwrap();
        assert_eq!(entry.relative_to(Path::new("/p/src")), "./app/core/app.module#AppModule");
    }

    #[test]
    fn test_directory_without_index_is_dead_end() {
        let host = MemoryHost::new()
            .with_file(MAIN, main_with("import { AppModule } from './app/entry';"))
            .with_file("/p/src/app/entry.ts", "export { AppModule } from './lib';\n")
            .with_file("/p/src/app/lib/app.module.ts", "export class AppModule {}\n");
        let err = resolve_bootstrap_entry(&host, Path::new(MAIN)).unwrap_err();
        assert_eq!(err.code(), "NGPASS_UNRESOLVED_SYMBOL");
    }

    #[test]
    fn test_renamed_reexport_uses_original_name() {
        let host = MemoryHost::new()
            .with_file(MAIN, main_with("import { AppModule } from './barrel';"))
            .with_file("/p/src/barrel.ts", "export { RootModule as AppModule } from './root';\n")
            .with_file("/p/src/root.ts", "export class RootModule {}\n");
        let entry = resolve_bootstrap_entry(&host, Path::new(MAIN)).unwrap();
        assert_eq!(entry.to_string(), "/p/src/root#RootModule");
    }

    #[test]
    fn test_namespace_import_resolves_to_module() {
        let source = "import * as AppModule from './app/app.module';\nplatform.bootstrapModuleFactory(AppModule);\n";
        let host = MemoryHost::new()
            .with_file(MAIN, source)
            .with_file("/p/src/app/app.module.ts", "export class Other {}\n");
        let entry = resolve_bootstrap_entry(&host, Path::new(MAIN)).unwrap();
        assert_eq!(entry.to_string(), "/p/src/app/app.module#AppModule");
    }

    #[test]
    fn test_default_import() {
        let host = MemoryHost::new()
            .with_file(MAIN, main_with("import AppModule from './app/app.module';"))
            .with_file("/p/src/app/app.module.ts", "export default class Root {}\n");
        let entry = resolve_bootstrap_entry(&host, Path::new(MAIN)).unwrap();
        assert_eq!(entry.symbol_name, "Root");
    }

    #[test]
    fn test_cyclic_reexports_terminate() {
        let host = MemoryHost::new()
            .with_file(MAIN, main_with("import { AppModule } from './a';"))
            .with_file("/p/src/a.ts", "export * from './b';\n")
            .with_file("/p/src/b.ts", "export * from './a';\n");
        let err = resolve_bootstrap_entry(&host, Path::new(MAIN)).unwrap_err();
        assert!(matches!(err, Error::UnresolvedSymbol { ref symbol, .. } if symbol == "AppModule"));
    }

    #[test]
    fn test_zero_and_two_bootstrap_calls_are_ambiguous() {
        let host = MemoryHost::new()
            .with_file("/p/none.ts", "platform.bootstrapModule(load());\n")
            .with_file(
                "/p/two.ts",
                "p.bootstrapModule(A);\np.bootstrapModuleFactory(B);\n",
            );
        for (file, found) in [("/p/none.ts", 0), ("/p/two.ts", 2)] {
            let err = resolve_bootstrap_entry(&host, Path::new(file)).unwrap_err();
            assert!(
                matches!(err, Error::AmbiguousBootstrap { found: f, .. } if f == found),
                "{file}: {err}"
            );
        }
    }

    #[test]
    fn test_unresolvable_imports_are_skipped() {
        let host = MemoryHost::new()
            .with_file(
                MAIN,
                "import { AppModule } from '@scope/missing';\nimport { AppModule as X } from './x';\nimport { AppModule } from './app.module';\np.bootstrapModule(AppModule);\n",
            )
            .with_file("/p/src/app.module.ts", "export class AppModule {}\n");
        let entry = resolve_bootstrap_entry(&host, Path::new(MAIN)).unwrap();
        assert_eq!(entry.to_string(), "/p/src/app.module#AppModule");
    }

    #[test]
    fn test_missing_main() {
        let err = resolve_bootstrap_entry(&MemoryHost::new(), Path::new(MAIN)).unwrap_err();
        assert_eq!(err.code(), "NGPASS_FILE_NOT_FOUND");
    }
}
