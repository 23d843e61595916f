//! Source units, immutable generations, and declaration-level type info.
//!
//! A [`Generation`] is a type-checked snapshot of a set of source files.
//! Passes never mutate a generation: they produce replacement units that go
//! into [`Generation::successor`], and every unit a pass did not touch is
//! shared with the successor as the same `Arc`.

use crate::error::Error;
use crate::host::{resolve_source_file, CompilerHost};
use crate::paths::is_declaration_file;
use crate::syntax::{self, DeclKind, Declaration, ExportClause, ImportKind, ModuleSyntax};
use rustc_hash::FxHashSet;
use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// One parsed source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUnit {
    path: PathBuf,
    text: String,
    syntax: ModuleSyntax,
}

impl SourceUnit {
    /// Parse `text` as the contents of `path`.
    #[must_use]
    pub fn parse(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        let text = text.into();
        let syntax = syntax::parse(&text);
        Self {
            path: path.into(),
            text,
            syntax,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn syntax(&self) -> &ModuleSyntax {
        &self.syntax
    }

    #[must_use]
    pub fn is_declaration_file(&self) -> bool {
        is_declaration_file(&self.path)
    }
}

/// An immutable snapshot of parsed units keyed by canonical path.
#[derive(Debug, Clone, Default)]
pub struct Generation {
    number: u32,
    units: BTreeMap<PathBuf, Arc<SourceUnit>>,
    roots: Vec<PathBuf>,
}

impl Generation {
    /// Baseline generation from already-parsed units. Every unit is a root.
    pub fn from_units(units: impl IntoIterator<Item = SourceUnit>) -> Self {
        let units: BTreeMap<PathBuf, Arc<SourceUnit>> = units
            .into_iter()
            .map(|unit| (unit.path.clone(), Arc::new(unit)))
            .collect();
        let roots = units.keys().cloned().collect();
        Self {
            number: 0,
            units,
            roots,
        }
    }

    /// Load `roots` and every file reachable from them through relative
    /// imports and re-exports. Each file is parsed once.
    ///
    /// # Errors
    /// Returns `FileNotFound` if a root cannot be read. Unreadable
    /// dependencies are skipped.
    pub fn load<H: CompilerHost + ?Sized>(host: &H, roots: &[PathBuf]) -> Result<Self, Error> {
        let mut units = BTreeMap::new();
        let mut canonical_roots = Vec::with_capacity(roots.len());
        let mut queue = VecDeque::new();
        let mut seen = FxHashSet::default();

        for root in roots {
            let path = host.canonical_file_name(root);
            let text = host
                .read_file(&path)
                .ok_or_else(|| Error::FileNotFound { path: root.clone() })?;
            if seen.insert(path.clone()) {
                queue.push_back((path.clone(), text));
            }
            canonical_roots.push(path);
        }

        while let Some((path, text)) = queue.pop_front() {
            let unit = SourceUnit::parse(path.clone(), text);
            for specifier in unit.syntax.module_specifiers() {
                let Some(dep) = resolve_dependency(host, specifier, &path) else {
                    continue;
                };
                if !seen.insert(dep.clone()) {
                    continue;
                }
                match host.read_file(&dep) {
                    Some(text) => queue.push_back((dep, text)),
                    None => debug!(path = %dep.display(), "skipping unreadable dependency"),
                }
            }
            units.insert(path, Arc::new(unit));
        }

        debug!(files = units.len(), roots = canonical_roots.len(), "loaded generation");
        Ok(Self {
            number: 0,
            units,
            roots: canonical_roots,
        })
    }

    /// Generation counter; the baseline is 0 and each successor adds one.
    #[must_use]
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Root files, in the order they were given.
    #[must_use]
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    #[must_use]
    pub fn unit(&self, path: &Path) -> Option<&Arc<SourceUnit>> {
        self.units.get(path)
    }

    /// All units in path order.
    pub fn units(&self) -> impl Iterator<Item = &Arc<SourceUnit>> {
        self.units.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// The next generation: `replaced` units take over their paths, every
    /// other unit is shared unchanged.
    #[must_use]
    pub fn successor(&self, replaced: impl IntoIterator<Item = SourceUnit>) -> Self {
        let mut units = self.units.clone();
        let mut changed = 0usize;
        for unit in replaced {
            units.insert(unit.path.clone(), Arc::new(unit));
            changed += 1;
        }
        debug!(generation = self.number + 1, changed, "built successor generation");
        Self {
            number: self.number + 1,
            units,
            roots: self.roots.clone(),
        }
    }

    /// Declaration-level type information over this generation.
    #[must_use]
    pub fn type_check<'a>(&'a self, host: &'a dyn CompilerHost) -> TypeChecker<'a> {
        TypeChecker {
            generation: self,
            host,
        }
    }
}

/// Resolve an import specifier to the canonical path of a source file.
fn resolve_dependency<H: CompilerHost + ?Sized>(
    host: &H,
    specifier: &str,
    from: &Path,
) -> Option<PathBuf> {
    let resolved = host.resolve_module(specifier, from)?;
    let file = resolve_source_file(host, &resolved)?;
    Some(host.canonical_file_name(&file))
}

/// A declaration as seen through type information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub kind: DeclKind,
    pub declared_in: PathBuf,
    /// JSDoc tags on the declaration.
    pub tags: Vec<String>,
    /// Declared with `declare` or inside a declaration file.
    pub ambient: bool,
}

impl Symbol {
    fn from_declaration(decl: &Declaration, declared_in: &Path) -> Self {
        Self {
            name: decl.name.clone(),
            kind: decl.kind,
            declared_in: declared_in.to_path_buf(),
            tags: decl.jsdoc.as_ref().map(|doc| doc.tags.clone()).unwrap_or_default(),
            ambient: decl.ambient || is_declaration_file(declared_in),
        }
    }

    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Symbol lookup consumed by transform passes.
pub trait TypeInfo {
    /// Resolve `name` as referenced from `file` to its declaration.
    ///
    /// `name` may be dotted (`ns.Name`) when `ns` is a namespace import.
    fn resolve_symbol(&self, file: &Path, name: &str) -> Option<Symbol>;
}

/// [`TypeInfo`] backed by a generation and its host.
///
/// Files outside the generation are parsed on demand so lookups can follow
/// imports into modules that were not loaded as part of the program.
pub struct TypeChecker<'a> {
    generation: &'a Generation,
    host: &'a dyn CompilerHost,
}

impl TypeChecker<'_> {
    fn load(&self, path: &Path) -> Option<Arc<SourceUnit>> {
        if let Some(unit) = self.generation.unit(path) {
            return Some(Arc::clone(unit));
        }
        let text = self.host.read_file(path)?;
        Some(Arc::new(SourceUnit::parse(path, text)))
    }

    fn lookup(
        &self,
        file: &Path,
        name: &str,
        visited: &mut FxHashSet<(PathBuf, String)>,
    ) -> Option<Symbol> {
        let unit = self.load(file)?;
        let syntax = unit.syntax();

        if let Some((head, rest)) = name.split_once('.') {
            let binding = syntax
                .import_binding(head)
                .filter(|b| b.kind == ImportKind::Namespace)?;
            let target = resolve_dependency(self.host, &binding.module_path, file)?;
            return self.exported(&target, rest, visited);
        }

        if let Some(decl) = syntax.declaration(name) {
            return Some(Symbol::from_declaration(decl, unit.path()));
        }
        let binding = syntax.import_binding(name)?;
        let target = resolve_dependency(self.host, &binding.module_path, file)?;
        match binding.kind {
            ImportKind::Namespace => None,
            ImportKind::Named | ImportKind::Default => {
                self.exported(&target, &binding.original_name, visited)
            }
        }
    }

    fn exported(
        &self,
        file: &Path,
        name: &str,
        visited: &mut FxHashSet<(PathBuf, String)>,
    ) -> Option<Symbol> {
        if !visited.insert((file.to_path_buf(), name.to_string())) {
            return None;
        }
        let unit = self.load(file)?;
        let syntax = unit.syntax();

        let own = syntax.declarations.iter().find(|d| {
            d.exported && (d.name == name || (name == "default" && d.default_export))
        });
        if let Some(decl) = own {
            return Some(Symbol::from_declaration(decl, unit.path()));
        }
        if let Some(local) = syntax.local_export_target(name) {
            let local = local.to_string();
            return self.lookup(file, &local, visited);
        }

        for export in &syntax.exports {
            let Some(specifier) = &export.specifier else {
                continue;
            };
            let Some(target) = resolve_dependency(self.host, specifier, file) else {
                continue;
            };
            let found = match &export.clause {
                ExportClause::All => self.exported(&target, name, visited),
                ExportClause::Named(bindings) => bindings
                    .iter()
                    .find(|b| b.exported_name == name)
                    .and_then(|b| self.exported(&target, &b.original_name, visited)),
                ExportClause::Namespace(_) => None,
            };
            if found.is_some() {
                return found;
            }
        }
        None
    }
}

impl TypeInfo for TypeChecker<'_> {
    fn resolve_symbol(&self, file: &Path, name: &str) -> Option<Symbol> {
        self.lookup(file, name, &mut FxHashSet::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;

    fn host() -> MemoryHost {
        MemoryHost::new()
            .with_file(
                "/p/src/main.ts",
                "import { Component } from './decorators';\nimport * as core from './core';\nimport './side-effect';\n@Component()\nexport class App implements core.Shape {}\n",
            )
            .with_file(
                "/p/src/decorators.ts",
                "export { Component } from './impl/component';\n",
            )
            .with_file(
                "/p/src/impl/component.ts",
                "/** @Annotation */\nexport function Component() {}\n",
            )
            .with_file(
                "/p/src/core/index.ts",
                "export * from './shape';\n",
            )
            .with_file("/p/src/core/shape.ts", "export interface Shape { area(): number; }\n")
    }

    #[test]
    fn test_load_follows_relative_imports() {
        let host = host();
        let generation = Generation::load(&host, &[PathBuf::from("/p/src/main.ts")]).unwrap();
        let paths: Vec<_> = generation.units().map(|u| u.path().to_path_buf()).collect();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/p/src/core/index.ts"),
                PathBuf::from("/p/src/core/shape.ts"),
                PathBuf::from("/p/src/decorators.ts"),
                PathBuf::from("/p/src/impl/component.ts"),
                PathBuf::from("/p/src/main.ts"),
            ]
        );
        assert_eq!(generation.roots(), &[PathBuf::from("/p/src/main.ts")]);
    }

    #[test]
    fn test_load_missing_root_is_error() {
        let err = Generation::load(&MemoryHost::new(), &[PathBuf::from("/p/none.ts")]).unwrap_err();
        assert_eq!(err.code(), "NGPASS_FILE_NOT_FOUND");
    }

    #[test]
    fn test_successor_shares_unchanged_units() {
        let base = Generation::from_units([
            SourceUnit::parse("/p/a.ts", "export class A {}"),
            SourceUnit::parse("/p/b.ts", "export class B {}"),
        ]);
        let next = base.successor([SourceUnit::parse("/p/a.ts", "export class A2 {}")]);
        assert_eq!(next.number(), 1);
        let a = Path::new("/p/a.ts");
        let b = Path::new("/p/b.ts");
        assert!(!Arc::ptr_eq(base.unit(a).unwrap(), next.unit(a).unwrap()));
        assert!(Arc::ptr_eq(base.unit(b).unwrap(), next.unit(b).unwrap()));
        assert!(base.unit(a).unwrap().syntax().declares_class("A"));
    }

    #[test]
    fn test_resolve_symbol_through_reexports_and_namespaces() {
        let host = host();
        let generation = Generation::load(&host, &[PathBuf::from("/p/src/main.ts")]).unwrap();
        let checker = generation.type_check(&host);
        let main = Path::new("/p/src/main.ts");

        let component = checker.resolve_symbol(main, "Component").unwrap();
        assert_eq!(component.declared_in, PathBuf::from("/p/src/impl/component.ts"));
        assert!(component.has_tag("Annotation"));

        let shape = checker.resolve_symbol(main, "core.Shape").unwrap();
        assert_eq!(shape.kind, DeclKind::Interface);
        assert!(!shape.ambient);

        assert!(checker.resolve_symbol(main, "Missing").is_none());
        assert_eq!(checker.resolve_symbol(main, "App").unwrap().kind, DeclKind::Class);
    }
}
