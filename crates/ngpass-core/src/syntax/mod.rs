//! Declaration-level syntax summaries of TypeScript modules.
//!
//! The transform pipeline and the entry resolver only need a module's
//! surface: its imports, exports, top-level declarations, class decorators
//! and method-call sites. [`parse`] extracts exactly that from source text
//! without building a full AST.

mod lexer;
mod scan;

pub use lexer::{tokenize, Token, TokenKind};

use serde::Serialize;

/// Parse source text into a [`ModuleSyntax`].
#[must_use]
pub fn parse(source: &str) -> ModuleSyntax {
    scan::Scanner::new(source).scan()
}

/// Byte range in the source text (end exclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    #[must_use]
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// How an import binding brings a name into scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportKind {
    /// `import * as ns from 'm'`
    Namespace,
    /// `import { a, b as c } from 'm'`
    Named,
    /// `import d from 'm'`
    Default,
}

/// One name brought into scope by an import declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportBinding {
    /// Name visible in the importing file.
    pub local_name: String,
    /// Name exported by the target module (`*` for namespaces, `default` for defaults).
    pub original_name: String,
    /// Module specifier exactly as written.
    pub module_path: String,
    pub kind: ImportKind,
}

/// An import declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportDecl {
    pub specifier: String,
    /// Empty for side-effect imports.
    pub bindings: Vec<ImportBinding>,
    /// 0-based line.
    pub line: u32,
}

/// One element of an export clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportBinding {
    pub exported_name: String,
    pub original_name: String,
    /// `None` for a local export, the specifier for a re-export.
    pub module_path: Option<String>,
}

/// The clause of an export declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ExportClause {
    /// `export * from 'm'`
    All,
    /// `export * as ns from 'm'`
    Namespace(String),
    /// `export { a, b as c } [from 'm']`
    Named(Vec<ExportBinding>),
}

/// An export declaration (not an exported declaration like `export class`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportDecl {
    pub specifier: Option<String>,
    pub clause: ExportClause,
    pub line: u32,
}

/// Kind of a top-level declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclKind {
    Class,
    Function,
    Interface,
    TypeAlias,
    Enum,
    Variable,
}

/// A `/** ... */` comment attached to a declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JsDoc {
    pub text: String,
    pub span: Span,
    /// Tag names without the leading `@`.
    pub tags: Vec<String>,
}

impl JsDoc {
    pub(crate) fn new(text: String, span: Span) -> Self {
        let tags = text
            .split(|c: char| c.is_whitespace() || c == '*' || c == '/')
            .filter_map(|word| word.strip_prefix('@'))
            .map(|tag| {
                tag.trim_end_matches(|c: char| !(c.is_alphanumeric() || c == '_' || c == '$'))
            })
            .filter(|tag| !tag.is_empty())
            .map(str::to_string)
            .collect();
        Self { text, span, tags }
    }

    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// A class-level decorator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decorator {
    /// Decorator expression name, possibly dotted (`core.Component`).
    pub name: String,
    /// Source text between the call parentheses; `None` for `@Foo` without a call.
    pub arguments: Option<String>,
    /// From `@` through the closing parenthesis.
    pub span: Span,
    pub line: u32,
}

/// Heritage clauses of a class or interface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Heritage {
    pub extends: Vec<String>,
    pub implements: Vec<String>,
}

/// A top-level declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Declaration {
    pub name: String,
    pub kind: DeclKind,
    pub exported: bool,
    pub default_export: bool,
    /// Declared with `declare` (or inside a `.d.ts`, decided by the caller).
    pub ambient: bool,
    pub jsdoc: Option<JsDoc>,
    pub decorators: Vec<Decorator>,
    pub heritage: Heritage,
    /// Member names of an interface body.
    pub members: Vec<String>,
    /// Braces of a class or interface body, inclusive.
    pub body: Option<Span>,
    /// Offset of the first token of the statement (decorators included).
    pub start: usize,
    /// 0-based line of `start`.
    pub line: u32,
}

/// A class declaration anywhere in the file, nested ones included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassName {
    pub name: String,
    pub line: u32,
}

/// First argument of a method call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CallArgument {
    Identifier(String),
    Expression,
}

/// A call whose callee is a property access: `receiver.method(args)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallSite {
    pub method: String,
    /// `None` when called without arguments.
    pub first_argument: Option<CallArgument>,
    pub line: u32,
}

/// Declaration-level summary of one module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ModuleSyntax {
    pub imports: Vec<ImportDecl>,
    pub exports: Vec<ExportDecl>,
    pub declarations: Vec<Declaration>,
    pub classes: Vec<ClassName>,
    pub calls: Vec<CallSite>,
    /// Lines holding `export = ...` assignments.
    pub export_assignments: Vec<u32>,
}

impl ModuleSyntax {
    /// Whether a class with this name is declared anywhere in the file.
    #[must_use]
    pub fn declares_class(&self, name: &str) -> bool {
        self.classes.iter().any(|c| c.name == name)
    }

    /// Top-level declaration by name.
    #[must_use]
    pub fn declaration(&self, name: &str) -> Option<&Declaration> {
        self.declarations.iter().find(|d| d.name == name)
    }

    /// Import binding that introduces `local_name`.
    #[must_use]
    pub fn import_binding(&self, local_name: &str) -> Option<&ImportBinding> {
        self.imports
            .iter()
            .flat_map(|decl| &decl.bindings)
            .find(|b| b.local_name == local_name)
    }

    /// For `export { a as b }` without a module specifier, the local name `a` behind `b`.
    #[must_use]
    pub fn local_export_target(&self, exported_name: &str) -> Option<&str> {
        self.exports
            .iter()
            .filter(|e| e.specifier.is_none())
            .find_map(|e| match &e.clause {
                ExportClause::Named(bindings) => bindings
                    .iter()
                    .find(|b| b.exported_name == exported_name)
                    .map(|b| b.original_name.as_str()),
                _ => None,
            })
    }

    /// Every module specifier this file imports or re-exports from, in order.
    #[must_use]
    pub fn module_specifiers(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        let imports = self.imports.iter().map(|i| i.specifier.as_str());
        let exports = self.exports.iter().filter_map(|e| e.specifier.as_deref());
        for spec in imports.chain(exports) {
            if !out.contains(&spec) {
                out.push(spec);
            }
        }
        out
    }
}
