//! Closure annotation pass.
//!
//! Adds the JSDoc Closure Compiler needs on top-level declarations,
//! follows each interface with a `@record` shim, and turns ambient
//! declarations into externs.

use super::rewrite::{indentation, Rewriter};
use super::{PassContext, PassError, PassKind, PassOutput, TransformPass};
use crate::diagnostics::Diagnostic;
use crate::program::SourceUnit;
use crate::syntax::{DeclKind, Declaration};
use std::fmt::Write as _;
use std::path::Path;
use tracing::debug;

/// Adds Closure JSDoc and collects externs.
#[derive(Debug, Default, Clone, Copy)]
pub struct Closurize;

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

fn member_access(owner: &str, member: &str) -> String {
    if is_identifier(member) {
        format!("{owner}.prototype.{member}")
    } else {
        format!("{owner}.prototype['{member}']")
    }
}

/// Record shim placed right after an interface body.
fn record_shim(decl: &Declaration) -> String {
    let mut out = format!("\nfunction {}() {{}}", decl.name);
    for member in &decl.members {
        let _ = write!(out, "\n/** @type {{?}} */\n{};", member_access(&decl.name, member));
    }
    out
}

/// Append the externs for an ambient declaration.
fn write_extern(out: &mut String, decl: &Declaration) {
    let name = &decl.name;
    match decl.kind {
        DeclKind::Class => {
            let _ = write!(out, "/** @constructor */\nfunction {name}() {{}}\n");
        }
        DeclKind::Interface => {
            let _ = write!(out, "/** @record */\nfunction {name}() {{}}\n");
            for member in &decl.members {
                let _ = writeln!(out, "/** @type {{?}} */\n{};", member_access(name, member));
            }
        }
        DeclKind::Function => {
            let _ = write!(out, "/** @return {{?}} */\nfunction {name}() {{}}\n");
        }
        DeclKind::Variable => {
            let _ = write!(out, "/** @type {{?}} */\nvar {name};\n");
        }
        DeclKind::Enum => {
            let _ = write!(out, "/** @enum {{number}} */\nvar {name} = {{}};\n");
        }
        DeclKind::TypeAlias => {}
    }
}

/// Tag name of a rendered tag: `@extends {A}` -> `extends`.
fn tag_name(tag: &str) -> &str {
    tag.trim_start_matches('@')
        .split_whitespace()
        .next()
        .unwrap_or("")
}

/// Put `tags` into the declaration's JSDoc, creating one if needed.
fn annotate(rewriter: &mut Rewriter<'_>, source: &str, decl: &Declaration, tags: &[String]) {
    let Some(doc) = &decl.jsdoc else {
        let indent = indentation(source, decl.start);
        let text = match tags {
            [tag] => format!("/** {tag} */\n{indent}"),
            _ => {
                let mut text = String::from("/**\n");
                for tag in tags {
                    let _ = writeln!(text, "{indent} * {tag}");
                }
                let _ = write!(text, "{indent} */\n{indent}");
                text
            }
        };
        rewriter.insert(decl.start, text);
        return;
    };

    let close = doc.span.end - 2;
    let last_line = source[doc.span.start..close]
        .rfind('\n')
        .map(|i| doc.span.start + i + 1);
    match last_line {
        // `/**\n * text\n */`: add lines above the closing line
        Some(line_start) if source[line_start..close].trim().is_empty() => {
            let prefix = &source[line_start..close];
            let text: String = tags.iter().map(|tag| format!("{prefix}* {tag}\n")).collect();
            rewriter.insert(line_start, text);
        }
        // `/** text */`: break the closing delimiter onto its own line
        _ => {
            let before = &source[doc.span.start..close];
            let from = close - (before.len() - before.trim_end().len());
            let indent = indentation(source, doc.span.start);
            let mut text: String = tags.iter().map(|tag| format!("\n{indent} * {tag}")).collect();
            let _ = write!(text, "\n{indent} */");
            rewriter.replace(from, doc.span.end, text);
        }
    }
}

impl Closurize {
    fn tags(
        unit: &SourceUnit,
        decl: &Declaration,
        cx: &PassContext<'_>,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Vec<String> {
        let path = unit.path();
        let resolve = |name: &str| cx.type_info.resolve_symbol(path, name);
        let mut tags = Vec::new();

        match decl.kind {
            DeclKind::Class => {
                if let Some(base) = decl.heritage.extends.first() {
                    if resolve(base).is_some_and(|s| s.kind == DeclKind::Class) {
                        tags.push(format!("@extends {{{base}}}"));
                    }
                }
                for implemented in &decl.heritage.implements {
                    match resolve(implemented) {
                        Some(s) if matches!(s.kind, DeclKind::Interface | DeclKind::Class) => {
                            tags.push(format!("@implements {{{implemented}}}"));
                        }
                        _ => diagnostics.push(located(
                            Diagnostic::warning(format!(
                                "could not resolve type {implemented} implemented by {}",
                                decl.name
                            ))
                            .with_code("NGPASS_UNRESOLVED_IMPLEMENTS"),
                            path,
                            decl,
                        )),
                    }
                }
            }
            DeclKind::Interface => {
                tags.push("@record".to_string());
                for base in &decl.heritage.extends {
                    if resolve(base).is_some_and(|s| s.kind == DeclKind::Interface) {
                        tags.push(format!("@extends {{{base}}}"));
                    }
                }
            }
            DeclKind::Enum => tags.push("@enum {number}".to_string()),
            DeclKind::Function | DeclKind::Variable | DeclKind::TypeAlias => {}
        }
        if decl.exported && decl.kind != DeclKind::TypeAlias {
            tags.push("@export".to_string());
        }

        if let Some(doc) = &decl.jsdoc {
            tags.retain(|tag| !doc.has_tag(tag_name(tag)));
        }
        tags
    }
}

fn located(diagnostic: Diagnostic, path: &Path, decl: &Declaration) -> Diagnostic {
    diagnostic.with_location(path.to_path_buf(), decl.line + 1, 1)
}

impl TransformPass for Closurize {
    fn kind(&self) -> PassKind {
        PassKind::Closurize
    }

    fn apply(&self, unit: &SourceUnit, cx: &PassContext<'_>) -> Result<PassOutput, PassError> {
        let source = unit.text();
        let syntax = unit.syntax();
        let path = unit.path();
        let ambient_file = unit.is_declaration_file();

        let mut rewriter = Rewriter::new(source);
        let mut diagnostics = Vec::new();
        let mut externs = String::new();

        for line in &syntax.export_assignments {
            diagnostics.push(
                Diagnostic::error("`export =` cannot be expressed as a Closure module export")
                    .with_code("NGPASS_EXPORT_ASSIGNMENT")
                    .with_location(path.to_path_buf(), line + 1, 1),
            );
        }

        for decl in &syntax.declarations {
            if decl.jsdoc.as_ref().is_some_and(|doc| doc.has_tag("type")) {
                diagnostics.push(located(
                    Diagnostic::warning(format!(
                        "@type annotation on {} is redundant with its declared type",
                        decl.name
                    ))
                    .with_code("NGPASS_JSDOC_TYPE"),
                    path,
                    decl,
                ));
            }

            if ambient_file || decl.ambient {
                write_extern(&mut externs, decl);
                continue;
            }

            let tags = Self::tags(unit, decl, cx, &mut diagnostics);
            if !tags.is_empty() {
                annotate(&mut rewriter, source, decl, &tags);
            }
            if decl.kind == DeclKind::Interface {
                if let Some(body) = decl.body {
                    rewriter.insert(body.end, record_shim(decl));
                }
            }
        }

        if cx.environment.should_ignore_warnings(path) {
            diagnostics.retain(Diagnostic::is_error);
        }
        let externs = (!externs.is_empty()).then_some(externs);
        debug!(
            file = %path.display(),
            diagnostics = diagnostics.len(),
            externs = externs.is_some(),
            "closurized"
        );

        if rewriter.is_empty() {
            return Ok(PassOutput {
                externs,
                ..PassOutput::unchanged(unit)
            }
            .with_diagnostics(diagnostics));
        }
        let (text, fragment) = rewriter.finish("");
        Ok(PassOutput {
            text,
            source_map: Some(fragment),
            diagnostics,
            externs,
        })
    }
}
