//! Decorator downleveling.
//!
//! Class decorators whose declaration is tagged `@Annotation` are removed
//! from the class head and re-expressed as static metadata at the top of the
//! class body:
//!
//! ```text
//! @Component({selector: 'app'})      class AppComponent {
//! class AppComponent {          ->     static decorators: DecoratorInvocation[] = [
//! }                                      { type: Component, args: [{selector: 'app'}] },
//!                                      ];
//!                                    }
//! ```
//!
//! The `DecoratorInvocation` interface is appended to every changed file.

use super::rewrite::{indentation, Rewriter};
use super::{PassContext, PassError, PassKind, PassOutput, TransformPass};
use crate::program::SourceUnit;
use crate::syntax::{DeclKind, Declaration, Decorator};
use std::fmt::Write as _;
use tracing::trace;

/// Support declaration appended to every file the pass changes.
pub const ANNOTATION_SUPPORT: &str =
    "\ninterface DecoratorInvocation {\n  type: Function;\n  args?: any[];\n}\n";

/// JSDoc tag marking a decorator as an annotation.
const ANNOTATION_TAG: &str = "Annotation";

/// Converts annotation decorators into static `decorators` properties.
#[derive(Debug, Default, Clone, Copy)]
pub struct DecoratorDownlevel;

impl DecoratorDownlevel {
    fn annotations<'d>(
        unit: &SourceUnit,
        decl: &'d Declaration,
        cx: &PassContext<'_>,
    ) -> Vec<&'d Decorator> {
        decl.decorators
            .iter()
            .filter(|decorator| {
                let is_annotation = cx
                    .type_info
                    .resolve_symbol(unit.path(), &decorator.name)
                    .is_some_and(|symbol| symbol.has_tag(ANNOTATION_TAG));
                trace!(decorator = %decorator.name, is_annotation, "classified decorator");
                is_annotation
            })
            .collect()
    }
}

/// End of a decorator including the blank space after it and, if the
/// decorator ends its line, that newline.
fn removal_end(source: &str, decorator: &Decorator) -> usize {
    let rest = &source[decorator.span.end..];
    let spaces = rest.len() - rest.trim_start_matches([' ', '\t']).len();
    let after = &rest[spaces..];
    let newline = if after.starts_with("\r\n") {
        2
    } else {
        usize::from(after.starts_with('\n'))
    };
    decorator.span.end + spaces + newline
}

fn render_decorators(decorators: &[&Decorator], indent: &str) -> String {
    let mut out = String::new();
    let _ = write!(out, "\n{indent}  static decorators: DecoratorInvocation[] = [");
    for decorator in decorators {
        let _ = write!(out, "\n{indent}    {{ type: {}", decorator.name);
        if let Some(args) = decorator.arguments.as_deref().filter(|a| !a.trim().is_empty()) {
            let _ = write!(out, ", args: [{args}]");
        }
        out.push_str(" },");
    }
    let _ = write!(out, "\n{indent}  ];");
    out
}

impl TransformPass for DecoratorDownlevel {
    fn kind(&self) -> PassKind {
        PassKind::DecoratorDownlevel
    }

    fn apply(&self, unit: &SourceUnit, cx: &PassContext<'_>) -> Result<PassOutput, PassError> {
        let source = unit.text();
        let mut rewriter = Rewriter::new(source);

        for decl in &unit.syntax().declarations {
            if decl.kind != DeclKind::Class {
                continue;
            }
            let annotations = Self::annotations(unit, decl, cx);
            if annotations.is_empty() {
                continue;
            }
            let Some(body) = decl.body else {
                return Err(PassError::new(
                    "NGPASS_DOWNLEVEL_NO_BODY",
                    format!("class {} has decorators but no body", decl.name),
                ));
            };

            for decorator in &annotations {
                rewriter.remove(decorator.span.start, removal_end(source, decorator));
            }
            let indent = indentation(source, body.start);
            rewriter.insert(body.start + 1, render_decorators(&annotations, indent));
        }

        if rewriter.is_empty() {
            return Ok(PassOutput::unchanged(unit));
        }
        let (text, fragment) = rewriter.finish(ANNOTATION_SUPPORT);
        Ok(PassOutput {
            text,
            source_map: Some(fragment),
            diagnostics: Vec::new(),
            externs: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::ProjectEnvironment;
    use crate::host::MemoryHost;
    use crate::program::Generation;
    use std::path::{Path, PathBuf};

    const ANNOTATIONS: &str = "/** @Annotation */\nexport function Component(meta: any) {}\n\nexport function Plain() {}\n";

    fn run(source: &str) -> PassOutput {
        let host = MemoryHost::new()
            .with_file("/p/src/annotations.ts", ANNOTATIONS)
            .with_file("/p/src/app.ts", source);
        let generation = Generation::load(&host, &[PathBuf::from("/p/src/app.ts")]).unwrap();
        let checker = generation.type_check(&host);
        let environment = ProjectEnvironment::new("/p");
        let cx = PassContext {
            type_info: &checker,
            environment: &environment,
        };
        let unit = generation.unit(Path::new("/p/src/app.ts")).unwrap();
        DecoratorDownlevel.apply(unit, &cx).unwrap()
    }

    #[test]
    fn test_downlevels_annotation_decorators() {
        let source = "import { Component, Plain } from './annotations';\n\n@Component({selector: 'app'})\n@Plain()\nexport class AppComponent {\n  title = 'app';\n}\n";
        let output = run(source);
        assert_eq!(
            output.text,
            format!(
                "import {{ Component, Plain }} from './annotations';\n\n@Plain()\nexport class AppComponent {{\n  static decorators: DecoratorInvocation[] = [\n    {{ type: Component, args: [{{selector: 'app'}}] }},\n  ];\n  title = 'app';\n}}\n{ANNOTATION_SUPPORT}"
            )
        );
        let fragment = output.source_map.unwrap();
        // `@Plain()` moved up one line
        assert_eq!(fragment.original_of(2, 0), Some((3, 0)));
        // `  title = 'app';` was line 5
        assert_eq!(fragment.original_of(7, 0), Some((5, 0)));
    }

    #[test]
    fn test_decorator_without_arguments() {
        let output = run("import { Component } from './annotations';\n@Component class A {}\n");
        assert!(output.text.contains("class A {\n  static decorators: DecoratorInvocation[] = [\n    { type: Component },\n  ];}"));
    }

    #[test]
    fn test_undecorated_file_is_unchanged() {
        let source = "import { Plain } from './annotations';\n@Plain()\nexport class A {}\n";
        let output = run(source);
        assert_eq!(output.text, source);
        assert!(output.source_map.is_none());
        assert!(output.diagnostics.is_empty());
    }
}
