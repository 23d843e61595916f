//! CommonJS to `goog.module` conversion of emitted JavaScript.
//!
//! Runs on output text, not on source units: every `require('x')` becomes
//! `goog.require('<module name of x>')` and the file gets a
//! `goog.module('<own name>');` header. The header shares the first line
//! with existing code, so line numbers and the emitted source map stay
//! valid.

use crate::environment::Environment;
use regex_lite::Regex;
use std::fmt::Write as _;
use std::path::Path;
use std::sync::OnceLock;

/// `require('x')` or `require("x")`.
const REQUIRE_PATTERN: &str = r#"\brequire\(\s*(?:'([^']*)'|"([^"]*)")\s*\)"#;

fn require_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(REQUIRE_PATTERN).expect("REQUIRE_PATTERN is a valid regex"))
}

/// A converted output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogModule {
    pub text: String,
    /// Name given to the file in its `goog.module` header.
    pub module_name: String,
    /// Names passed to `goog.require`, first occurrence order.
    pub referenced_modules: Vec<String>,
}

/// Whether the first line is only a `"use strict";` directive.
fn is_use_strict(line: &str) -> bool {
    matches!(line.trim(), "'use strict';" | "\"use strict\";")
}

/// Convert the CommonJS output `text` written to `path`.
pub fn wrap_commonjs(
    path: &Path,
    text: &str,
    environment: &dyn Environment,
    es5_mode: bool,
) -> GoogModule {
    let path_str = path.to_string_lossy();
    let module_name = environment.path_to_module_name(Path::new(""), &path_str);
    let mut referenced_modules: Vec<String> = Vec::new();

    let mut body = String::with_capacity(text.len() + 64);
    let mut last = 0;
    for caps in require_pattern().captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        if text[..whole.start()].ends_with("goog.") {
            continue;
        }
        let Some(specifier) = caps.get(1).or_else(|| caps.get(2)) else {
            continue;
        };
        let name = environment.path_to_module_name(path, specifier.as_str());
        body.push_str(&text[last..whole.start()]);
        body.push_str("goog.require('");
        body.push_str(&name);
        body.push_str("')");
        last = whole.end();
        if !referenced_modules.contains(&name) {
            referenced_modules.push(name);
        }
    }
    body.push_str(&text[last..]);

    let mut header = format!("goog.module('{module_name}');");
    if es5_mode {
        let module_id = environment.file_name_to_module_id(path);
        let _ = write!(header, " var module = module || {{id: '{module_id}'}};");
    }

    let first_line_end = body.find('\n').unwrap_or(body.len());
    let text = if is_use_strict(&body[..first_line_end]) {
        format!("{header}{}", &body[first_line_end..])
    } else {
        format!("{header} {body}")
    };

    GoogModule {
        text,
        module_name,
        referenced_modules,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::ProjectEnvironment;

    #[test]
    fn test_require_pattern_matches_both_quotes() {
        let re = require_pattern();
        assert!(re.is_match("require('./a')"));
        assert!(re.is_match("require( \"./a\" )"));
        assert!(!re.is_match("required('./a')"));
    }

    fn env() -> ProjectEnvironment {
        ProjectEnvironment::new("/p").with_out_dir("/p/dist")
    }

    #[test]
    fn test_rewrites_requires_and_keeps_lines() {
        let source = "\"use strict\";\nvar core_1 = require('@angular/core');\nvar app_1 = require(\"./app.component\");\nvar again = require('./app.component');\ngoog.require('already.there');\n";
        let out = wrap_commonjs(Path::new("/p/dist/app/app.module.js"), source, &env(), false);
        assert_eq!(out.module_name, "app.app_module");
        assert_eq!(
            out.text,
            "goog.module('app.app_module');\nvar core_1 = goog.require('_angular.core');\nvar app_1 = goog.require('app.app_component');\nvar again = goog.require('app.app_component');\ngoog.require('already.there');\n"
        );
        assert_eq!(out.referenced_modules, vec!["_angular.core", "app.app_component"]);
        assert_eq!(out.text.lines().count(), source.lines().count());
    }

    #[test]
    fn test_header_shares_first_line() {
        let out = wrap_commonjs(Path::new("/p/dist/main.js"), "var x = 1;\n", &env(), true);
        assert_eq!(
            out.text,
            "goog.module('main'); var module = module || {id: 'dist/main.js'}; var x = 1;\n"
        );
        assert!(out.referenced_modules.is_empty());
    }

    #[test]
    fn test_ignores_other_calls() {
        let source = "var a = myrequire('x');\nvar b = require(name);\n";
        let out = wrap_commonjs(Path::new("/p/dist/a.js"), source, &env(), false);
        assert_eq!(out.text, format!("goog.module('a'); {source}"));
    }
}
