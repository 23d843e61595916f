//! Declaration scanner.
//!
//! Walks the token stream once per concern: class names anywhere in the
//! file, property-access call sites, and top-level statements (imports,
//! exports, declarations). Only brace depth is tracked; anything at depth
//! zero that starts a statement is a candidate.

use super::lexer::{tokenize, Token, TokenKind};
use super::{
    CallArgument, CallSite, ClassName, DeclKind, Declaration, Decorator, ExportBinding,
    ExportClause, ExportDecl, Heritage, ImportBinding, ImportDecl, ImportKind, JsDoc,
    ModuleSyntax, Span,
};

/// Words that never count as a bare identifier argument.
const RESERVED_ARGUMENTS: &[&str] = &[
    "this", "new", "function", "class", "true", "false", "null", "typeof", "void", "await",
    "async", "super", "yield",
];

/// Words that may follow `export default` as the start of a declaration.
const DEFAULT_DECLARATION_WORDS: &[&str] =
    &["class", "function", "abstract", "async", "interface", "enum"];

pub(super) struct Scanner<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    out: ModuleSyntax,
}

impl<'a> Scanner<'a> {
    pub(super) fn new(source: &'a str) -> Self {
        Self {
            source,
            tokens: tokenize(source),
            out: ModuleSyntax::default(),
        }
    }

    pub(super) fn scan(mut self) -> ModuleSyntax {
        self.collect_classes();
        self.collect_calls();
        self.collect_statements();
        self.out
    }

    // ------------------------------------------------------------------
    // token helpers
    // ------------------------------------------------------------------

    fn ident_at(&self, i: usize) -> Option<&str> {
        self.tokens.get(i).and_then(Token::ident)
    }

    fn punct_at(&self, i: usize, ch: char) -> bool {
        self.tokens.get(i).is_some_and(|t| t.is_punct(ch))
    }

    fn str_at(&self, i: usize) -> Option<String> {
        match self.tokens.get(i).map(|t| &t.kind) {
            Some(TokenKind::Str(value)) => Some(value.clone()),
            _ => None,
        }
    }

    /// Identifier or string literal (module namespace names may be strings).
    fn name_at(&self, i: usize) -> Option<String> {
        match self.tokens.get(i).map(|t| &t.kind) {
            Some(TokenKind::Ident(value) | TokenKind::Str(value)) => Some(value.clone()),
            _ => None,
        }
    }

    /// Index of the bracket closing the one at `open`.
    fn matching(&self, open: usize) -> Option<usize> {
        let (open_ch, close_ch) = match self.tokens.get(open)?.kind {
            TokenKind::Punct('{') => ('{', '}'),
            TokenKind::Punct('(') => ('(', ')'),
            TokenKind::Punct('[') => ('[', ']'),
            _ => return None,
        };
        let mut depth = 0usize;
        for (k, tok) in self.tokens.iter().enumerate().skip(open) {
            if tok.is_punct(open_ch) {
                depth += 1;
            } else if tok.is_punct(close_ch) {
                depth -= 1;
                if depth == 0 {
                    return Some(k);
                }
            }
        }
        None
    }

    /// Skip a `<...>` type argument list starting at `i`, if any.
    fn skip_type_args(&self, i: usize) -> usize {
        if !self.punct_at(i, '<') {
            return i;
        }
        let mut depth = 0usize;
        let mut k = i;
        while let Some(tok) = self.tokens.get(k) {
            if tok.is_punct('<') {
                depth += 1;
            } else if tok.is_punct('>') && !self.is_arrow_head(k) {
                depth -= 1;
                if depth == 0 {
                    return k + 1;
                }
            }
            k += 1;
        }
        k
    }

    /// `>` glued to a preceding `=` is the arrow in a function type.
    fn is_arrow_head(&self, k: usize) -> bool {
        k.checked_sub(1)
            .map(|p| &self.tokens[p])
            .is_some_and(|prev| prev.is_punct('=') && prev.end == self.tokens[k].start)
    }

    /// `a.b.c` starting at `i`; returns the name and the index after it.
    fn dotted_name(&self, i: usize) -> Option<(String, usize)> {
        let mut name = self.ident_at(i)?.to_string();
        let mut k = i + 1;
        while self.punct_at(k, '.') {
            let Some(part) = self.ident_at(k + 1) else {
                break;
            };
            name.push('.');
            name.push_str(part);
            k += 2;
        }
        Some((name, k))
    }

    fn at_statement_start(&self, i: usize) -> bool {
        let Some(prev) = i.checked_sub(1).map(|p| &self.tokens[p]) else {
            return true;
        };
        let on_new_line = prev.line < self.tokens[i].line;
        match &prev.kind {
            TokenKind::Punct(';' | '{' | '}') | TokenKind::JsDoc(_) => true,
            TokenKind::Punct(')' | ']') => on_new_line,
            TokenKind::Punct(_) => false,
            _ => on_new_line,
        }
    }

    fn jsdoc_before(&self, i: usize) -> Option<JsDoc> {
        let prev = &self.tokens[i.checked_sub(1)?];
        match &prev.kind {
            TokenKind::JsDoc(text) => Some(JsDoc::new(text.clone(), Span::new(prev.start, prev.end))),
            _ => None,
        }
    }

    // ------------------------------------------------------------------
    // whole-file passes
    // ------------------------------------------------------------------

    fn collect_classes(&mut self) {
        for (k, tok) in self.tokens.iter().enumerate() {
            if !tok.is_ident("class") {
                continue;
            }
            let Some(name) = self.tokens.get(k + 1).and_then(Token::ident) else {
                continue;
            };
            if matches!(name, "extends" | "implements") {
                continue;
            }
            let in_declaration_position = match k.checked_sub(1).map(|p| &self.tokens[p]) {
                None => true,
                Some(prev) => match &prev.kind {
                    TokenKind::Punct(';' | '{' | '}' | ')') | TokenKind::JsDoc(_) => true,
                    TokenKind::Ident(word) => {
                        matches!(word.as_str(), "export" | "default" | "abstract" | "declare")
                            || prev.line < tok.line
                    }
                    _ => false,
                },
            };
            if in_declaration_position {
                self.out.classes.push(ClassName {
                    name: name.to_string(),
                    line: tok.line,
                });
            }
        }
    }

    fn collect_calls(&mut self) {
        for k in 1..self.tokens.len() {
            if !self.tokens[k - 1].is_punct('.') {
                continue;
            }
            let Some(method) = self.tokens[k].ident() else {
                continue;
            };
            let Some(open) = self.call_paren(k + 1) else {
                continue;
            };
            let first_argument = match self.tokens.get(open + 1) {
                None => None,
                Some(arg) if arg.is_punct(')') => None,
                Some(arg) => match arg.ident() {
                    Some(id)
                        if !RESERVED_ARGUMENTS.contains(&id)
                            && (self.punct_at(open + 2, ')') || self.punct_at(open + 2, ',')) =>
                    {
                        Some(CallArgument::Identifier(id.to_string()))
                    }
                    _ => Some(CallArgument::Expression),
                },
            };
            self.out.calls.push(CallSite {
                method: method.to_string(),
                first_argument,
                line: self.tokens[k].line,
            });
        }
    }

    /// Index of the `(` opening a call whose callee ends just before `i`,
    /// past an optional `<...>` type argument list.
    fn call_paren(&self, i: usize) -> Option<usize> {
        let open = self.skip_type_args(i);
        // a comparison such as `a.length < n && (b > c)` is not a type argument list
        let plain_types = self.tokens[i..open.min(self.tokens.len())]
            .iter()
            .all(|tok| !(tok.is_punct('(') || tok.is_punct(')') || tok.is_punct(';') || tok.is_punct('&')));
        (plain_types && self.punct_at(open, '(')).then_some(open)
    }

    fn collect_statements(&mut self) {
        let mut depth = 0usize;
        let mut i = 0;
        while i < self.tokens.len() {
            if self.punct_at(i, '{') {
                depth += 1;
                i += 1;
                continue;
            }
            if self.punct_at(i, '}') {
                depth = depth.saturating_sub(1);
                i += 1;
                continue;
            }
            if depth > 0 || !self.at_statement_start(i) {
                i += 1;
                continue;
            }

            let next = match self.ident_at(i) {
                Some("import") => self.import_decl(i),
                Some("export") => self.export_decl(i),
                Some(
                    "class" | "function" | "interface" | "type" | "enum" | "const" | "let"
                    | "var" | "declare" | "abstract" | "async",
                ) => self.declaration(i),
                _ if self.punct_at(i, '@') => self.declaration(i),
                _ => None,
            };
            i = next.map_or(i + 1, |n| n.max(i + 1));
        }
    }

    // ------------------------------------------------------------------
    // statements
    // ------------------------------------------------------------------

    fn import_decl(&mut self, i: usize) -> Option<usize> {
        let line = self.tokens[i].line;
        let mut j = i + 1;
        // import(...) and import.meta
        if self.punct_at(j, '(') || self.punct_at(j, '.') {
            return None;
        }
        if let Some(specifier) = self.str_at(j) {
            self.out.imports.push(ImportDecl {
                specifier,
                bindings: Vec::new(),
                line,
            });
            return Some(j + 1);
        }
        if self.ident_at(j) == Some("type")
            && self.ident_at(j + 1) != Some("from")
            && !self.punct_at(j + 1, ',')
            && !self.punct_at(j + 1, '=')
        {
            j += 1;
        }

        let mut pending: Vec<(String, String, ImportKind)> = Vec::new();
        if let Some(local) = self.ident_at(j).filter(|w| *w != "from") {
            let local = local.to_string();
            if self.punct_at(j + 1, '=') {
                // import x = require('m')
                if self.ident_at(j + 2) == Some("require") && self.punct_at(j + 3, '(') {
                    if let Some(specifier) = self.str_at(j + 4) {
                        let binding = ImportBinding {
                            local_name: local,
                            original_name: "*".to_string(),
                            module_path: specifier.clone(),
                            kind: ImportKind::Namespace,
                        };
                        self.out.imports.push(ImportDecl {
                            specifier,
                            bindings: vec![binding],
                            line,
                        });
                        return Some(j + 5);
                    }
                }
                return Some(j + 2);
            }
            pending.push((local, "default".to_string(), ImportKind::Default));
            j += 1;
            if self.punct_at(j, ',') {
                j += 1;
            }
        }

        if self.punct_at(j, '*') {
            if self.ident_at(j + 1) != Some("as") {
                return Some(j + 1);
            }
            let local = self.ident_at(j + 2)?.to_string();
            pending.push((local, "*".to_string(), ImportKind::Namespace));
            j += 3;
        } else if self.punct_at(j, '{') {
            let close = self.matching(j)?;
            pending.extend(
                self.named_elements(j + 1, close)
                    .into_iter()
                    .map(|(name, alias)| (alias, name, ImportKind::Named)),
            );
            j = close + 1;
        }

        if self.ident_at(j) != Some("from") {
            return Some(j);
        }
        let specifier = self.str_at(j + 1)?;
        let bindings = pending
            .into_iter()
            .map(|(local_name, original_name, kind)| ImportBinding {
                local_name,
                original_name,
                module_path: specifier.clone(),
                kind,
            })
            .collect();
        self.out.imports.push(ImportDecl {
            specifier,
            bindings,
            line,
        });
        Some(j + 2)
    }

    /// Elements of `{ a, b as c, type d }` between `from` and `close`,
    /// as `(name, alias)` pairs.
    fn named_elements(&self, from: usize, close: usize) -> Vec<(String, String)> {
        let mut out = Vec::new();
        let mut k = from;
        while k < close {
            if self.ident_at(k) == Some("type")
                && self.name_at(k + 1).is_some()
                && self.ident_at(k + 1) != Some("as")
            {
                k += 1;
            }
            let Some(name) = self.name_at(k) else {
                k += 1;
                continue;
            };
            let mut alias = name.clone();
            k += 1;
            if self.ident_at(k) == Some("as") {
                if let Some(renamed) = self.name_at(k + 1) {
                    alias = renamed;
                    k += 2;
                }
            }
            out.push((name, alias));
            while k < close && !self.punct_at(k, ',') {
                k += 1;
            }
            k += 1;
        }
        out
    }

    fn export_decl(&mut self, i: usize) -> Option<usize> {
        let line = self.tokens[i].line;
        let j = i + 1;

        if self.punct_at(j, '=') {
            self.out.export_assignments.push(line);
            return Some(j + 1);
        }

        if self.punct_at(j, '*') {
            let mut k = j + 1;
            let clause = if self.ident_at(k) == Some("as") {
                let name = self.name_at(k + 1)?;
                k += 2;
                ExportClause::Namespace(name)
            } else {
                ExportClause::All
            };
            if self.ident_at(k) != Some("from") {
                return Some(k);
            }
            let specifier = self.str_at(k + 1)?;
            self.out.exports.push(ExportDecl {
                specifier: Some(specifier),
                clause,
                line,
            });
            return Some(k + 2);
        }

        let mut k = j;
        if self.ident_at(k) == Some("type") && self.punct_at(k + 1, '{') {
            k += 1;
        }
        if self.punct_at(k, '{') {
            let close = self.matching(k)?;
            let elements = self.named_elements(k + 1, close);
            let mut next = close + 1;
            let specifier = if self.ident_at(next) == Some("from") {
                let specifier = self.str_at(next + 1);
                next += 2;
                specifier
            } else {
                None
            };
            let bindings = elements
                .into_iter()
                .map(|(name, alias)| ExportBinding {
                    exported_name: alias,
                    original_name: name,
                    module_path: specifier.clone(),
                })
                .collect();
            self.out.exports.push(ExportDecl {
                specifier,
                clause: ExportClause::Named(bindings),
                line,
            });
            return Some(next);
        }

        if self.ident_at(k) == Some("default") {
            if let Some(name) = self.ident_at(k + 1) {
                let ends_statement = self
                    .tokens
                    .get(k + 2)
                    .map_or(true, |t| t.is_punct(';') || t.line > line);
                if !DEFAULT_DECLARATION_WORDS.contains(&name) && ends_statement {
                    let binding = ExportBinding {
                        exported_name: "default".to_string(),
                        original_name: name.to_string(),
                        module_path: None,
                    };
                    self.out.exports.push(ExportDecl {
                        specifier: None,
                        clause: ExportClause::Named(vec![binding]),
                        line,
                    });
                    return Some(k + 2);
                }
            }
        }

        // export import a = b.c; export as namespace X;
        if matches!(self.ident_at(k), Some("import" | "as")) {
            return Some(k + 1);
        }

        self.declaration(i)
    }

    fn decorator(&self, at: usize) -> Option<(Decorator, usize)> {
        let (name, mut j) = self.dotted_name(at + 1)?;
        let mut arguments = None;
        let mut end = self.tokens[j - 1].end;
        if self.punct_at(j, '(') {
            let close = self.matching(j)?;
            arguments = Some(self.source[self.tokens[j].end..self.tokens[close].start].to_string());
            end = self.tokens[close].end;
            j = close + 1;
        }
        let decorator = Decorator {
            name,
            arguments,
            span: Span::new(self.tokens[at].start, end),
            line: self.tokens[at].line,
        };
        Some((decorator, j))
    }

    fn declaration(&mut self, start: usize) -> Option<usize> {
        let jsdoc = self.jsdoc_before(start);
        let mut i = start;

        let mut decorators = Vec::new();
        while self.punct_at(i, '@') {
            let (decorator, next) = self.decorator(i)?;
            decorators.push(decorator);
            i = next;
        }

        let mut exported = false;
        let mut default_export = false;
        let mut ambient = false;
        loop {
            match self.ident_at(i) {
                Some("export") => exported = true,
                Some("default") if exported => default_export = true,
                Some("declare") => ambient = true,
                Some("abstract" | "async") => {}
                Some("const") if self.ident_at(i + 1) == Some("enum") => {}
                _ => break,
            }
            i += 1;
        }

        let kind = match self.ident_at(i) {
            Some("class") => DeclKind::Class,
            Some("function") => DeclKind::Function,
            Some("interface") => DeclKind::Interface,
            Some("type") => DeclKind::TypeAlias,
            Some("enum") => DeclKind::Enum,
            Some("const" | "let" | "var") => DeclKind::Variable,
            // declare module 'x' {}, namespace N {}, a stray modifier, ...
            _ => return if i > start { Some(i) } else { None },
        };

        let mut j = i + 1;
        if kind == DeclKind::Function && self.punct_at(j, '*') {
            j += 1;
        }
        let name = match self.ident_at(j) {
            Some(word)
                if !(kind == DeclKind::Class && matches!(word, "extends" | "implements")) =>
            {
                j += 1;
                word.to_string()
            }
            _ if default_export && matches!(kind, DeclKind::Class | DeclKind::Function) => {
                "default".to_string()
            }
            // destructuring and other shapes we do not summarize
            _ => return Some(j),
        };
        if kind == DeclKind::TypeAlias && !(self.punct_at(j, '=') || self.punct_at(j, '<')) {
            // `type` used as a plain identifier
            return None;
        }
        j = self.skip_type_args(j);

        let mut heritage = Heritage::default();
        if matches!(kind, DeclKind::Class | DeclKind::Interface) {
            loop {
                match self.ident_at(j) {
                    Some("extends") => {
                        let (names, next) = self.type_list(j + 1);
                        heritage.extends.extend(names);
                        j = next;
                    }
                    Some("implements") => {
                        let (names, next) = self.type_list(j + 1);
                        heritage.implements.extend(names);
                        j = next;
                    }
                    _ => break,
                }
            }
        }

        let mut body = None;
        let mut members = Vec::new();
        if matches!(kind, DeclKind::Class | DeclKind::Interface | DeclKind::Enum)
            && self.punct_at(j, '{')
        {
            if let Some(close) = self.matching(j) {
                body = Some(Span::new(self.tokens[j].start, self.tokens[close].end));
                if kind == DeclKind::Interface {
                    members = self.interface_members(j, close);
                }
            }
        }

        self.out.declarations.push(Declaration {
            name,
            kind,
            exported,
            default_export,
            ambient,
            jsdoc,
            decorators,
            heritage,
            members,
            body,
            start: self.tokens[start].start,
            line: self.tokens[start].line,
        });
        // Resume at the body so the caller keeps counting its braces.
        Some(j)
    }

    /// Comma-separated heritage types starting at `i`.
    fn type_list(&self, i: usize) -> (Vec<String>, usize) {
        let mut names = Vec::new();
        let mut k = i;
        while let Some((name, next)) = self.dotted_name(k) {
            names.push(name);
            k = self.skip_type_args(next);
            // class A extends mixin(B) {}
            if self.punct_at(k, '(') {
                match self.matching(k) {
                    Some(close) => k = close + 1,
                    None => break,
                }
            }
            if !self.punct_at(k, ',') {
                break;
            }
            k += 1;
        }
        (names, k)
    }

    fn interface_members(&self, open: usize, close: usize) -> Vec<String> {
        let mut members: Vec<String> = Vec::new();
        let mut depth = 0usize;
        for k in open..close {
            let tok = &self.tokens[k];
            match tok.kind {
                TokenKind::Punct('{' | '(' | '[') => {
                    depth += 1;
                    continue;
                }
                TokenKind::Punct('}' | ')' | ']') => {
                    depth = depth.saturating_sub(1);
                    continue;
                }
                _ => {}
            }
            if depth != 1 {
                continue;
            }
            let Some(name) = self.name_at(k) else {
                continue;
            };
            let prev = &self.tokens[k - 1];
            let starts_member = prev.is_punct('{')
                || prev.is_punct(';')
                || prev.is_punct(',')
                || prev.is_ident("readonly")
                || matches!(prev.kind, TokenKind::JsDoc(_))
                || prev.line < tok.line;
            let declares_member = ['?', ':', '(', '<'].iter().any(|c| self.punct_at(k + 1, *c));
            if starts_member && declares_member && !members.contains(&name) {
                members.push(name);
            }
        }
        members
    }
}
