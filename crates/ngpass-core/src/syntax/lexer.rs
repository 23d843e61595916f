//! Token stream for the declaration scanner.
//!
//! This is not a full JavaScript lexer: it only distinguishes what the
//! scanner needs (identifiers, string literals, single-character punctuation
//! and JSDoc blocks). Ordinary comments, numbers, template literals and
//! regular expression literals are consumed so their contents can never be
//! mistaken for declarations.

/// Kind of a scanned token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// Identifier or keyword.
    Ident(String),
    /// String literal with quotes removed (escapes are kept verbatim).
    Str(String),
    /// Template literal (contents are opaque).
    Template,
    /// Numeric literal.
    Number,
    /// Regular expression literal.
    Regex,
    /// Any other single ASCII character.
    Punct(char),
    /// A `/** ... */` block, including the delimiters.
    JsDoc(String),
}

/// A token with its byte span and 0-based line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
    pub line: u32,
}

impl Token {
    /// The identifier text, if this is an identifier.
    #[must_use]
    pub fn ident(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Ident(name) => Some(name),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_ident(&self, word: &str) -> bool {
        self.ident() == Some(word)
    }

    #[must_use]
    pub fn is_punct(&self, ch: char) -> bool {
        self.kind == TokenKind::Punct(ch)
    }
}

/// Keywords after which a `/` starts a regular expression rather than a division.
const REGEX_PRECEDING_KEYWORDS: &[&str] = &[
    "return", "typeof", "case", "do", "else", "in", "of", "new", "delete", "void", "throw",
    "yield", "await", "instanceof",
];

/// Tokenize source text.
#[must_use]
pub fn tokenize(source: &str) -> Vec<Token> {
    Lexer::new(source).run()
}

struct Lexer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
    line: u32,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            line: 0,
            tokens: Vec::new(),
        }
    }

    fn run(mut self) -> Vec<Token> {
        while self.pos < self.bytes.len() {
            let ch = self.bytes[self.pos];
            match ch {
                b'\n' => {
                    self.line += 1;
                    self.pos += 1;
                }
                b' ' | b'\t' | b'\r' => self.pos += 1,
                b'/' if self.peek(1) == Some(b'/') => self.skip_line_comment(),
                b'/' if self.peek(1) == Some(b'*') => self.block_comment(),
                b'/' if self.regex_allowed() => self.regex(),
                b'"' | b'\'' => self.string(ch),
                b'`' => self.template(),
                b'0'..=b'9' => self.number(),
                b'.' if self.peek(1).is_some_and(|c| c.is_ascii_digit()) => self.number(),
                c if is_ident_start(c) => self.identifier(),
                c if c.is_ascii() => {
                    self.push(TokenKind::Punct(c as char), self.pos, self.pos + 1, self.line);
                    self.pos += 1;
                }
                // Stray non-ASCII outside identifiers (e.g. NBSP); skip the whole char.
                _ => self.pos += utf8_len(ch),
            }
        }
        self.tokens
    }

    fn peek(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn push(&mut self, kind: TokenKind, start: usize, end: usize, line: u32) {
        self.tokens.push(Token {
            kind,
            start,
            end,
            line,
        });
    }

    fn regex_allowed(&self) -> bool {
        match self.tokens.last().map(|t| &t.kind) {
            None => true,
            Some(TokenKind::Punct(c)) => !matches!(c, ')' | ']' | '}'),
            Some(TokenKind::Ident(word)) => REGEX_PRECEDING_KEYWORDS.contains(&word.as_str()),
            Some(TokenKind::JsDoc(_)) => true,
            Some(_) => false,
        }
    }

    fn skip_line_comment(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos] != b'\n' {
            self.pos += 1;
        }
    }

    fn block_comment(&mut self) {
        let start = self.pos;
        let line = self.line;
        self.pos += 2;
        while self.pos < self.bytes.len() {
            if self.bytes[self.pos] == b'*' && self.peek(1) == Some(b'/') {
                self.pos += 2;
                break;
            }
            if self.bytes[self.pos] == b'\n' {
                self.line += 1;
            }
            self.pos += 1;
        }
        let end = self.pos.min(self.bytes.len());
        let text = &self.source[start..end];
        // `/**/` is an empty plain comment, not JSDoc.
        if text.starts_with("/**") && text.len() > 4 {
            self.push(TokenKind::JsDoc(text.to_string()), start, end, line);
        }
    }

    fn string(&mut self, quote: u8) {
        let start = self.pos;
        let line = self.line;
        self.pos += 1;
        while self.pos < self.bytes.len() {
            match self.bytes[self.pos] {
                b'\\' => self.pos += 2,
                b'\n' => break,
                c if c == quote => {
                    self.pos += 1;
                    let value = self.source[start + 1..self.pos - 1].to_string();
                    self.push(TokenKind::Str(value), start, self.pos, line);
                    return;
                }
                _ => self.pos += 1,
            }
        }
        // Unterminated literal: keep what we have so spans stay monotonic.
        self.pos = self.pos.min(self.bytes.len());
        let value = self.source[start + 1..self.pos].to_string();
        self.push(TokenKind::Str(value), start, self.pos, line);
    }

    fn template(&mut self) {
        let start = self.pos;
        let line = self.line;
        self.pos += 1;
        let mut depth = 0usize;
        while self.pos < self.bytes.len() {
            match self.bytes[self.pos] {
                b'\\' => {
                    self.pos += 2;
                    continue;
                }
                b'\n' => self.line += 1,
                b'$' if depth == 0 && self.peek(1) == Some(b'{') => {
                    depth = 1;
                    self.pos += 2;
                    continue;
                }
                b'{' if depth > 0 => depth += 1,
                b'}' if depth > 0 => depth -= 1,
                b'`' if depth == 0 => {
                    self.pos += 1;
                    break;
                }
                _ => {}
            }
            self.pos += 1;
        }
        self.pos = self.pos.min(self.bytes.len());
        self.push(TokenKind::Template, start, self.pos, line);
    }

    fn regex(&mut self) {
        let start = self.pos;
        let line = self.line;
        self.pos += 1;
        let mut in_class = false;
        while self.pos < self.bytes.len() {
            match self.bytes[self.pos] {
                b'\\' => self.pos += 1,
                b'[' => in_class = true,
                b']' => in_class = false,
                b'/' if !in_class => {
                    self.pos += 1;
                    break;
                }
                b'\n' => break,
                _ => {}
            }
            self.pos += 1;
        }
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_alphabetic() {
            self.pos += 1;
        }
        self.pos = self.pos.min(self.bytes.len());
        self.push(TokenKind::Regex, start, self.pos, line);
    }

    fn number(&mut self) {
        let start = self.pos;
        while self.pos < self.bytes.len() {
            let c = self.bytes[self.pos];
            if c.is_ascii_alphanumeric() || c == b'.' || c == b'_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        self.push(TokenKind::Number, start, self.pos, self.line);
    }

    fn identifier(&mut self) {
        let start = self.pos;
        while self.pos < self.bytes.len() && is_ident_continue(self.bytes[self.pos]) {
            self.pos += utf8_len(self.bytes[self.pos]);
        }
        self.pos = self.pos.min(self.bytes.len());
        let word = self.source[start..self.pos].to_string();
        self.push(TokenKind::Ident(word), start, self.pos, self.line);
    }
}

fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_' || c == b'$' || c >= 0x80
}

fn is_ident_continue(c: u8) -> bool {
    is_ident_start(c) || c.is_ascii_digit()
}

fn utf8_len(first: u8) -> usize {
    match first {
        0xF0..=0xFF => 4,
        0xE0..=0xEF => 3,
        0xC0..=0xDF => 2,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_skips_comments_and_keeps_jsdoc() {
        let toks = kinds("// import x from 'y'\n/* class A {} */\n/** @Annotation */ class B {}");
        assert_eq!(toks[0], TokenKind::JsDoc("/** @Annotation */".to_string()));
        assert_eq!(toks[1], TokenKind::Ident("class".to_string()));
        assert_eq!(toks[2], TokenKind::Ident("B".to_string()));
    }

    #[test]
    fn test_strings_and_lines() {
        let toks = tokenize("import { A }\n  from './a';");
        let spec = toks.iter().find(|t| matches!(t.kind, TokenKind::Str(_))).unwrap();
        assert_eq!(spec.kind, TokenKind::Str("./a".to_string()));
        assert_eq!(spec.line, 1);
    }

    #[test]
    fn test_template_and_regex_are_opaque() {
        let toks = kinds("const a = `class ${x} {`; const r = /class {/g; b / c;");
        assert!(toks.contains(&TokenKind::Template));
        assert!(toks.contains(&TokenKind::Regex));
        assert_eq!(
            toks.iter().filter(|k| **k == TokenKind::Ident("class".to_string())).count(),
            0
        );
        assert!(toks.contains(&TokenKind::Punct('/')));
    }

    #[test]
    fn test_non_ascii_identifiers() {
        let toks = kinds("const café = 1;");
        assert_eq!(toks[1], TokenKind::Ident("café".to_string()));
    }
}
