//! Facts extracted from a single Go source file.
//!
//! Only as much of the language as the build needs is understood: the
//! package clause, the comments before it, the import declarations, the
//! interop directives attached to the `import "C"` pseudo-import, and
//! (in full mode) the names of top-level functions. Everything else is
//! tokenized and skipped.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::LazyLock;

use miette::{Diagnostic as MietteDiagnostic, NamedSource, SourceSpan};
use regex::Regex;
use thiserror::Error;

use crate::core::platform::Platform;

/// Import path of the C-interop pseudo-package.
pub const INTEROP_IMPORT: &str = "C";

/// Package name of files that only carry documentation.
pub const DOCUMENTATION_PACKAGE: &str = "documentation";

/// Comment prefix that overrides a directory's target name.
const TARGET_DIRECTIVE: &str = "//target:";

static CGO_DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#cgo\s+(?:(?P<cons>[^:]*?)\s+)?(?P<verb>[A-Za-z-]+):\s*(?P<args>.*)$")
        .expect("valid regex")
});

/// How much of a file to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Package clause and imports only.
    Header,
    /// Whole file, collecting top-level function names.
    Full,
}

/// What one source file tells the build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceFacts {
    pub package: String,
    pub target_override: Option<String>,
    pub imports: BTreeSet<String>,
    pub functions: Vec<String>,
    pub cflags: Vec<String>,
    pub ldflags: Vec<String>,
}

impl SourceFacts {
    pub fn uses_interop(&self) -> bool {
        self.imports.contains(INTEROP_IMPORT)
    }
}

/// A source file could not be read or tokenized.
#[derive(Debug, Error, MietteDiagnostic)]
#[error("{file}:{line}: {message}")]
#[diagnostic(code(gb::facts::parse))]
pub struct ParseError {
    pub file: String,
    pub line: usize,
    pub message: String,
    #[source_code]
    src: NamedSource<String>,
    #[label("here")]
    span: SourceSpan,
}

impl ParseError {
    fn new(file: &str, src: &str, offset: usize, message: impl Into<String>) -> Self {
        let offset = offset.min(src.len());
        ParseError {
            file: file.to_string(),
            line: src[..offset].matches('\n').count() + 1,
            message: message.into(),
            src: NamedSource::new(file, src.to_string()),
            span: SourceSpan::from((offset, 0)),
        }
    }
}

/// Extract facts from the file at `path`.
pub fn extract_file(path: &Path, mode: ScanMode, platform: &Platform) -> Result<SourceFacts, ParseError> {
    let name = path.display().to_string();
    let src = std::fs::read_to_string(path)
        .map_err(|e| ParseError::new(&name, "", 0, format!("cannot read file: {e}")))?;
    extract_source(&name, &src, mode, platform)
}

/// Extract facts from in-memory source text.
pub fn extract_source(
    name: &str,
    src: &str,
    mode: ScanMode,
    platform: &Platform,
) -> Result<SourceFacts, ParseError> {
    Parser {
        lexer: Lexer::new(name, src),
        platform,
        facts: SourceFacts::default(),
    }
    .run(mode)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Tok {
    Ident(String),
    Str(String),
    Punct(char),
    Other,
    Eof,
}

#[derive(Debug)]
struct Spanned {
    tok: Tok,
    offset: usize,
    /// Comments between the previous token and this one.
    comments: Vec<String>,
}

struct Lexer<'a> {
    name: &'a str,
    src: &'a str,
    pos: usize,
    peeked: Option<Spanned>,
}

impl<'a> Lexer<'a> {
    fn new(name: &'a str, src: &'a str) -> Self {
        Lexer {
            name,
            src,
            pos: 0,
            peeked: None,
        }
    }

    fn error(&self, offset: usize, message: &str) -> ParseError {
        ParseError::new(self.name, self.src, offset, message)
    }

    fn peek_char(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn peek(&mut self) -> Result<&Spanned, ParseError> {
        let tok = match self.peeked.take() {
            Some(tok) => tok,
            None => self.lex()?,
        };
        Ok(&*self.peeked.insert(tok))
    }

    fn next(&mut self) -> Result<Spanned, ParseError> {
        match self.peeked.take() {
            Some(tok) => Ok(tok),
            None => self.lex(),
        }
    }

    fn lex(&mut self) -> Result<Spanned, ParseError> {
        let mut comments = Vec::new();
        loop {
            let start = self.pos;
            let Some(c) = self.peek_char() else {
                return Ok(Spanned {
                    tok: Tok::Eof,
                    offset: start,
                    comments,
                });
            };

            if c.is_whitespace() {
                self.bump();
                continue;
            }

            if self.src[start..].starts_with("//") {
                let end = self.src[start..]
                    .find('\n')
                    .map(|i| start + i)
                    .unwrap_or(self.src.len());
                comments.push(self.src[start..end].to_string());
                self.pos = end;
                continue;
            }

            if self.src[start..].starts_with("/*") {
                let end = self.src[start + 2..]
                    .find("*/")
                    .map(|i| start + 2 + i + 2)
                    .ok_or_else(|| self.error(start, "comment not terminated"))?;
                comments.push(self.src[start..end].to_string());
                self.pos = end;
                continue;
            }

            let tok = if c.is_alphabetic() || c == '_' {
                while matches!(self.peek_char(), Some(ch) if ch.is_alphanumeric() || ch == '_') {
                    self.bump();
                }
                Tok::Ident(self.src[start..self.pos].to_string())
            } else if c.is_ascii_digit() {
                while matches!(self.peek_char(), Some(ch) if ch.is_alphanumeric() || ch == '_' || ch == '.') {
                    self.bump();
                }
                Tok::Other
            } else if c == '"' {
                Tok::Str(self.interpreted(start, '"')?)
            } else if c == '\'' {
                self.interpreted(start, '\'')?;
                Tok::Other
            } else if c == '`' {
                self.bump();
                let end = self.src[self.pos..]
                    .find('`')
                    .map(|i| self.pos + i)
                    .ok_or_else(|| self.error(start, "raw string literal not terminated"))?;
                let value = self.src[self.pos..end].to_string();
                self.pos = end + 1;
                Tok::Str(value)
            } else {
                self.bump();
                Tok::Punct(c)
            };

            return Ok(Spanned {
                tok,
                offset: start,
                comments,
            });
        }
    }

    /// Lex a quoted literal whose opening quote is at `start`.
    fn interpreted(&mut self, start: usize, quote: char) -> Result<String, ParseError> {
        self.bump();
        let body_start = self.pos;
        loop {
            match self.bump() {
                None | Some('\n') => {
                    return Err(self.error(start, "literal not terminated"));
                }
                Some('\\') => {
                    self.bump();
                }
                Some(c) if c == quote => {
                    return Ok(self.src[body_start..self.pos - 1].to_string());
                }
                Some(_) => {}
            }
        }
    }
}

struct Parser<'a> {
    lexer: Lexer<'a>,
    platform: &'a Platform,
    facts: SourceFacts,
}

impl Parser<'_> {
    fn run(mut self, mode: ScanMode) -> Result<SourceFacts, ParseError> {
        let keyword = self.lexer.next()?;
        if keyword.tok != Tok::Ident("package".to_string()) {
            return Err(self.lexer.error(keyword.offset, "expected 'package'"));
        }
        self.facts.target_override = keyword
            .comments
            .iter()
            .filter_map(|c| c.strip_prefix(TARGET_DIRECTIVE))
            .map(|rest| rest.trim().to_string())
            .find(|name| !name.is_empty());

        let name = self.lexer.next()?;
        match name.tok {
            Tok::Ident(pkg) => self.facts.package = pkg,
            _ => return Err(self.lexer.error(name.offset, "expected package name")),
        }

        self.imports()?;

        if mode == ScanMode::Full {
            self.functions()?;
        }
        Ok(self.facts)
    }

    fn skip_semicolons(&mut self) -> Result<(), ParseError> {
        while self.lexer.peek()?.tok == Tok::Punct(';') {
            self.lexer.next()?;
        }
        Ok(())
    }

    fn imports(&mut self) -> Result<(), ParseError> {
        loop {
            self.skip_semicolons()?;
            if self.lexer.peek()?.tok != Tok::Ident("import".to_string()) {
                return Ok(());
            }
            let keyword = self.lexer.next()?;

            if self.lexer.peek()?.tok == Tok::Punct('(') {
                self.lexer.next()?;
                loop {
                    self.skip_semicolons()?;
                    if self.lexer.peek()?.tok == Tok::Punct(')') {
                        self.lexer.next()?;
                        break;
                    }
                    self.import_spec(Vec::new())?;
                }
            } else {
                self.import_spec(keyword.comments)?;
            }
        }
    }

    /// One `[alias] "path"` spec. `doc` holds comments seen before the
    /// `import` keyword of an ungrouped declaration.
    fn import_spec(&mut self, mut doc: Vec<String>) -> Result<(), ParseError> {
        let mut tok = self.lexer.next()?;
        doc.extend(std::mem::take(&mut tok.comments));

        if matches!(tok.tok, Tok::Ident(_) | Tok::Punct('.')) {
            tok = self.lexer.next()?;
        }

        match tok.tok {
            Tok::Str(path) => {
                if path == INTEROP_IMPORT {
                    self.interop_directives(&doc);
                }
                self.facts.imports.insert(path);
                Ok(())
            }
            Tok::Eof => Err(self.lexer.error(tok.offset, "unexpected end of file in import")),
            _ => Err(self.lexer.error(tok.offset, "expected import path")),
        }
    }

    fn interop_directives(&mut self, doc: &[String]) {
        for comment in doc {
            let body = comment
                .strip_prefix("//")
                .or_else(|| {
                    comment
                        .strip_prefix("/*")
                        .and_then(|c| c.strip_suffix("*/"))
                })
                .unwrap_or(comment);

            for line in body.lines() {
                let Some(caps) = CGO_DIRECTIVE.captures(line.trim()) else {
                    continue;
                };
                if let Some(cons) = caps.name("cons") {
                    if !self.platform.constraint_holds(cons.as_str()) {
                        continue;
                    }
                }
                let args = caps["args"].split_whitespace().map(String::from);
                match &caps["verb"] {
                    "CFLAGS" | "CPPFLAGS" => self.facts.cflags.extend(args),
                    "LDFLAGS" => self.facts.ldflags.extend(args),
                    other => tracing::debug!("ignoring #cgo {} directive", other),
                }
            }
        }
    }

    fn functions(&mut self) -> Result<(), ParseError> {
        let mut depth = 0i32;
        let mut tok = self.lexer.next()?;
        loop {
            match &tok.tok {
                Tok::Eof => return Ok(()),
                Tok::Punct('{' | '(' | '[') => depth += 1,
                Tok::Punct('}' | ')' | ']') => depth -= 1,
                Tok::Ident(kw) if kw == "func" && depth == 0 => {
                    let next = self.lexer.next()?;
                    if let Tok::Ident(name) = next.tok {
                        self.facts.functions.push(name);
                        tok = self.lexer.next()?;
                    } else {
                        // method receiver or literal; re-examine for depth
                        tok = next;
                    }
                    continue;
                }
                _ => {}
            }
            tok = self.lexer.next()?;
        }
    }
}
