//! Built-in declaration scanner.
//!
//! Recognizes the declarations the documentation model cares about directly
//! from the token stream, without preprocessing or semantic analysis.
//! Anything it does not understand is skipped up to the next `;`, `@`-keyword
//! or directive, so malformed input yields a shorter cursor list instead of an
//! error. Method and function bodies are skipped as balanced brace groups.

use super::{Cursor, CursorDetail, CursorKind, Frontend, Language, TranslationUnit};
use crate::error::{Diagnostic, Error, Result};
use crate::lexer::{self, LineIndex, Token};
use crate::model::{SignatureFragment, SourceLocation};
use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

static RE_DEFINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#[[:blank:]]*define[[:blank:]]+([A-Za-z_][A-Za-z0-9_]*)").unwrap()
});

/// Leading words that are not part of a declared type.
const STORAGE_WORDS: &[&str] = &[
    "typedef",
    "extern",
    "static",
    "inline",
    "__inline",
    "__inline__",
    "FOUNDATION_EXPORT",
    "FOUNDATION_EXTERN",
    "UIKIT_EXTERN",
    "APPKIT_EXTERN",
    "CF_EXPORT",
    "OBJC_EXPORT",
    "NS_INLINE",
    "CF_INLINE",
];

/// Words that can never be a declared name.
const RESERVED_WORDS: &[&str] = &[
    "typedef", "struct", "union", "enum", "class", "extern", "static", "const", "volatile",
    "restrict", "inline", "signed", "unsigned", "return", "using", "namespace", "template",
];

const ENUM_MACROS: &[&str] = &[
    "NS_ENUM",
    "NS_OPTIONS",
    "NS_CLOSED_ENUM",
    "NS_ERROR_ENUM",
    "CF_ENUM",
    "CF_OPTIONS",
    "CF_CLOSED_ENUM",
];

/// Availability and attribute macros that trail or prefix declarations.
fn is_attribute_word(word: &str) -> bool {
    word.starts_with("__")
        || ["NS_", "CF_", "UI_", "API_", "OBJC_", "AVAILABLE", "DEPRECATED", "UNAVAILABLE"]
            .iter()
            .any(|p| word.starts_with(p))
        || word.ends_with("_ATTRIBUTE")
        || word.contains("_AVAILABLE")
        || word.contains("_DEPRECATED")
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace(" )", ")")
        .replace("( ", "(")
}

pub struct ScanFrontend;

impl Frontend for ScanFrontend {
    fn name(&self) -> &'static str {
        "scan"
    }

    fn parse(&self, contents: &str, path: &str, _arguments: &[String]) -> Result<TranslationUnit> {
        if Language::from_path(path).is_none() {
            return Err(Error::UnsupportedFile(path.to_string()));
        }
        if contents.contains('\0') {
            return Err(Error::Frontend {
                file: path.to_string(),
                message: "input contains NUL bytes".to_string(),
            });
        }

        let mut scanner = Scanner::new(contents, path);
        let children = scanner.scan();
        let root = Cursor::new(
            CursorKind::TranslationUnit,
            path,
            SourceLocation::new(path, 1, 1),
            0,
            0,
        )
        .with_children(children);

        Ok(TranslationUnit {
            root,
            diagnostics: scanner.diagnostics,
        })
    }
}

#[derive(Debug, Clone)]
struct Tok {
    token: Token,
    span: Range<usize>,
    /// First code token on a line that follows a comment.
    after_comment: bool,
}

struct Scanner<'a> {
    source: &'a str,
    file: &'a str,
    lines: LineIndex,
    toks: Vec<Tok>,
    pos: usize,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Scanner<'a> {
    fn new(source: &'a str, file: &'a str) -> Self {
        let mut toks = Vec::new();
        let mut comment_end: Option<usize> = None;
        for lexeme in lexer::lex(source) {
            match lexeme.token {
                Some(token) if token.is_comment() => comment_end = Some(lexeme.span.end),
                Some(token) => {
                    let after_comment = comment_end
                        .is_some_and(|end| source[end..lexeme.span.start].contains('\n'));
                    toks.push(Tok {
                        token,
                        span: lexeme.span,
                        after_comment,
                    });
                    comment_end = None;
                }
                None => comment_end = None,
            }
        }

        Self {
            source,
            file,
            lines: LineIndex::new(source),
            toks,
            pos: 0,
            diagnostics: Vec::new(),
        }
    }

    // -- Token access ---------------------------------------------------------

    fn peek(&self) -> Option<Token> {
        self.token_at(self.pos)
    }

    fn peek_at(&self, n: usize) -> Option<Token> {
        self.token_at(self.pos + n)
    }

    fn token_at(&self, i: usize) -> Option<Token> {
        self.toks.get(i).map(|t| t.token)
    }

    fn text(&self, i: usize) -> &'a str {
        let source: &'a str = self.source;
        &source[self.toks[i].span.clone()]
    }

    fn is_word(&self, i: usize, word: &str) -> bool {
        self.token_at(i) == Some(Token::Ident) && self.text(i) == word
    }

    fn location(&self, offset: usize) -> SourceLocation {
        let (line, column) = self.lines.position(offset);
        SourceLocation::new(self.file, line, column)
    }

    fn cursor(&self, kind: CursorKind, spelling: impl Into<String>, name_idx: usize, start_idx: usize) -> Cursor {
        let offset = self.toks[name_idx].span.start;
        let extent_start = self.toks[start_idx].span.start;
        Cursor::new(kind, spelling, self.location(offset), offset, extent_start)
    }

    fn warn(&mut self, idx: usize, message: impl Into<String>) {
        let offset = self
            .toks
            .get(idx)
            .map(|t| t.span.start)
            .unwrap_or(self.source.len());
        let location = self.location(offset);
        self.diagnostics.push(Diagnostic::warning(Some(location), message));
    }

    /// Source text covering tokens `from..to`, whitespace-normalized.
    fn text_between(&self, from: usize, to: usize) -> String {
        if from >= to || to > self.toks.len() {
            return String::new();
        }
        normalize(&self.source[self.toks[from].span.start..self.toks[to - 1].span.end])
    }

    // -- Skipping -------------------------------------------------------------

    /// Skip a balanced group starting at the current opening token.
    fn skip_balanced(&mut self) {
        let Some(open) = self.peek() else { return };
        let close = match open {
            Token::LBrace => Token::RBrace,
            Token::LParen => Token::RParen,
            Token::LBracket => Token::RBracket,
            Token::Lt => Token::Gt,
            _ => {
                self.pos += 1;
                return;
            }
        };
        let mut depth = 0usize;
        while let Some(token) = self.peek() {
            self.pos += 1;
            if token == open {
                depth += 1;
            } else if token == close {
                depth -= 1;
                if depth == 0 {
                    return;
                }
            }
        }
    }

    /// Skip through the next `;`, stopping early at `@`-keywords, directives
    /// and unmatched closing braces.
    fn skip_statement(&mut self) {
        while let Some(token) = self.peek() {
            match token {
                Token::Semi => {
                    self.pos += 1;
                    return;
                }
                Token::LBrace | Token::LParen | Token::LBracket => self.skip_balanced(),
                Token::AtKeyword | Token::Directive | Token::RBrace => return,
                _ => self.pos += 1,
            }
        }
    }

    /// Index of the token closing the group opened at `open`, searching below `limit`.
    fn matching_close(&self, open: usize, limit: usize) -> Option<usize> {
        let open_token = self.token_at(open)?;
        let close_token = match open_token {
            Token::LParen => Token::RParen,
            Token::LBracket => Token::RBracket,
            Token::LBrace => Token::RBrace,
            _ => return None,
        };
        let mut depth = 0usize;
        for i in open..limit.min(self.toks.len()) {
            let token = self.toks[i].token;
            if token == open_token {
                depth += 1;
            } else if token == close_token {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
        }
        None
    }

    /// Text inside the parenthesized group at the current position; consumes it.
    fn paren_text(&mut self) -> String {
        let open = self.pos;
        self.skip_balanced();
        let inner_end = if self.pos > open + 1 && self.token_at(self.pos - 1) == Some(Token::RParen) {
            self.pos - 1
        } else {
            self.pos
        };
        self.text_between(open + 1, inner_end)
    }

    /// Identifiers inside the `<...>` group at the current position; consumes it.
    fn name_list(&mut self) -> Vec<String> {
        let mut names = Vec::new();
        let mut depth = 0usize;
        while let Some(token) = self.peek() {
            match token {
                Token::Lt => depth += 1,
                Token::Gt => {
                    depth -= 1;
                    if depth == 0 {
                        self.pos += 1;
                        break;
                    }
                }
                Token::Ident if depth == 1 => names.push(self.text(self.pos).to_string()),
                Token::Semi | Token::LBrace | Token::AtKeyword => break,
                _ => {}
            }
            self.pos += 1;
        }
        names
    }

    // -- Top level ------------------------------------------------------------

    fn scan(&mut self) -> Vec<Cursor> {
        let mut out = Vec::new();
        while let Some(token) = self.peek() {
            match token {
                Token::Directive => {
                    if let Some(cursor) = self.directive() {
                        out.push(cursor);
                    }
                }
                Token::AtKeyword => self.objc_declaration(&mut out),
                Token::Semi | Token::RBrace => self.pos += 1,
                _ => self.c_declaration(&mut out),
            }
        }
        out
    }

    fn directive(&mut self) -> Option<Cursor> {
        let idx = self.pos;
        self.pos += 1;
        let caps = RE_DEFINE.captures(self.text(idx))?;
        let name = caps.get(1)?;
        let start = self.toks[idx].span.start;
        let offset = start + name.start();
        Some(Cursor::new(
            CursorKind::MacroDefinition,
            name.as_str(),
            self.location(offset),
            offset,
            start,
        ))
    }

    fn objc_declaration(&mut self, out: &mut Vec<Cursor>) {
        match self.text(self.pos) {
            "@interface" | "@implementation" => {
                if let Some(cursor) = self.objc_container() {
                    out.push(cursor);
                }
            }
            "@protocol" => {
                if let Some(cursor) = self.protocol() {
                    out.push(cursor);
                }
            }
            "@class" | "@import" | "@compatibility_alias" => {
                self.pos += 1;
                self.skip_statement();
            }
            "@end" => {
                self.warn(self.pos, "@end without a matching container");
                self.pos += 1;
            }
            _ => self.pos += 1,
        }
    }

    // -- Objective-C ----------------------------------------------------------

    fn objc_container(&mut self) -> Option<Cursor> {
        let start = self.pos;
        let keyword = self.text(start);
        let is_impl = keyword == "@implementation";
        self.pos += 1;
        if self.peek() != Some(Token::Ident) {
            self.warn(start, format!("{} without a class name", keyword));
            return None;
        }
        let class_idx = self.pos;
        let class_name = self.text(class_idx).to_string();
        self.pos += 1;

        let mut detail = CursorDetail::default();

        if self.peek() == Some(Token::Lt) {
            let names = self.name_list();
            // `@interface Foo<T> : Base` declares generic parameters, not protocols
            if !matches!(self.peek(), Some(Token::Colon) | Some(Token::LParen)) {
                detail.protocols = names;
            }
        }

        let (kind, spelling, name_idx) = if self.peek() == Some(Token::LParen) {
            self.pos += 1;
            let category_idx = (self.peek() == Some(Token::Ident)).then_some(self.pos);
            while let Some(token) = self.peek() {
                self.pos += 1;
                if token == Token::RParen {
                    break;
                }
            }
            detail.base_class = Some(class_name);
            let kind = if is_impl {
                CursorKind::ObjCCategoryImplDecl
            } else {
                CursorKind::ObjCCategoryDecl
            };
            match category_idx {
                Some(idx) => (kind, self.text(idx).to_string(), idx),
                None => (kind, String::new(), class_idx),
            }
        } else {
            let kind = if is_impl {
                CursorKind::ObjCImplementationDecl
            } else {
                CursorKind::ObjCInterfaceDecl
            };
            (kind, class_name, class_idx)
        };

        if self.peek() == Some(Token::Colon) {
            self.pos += 1;
            if self.peek() == Some(Token::Ident) {
                detail.superclass = Some(self.text(self.pos).to_string());
                self.pos += 1;
            }
        }
        if self.peek() == Some(Token::Lt) {
            detail.protocols.extend(self.name_list());
        }
        if self.peek() == Some(Token::LBrace) {
            self.skip_balanced();
        }

        let children = self.objc_members(start);
        Some(
            self.cursor(kind, spelling, name_idx, start)
                .with_detail(detail)
                .with_children(children),
        )
    }

    fn protocol(&mut self) -> Option<Cursor> {
        let start = self.pos;
        self.pos += 1;
        if self.peek() != Some(Token::Ident) {
            self.warn(start, "@protocol without a name");
            return None;
        }
        let name_idx = self.pos;
        self.pos += 1;

        // forward declaration: `@protocol A;` or `@protocol A, B;`
        if matches!(self.peek(), Some(Token::Semi) | Some(Token::Comma)) {
            self.skip_statement();
            return None;
        }

        let mut detail = CursorDetail::default();
        if self.peek() == Some(Token::Lt) {
            detail.protocols = self.name_list();
        }

        let children = self.objc_members(start);
        Some(
            self.cursor(CursorKind::ObjCProtocolDecl, self.text(name_idx), name_idx, start)
                .with_detail(detail)
                .with_children(children),
        )
    }

    fn objc_members(&mut self, start: usize) -> Vec<Cursor> {
        let mut members = Vec::new();
        loop {
            let Some(token) = self.peek() else {
                self.warn(start, "missing @end");
                break;
            };
            match token {
                Token::AtKeyword => match self.text(self.pos) {
                    "@end" => {
                        self.pos += 1;
                        break;
                    }
                    "@property" => {
                        if let Some(cursor) = self.property() {
                            members.push(cursor);
                        }
                    }
                    "@interface" | "@implementation" | "@protocol" => {
                        self.warn(start, "missing @end");
                        break;
                    }
                    "@synthesize" | "@dynamic" | "@class" | "@import" => {
                        self.pos += 1;
                        self.skip_statement();
                    }
                    _ => self.pos += 1,
                },
                Token::Minus | Token::Plus => {
                    if let Some(cursor) = self.method() {
                        members.push(cursor);
                    }
                }
                Token::LBrace => self.skip_balanced(),
                Token::Directive => {
                    // reported as a root by the tokenizer
                    if let Some(cursor) = self.directive() {
                        members.push(cursor);
                    }
                }
                Token::Semi | Token::RBrace => self.pos += 1,
                _ => self.c_declaration(&mut members),
            }
        }
        members
    }

    fn method(&mut self) -> Option<Cursor> {
        let start = self.pos;
        let is_class = self.peek() == Some(Token::Plus);
        self.pos += 1;

        let mut detail = CursorDetail::default();
        let return_type = if self.peek() == Some(Token::LParen) {
            self.paren_text()
        } else {
            "id".to_string()
        };
        detail.signature.push(SignatureFragment::Return {
            type_name: return_type,
        });

        let mut selector = String::new();
        let mut name_idx = None;
        loop {
            match (self.peek(), self.peek_at(1)) {
                (Some(Token::Ident), Some(Token::Colon)) => {
                    let keyword = self.text(self.pos).to_string();
                    name_idx.get_or_insert(self.pos);
                    self.pos += 2;
                    self.method_parameter(Some(keyword), &mut selector, &mut detail);
                }
                (Some(Token::Colon), _) => {
                    name_idx.get_or_insert(self.pos);
                    self.pos += 1;
                    self.method_parameter(None, &mut selector, &mut detail);
                }
                (Some(Token::Ident), _) if selector.is_empty() => {
                    name_idx = Some(self.pos);
                    selector = self.text(self.pos).to_string();
                    self.pos += 1;
                    break;
                }
                _ => break,
            }
        }

        if self.peek() == Some(Token::Comma) && self.peek_at(1) == Some(Token::Ellipsis) {
            self.pos += 2;
            detail.signature.push(SignatureFragment::Variadic);
        }

        // attributes, then `;` or a body
        while let Some(token) = self.peek() {
            match token {
                Token::Semi => {
                    self.pos += 1;
                    break;
                }
                Token::LBrace => {
                    self.skip_balanced();
                    break;
                }
                Token::LParen => self.skip_balanced(),
                Token::Minus | Token::Plus | Token::AtKeyword => break,
                _ => self.pos += 1,
            }
        }

        let Some(name_idx) = name_idx.filter(|_| !selector.is_empty()) else {
            self.warn(start, "method declaration without a selector");
            return None;
        };
        let kind = if is_class {
            CursorKind::ObjCClassMethodDecl
        } else {
            CursorKind::ObjCInstanceMethodDecl
        };
        Some(self.cursor(kind, selector, name_idx, start).with_detail(detail))
    }

    fn method_parameter(
        &mut self,
        keyword: Option<String>,
        selector: &mut String,
        detail: &mut CursorDetail,
    ) {
        if let Some(keyword) = &keyword {
            selector.push_str(keyword);
        }
        selector.push(':');
        let type_name = if self.peek() == Some(Token::LParen) {
            self.paren_text()
        } else {
            "id".to_string()
        };
        let name = if self.peek() == Some(Token::Ident) && self.peek_at(1) != Some(Token::Colon) {
            let name = self.text(self.pos).to_string();
            self.pos += 1;
            name
        } else {
            String::new()
        };
        detail.signature.push(SignatureFragment::Parameter {
            keyword,
            type_name,
            name,
        });
    }

    fn property(&mut self) -> Option<Cursor> {
        let start = self.pos;
        self.pos += 1;

        let mut detail = CursorDetail::default();
        if self.peek() == Some(Token::LParen) {
            detail.attributes = self
                .paren_text()
                .split(',')
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty())
                .collect();
        }

        let decl_start = self.pos;
        let mut end = self.pos;
        let mut depth = 0usize;
        while let Some(token) = self.token_at(end) {
            match token {
                Token::LParen | Token::LBracket => depth += 1,
                Token::RParen | Token::RBracket => depth = depth.saturating_sub(1),
                Token::Semi if depth == 0 => break,
                Token::AtKeyword | Token::Minus | Token::Plus if depth == 0 => break,
                _ => {}
            }
            end += 1;
        }
        self.pos = end;
        if self.peek() == Some(Token::Semi) {
            self.pos += 1;
        }

        let Some(name_idx) = self.declarator_name(decl_start, end) else {
            self.warn(start, "@property without a name");
            return None;
        };
        detail.type_name = Some(self.type_text(decl_start, end, name_idx));
        Some(
            self.cursor(CursorKind::ObjCPropertyDecl, self.text(name_idx), name_idx, start)
                .with_detail(detail),
        )
    }

    // -- C declarations -------------------------------------------------------

    /// End of the declaration head starting at `start`: the index of the
    /// terminating `;` or `{` (returned alongside), or of the token that
    /// interrupted it.
    fn declaration_extent(&self, start: usize) -> (usize, Option<Token>) {
        let mut depth = 0usize;
        let mut i = start;
        while let Some(token) = self.token_at(i) {
            match token {
                Token::LParen | Token::LBracket => depth += 1,
                Token::RParen | Token::RBracket => depth = depth.saturating_sub(1),
                Token::Semi | Token::LBrace if depth == 0 => return (i, Some(token)),
                Token::AtKeyword | Token::Directive | Token::RBrace if depth == 0 => {
                    return (i, None)
                }
                _ => {}
            }
            i += 1;
        }
        (i, None)
    }

    /// A documentation comment on its own line inside the head restarts the
    /// declaration there; whatever came before was a macro or other junk.
    fn declaration_start(&self, start: usize, end: usize) -> usize {
        let mut first = start;
        for i in start + 1..end {
            match self.toks[i].token {
                Token::LParen | Token::LBracket | Token::Eq => break,
                _ if self.toks[i].after_comment => first = i,
                _ => {}
            }
        }
        first
    }

    fn find_word(&self, range: Range<usize>, words: &[&str]) -> Option<usize> {
        range
            .into_iter()
            .find(|&i| self.token_at(i) == Some(Token::Ident) && words.contains(&self.text(i)))
    }

    fn c_declaration(&mut self, out: &mut Vec<Cursor>) {
        let start = self.pos;
        let (end, terminator) = self.declaration_extent(start);
        let Some(terminator) = terminator else {
            // macro invocation or junk in front of an @-keyword or directive
            self.pos = end.max(start + 1);
            return;
        };

        let decl_start = self.declaration_start(start, end);
        let is_typedef = self.is_word(decl_start, "typedef");
        let enum_macro = self.find_word(decl_start..end, ENUM_MACROS);
        let enum_kw = self.find_word(decl_start..end, &["enum"]);
        let record_kw = self.find_word(decl_start..end, &["struct", "union", "class"]);
        let assign = (decl_start..end).find(|&i| self.toks[i].token == Token::Eq);

        if terminator == Token::LBrace {
            if let Some(eq) = assign {
                if let Some(cursor) = self.variable(decl_start, eq) {
                    out.push(cursor);
                }
                self.pos = end;
                self.skip_balanced();
                self.skip_statement();
            } else if enum_macro.is_some() {
                self.enum_declaration(decl_start, end, is_typedef, enum_macro, enum_kw, out);
            } else if let Some(cursor) = self.function(decl_start, end) {
                out.push(cursor);
                self.pos = end;
                self.skip_balanced();
            } else if enum_kw.is_some() {
                self.enum_declaration(decl_start, end, is_typedef, None, enum_kw, out);
            } else if let Some(kw) = record_kw {
                self.record_declaration(decl_start, end, kw, is_typedef, out);
            } else if self.is_word(decl_start, "namespace")
                || (self.is_word(decl_start, "extern")
                    && self.token_at(decl_start + 1) == Some(Token::StringLiteral))
            {
                // step inside; the closing brace is skipped as a stray token
                self.pos = end + 1;
            } else {
                self.pos = end;
                self.skip_balanced();
            }
            return;
        }

        self.pos = end + 1;
        let head_len = end - decl_start;

        if is_typedef {
            if let Some(name_idx) = self.declarator_name(decl_start + 1, end) {
                let mut cursor = self.cursor(CursorKind::TypedefDecl, self.text(name_idx), name_idx, decl_start);
                cursor.detail.type_name = Some(self.type_text(decl_start, end, name_idx));
                out.push(cursor);
            }
            return;
        }
        if head_len == 2 && (record_kw == Some(decl_start) || enum_kw == Some(decl_start)) {
            // forward declaration
            return;
        }
        if self.find_word(decl_start..decl_start + 1, &["using", "template", "namespace", "return"]).is_some() {
            return;
        }
        if let Some(cursor) = self.function(decl_start, end) {
            out.push(cursor);
            return;
        }
        self.variables(decl_start, end, out);
    }

    /// One variable per top-level declarator: `int a, *b = 0;` declares two.
    fn variables(&self, from: usize, end: usize, out: &mut Vec<Cursor>) {
        let mut segments = Vec::new();
        let mut depth = 0usize;
        let mut segment_start = from;
        for i in from..end {
            match self.toks[i].token {
                Token::LParen | Token::LBracket | Token::LBrace => depth += 1,
                Token::RParen | Token::RBracket | Token::RBrace => depth = depth.saturating_sub(1),
                Token::Comma if depth == 0 => {
                    segments.push(segment_start..i);
                    segment_start = i + 1;
                }
                _ => {}
            }
        }
        segments.push(segment_start..end);

        let initializer_free = |segment: &Range<usize>| {
            segment
                .clone()
                .find(|&i| self.toks[i].token == Token::Eq)
                .unwrap_or(segment.end)
        };
        let mut segments = segments.into_iter();
        let Some(first) = segments.next() else {
            return;
        };
        let first_limit = initializer_free(&first);
        let Some(cursor) = self.variable(from, first_limit) else {
            return;
        };
        out.push(cursor);

        // the base type is shared; pointer stars belong to each declarator
        let Some(first_name) = self.declarator_name(from, first_limit) else {
            return;
        };
        let type_start = self.skip_storage(from, first_name);
        let mut base_end = first_name;
        while base_end > type_start
            && matches!(self.token_at(base_end - 1), Some(Token::Star) | Some(Token::Caret))
        {
            base_end -= 1;
        }
        let base = self.text_between(type_start, base_end);

        for segment in segments {
            let limit = initializer_free(&segment);
            let Some(name_idx) = self.declarator_name(segment.start, limit) else {
                continue;
            };
            let mut cursor = self.cursor(CursorKind::VarDecl, self.text(name_idx), name_idx, segment.start);
            let own = self.type_text(segment.start, limit, name_idx);
            cursor.detail.type_name = Some(normalize(&format!("{} {}", base, own)));
            out.push(cursor);
        }
    }

    fn variable(&self, from: usize, to: usize) -> Option<Cursor> {
        let name_idx = self.declarator_name(from, to)?;
        let type_start = self.skip_storage(from, name_idx);
        if type_start >= name_idx {
            return None;
        }
        let mut cursor = self.cursor(CursorKind::VarDecl, self.text(name_idx), name_idx, from);
        cursor.detail.type_name = Some(self.type_text(from, to, name_idx));
        Some(cursor)
    }

    fn function(&self, from: usize, end: usize) -> Option<Cursor> {
        // first `(` that is not an attribute's argument group
        let mut i = from;
        let open = loop {
            let open = (i..end).find(|&j| self.toks[j].token == Token::LParen)?;
            if open > from
                && self.token_at(open - 1) == Some(Token::Ident)
                && is_attribute_word(self.text(open - 1))
            {
                i = self.matching_close(open, end)? + 1;
                continue;
            }
            break open;
        };
        if open == from || self.token_at(open - 1) != Some(Token::Ident) {
            return None;
        }
        if matches!(self.token_at(open + 1), Some(Token::Star) | Some(Token::Caret)) {
            return None;
        }
        let name_idx = open - 1;
        if RESERVED_WORDS.contains(&self.text(name_idx)) {
            return None;
        }
        let type_start = self.skip_storage(from, name_idx);
        if type_start >= name_idx {
            // `MACRO(args);` has no return type
            return None;
        }
        let close = self.matching_close(open, end)?;

        let mut detail = CursorDetail::default();
        detail.signature.push(SignatureFragment::Return {
            type_name: self.text_between(type_start, name_idx),
        });
        detail.signature.extend(self.parameters(open + 1, close));

        Some(
            self.cursor(CursorKind::FunctionDecl, self.text(name_idx), name_idx, from)
                .with_detail(detail),
        )
    }

    fn parameters(&self, from: usize, to: usize) -> Vec<SignatureFragment> {
        let mut parts = Vec::new();
        let mut depth = 0usize;
        let mut part_start = from;
        for i in from..to {
            match self.toks[i].token {
                Token::LParen | Token::LBracket => depth += 1,
                Token::RParen | Token::RBracket => depth = depth.saturating_sub(1),
                Token::Comma if depth == 0 => {
                    parts.push(part_start..i);
                    part_start = i + 1;
                }
                _ => {}
            }
        }
        if part_start < to {
            parts.push(part_start..to);
        }

        if parts.len() == 1 && parts[0].len() == 1 && self.is_word(parts[0].start, "void") {
            return Vec::new();
        }

        parts
            .into_iter()
            .filter(|part| !part.is_empty())
            .map(|part| {
                if part.len() == 1 && self.toks[part.start].token == Token::Ellipsis {
                    return SignatureFragment::Variadic;
                }
                let named = part.len() > 1
                    && matches!(
                        self.token_at(part.end - 1),
                        Some(Token::Ident) | Some(Token::RBracket) | Some(Token::RParen)
                    );
                match self.declarator_name(part.start, part.end).filter(|_| named) {
                    Some(name_idx) => SignatureFragment::Parameter {
                        keyword: None,
                        type_name: self.type_text(part.start, part.end, name_idx),
                        name: self.text(name_idx).to_string(),
                    },
                    None => SignatureFragment::Parameter {
                        keyword: None,
                        type_name: self.text_between(part.start, part.end),
                        name: String::new(),
                    },
                }
            })
            .collect()
    }

    fn enum_declaration(
        &mut self,
        decl_start: usize,
        brace: usize,
        is_typedef: bool,
        enum_macro: Option<usize>,
        enum_kw: Option<usize>,
        out: &mut Vec<Cursor>,
    ) {
        let mut name_idx = None;
        let mut type_name = None;
        if let Some(m) = enum_macro {
            // NS_ENUM(NSInteger, Name)
            if self.token_at(m + 1) == Some(Token::LParen) {
                if let Some(close) = self.matching_close(m + 1, brace) {
                    name_idx = (m + 2..close)
                        .rev()
                        .find(|&i| self.token_at(i) == Some(Token::Ident));
                    let comma = (m + 2..close).find(|&i| self.toks[i].token == Token::Comma);
                    if let Some(comma) = comma {
                        type_name = Some(self.text_between(m + 2, comma));
                    }
                }
            }
        } else if let Some(k) = enum_kw {
            // enum [class|struct] Name [: type]
            let mut i = k + 1;
            if self.is_word(i, "class") || self.is_word(i, "struct") {
                i += 1;
            }
            if i < brace && self.token_at(i) == Some(Token::Ident) {
                name_idx = Some(i);
                i += 1;
            }
            if i < brace && self.token_at(i) == Some(Token::Colon) {
                type_name = Some(self.text_between(i + 1, brace));
            }
        }

        self.pos = brace;
        let values = self.enumerators();

        let tail_start = self.pos;
        let (tail_end, terminator) = self.declaration_extent(tail_start);
        if is_typedef && tail_end > tail_start {
            if let Some(idx) = self.declarator_name(tail_start, tail_end) {
                name_idx = Some(idx);
            }
        }
        self.pos = tail_end;
        if terminator == Some(Token::Semi) {
            self.pos += 1;
        }

        // a trailing typedef name lies after the enumerators; anchor there instead
        let anchor = enum_macro.or(enum_kw).unwrap_or(decl_start);
        let (spelling, idx) = match name_idx {
            Some(idx) if idx < brace => (self.text(idx).to_string(), idx),
            Some(idx) => (self.text(idx).to_string(), anchor),
            None => (String::new(), anchor),
        };
        let mut cursor = self
            .cursor(CursorKind::EnumDecl, spelling, idx, decl_start)
            .with_children(values);
        cursor.detail.type_name = type_name;
        out.push(cursor);
    }

    /// Enumerator list at the current `{`; consumes through the closing `}`.
    fn enumerators(&mut self) -> Vec<Cursor> {
        self.pos += 1;
        let mut values = Vec::new();
        loop {
            match self.peek() {
                None => break,
                Some(Token::RBrace) => {
                    self.pos += 1;
                    break;
                }
                Some(Token::Ident) => {
                    let idx = self.pos;
                    self.pos += 1;
                    if !is_attribute_word(self.text(idx)) {
                        values.push(self.cursor(CursorKind::EnumConstantDecl, self.text(idx), idx, idx));
                    }
                    // value expression and attributes up to `,` or `}`
                    let mut depth = 0usize;
                    while let Some(token) = self.peek() {
                        match token {
                            Token::LParen | Token::LBracket | Token::LBrace => depth += 1,
                            Token::RBrace if depth == 0 => break,
                            Token::RParen | Token::RBracket | Token::RBrace => {
                                depth = depth.saturating_sub(1)
                            }
                            Token::Comma if depth == 0 => {
                                self.pos += 1;
                                break;
                            }
                            _ => {}
                        }
                        self.pos += 1;
                    }
                }
                Some(_) => self.pos += 1,
            }
        }
        values
    }

    fn record_declaration(
        &mut self,
        decl_start: usize,
        brace: usize,
        kw: usize,
        is_typedef: bool,
        out: &mut Vec<Cursor>,
    ) {
        let kind = match self.text(kw) {
            "struct" => CursorKind::StructDecl,
            "union" => CursorKind::UnionDecl,
            _ => CursorKind::ClassDecl,
        };

        // tag name: first identifier after the keyword that is not an attribute
        let mut name_idx = None;
        let mut i = kw + 1;
        while i < brace {
            match self.toks[i].token {
                Token::Ident if is_attribute_word(self.text(i)) => i += 1,
                Token::Ident => {
                    name_idx = Some(i);
                    break;
                }
                Token::LParen => match self.matching_close(i, brace) {
                    Some(close) => i = close + 1,
                    None => break,
                },
                _ => break,
            }
        }

        self.pos = brace;
        self.skip_balanced();

        let tail_start = self.pos;
        let (tail_end, terminator) = self.declaration_extent(tail_start);
        if is_typedef && tail_end > tail_start {
            if let Some(idx) = self.declarator_name(tail_start, tail_end) {
                name_idx = Some(idx);
            }
        }
        self.pos = tail_end;
        if terminator == Some(Token::Semi) {
            self.pos += 1;
        }

        if let Some(idx) = name_idx {
            let anchor = if idx < brace { idx } else { kw };
            out.push(self.cursor(kind, self.text(idx), anchor, decl_start));
        }
    }

    // -- Declarators ----------------------------------------------------------

    /// Skips storage words, attribute macros and their argument groups.
    fn skip_storage(&self, from: usize, limit: usize) -> usize {
        let mut i = from;
        while i < limit && self.token_at(i) == Some(Token::Ident) {
            let word = self.text(i);
            if STORAGE_WORDS.contains(&word) {
                i += 1;
            } else if is_attribute_word(word) {
                i += 1;
                if self.token_at(i) == Some(Token::LParen) {
                    match self.matching_close(i, limit) {
                        Some(close) => i = close + 1,
                        None => break,
                    }
                }
            } else {
                break;
            }
        }
        i
    }

    /// Index of the name a declarator in `from..to` declares.
    fn declarator_name(&self, from: usize, to: usize) -> Option<usize> {
        // function pointer or block: `(*name)` / `(^name)`
        for i in from..to.saturating_sub(2) {
            if self.toks[i].token == Token::LParen
                && matches!(self.toks[i + 1].token, Token::Star | Token::Caret)
                && self.toks[i + 2].token == Token::Ident
            {
                return Some(i + 2);
            }
        }

        let mut depth = 0usize;
        let mut i = to;
        while i > from {
            i -= 1;
            match self.toks[i].token {
                Token::RParen | Token::RBracket => depth += 1,
                Token::LParen | Token::LBracket => depth = depth.saturating_sub(1),
                Token::Ident if depth == 0 => {
                    let word = self.text(i);
                    let has_group = i + 1 < to && self.toks[i + 1].token == Token::LParen;
                    if is_attribute_word(word) || has_group || RESERVED_WORDS.contains(&word) {
                        continue;
                    }
                    return Some(i);
                }
                _ => {}
            }
        }
        None
    }

    /// Declared type of the declarator `from..to` naming `name_idx`.
    fn type_text(&self, from: usize, to: usize, name_idx: usize) -> String {
        let first = self.skip_storage(from, name_idx);
        let before = if first < name_idx {
            &self.source[self.toks[first].span.start..self.toks[name_idx].span.start]
        } else {
            ""
        };
        let wrapped = name_idx >= from + 2
            && matches!(self.toks[name_idx - 1].token, Token::Star | Token::Caret)
            && self.toks[name_idx - 2].token == Token::LParen;
        let after = if wrapped && name_idx + 1 < to {
            &self.source[self.toks[name_idx].span.end..self.toks[to - 1].span.end]
        } else {
            ""
        };
        normalize(&format!("{}{}", before, after))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(source: &str) -> Vec<Cursor> {
        ScanFrontend.parse(source, "test.h", &[]).unwrap().root.children
    }

    fn summary(cursors: &[Cursor]) -> Vec<(CursorKind, String)> {
        cursors
            .iter()
            .map(|c| (c.kind, c.spelling.clone()))
            .collect()
    }

    #[test]
    fn interface_with_superclass_and_protocols() {
        let cursors = scan("@interface Foo : NSObject <NSCopying, NSCoding>\n- (void)bar;\n@end\n");
        assert_eq!(cursors.len(), 1);
        let foo = &cursors[0];
        assert_eq!(foo.kind, CursorKind::ObjCInterfaceDecl);
        assert_eq!(foo.spelling, "Foo");
        assert_eq!(foo.detail.superclass.as_deref(), Some("NSObject"));
        assert_eq!(foo.detail.protocols, vec!["NSCopying", "NSCoding"]);
        assert_eq!(summary(&foo.children), vec![(CursorKind::ObjCInstanceMethodDecl, "bar".to_string())]);
    }

    #[test]
    fn single_line_declarations() {
        let cursors = scan("@interface Foo @end");
        assert_eq!(summary(&cursors), vec![(CursorKind::ObjCInterfaceDecl, "Foo".to_string())]);

        let cursors = scan("@interface Foo (Bar) - (void)baz; @end");
        assert_eq!(cursors.len(), 1);
        assert_eq!(cursors[0].kind, CursorKind::ObjCCategoryDecl);
        assert_eq!(cursors[0].spelling, "Bar");
        assert_eq!(cursors[0].detail.base_class.as_deref(), Some("Foo"));
        assert_eq!(summary(&cursors[0].children), vec![(CursorKind::ObjCInstanceMethodDecl, "baz".to_string())]);
    }

    #[test]
    fn class_extension_has_empty_name() {
        let cursors = scan("@interface Foo ()\n@property (nonatomic, copy) NSString *name;\n@end\n");
        assert_eq!(cursors[0].kind, CursorKind::ObjCCategoryDecl);
        assert_eq!(cursors[0].spelling, "");
        let property = &cursors[0].children[0];
        assert_eq!(property.kind, CursorKind::ObjCPropertyDecl);
        assert_eq!(property.spelling, "name");
        assert_eq!(property.detail.attributes, vec!["nonatomic", "copy"]);
        assert_eq!(property.detail.type_name.as_deref(), Some("NSString *"));
    }

    #[test]
    fn keyword_selectors_and_signature() {
        let cursors = scan(
            "@interface Foo\n+ (id)applyXSLTFromFile:(NSString*) filename\n\ttoDocument:(NSXMLDocument*) document\n\terror:(NSError**) error;\n@end\n",
        );
        let method = &cursors[0].children[0];
        assert_eq!(method.kind, CursorKind::ObjCClassMethodDecl);
        assert_eq!(method.spelling, "applyXSLTFromFile:toDocument:error:");
        assert_eq!(
            method.detail.signature[0],
            SignatureFragment::Return {
                type_name: "id".to_string()
            }
        );
        assert_eq!(
            method.detail.signature[1],
            SignatureFragment::Parameter {
                keyword: Some("applyXSLTFromFile".to_string()),
                type_name: "NSString*".to_string(),
                name: "filename".to_string(),
            }
        );
        assert_eq!(method.detail.signature.len(), 4);
    }

    #[test]
    fn variadic_method() {
        let cursors = scan("@interface S\n+ (void) runTask:(NSString*) command, ...;\n@end\n");
        let method = &cursors[0].children[0];
        assert_eq!(method.spelling, "runTask:");
        assert_eq!(method.detail.signature.last(), Some(&SignatureFragment::Variadic));
    }

    #[test]
    fn implementation_bodies_are_skipped() {
        let cursors = scan(
            "@implementation Foo\n- (void)bar {\n  if (x) { [self baz]; }\n}\n- (int)qux { return 1; }\n@end\n",
        );
        assert_eq!(cursors[0].kind, CursorKind::ObjCImplementationDecl);
        assert_eq!(
            summary(&cursors[0].children),
            vec![
                (CursorKind::ObjCInstanceMethodDecl, "bar".to_string()),
                (CursorKind::ObjCInstanceMethodDecl, "qux".to_string()),
            ]
        );
    }

    #[test]
    fn forward_declarations_are_not_declarations() {
        assert!(scan("@class Foo, Bar;\n@protocol Baz;\nstruct S;\n").is_empty());
    }

    #[test]
    fn protocol_with_optional_section() {
        let cursors = scan("@protocol Delegate <NSObject>\n@optional\n- (void)didFinish;\n@end\n");
        assert_eq!(cursors[0].kind, CursorKind::ObjCProtocolDecl);
        assert_eq!(cursors[0].detail.protocols, vec!["NSObject"]);
        assert_eq!(cursors[0].children.len(), 1);
    }

    #[test]
    fn enums_in_all_spellings() {
        let cursors = scan(
            "typedef NS_ENUM(NSInteger, Mode) {\n  ModeA,\n  ModeB = 2,\n};\nenum Color { Red, Green };\ntypedef enum { X = (1 << 2), Y } Axis;\n",
        );
        assert_eq!(
            summary(&cursors),
            vec![
                (CursorKind::EnumDecl, "Mode".to_string()),
                (CursorKind::EnumDecl, "Color".to_string()),
                (CursorKind::EnumDecl, "Axis".to_string()),
            ]
        );
        assert_eq!(cursors[0].detail.type_name.as_deref(), Some("NSInteger"));
        assert_eq!(
            summary(&cursors[0].children),
            vec![
                (CursorKind::EnumConstantDecl, "ModeA".to_string()),
                (CursorKind::EnumConstantDecl, "ModeB".to_string()),
            ]
        );
        assert_eq!(cursors[2].children.len(), 2);
    }

    #[test]
    fn functions_typedefs_constants_and_macros() {
        let cursors = scan(
            "#import <Foundation/Foundation.h>\n#define MAX_ITEMS 10\nextern NSString *const FooErrorDomain;\nvoid FooLog(NSString *format, ...);\nstatic int helper(void) { return 1; }\ntypedef void (^FooHandler)(BOOL ok);\ntypedef struct Point Point;\n",
        );
        assert_eq!(
            summary(&cursors),
            vec![
                (CursorKind::MacroDefinition, "MAX_ITEMS".to_string()),
                (CursorKind::VarDecl, "FooErrorDomain".to_string()),
                (CursorKind::FunctionDecl, "FooLog".to_string()),
                (CursorKind::FunctionDecl, "helper".to_string()),
                (CursorKind::TypedefDecl, "FooHandler".to_string()),
                (CursorKind::TypedefDecl, "Point".to_string()),
            ]
        );
        assert_eq!(cursors[1].detail.type_name.as_deref(), Some("NSString *const"));
        let log = &cursors[2].detail.signature;
        assert_eq!(
            log[0],
            SignatureFragment::Return {
                type_name: "void".to_string()
            }
        );
        assert_eq!(log.last(), Some(&SignatureFragment::Variadic));
        assert!(cursors[3].detail.signature.len() == 1);
    }

    #[test]
    fn structs_and_unions() {
        let cursors = scan(
            "struct Point { int x; int y; };\ntypedef struct { float w; } Size;\nunion Value { int i; float f; };\n",
        );
        assert_eq!(
            summary(&cursors),
            vec![
                (CursorKind::StructDecl, "Point".to_string()),
                (CursorKind::StructDecl, "Size".to_string()),
                (CursorKind::UnionDecl, "Value".to_string()),
            ]
        );
    }

    #[test]
    fn junk_before_comment_does_not_move_extent() {
        let source = "NS_ASSUME_NONNULL_BEGIN\n/** Domain. */\nextern NSString *const Domain;\n";
        let cursors = scan(source);
        assert_eq!(cursors.len(), 1);
        let extent = cursors[0].extent_start;
        assert!(source[extent..].starts_with("extern"));
    }

    #[test]
    fn one_variable_per_declarator() {
        let cursors = scan("extern int a, b;\nstatic NSString *first = @\"x\", *second;\n");
        assert_eq!(
            summary(&cursors),
            vec![
                (CursorKind::VarDecl, "a".to_string()),
                (CursorKind::VarDecl, "b".to_string()),
                (CursorKind::VarDecl, "first".to_string()),
                (CursorKind::VarDecl, "second".to_string()),
            ]
        );
        assert_eq!(cursors[1].detail.type_name.as_deref(), Some("int"));
        assert_eq!(cursors[3].detail.type_name.as_deref(), Some("NSString *"));
    }

    #[test]
    fn attribute_prefixes_are_not_return_types() {
        let cursors = scan(
            "NS_ASSUME_NONNULL_BEGIN\nvoid h(int x);\n__attribute__((visibility(\"default\"))) void g(void);\nAPI_AVAILABLE(macos(10.12)) NSString *name(void);\n",
        );
        let returns: Vec<(String, SignatureFragment)> = cursors
            .iter()
            .map(|c| (c.spelling.clone(), c.detail.signature[0].clone()))
            .collect();
        let ret = |t: &str| SignatureFragment::Return {
            type_name: t.to_string(),
        };
        assert_eq!(
            returns,
            vec![
                ("h".to_string(), ret("void")),
                ("g".to_string(), ret("void")),
                ("name".to_string(), ret("NSString *")),
            ]
        );
    }

    #[test]
    fn macros_inside_containers_are_kept() {
        let cursors = scan("@interface Foo\n#define FOO_LIMIT 4\n- (void)bar;\n@end\n");
        assert_eq!(
            summary(&cursors[0].children),
            vec![
                (CursorKind::MacroDefinition, "FOO_LIMIT".to_string()),
                (CursorKind::ObjCInstanceMethodDecl, "bar".to_string()),
            ]
        );
    }

    #[test]
    fn slashes_and_stars_in_doc_comments() {
        let cursors = scan("@interface Foo\n/** Starts and/or resumes. */\n- (void)run;\n/** Returns a*b, see https://example.com. */\n- (int)product;\n@end\n");
        assert_eq!(cursors.len(), 1);
        assert_eq!(
            summary(&cursors[0].children),
            vec![
                (CursorKind::ObjCInstanceMethodDecl, "run".to_string()),
                (CursorKind::ObjCInstanceMethodDecl, "product".to_string()),
            ]
        );
    }

    #[test]
    fn missing_end_is_reported() {
        let unit = ScanFrontend.parse("@interface Foo\n- (void)bar;\n", "x.h", &[]).unwrap();
        assert_eq!(unit.root.children.len(), 1);
        assert!(unit.diagnostics.iter().any(|d| d.message.contains("missing @end")));
    }

    #[test]
    fn nul_bytes_fail_construction() {
        let err = ScanFrontend.parse("int x;\0", "x.c", &[]).unwrap_err();
        assert!(matches!(err, Error::Frontend { .. }));
    }

    #[test]
    fn locations_point_at_names() {
        let cursors = scan("\n@interface Foo\n  - (void)bar;\n@end\n");
        assert_eq!(cursors[0].location, SourceLocation::new("test.h", 2, 12));
        assert_eq!(cursors[0].children[0].location, SourceLocation::new("test.h", 3, 11));
    }
}
