//! Entity tokenizer.
//!
//! Wraps one translation unit and hands out [`Entity`] descriptors one at a
//! time, in depth-first pre-order, which is lexical source order. Each entity
//! carries the documentation comment that immediately precedes its
//! declaration, if any.

use crate::error::{Diagnostic, Error, Result};
use crate::frontend::{Cursor, CursorKind, Frontend, Language};
use crate::lexer::{self, CommentStyle, Lexeme, Token};
use crate::model::{Entity, EntityKind, MethodFlavor, ParentRef};
use regex::Regex;
use std::sync::LazyLock;

static RE_GROUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[@\\]name[ \t]+([^\n]+)").unwrap());

struct Pending {
    cursor: Cursor,
    parent: Option<ParentRef>,
    in_anonymous_enum: bool,
}

pub struct Tokenizer {
    stack: Vec<Pending>,
    comments: CommentIndex,
    diagnostics: Vec<Diagnostic>,
    last_offset: Option<usize>,
    /// Where the search for the next `@name` marker begins.
    group_from: usize,
}

impl Tokenizer {
    /// Bind a tokenizer to in-memory `contents`. Fails when the file type is
    /// not a C-family source or the front-end cannot build a translation unit.
    pub fn new(
        contents: &str,
        filename: &str,
        arguments: &[String],
        frontend: &dyn Frontend,
    ) -> Result<Self> {
        if Language::from_path(filename).is_none() {
            return Err(Error::UnsupportedFile(filename.to_string()));
        }
        let unit = frontend.parse(contents, filename, arguments)?;
        tracing::debug!(
            "{}: {} top-level cursors from {}",
            filename,
            unit.root.children.len(),
            frontend.name()
        );

        let stack = unit
            .root
            .children
            .into_iter()
            .rev()
            .map(|cursor| Pending {
                cursor,
                parent: None,
                in_anonymous_enum: false,
            })
            .collect();

        Ok(Self {
            stack,
            comments: CommentIndex::new(contents),
            diagnostics: unit.diagnostics,
            last_offset: None,
            group_from: 0,
        })
    }

    /// Next entity in source order, or `None` once the unit is exhausted.
    pub fn next_entity(&mut self) -> Option<Entity> {
        while let Some(Pending {
            cursor,
            parent,
            in_anonymous_enum,
        }) = self.stack.pop()
        {
            if cursor.kind == CursorKind::CompoundStmt {
                continue;
            }

            let Some(kind) = entity_kind(&cursor, in_anonymous_enum) else {
                // not modeled itself, but its declarations are
                let anonymous_enum = cursor.kind == CursorKind::EnumDecl;
                self.push_children(cursor.children, parent, anonymous_enum);
                continue;
            };

            if cursor.spelling.is_empty() && kind != EntityKind::ClassExtension {
                self.diagnostics.push(Diagnostic::warning(
                    Some(cursor.location),
                    format!("unnamed {} skipped", kind),
                ));
                continue;
            }
            if self.last_offset.is_some_and(|last| cursor.offset < last) {
                self.diagnostics.push(Diagnostic::warning(
                    Some(cursor.location),
                    format!("{} {} is out of source order, skipped", kind, cursor.spelling),
                ));
                continue;
            }
            self.last_offset = Some(cursor.offset);

            // a macro defined inside a container is still a root
            let nested_root = parent.is_some() && !kind.is_member();
            let group = if kind.is_member() {
                self.comments.group_between(self.group_from, cursor.extent_start)
            } else {
                None
            };
            if !nested_root {
                self.group_from = cursor.offset;
            }

            let raw_comment = self
                .comments
                .preceding(cursor.extent_start)
                .unwrap_or_default()
                .to_string();

            let Cursor {
                kind: cursor_kind,
                spelling,
                location,
                detail,
                children,
                ..
            } = cursor;

            let mut entity = Entity::new(kind, spelling, location);
            entity.raw_comment = raw_comment;
            entity.parent = if in_anonymous_enum || nested_root { None } else { parent };
            entity.group = group;
            entity.flavor = match cursor_kind {
                CursorKind::ObjCInstanceMethodDecl => Some(MethodFlavor::Instance),
                CursorKind::ObjCClassMethodDecl => Some(MethodFlavor::Class),
                _ => None,
            };
            if matches!(kind, EntityKind::Method | EntityKind::Function) {
                entity.signature = detail.signature;
            }
            entity.type_name = detail.type_name;
            entity.superclass = detail.superclass;
            entity.protocols = detail.protocols;
            entity.base_class = detail.base_class;
            entity.attributes = detail.attributes;

            if kind.is_container() {
                let parent = ParentRef {
                    kind,
                    name: entity.name.clone(),
                    location: entity.location.clone(),
                };
                self.push_children(children, Some(parent), false);
            }
            return Some(entity);
        }
        None
    }

    /// Diagnostics produced so far; drains the buffer.
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    fn push_children(&mut self, children: Vec<Cursor>, parent: Option<ParentRef>, in_anonymous_enum: bool) {
        self.stack.extend(children.into_iter().rev().map(|cursor| Pending {
            cursor,
            parent: parent.clone(),
            in_anonymous_enum,
        }));
    }
}

impl Iterator for Tokenizer {
    type Item = Entity;

    fn next(&mut self) -> Option<Entity> {
        self.next_entity()
    }
}

fn entity_kind(cursor: &Cursor, in_anonymous_enum: bool) -> Option<EntityKind> {
    use CursorKind::*;
    let kind = match cursor.kind {
        ObjCInterfaceDecl | ObjCImplementationDecl => EntityKind::Interface,
        ObjCCategoryDecl | ObjCCategoryImplDecl if cursor.spelling.is_empty() => {
            EntityKind::ClassExtension
        }
        ObjCCategoryDecl | ObjCCategoryImplDecl => EntityKind::Category,
        ObjCProtocolDecl => EntityKind::Protocol,
        ObjCInstanceMethodDecl | ObjCClassMethodDecl => EntityKind::Method,
        ObjCPropertyDecl => EntityKind::Property,
        FunctionDecl => EntityKind::Function,
        EnumDecl if cursor.spelling.is_empty() => return None,
        EnumDecl => EntityKind::Enum,
        EnumConstantDecl if in_anonymous_enum => EntityKind::Constant,
        EnumConstantDecl => EntityKind::EnumValue,
        TypedefDecl => EntityKind::Typedef,
        VarDecl => EntityKind::Constant,
        StructDecl | ClassDecl => EntityKind::Struct,
        UnionDecl => EntityKind::Union,
        MacroDefinition => EntityKind::Macro,
        TranslationUnit | CompoundStmt | Other => return None,
    };
    Some(kind)
}

/// Comment tokens of one file, searchable by offset.
struct CommentIndex {
    source: String,
    lexemes: Vec<Lexeme>,
}

impl CommentIndex {
    fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            lexemes: lexer::lex(source),
        }
    }

    fn text(&self, lexeme: &Lexeme) -> &str {
        &self.source[lexeme.span.clone()]
    }

    fn doc_comment(&self, lexeme: &Lexeme) -> Option<CommentStyle> {
        if !lexeme.token.is_some_and(Token::is_comment) {
            return None;
        }
        let text = self.text(lexeme);
        lexer::doc_style(text).filter(|_| group_title(text).is_none())
    }

    /// The documentation comment ending right before `offset`: it must be the
    /// previous token, separated by at most one line break.
    fn preceding(&self, offset: usize) -> Option<&str> {
        let idx = self.lexemes.partition_point(|l| l.span.start < offset);
        let prev = self.lexemes.get(idx.checked_sub(1)?)?;
        if prev.span.end > offset || line_breaks(&self.source[prev.span.end..offset]) > 1 {
            return None;
        }
        let style = self.doc_comment(prev)?;

        let mut start = prev.span.start;
        if style == CommentStyle::Line {
            // consecutive `///` lines form one block
            let mut i = idx - 1;
            while i > 0 {
                let before = &self.lexemes[i - 1];
                let gap = &self.source[before.span.end..self.lexemes[i].span.start];
                if before.token != Some(Token::LineComment)
                    || self.doc_comment(before) != Some(CommentStyle::Line)
                    || line_breaks(gap) != 1
                {
                    break;
                }
                start = before.span.start;
                i -= 1;
            }
        }
        Some(&self.source[start..prev.span.end])
    }

    /// Title of the last `@name` marker in `from..to`.
    fn group_between(&self, from: usize, to: usize) -> Option<String> {
        self.lexemes
            .iter()
            .skip_while(|l| l.span.start < from)
            .take_while(|l| l.span.end <= to)
            .filter(|l| l.token.is_some_and(Token::is_comment))
            .filter_map(|l| group_title(self.text(l)))
            .last()
    }
}

fn line_breaks(gap: &str) -> usize {
    gap.matches('\n').count()
}

/// `Title` for `/// @name Title` and `/** @name Title */`.
fn group_title(text: &str) -> Option<String> {
    lexer::doc_style(text)?;
    let body = text
        .get(3..)?
        .trim_end()
        .trim_end_matches("*/")
        .trim_start_matches(|c: char| c.is_whitespace() || c == '*');
    let caps = RE_GROUP.captures(body)?;
    let title = caps[1].trim();
    (!title.is_empty()).then(|| title.to_string())
}
