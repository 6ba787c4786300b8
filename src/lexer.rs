//! C-family token lexer.
//!
//! Shared by the built-in scanner front-end (declaration recognition) and the
//! tokenizer's comment lookback. Whitespace is skipped; comments, directives
//! and literals are kept as single tokens so that nothing inside them is
//! mistaken for code.

use logos::Logos;
use std::ops::Range;

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n\f\v]+")]
pub enum Token {
    #[regex(r"//[^\n]*")]
    LineComment,

    /// Runs to the first `*/`, or to the end of input when unterminated.
    #[token("/*", block_comment)]
    BlockComment,

    /// Preprocessor directive including backslash continuations.
    #[regex(r"#([^\n\\]|\\[^\n]|\\\n)*")]
    Directive,

    #[regex(r"@[A-Za-z_][A-Za-z0-9_]*")]
    AtKeyword,

    #[regex(r#"@?"([^"\\\n]|\\[^\n])*""#)]
    StringLiteral,

    #[regex(r"'([^'\\\n]|\\[^\n])*'")]
    CharLiteral,

    #[regex(r"[A-Za-z_$][A-Za-z0-9_$]*")]
    Ident,

    #[regex(r"[0-9][0-9A-Za-z_.]*")]
    Number,

    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(";")]
    Semi,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("=")]
    Eq,
    #[token("*")]
    Star,
    #[token("^")]
    Caret,
    #[token("-")]
    Minus,
    #[token("+")]
    Plus,
    #[token("...")]
    Ellipsis,

    #[regex(r"[&|!~?%/.]")]
    Punct,
}

fn block_comment(lex: &mut logos::Lexer<Token>) {
    let rest = lex.remainder();
    let len = rest.find("*/").map_or(rest.len(), |end| end + 2);
    lex.bump(len);
}

impl Token {
    pub fn is_comment(self) -> bool {
        matches!(self, Token::LineComment | Token::BlockComment)
    }
}

/// One lexed token. `token` is `None` for characters the lexer does not know.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lexeme {
    pub token: Option<Token>,
    pub span: Range<usize>,
}

pub fn lex(source: &str) -> Vec<Lexeme> {
    Token::lexer(source)
        .spanned()
        .map(|(token, span)| Lexeme {
            token: token.ok(),
            span,
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentStyle {
    /// `/** ... */` or `/*! ... */`
    Block,
    /// `/// ...` or `//! ...`
    Line,
}

/// Documentation style of a comment token, `None` for regular comments,
/// trailing `///<` comments and slash-only decoration lines.
pub fn doc_style(text: &str) -> Option<CommentStyle> {
    let rest_after = |prefix: &str| text.strip_prefix(prefix);
    if let Some(rest) = rest_after("/**").or_else(|| rest_after("/*!")) {
        if rest.starts_with('/') || rest.starts_with('<') || rest.starts_with('*') {
            return None;
        }
        return Some(CommentStyle::Block);
    }
    if let Some(rest) = rest_after("///").or_else(|| rest_after("//!")) {
        if rest.starts_with('/') || rest.starts_with('<') {
            return None;
        }
        return Some(CommentStyle::Line);
    }
    None
}

/// Maps byte offsets to 1-based line and column numbers.
#[derive(Debug, Clone)]
pub struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(source.match_indices('\n').map(|(i, _)| i + 1));
        Self { starts }
    }

    pub fn position(&self, offset: usize) -> (u32, u32) {
        let line = self.starts.partition_point(|&s| s <= offset).max(1) - 1;
        let column = offset - self.starts[line];
        (line as u32 + 1, column as u32 + 1)
    }
}
