//! Documentation comment markup.
//!
//! The parser only associates raw comments with declarations; turning the
//! raw text into a structured [`Comment`] is the job of a [`CommentParser`].
//! [`MarkupParser`] understands the common HeaderDoc/Doxygen directive subset;
//! [`PlainParser`] keeps the text as written.

use crate::model::{Comment, NamedDescription};
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

static RE_DIRECTIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[@\\]([A-Za-z]+)\b[ \t]*(.*)$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedComment {
    #[error("unterminated block comment")]
    Unterminated,
}

/// Structured comment plus the problems found while reading it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedComment {
    pub comment: Comment,
    pub warnings: Vec<String>,
}

pub trait CommentParser {
    fn parse(&self, raw: &str) -> Result<ParsedComment, MalformedComment>;
}

pub struct MarkupParser;

impl CommentParser for MarkupParser {
    fn parse(&self, raw: &str) -> Result<ParsedComment, MalformedComment> {
        let mut builder = Builder::for_comment(raw);
        for line in strip_delimiters(raw)? {
            let line = line.trim();
            if line.is_empty() {
                builder.blank();
                continue;
            }
            match RE_DIRECTIVE.captures(line) {
                Some(caps) => {
                    let rest = caps.get(2).map_or("", |m| m.as_str());
                    builder.directive(&caps[1], rest);
                }
                None => builder.push_text(line),
            }
        }
        Ok(builder.finish(raw))
    }
}

/// Paragraphs only: the first is the short description, the rest the long
/// description. Directives stay in the text.
pub struct PlainParser;

impl CommentParser for PlainParser {
    fn parse(&self, raw: &str) -> Result<ParsedComment, MalformedComment> {
        let mut builder = Builder::for_comment(raw);
        for line in strip_delimiters(raw)? {
            let line = line.trim();
            if line.is_empty() {
                builder.blank();
            } else {
                builder.push_text(line);
            }
        }
        Ok(builder.finish(raw))
    }
}

/// Comment body lines without `/**`, `*/`, leading `*` or `///`.
fn strip_delimiters(raw: &str) -> Result<Vec<&str>, MalformedComment> {
    let raw = raw.trim();
    if raw.starts_with("/*") {
        let inner = raw
            .strip_suffix("*/")
            .filter(|_| raw.len() >= 4)
            .ok_or(MalformedComment::Unterminated)?;
        let inner = inner
            .strip_prefix("/**")
            .or_else(|| inner.strip_prefix("/*!"))
            .or_else(|| inner.strip_prefix("/*"))
            .unwrap_or(inner);
        Ok(inner
            .lines()
            .map(|line| {
                let line = line.trim_start();
                match line.strip_prefix('*') {
                    Some(rest) if !rest.starts_with('/') => rest,
                    _ => line,
                }
            })
            .collect())
    } else {
        Ok(raw
            .lines()
            .map(|line| {
                let line = line.trim_start();
                line.strip_prefix("///")
                    .or_else(|| line.strip_prefix("//!"))
                    .or_else(|| line.strip_prefix("//"))
                    .unwrap_or(line)
            })
            .collect())
    }
}

#[derive(Debug, Default)]
enum Section {
    #[default]
    Description,
    Param(String),
    Returns,
    Exception(String),
    See,
    Warning,
    Bug,
    Deprecated,
    Ignored,
}

#[derive(Debug, Default)]
struct Builder {
    comment: Comment,
    warnings: Vec<String>,
    paragraphs: Vec<String>,
    section: Section,
    buffer: String,
}

impl Builder {
    /// A `/*` inside a block comment is kept as text and reported.
    fn for_comment(raw: &str) -> Self {
        let mut builder = Self::default();
        let nested = raw
            .trim_start()
            .strip_prefix("/*")
            .is_some_and(|body| body.contains("/*"));
        if nested {
            builder.warnings.push("`/*` inside a block comment".to_string());
        }
        builder
    }

    fn push_text(&mut self, text: &str) {
        if !self.buffer.is_empty() {
            self.buffer.push(' ');
        }
        self.buffer.push_str(text);
    }

    /// A blank line ends the current paragraph or directive.
    fn blank(&mut self) {
        self.flush();
    }

    fn directive(&mut self, name: &str, rest: &str) {
        self.flush();
        let (section, text) = match name {
            "param" | "exception" | "throws" => {
                let rest = rest.trim();
                let (target, text) = rest
                    .split_once(char::is_whitespace)
                    .unwrap_or((rest, ""));
                if target.is_empty() {
                    self.warnings.push(format!("@{} without a name", name));
                    (Section::Ignored, "")
                } else if name == "param" {
                    (Section::Param(target.to_string()), text)
                } else {
                    (Section::Exception(target.to_string()), text)
                }
            }
            "return" | "returns" | "result" => (Section::Returns, rest),
            "see" | "sa" => (Section::See, rest),
            "warning" => (Section::Warning, rest),
            "bug" => (Section::Bug, rest),
            "deprecated" => (Section::Deprecated, rest),
            "abstract" | "brief" | "discussion" => (Section::Description, rest),
            _ => {
                self.warnings.push(format!("unknown directive @{}", name));
                (Section::Ignored, "")
            }
        };
        self.section = section;
        let text = text.trim();
        if !text.is_empty() {
            self.push_text(text);
        }
    }

    fn flush(&mut self) {
        let text = std::mem::take(&mut self.buffer);
        let comment = &mut self.comment;
        match std::mem::take(&mut self.section) {
            Section::Description => {
                if !text.is_empty() {
                    self.paragraphs.push(text);
                }
            }
            Section::Param(name) => {
                if text.is_empty() {
                    self.warnings
                        .push(format!("@param {} has no description", name));
                }
                comment.parameters.push(NamedDescription {
                    name,
                    description: text,
                });
            }
            Section::Exception(name) => comment.exceptions.push(NamedDescription {
                name,
                description: text,
            }),
            Section::Returns if text.is_empty() => {
                self.warnings.push("empty @return".to_string());
            }
            Section::Returns => {
                comment.returns.get_or_insert(text);
            }
            Section::See => {
                comment
                    .see_also
                    .extend(text.split_whitespace().map(str::to_string));
            }
            Section::Warning if !text.is_empty() => comment.warnings.push(text),
            Section::Bug if !text.is_empty() => comment.bugs.push(text),
            Section::Deprecated => comment.deprecated = Some(text),
            Section::Warning | Section::Bug | Section::Ignored => {}
        }
    }

    fn finish(mut self, raw: &str) -> ParsedComment {
        self.flush();
        let mut paragraphs = self.paragraphs.into_iter();
        self.comment.short_description = paragraphs.next();
        let long: Vec<String> = paragraphs.collect();
        if !long.is_empty() {
            self.comment.long_description = Some(long.join("\n\n"));
        }
        self.comment.raw = raw.to_string();
        ParsedComment {
            comment: self.comment,
            warnings: self.warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> ParsedComment {
        MarkupParser.parse(raw).unwrap()
    }

    #[test]
    fn short_and_long_description() {
        let parsed = parse("/** Runs a task.\n *\n * The task is started\n * synchronously.\n *\n * Output is captured.\n */");
        let c = parsed.comment;
        assert_eq!(c.short_description.as_deref(), Some("Runs a task."));
        assert_eq!(
            c.long_description.as_deref(),
            Some("The task is started synchronously.\n\nOutput is captured.")
        );
        assert!(parsed.warnings.is_empty());
    }

    #[test]
    fn directives() {
        let parsed = parse(
            "/** Applies XSLT.\n @param filename The stylesheet.\n @param document The input\n   document.\n @return The result.\n @exception NSException Thrown on failure.\n @see runTask:\n @warning Slow.\n @deprecated Use transform: instead.\n */",
        );
        let c = parsed.comment;
        assert_eq!(c.parameters.len(), 2);
        assert_eq!(c.parameters[1].name, "document");
        assert_eq!(c.parameters[1].description, "The input document.");
        assert_eq!(c.returns.as_deref(), Some("The result."));
        assert_eq!(c.exceptions[0].name, "NSException");
        assert_eq!(c.see_also, vec!["runTask:"]);
        assert_eq!(c.warnings, vec!["Slow."]);
        assert_eq!(c.deprecated.as_deref(), Some("Use transform: instead."));
    }

    #[test]
    fn line_comments() {
        let parsed = parse("/// Brief.\n///\n/// More.");
        assert_eq!(parsed.comment.short_description.as_deref(), Some("Brief."));
        assert_eq!(parsed.comment.long_description.as_deref(), Some("More."));
    }

    #[test]
    fn backslash_directives() {
        let parsed = parse("/*! \\brief Frobs.\n \\returns Nothing.\n */");
        assert_eq!(parsed.comment.short_description.as_deref(), Some("Frobs."));
        assert_eq!(parsed.comment.returns.as_deref(), Some("Nothing."));
    }

    #[test]
    fn incomplete_directives_warn_and_drop() {
        let parsed = parse("/** Text.\n @param\n @return\n @frobnicate x\n */");
        assert!(parsed.comment.parameters.is_empty());
        assert!(parsed.comment.returns.is_none());
        assert_eq!(parsed.warnings.len(), 3);
        assert_eq!(parsed.comment.short_description.as_deref(), Some("Text."));
    }

    #[test]
    fn unterminated_block_is_malformed() {
        assert_eq!(
            MarkupParser.parse("/** never closed").unwrap_err(),
            MalformedComment::Unterminated
        );
        assert_eq!(MarkupParser.parse("/*/").unwrap_err(), MalformedComment::Unterminated);
    }

    #[test]
    fn nested_opener_is_kept_with_a_warning() {
        let parsed = parse("/** outer /* inner */");
        assert_eq!(parsed.comment.short_description.as_deref(), Some("outer /* inner"));
        assert_eq!(parsed.warnings, vec!["`/*` inside a block comment".to_string()]);
    }

    #[test]
    fn slashes_and_stars_are_text() {
        let parsed = parse("/** Starts and/or resumes a*b, see https://example.com.\n * Reads @c *ptr. */");
        assert_eq!(
            parsed.comment.short_description.as_deref(),
            Some("Starts and/or resumes a*b, see https://example.com. Reads @c *ptr.")
        );
    }

    #[test]
    fn plain_parser_keeps_directives_as_text() {
        let parsed = PlainParser
            .parse("/** Runs it.\n *\n * @param x The x.\n * @frobnicate\n */")
            .unwrap();
        assert_eq!(parsed.comment.short_description.as_deref(), Some("Runs it."));
        assert_eq!(
            parsed.comment.long_description.as_deref(),
            Some("@param x The x. @frobnicate")
        );
        assert!(parsed.comment.parameters.is_empty());
        assert!(parsed.warnings.is_empty());
    }

    #[test]
    fn empty_comment() {
        let parsed = parse("/** */");
        assert!(parsed.comment.is_empty());
        assert_eq!(parsed.comment.raw, "/** */");
    }
}
