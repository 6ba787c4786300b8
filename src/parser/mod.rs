//! Source parser: drives one tokenizer per file and populates the store.
//!
//! Every entity goes through the path filter, the kind filter and comment
//! parsing, then to the handler the dispatch table registers for its kind.
//! Members attach to the single "current container" slot; categories go to
//! the store's pending map until [`SourceParser::finish`].

pub mod merge;

use crate::comment::{CommentParser, MarkupParser};
use crate::error::{Diagnostic, Result, Severity};
use crate::frontend::scan::ScanFrontend;
use crate::frontend::Frontend;
use crate::model::{Comment, Entity, EntityKind, Node};
use crate::settings::{DiagnosticSink, LogSink, Settings};
use crate::store::{ContainerRef, Store};
use crate::tokenizer::Tokenizer;

/// Returns whether the entity ended up in the store.
type Handler = fn(&SourceParser, &mut FileState, &mut Store, Entity, Option<Comment>) -> bool;

const DISPATCH: &[(EntityKind, Handler)] = &[
    (EntityKind::Interface, SourceParser::open_container as Handler),
    (EntityKind::Protocol, SourceParser::open_container as Handler),
    (EntityKind::Enum, SourceParser::open_container as Handler),
    (EntityKind::Category, SourceParser::open_category as Handler),
    (EntityKind::ClassExtension, SourceParser::open_category as Handler),
    (EntityKind::Method, SourceParser::attach_member as Handler),
    (EntityKind::Property, SourceParser::attach_member as Handler),
    (EntityKind::EnumValue, SourceParser::attach_member as Handler),
    (EntityKind::Function, SourceParser::insert_root as Handler),
    (EntityKind::Typedef, SourceParser::insert_root as Handler),
    (EntityKind::Constant, SourceParser::insert_root as Handler),
    (EntityKind::Struct, SourceParser::insert_root as Handler),
    (EntityKind::Union, SourceParser::insert_root as Handler),
    (EntityKind::Macro, SourceParser::insert_root as Handler),
    (EntityKind::Unknown, SourceParser::skip_unknown as Handler),
];

fn handler_for(kind: EntityKind) -> Handler {
    DISPATCH
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, handler)| *handler)
        .unwrap_or(SourceParser::skip_unknown)
}

/// Counts for one `parse` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseSummary {
    /// Entities inserted or merged into the store.
    pub entities: usize,
    /// Entities dropped by the kind filter.
    pub filtered: usize,
    /// Entities dropped because of a problem.
    pub skipped: usize,
}

struct OpenContainer {
    target: ContainerRef,
    kind: EntityKind,
    name: String,
}

/// Per-file state: the current container and its active `@name` group.
#[derive(Default)]
struct FileState {
    container: Option<OpenContainer>,
    group: Option<String>,
}

impl FileState {
    fn open(&mut self, target: ContainerRef, kind: EntityKind, name: String) {
        self.container = Some(OpenContainer { target, kind, name });
        self.group = None;
    }

    fn close(&mut self) {
        self.container = None;
        self.group = None;
    }
}

pub struct SourceParser {
    settings: Settings,
    frontend: Box<dyn Frontend>,
    comments: Box<dyn CommentParser>,
    sink: Box<dyn DiagnosticSink>,
}

impl SourceParser {
    /// Parser with the built-in scanner, markup comments and `tracing` output.
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            frontend: Box::new(ScanFrontend),
            comments: Box::new(MarkupParser),
            sink: Box::new(LogSink),
        }
    }

    pub fn with_frontend(mut self, frontend: Box<dyn Frontend>) -> Self {
        self.frontend = frontend;
        self
    }

    pub fn with_comment_parser(mut self, comments: Box<dyn CommentParser>) -> Self {
        self.comments = comments;
        self
    }

    pub fn with_sink(mut self, sink: Box<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Parse `input` (the contents of `filename`) into `store`.
    ///
    /// Fails without touching the store when no translation unit can be
    /// built. Everything after that is reported as diagnostics.
    pub fn parse(&self, input: &str, filename: &str, store: &mut Store) -> Result<ParseSummary> {
        let mut summary = ParseSummary::default();
        if !self.settings.includes_path(filename) {
            self.sink.emit(&Diagnostic::trace(
                None,
                format!("{}: excluded by path filter", filename),
            ));
            return Ok(summary);
        }

        let mut tokenizer = Tokenizer::new(
            input,
            filename,
            &self.settings.clang_arguments,
            self.frontend.as_ref(),
        )?;
        let mut state = FileState::default();

        while let Some(entity) = tokenizer.next_entity() {
            for diagnostic in tokenizer.take_diagnostics() {
                self.emit(store, diagnostic);
            }

            if !self.settings.includes_kind(entity.kind) {
                summary.filtered += 1;
                if entity.kind.is_container() || entity.kind.is_category_like() {
                    state.close();
                }
                self.sink.emit(&Diagnostic::trace(
                    Some(entity.location.clone()),
                    format!("{} {} excluded by kind filter", entity.kind, entity.name),
                ));
                continue;
            }

            let comment = if entity.raw_comment.is_empty() {
                None
            } else {
                match self.comments.parse(&entity.raw_comment) {
                    Ok(parsed) => {
                        for warning in parsed.warnings {
                            self.emit(
                                store,
                                Diagnostic::warning(Some(entity.location.clone()), warning),
                            );
                        }
                        Some(parsed.comment)
                    }
                    Err(err) => {
                        self.emit(
                            store,
                            Diagnostic::warning(
                                Some(entity.location.clone()),
                                format!("{} {} skipped: {}", entity.kind, entity.name, err),
                            ),
                        );
                        summary.skipped += 1;
                        if entity.kind.is_container() || entity.kind.is_category_like() {
                            state.close();
                        }
                        continue;
                    }
                }
            };

            let handler = handler_for(entity.kind);
            if handler(self, &mut state, store, entity, comment) {
                summary.entities += 1;
            } else {
                summary.skipped += 1;
            }
        }

        for diagnostic in tokenizer.take_diagnostics() {
            self.emit(store, diagnostic);
        }
        tracing::debug!(
            "{}: {} entities, {} filtered, {} skipped",
            filename,
            summary.entities,
            summary.filtered,
            summary.skipped
        );
        Ok(summary)
    }

    /// Close the run: resolve categories, then apply the undocumented-object
    /// policy. Returns the number of unresolved categories.
    pub fn finish(&self, store: &mut Store) -> usize {
        let seen = store.diagnostics().len();
        let unresolved = store.finalize();
        for diagnostic in &store.diagnostics()[seen..] {
            self.sink.emit(diagnostic);
        }

        if self.settings.warn_undocumented {
            let warnings: Vec<Diagnostic> = store
                .undocumented()
                .into_iter()
                .map(|node| {
                    Diagnostic::warning(
                        Some(node.location.clone()),
                        format!("{} {} is not documented", node.kind, node.display_name()),
                    )
                })
                .collect();
            for warning in warnings {
                self.emit(store, warning);
            }
        }

        let keep_objects = self.settings.keep_undocumented_objects;
        let keep_members = self.settings.keep_undocumented_members;
        if !keep_objects || !keep_members {
            let removed = store.prune_undocumented(keep_objects, keep_members);
            tracing::debug!("removed {} undocumented nodes", removed);
        }
        unresolved
    }

    fn emit(&self, store: &mut Store, diagnostic: Diagnostic) {
        self.sink.emit(&diagnostic);
        if diagnostic.severity > Severity::Trace {
            store.report(diagnostic);
        }
    }

    // -- Handlers -------------------------------------------------------------

    fn open_container(
        &self,
        state: &mut FileState,
        store: &mut Store,
        entity: Entity,
        comment: Option<Comment>,
    ) -> bool {
        let kind = entity.kind;
        let name = entity.name.clone();
        let target = store.insert_root(Node::from_entity(entity, comment));
        state.open(target, kind, name);
        true
    }

    fn open_category(
        &self,
        state: &mut FileState,
        store: &mut Store,
        entity: Entity,
        comment: Option<Comment>,
    ) -> bool {
        let Some(base_class) = entity.base_class.clone() else {
            self.emit(
                store,
                Diagnostic::warning(
                    Some(entity.location.clone()),
                    format!("{} {} has no base class", entity.kind, entity.name),
                ),
            );
            state.close();
            return false;
        };
        let kind = entity.kind;
        let name = entity.name.clone();
        let target = store.insert_category(&base_class, Node::from_entity(entity, comment));
        state.open(target, kind, name);
        true
    }

    fn attach_member(
        &self,
        state: &mut FileState,
        store: &mut Store,
        mut entity: Entity,
        comment: Option<Comment>,
    ) -> bool {
        let target = state
            .container
            .as_ref()
            .filter(|open| {
                open.kind.accepts(entity.kind)
                    && entity
                        .parent
                        .as_ref()
                        .is_some_and(|p| p.kind == open.kind && p.name == open.name)
            })
            .map(|open| open.target.clone());
        let Some(target) = target else {
            self.emit(
                store,
                Diagnostic::warning(
                    Some(entity.location.clone()),
                    format!("{} {} has no enclosing container", entity.kind, entity.name),
                ),
            );
            return false;
        };

        if entity.kind != EntityKind::EnumValue {
            if entity.group.is_some() {
                state.group = entity.group.clone();
            }
            entity.group = state.group.clone();
        }
        store.insert_child(&target, Node::from_entity(entity, comment))
    }

    fn insert_root(
        &self,
        _state: &mut FileState,
        store: &mut Store,
        entity: Entity,
        comment: Option<Comment>,
    ) -> bool {
        store.insert_root(Node::from_entity(entity, comment));
        true
    }

    fn skip_unknown(
        &self,
        _state: &mut FileState,
        _store: &mut Store,
        entity: Entity,
        _comment: Option<Comment>,
    ) -> bool {
        self.sink.emit(&Diagnostic::trace(
            Some(entity.location),
            format!("unknown declaration {} skipped", entity.name),
        ));
        false
    }
}
