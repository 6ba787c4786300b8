//! libclang front-end.
//!
//! Converts the libclang cursor tree of the main file into owned [`Cursor`]s
//! so nothing borrowed from the index outlives a `parse` call. Namespaces and
//! linkage specifications are flattened into their parent. libclang is loaded
//! at run time; only one instance may be alive per process, so every parse
//! holds a process-wide lock.

use super::{Cursor, CursorDetail, CursorKind, Frontend, Language, TranslationUnit};
use crate::error::{Diagnostic, Error, Result};
use crate::model::{SignatureFragment, SourceLocation};
use clang::diagnostic::Severity as ClangSeverity;
use clang::{Clang, Entity as ClangEntity, EntityKind as ClangKind, Index, Unsaved};
use regex::Regex;
use std::sync::{LazyLock, Mutex, MutexGuard};

static RE_PROPERTY_ATTRIBUTES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@property\s*\(([^)]*)\)").unwrap());

static CLANG_LOCK: Mutex<()> = Mutex::new(());

fn clang_lock() -> MutexGuard<'static, ()> {
    CLANG_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct ClangFrontend {
    _private: (),
}

impl ClangFrontend {
    /// Fails with [`Error::Unavailable`] when libclang cannot be loaded.
    pub fn new() -> Result<Self> {
        let _guard = clang_lock();
        Clang::new().map_err(Error::Unavailable)?;
        Ok(Self { _private: () })
    }
}

impl Frontend for ClangFrontend {
    fn name(&self) -> &'static str {
        "libclang"
    }

    fn parse(&self, contents: &str, path: &str, arguments: &[String]) -> Result<TranslationUnit> {
        let language =
            Language::from_path(path).ok_or_else(|| Error::UnsupportedFile(path.to_string()))?;
        let mut args: Vec<String> = language
            .clang_arguments()
            .iter()
            .map(|a| a.to_string())
            .collect();
        args.extend(arguments.iter().cloned());

        let _guard = clang_lock();
        let clang = Clang::new().map_err(Error::Unavailable)?;
        let index = Index::new(&clang, false, false);
        let unit = index
            .parser(path)
            .arguments(&args)
            .unsaved(&[Unsaved::new(path, contents)])
            .skip_function_bodies(true)
            .detailed_preprocessing_record(true)
            .parse()
            .map_err(|e| Error::Frontend {
                file: path.to_string(),
                message: e.to_string(),
            })?;

        let converter = Converter {
            path,
            source: contents,
        };
        let mut entities = Vec::new();
        flatten(unit.get_entity().get_children(), &mut entities);
        let root = Cursor::new(
            CursorKind::TranslationUnit,
            path,
            SourceLocation::new(path, 1, 1),
            0,
            0,
        )
        .with_children(converter.convert(entities));

        let diagnostics = unit
            .get_diagnostics()
            .iter()
            .filter_map(|d| {
                let location = d.get_location().get_file_location();
                let location = location
                    .file
                    .is_some()
                    .then(|| SourceLocation::new(path, location.line, location.column));
                match d.get_severity() {
                    ClangSeverity::Fatal => Some(Diagnostic::error(location, d.get_text())),
                    ClangSeverity::Error => Some(Diagnostic::warning(location, d.get_text())),
                    ClangSeverity::Warning => Some(Diagnostic::trace(location, d.get_text())),
                    _ => None,
                }
            })
            .collect();

        Ok(TranslationUnit { root, diagnostics })
    }
}

struct Converter<'s> {
    path: &'s str,
    source: &'s str,
}

impl Converter<'_> {
    /// Cursors for one level of the tree, sorted by offset. Macro definitions
    /// lexically inside a container become that container's children.
    fn convert(&self, entities: Vec<ClangEntity>) -> Vec<Cursor> {
        let names = TypedefNames::collect(&entities);
        let (mut macros, decls): (Vec<_>, Vec<_>) = entities
            .into_iter()
            .filter(|e| !names.hidden.contains(e))
            .partition(|e| e.get_kind() == ClangKind::MacroDefinition);

        let mut cursors = Vec::new();
        for entity in &decls {
            let Some(mut cursor) = self.cursor(entity, &names) else {
                continue;
            };
            if has_members(cursor.kind) {
                let end = end_offset(entity).unwrap_or(cursor.offset);
                let start = cursor.offset;
                let (inside, outside): (Vec<_>, Vec<_>) = macros
                    .into_iter()
                    .partition(|m| start_offset(m).is_some_and(|o| start < o && o < end));
                macros = outside;
                cursor
                    .children
                    .extend(inside.iter().filter_map(|m| self.cursor(m, &names)));
                cursor.children.sort_by_key(|c| c.offset);
            }
            cursors.push(cursor);
        }
        cursors.extend(macros.iter().filter_map(|m| self.cursor(m, &names)));
        cursors.sort_by_key(|c| c.offset);
        cursors
    }

    fn cursor(&self, entity: &ClangEntity, names: &TypedefNames) -> Option<Cursor> {
        let kind = cursor_kind(entity.get_kind());
        if kind == CursorKind::Other || is_forward_declaration(entity, kind) {
            return None;
        }
        let location = entity.get_location()?.get_file_location();
        let offset = location.offset as usize;
        let extent_start = start_offset(entity).unwrap_or(offset);

        let spelling = names
            .renamed
            .iter()
            .find(|(decl, _)| decl == entity)
            .map(|(_, name)| name.clone())
            .or_else(|| {
                if entity.is_anonymous() {
                    None
                } else {
                    entity.get_name()
                }
            })
            .unwrap_or_default();

        let detail = self.detail(entity, kind, &spelling, extent_start, offset);
        let cursor = Cursor::new(
            kind,
            spelling,
            SourceLocation::new(self.path, location.line, location.column),
            offset,
            extent_start,
        )
        .with_detail(detail);

        Some(if has_members(kind) {
            let mut members = Vec::new();
            flatten(entity.get_children(), &mut members);
            cursor.with_children(self.convert(members))
        } else {
            cursor
        })
    }

    fn detail(
        &self,
        entity: &ClangEntity,
        kind: CursorKind,
        spelling: &str,
        extent_start: usize,
        offset: usize,
    ) -> CursorDetail {
        let mut detail = CursorDetail::default();

        for child in entity.get_children() {
            match child.get_kind() {
                ClangKind::ObjCSuperClassRef => detail.superclass = child.get_name(),
                ClangKind::ObjCProtocolRef => detail.protocols.extend(child.get_name()),
                ClangKind::ObjCClassRef
                    if matches!(
                        kind,
                        CursorKind::ObjCCategoryDecl | CursorKind::ObjCCategoryImplDecl
                    ) =>
                {
                    detail.base_class = child.get_name()
                }
                _ => {}
            }
        }

        match kind {
            CursorKind::ObjCInstanceMethodDecl
            | CursorKind::ObjCClassMethodDecl
            | CursorKind::FunctionDecl => {
                if let Some(result) = entity.get_result_type() {
                    detail.signature.push(SignatureFragment::Return {
                        type_name: result.get_display_name(),
                    });
                }
                let is_method = kind != CursorKind::FunctionDecl;
                let keywords: Vec<&str> = spelling.split(':').collect();
                for (i, argument) in entity.get_arguments().unwrap_or_default().iter().enumerate() {
                    let keyword = keywords
                        .get(i)
                        .filter(|k| is_method && !k.is_empty())
                        .map(|k| k.to_string());
                    detail.signature.push(SignatureFragment::Parameter {
                        keyword,
                        type_name: argument
                            .get_type()
                            .map(|t| t.get_display_name())
                            .unwrap_or_default(),
                        name: argument.get_name().unwrap_or_default(),
                    });
                }
                if entity.is_variadic() {
                    detail.signature.push(SignatureFragment::Variadic);
                }
            }
            CursorKind::ObjCPropertyDecl => {
                detail.type_name = entity.get_type().map(|t| t.get_display_name());
                let head = self.source.get(extent_start..offset).unwrap_or_default();
                if let Some(caps) = RE_PROPERTY_ATTRIBUTES.captures(head) {
                    detail.attributes = caps[1]
                        .split(',')
                        .map(|a| a.trim().to_string())
                        .filter(|a| !a.is_empty())
                        .collect();
                }
            }
            CursorKind::TypedefDecl => {
                detail.type_name = entity
                    .get_typedef_underlying_type()
                    .map(|t| t.get_display_name());
            }
            CursorKind::VarDecl => {
                detail.type_name = entity.get_type().map(|t| t.get_display_name());
            }
            CursorKind::EnumDecl => {
                detail.type_name = entity
                    .get_enum_underlying_type()
                    .map(|t| t.get_display_name());
            }
            _ => {}
        }
        detail
    }
}

fn has_members(kind: CursorKind) -> bool {
    matches!(
        kind,
        CursorKind::ObjCInterfaceDecl
            | CursorKind::ObjCImplementationDecl
            | CursorKind::ObjCCategoryDecl
            | CursorKind::ObjCCategoryImplDecl
            | CursorKind::ObjCProtocolDecl
            | CursorKind::EnumDecl
    )
}

/// `@protocol P;`, `struct S;` and `enum E;` declare nothing to document.
fn is_forward_declaration(entity: &ClangEntity, kind: CursorKind) -> bool {
    matches!(
        kind,
        CursorKind::ObjCProtocolDecl
            | CursorKind::StructDecl
            | CursorKind::UnionDecl
            | CursorKind::ClassDecl
            | CursorKind::EnumDecl
    ) && !entity.is_definition()
}

fn start_offset(entity: &ClangEntity) -> Option<usize> {
    let range = entity.get_range()?;
    Some(range.get_start().get_file_location().offset as usize)
}

fn end_offset(entity: &ClangEntity) -> Option<usize> {
    let range = entity.get_range()?;
    Some(range.get_end().get_file_location().offset as usize)
}

/// Main-file declarations, with namespaces and `extern "C"` blocks opened up.
fn flatten<'tu>(entities: Vec<ClangEntity<'tu>>, out: &mut Vec<ClangEntity<'tu>>) {
    for entity in entities {
        let in_main_file = entity
            .get_location()
            .is_some_and(|l| l.is_in_main_file());
        if !in_main_file {
            continue;
        }
        match entity.get_kind() {
            ClangKind::Namespace | ClangKind::LinkageSpec | ClangKind::UnexposedDecl => {
                flatten(entity.get_children(), out)
            }
            _ => out.push(entity),
        }
    }
}

/// `typedef enum { ... } Name;` names the anonymous enum after the typedef,
/// and the typedef itself is not reported.
#[derive(Default)]
struct TypedefNames<'tu> {
    renamed: Vec<(ClangEntity<'tu>, String)>,
    hidden: Vec<ClangEntity<'tu>>,
}

impl<'tu> TypedefNames<'tu> {
    fn collect(entities: &[ClangEntity<'tu>]) -> Self {
        let mut names = Self::default();
        for typedef in entities
            .iter()
            .filter(|e| e.get_kind() == ClangKind::TypedefDecl)
        {
            let Some(decl) = typedef
                .get_typedef_underlying_type()
                .and_then(|t| t.get_declaration())
            else {
                continue;
            };
            if !matches!(
                decl.get_kind(),
                ClangKind::EnumDecl | ClangKind::StructDecl | ClangKind::UnionDecl
            ) {
                continue;
            }
            let name = typedef.get_name().unwrap_or_default();
            if decl.is_anonymous() {
                names.renamed.push((decl, name));
                names.hidden.push(*typedef);
            } else if decl.get_name().as_deref() == Some(name.as_str()) {
                names.hidden.push(*typedef);
            }
        }
        names
    }
}

fn cursor_kind(kind: ClangKind) -> CursorKind {
    match kind {
        ClangKind::ObjCInterfaceDecl => CursorKind::ObjCInterfaceDecl,
        ClangKind::ObjCImplementationDecl => CursorKind::ObjCImplementationDecl,
        ClangKind::ObjCCategoryDecl => CursorKind::ObjCCategoryDecl,
        ClangKind::ObjCCategoryImplDecl => CursorKind::ObjCCategoryImplDecl,
        ClangKind::ObjCProtocolDecl => CursorKind::ObjCProtocolDecl,
        ClangKind::ObjCInstanceMethodDecl => CursorKind::ObjCInstanceMethodDecl,
        ClangKind::ObjCClassMethodDecl => CursorKind::ObjCClassMethodDecl,
        ClangKind::ObjCPropertyDecl => CursorKind::ObjCPropertyDecl,
        ClangKind::FunctionDecl => CursorKind::FunctionDecl,
        ClangKind::EnumDecl => CursorKind::EnumDecl,
        ClangKind::EnumConstantDecl => CursorKind::EnumConstantDecl,
        ClangKind::TypedefDecl => CursorKind::TypedefDecl,
        ClangKind::VarDecl => CursorKind::VarDecl,
        ClangKind::StructDecl => CursorKind::StructDecl,
        ClangKind::UnionDecl => CursorKind::UnionDecl,
        ClangKind::ClassDecl => CursorKind::ClassDecl,
        ClangKind::MacroDefinition => CursorKind::MacroDefinition,
        ClangKind::CompoundStmt => CursorKind::CompoundStmt,
        _ => CursorKind::Other,
    }
}
