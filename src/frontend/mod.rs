//! Compiler front-end abstraction.
//!
//! A [`Frontend`] plays the role of the compiler index: given the in-memory
//! contents of one file it produces a [`TranslationUnit`] whose cursor tree
//! the tokenizer walks. Two implementations exist:
//!
//! - [`libclang::ClangFrontend`]: libclang, loaded at run time
//! - [`scan::ScanFrontend`]: built-in declaration scanner, used when libclang
//!   is not installed and wherever output must not depend on the host

pub mod libclang;
pub mod scan;

use crate::error::{Diagnostic, Error, Result};
use crate::model::{SignatureFragment, SourceLocation};
use std::path::Path;

/// Cursor kinds the extractor distinguishes. Mirrors the libclang names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorKind {
    TranslationUnit,
    ObjCInterfaceDecl,
    ObjCImplementationDecl,
    ObjCCategoryDecl,
    ObjCCategoryImplDecl,
    ObjCProtocolDecl,
    ObjCInstanceMethodDecl,
    ObjCClassMethodDecl,
    ObjCPropertyDecl,
    FunctionDecl,
    EnumDecl,
    EnumConstantDecl,
    TypedefDecl,
    VarDecl,
    StructDecl,
    UnionDecl,
    ClassDecl,
    MacroDefinition,
    /// Statement body; never descended into.
    CompoundStmt,
    Other,
}

/// Semantic facts a front-end extracts alongside the cursor itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CursorDetail {
    pub superclass: Option<String>,
    pub protocols: Vec<String>,
    pub base_class: Option<String>,
    pub attributes: Vec<String>,
    pub type_name: Option<String>,
    pub signature: Vec<SignatureFragment>,
}

/// One node of the abstract syntax traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    pub kind: CursorKind,
    pub spelling: String,
    /// Location of the declared name.
    pub location: SourceLocation,
    /// Byte offset of the declared name.
    pub offset: usize,
    /// Byte offset where the declaration begins; comment lookback starts here.
    pub extent_start: usize,
    pub detail: CursorDetail,
    pub children: Vec<Cursor>,
}

impl Cursor {
    pub fn new(
        kind: CursorKind,
        spelling: impl Into<String>,
        location: SourceLocation,
        offset: usize,
        extent_start: usize,
    ) -> Self {
        Self {
            kind,
            spelling: spelling.into(),
            location,
            offset,
            extent_start,
            detail: CursorDetail::default(),
            children: Vec::new(),
        }
    }

    pub fn with_detail(mut self, detail: CursorDetail) -> Self {
        self.detail = detail;
        self
    }

    pub fn with_children(mut self, children: Vec<Cursor>) -> Self {
        self.children = children;
        self
    }
}

/// Source dialect, derived from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    C,
    ObjC,
    Cxx,
    ObjCxx,
}

impl Language {
    pub fn from_path(path: &str) -> Option<Self> {
        match Path::new(path).extension().and_then(|e| e.to_str()) {
            Some("c") => Some(Language::C),
            Some("h" | "m") => Some(Language::ObjC),
            Some("cc" | "cpp" | "cxx" | "hpp" | "hh") => Some(Language::Cxx),
            Some("mm") => Some(Language::ObjCxx),
            _ => None,
        }
    }

    /// Arguments selecting this dialect on a clang command line.
    pub fn clang_arguments(self) -> &'static [&'static str] {
        match self {
            Language::C => &["-x", "c"],
            Language::ObjC => &["-x", "objective-c"],
            Language::Cxx => &["-x", "c++"],
            Language::ObjCxx => &["-x", "objective-c++"],
        }
    }
}

/// File extensions recognized as source files.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["h", "c", "m", "mm", "cc", "cpp", "cxx", "hpp", "hh"];

/// Parse result of one file.
#[derive(Debug)]
pub struct TranslationUnit {
    pub root: Cursor,
    /// Problems the front-end recovered from.
    pub diagnostics: Vec<Diagnostic>,
}

pub trait Frontend {
    fn name(&self) -> &'static str;

    /// Build a translation unit from in-memory contents.
    fn parse(&self, contents: &str, path: &str, arguments: &[String]) -> Result<TranslationUnit>;
}

/// Create the front-end selected on the command line. `auto` prefers
/// libclang and falls back to the scanner when it cannot be loaded.
pub fn create_frontend(name: &str) -> Result<Box<dyn Frontend>> {
    match name {
        "auto" => match libclang::ClangFrontend::new() {
            Ok(frontend) => Ok(Box::new(frontend)),
            Err(err) => {
                tracing::info!("{}; using the built-in scanner", err);
                Ok(Box::new(scan::ScanFrontend))
            }
        },
        "libclang" | "clang" => Ok(Box::new(libclang::ClangFrontend::new()?)),
        "scan" => Ok(Box::new(scan::ScanFrontend)),
        _ => Err(Error::Unavailable(format!(
            "unknown front-end: {}. Use auto, libclang or scan",
            name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_from_extension() {
        assert_eq!(Language::from_path("Foo.h"), Some(Language::ObjC));
        assert_eq!(Language::from_path("Foo+Bar.m"), Some(Language::ObjC));
        assert_eq!(Language::from_path("x/y.mm"), Some(Language::ObjCxx));
        assert_eq!(Language::from_path("util.c"), Some(Language::C));
        assert_eq!(Language::from_path("a.hpp"), Some(Language::Cxx));
        assert_eq!(Language::from_path("README.md"), None);
        assert_eq!(Language::from_path("Makefile"), None);
    }

    #[test]
    fn every_supported_extension_has_a_language() {
        for ext in SUPPORTED_EXTENSIONS {
            assert!(Language::from_path(&format!("f.{}", ext)).is_some(), "{}", ext);
        }
    }

    #[test]
    fn scan_frontend_is_always_available() {
        assert_eq!(create_frontend("scan").unwrap().name(), "scan");
        assert!(create_frontend("gcc").is_err());
    }

    #[test]
    fn auto_always_yields_a_frontend() {
        let frontend = create_frontend("auto").unwrap();
        match libclang::ClangFrontend::new() {
            Ok(_) => assert_eq!(frontend.name(), "libclang"),
            Err(_) => assert_eq!(frontend.name(), "scan"),
        }
    }
}
