//! Settings consumed read-only by the parser: compiler arguments,
//! inclusion filters, undocumented-object policy and the diagnostic sink.

use crate::error::{Diagnostic, Severity};
use crate::model::EntityKind;
use std::collections::BTreeSet;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct Settings {
    /// Extra arguments handed to the compiler front-end (`-I`, `-D`, `-std=`...).
    pub clang_arguments: Vec<String>,
    /// Paths matching any of these are not parsed.
    pub ignored_paths: Vec<glob::Pattern>,
    pub ignored_kinds: BTreeSet<EntityKind>,
    pub keep_undocumented_objects: bool,
    pub keep_undocumented_members: bool,
    pub warn_undocumented: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            clang_arguments: Vec::new(),
            ignored_paths: Vec::new(),
            ignored_kinds: BTreeSet::new(),
            keep_undocumented_objects: true,
            keep_undocumented_members: true,
            warn_undocumented: false,
        }
    }
}

impl Settings {
    /// Add an ignore pattern. Plain names match any path component,
    /// glob patterns match the whole path or the file name.
    pub fn ignore_path(&mut self, pattern: &str) -> Result<(), glob::PatternError> {
        self.ignored_paths.push(glob::Pattern::new(pattern)?);
        Ok(())
    }

    pub fn ignore_kind(&mut self, kind: EntityKind) {
        self.ignored_kinds.insert(kind);
    }

    pub fn includes_path(&self, path: &str) -> bool {
        let path = Path::new(path);
        !self.ignored_paths.iter().any(|pattern| {
            pattern.matches_path(path)
                || path.components().any(|c| {
                    pattern.matches(&c.as_os_str().to_string_lossy())
                })
        })
    }

    pub fn includes_kind(&self, kind: EntityKind) -> bool {
        !self.ignored_kinds.contains(&kind)
    }
}

/// Receives every diagnostic as it is produced.
pub trait DiagnosticSink {
    fn emit(&self, diagnostic: &Diagnostic);
}

/// Forwards diagnostics to `tracing` at the matching level.
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn emit(&self, diagnostic: &Diagnostic) {
        match diagnostic.severity {
            Severity::Trace => tracing::trace!("{}", diagnostic),
            Severity::Warning => tracing::warn!("{}", diagnostic),
            Severity::Error => tracing::error!("{}", diagnostic),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_includes_everything() {
        let settings = Settings::default();
        assert!(settings.includes_path("src/Foo.h"));
        for kind in EntityKind::ALL {
            assert!(settings.includes_kind(kind));
        }
    }

    #[test]
    fn ignore_by_component() {
        let mut settings = Settings::default();
        settings.ignore_path("Pods").unwrap();
        assert!(!settings.includes_path("Pods/AFNetworking/AFURL.h"));
        assert!(!settings.includes_path("vendor/Pods/x.h"));
        assert!(settings.includes_path("Sources/Foo.h"));
    }

    #[test]
    fn ignore_by_glob() {
        let mut settings = Settings::default();
        settings.ignore_path("*.m").unwrap();
        assert!(!settings.includes_path("src/Foo.m"));
        assert!(settings.includes_path("src/Foo.h"));
    }

    #[test]
    fn ignore_kind_filters_only_that_kind() {
        let mut settings = Settings::default();
        settings.ignore_kind(EntityKind::Macro);
        assert!(!settings.includes_kind(EntityKind::Macro));
        assert!(settings.includes_kind(EntityKind::Constant));
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        let mut settings = Settings::default();
        assert!(settings.ignore_path("[").is_err());
    }
}
