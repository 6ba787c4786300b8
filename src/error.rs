//! Fatal errors and recoverable diagnostics.
//!
//! Construction-level failures abort the affected file and come back as
//! [`Error`]. Everything else is a [`Diagnostic`] collected on the store.

use crate::model::SourceLocation;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unsupported source file: {0}")]
    UnsupportedFile(String),

    #[error("{file}: cannot create a translation unit: {message}")]
    Frontend { file: String, message: String },

    #[error("front-end unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Trace,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Trace => "trace",
            Severity::Warning => "warning",
            Severity::Error => "error",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(
        severity: Severity,
        location: Option<SourceLocation>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            location,
            message: message.into(),
        }
    }

    pub fn trace(location: Option<SourceLocation>, message: impl Into<String>) -> Self {
        Self::new(Severity::Trace, location, message)
    }

    pub fn warning(location: Option<SourceLocation>, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, location, message)
    }

    pub fn error(location: Option<SourceLocation>, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, location, message)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(loc) => write!(f, "{}: {}: {}", loc, self.severity, self.message),
            None => write!(f, "{}: {}", self.severity, self.message),
        }
    }
}
