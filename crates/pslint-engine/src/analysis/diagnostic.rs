//! Diagnostics produced by analysis.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::ast::Span;
use crate::source::SourceFile;

/// Which list a diagnostic belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// The parser rejected part of a file, or a file could not be read.
    Syntax,
    /// A command could not be resolved, or a function was redefined.
    Resolution,
    /// Something the analyzer does not follow and a human should check.
    Unsupported,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Syntax => write!(f, "syntax error"),
            Category::Resolution => write!(f, "resolution error"),
            Category::Unsupported => write!(f, "unsupported"),
        }
    }
}

/// Invalid diagnostic construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiagnosticError {
    #[error("diagnostic message is empty")]
    EmptyMessage,
    #[error("invalid position {line}:{column}, lines and columns start at 1")]
    InvalidPosition { line: usize, column: usize },
}

/// Where a diagnostic points: file, 1-based position, byte span, source text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Location {
    file: PathBuf,
    line: usize,
    column: usize,
    span: Span,
    text: String,
}

impl Location {
    pub fn new(
        file: impl Into<PathBuf>,
        line: usize,
        column: usize,
        span: Span,
        text: impl Into<String>,
    ) -> Result<Self, DiagnosticError> {
        if line == 0 || column == 0 {
            return Err(DiagnosticError::InvalidPosition { line, column });
        }
        Ok(Self {
            file: file.into(),
            line,
            column,
            span,
            text: text.into(),
        })
    }

    /// Location of a span inside a loaded file.
    pub fn in_file(source: &SourceFile, span: Span) -> Self {
        let (line, column) = source.line_col(span.start);
        Self {
            file: source.path().to_path_buf(),
            line,
            column,
            span,
            text: source.snippet(span).to_string(),
        }
    }

    /// Line 1 of a file that has no text to point into.
    pub fn start_of(file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            line: 1,
            column: 1,
            span: Span::default(),
            text: String::new(),
        }
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn column(&self) -> usize {
        self.column
    }

    pub fn span(&self) -> Span {
        self.span
    }

    /// Source text of the offending construct, trimmed.
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// A single finding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Diagnostic {
    category: Category,
    message: String,
    location: Location,
}

impl Diagnostic {
    pub fn new(
        category: Category,
        message: impl Into<String>,
        location: Location,
    ) -> Result<Self, DiagnosticError> {
        let message = message.into();
        if message.trim().is_empty() {
            return Err(DiagnosticError::EmptyMessage);
        }
        Ok(Self { category, message, location })
    }

    /// Internal constructor for messages the analyzer builds itself.
    pub(crate) fn emit(category: Category, message: impl Into<String>, location: Location) -> Self {
        let message = message.into();
        debug_assert!(!message.is_empty());
        Self { category, message, location }
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn location(&self) -> &Location {
        &self.location
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}: {}",
            self.location.file.display(),
            self.location.line,
            self.location.column,
            self.message
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_rejects_zero_positions() {
        assert_eq!(
            Location::new("/a.ps1", 0, 1, Span::default(), ""),
            Err(DiagnosticError::InvalidPosition { line: 0, column: 1 })
        );
        assert!(Location::new("/a.ps1", 3, 0, Span::default(), "").is_err());
        assert!(Location::new("/a.ps1", 3, 7, Span::default(), "").is_ok());
    }

    #[test]
    fn diagnostic_rejects_empty_message() {
        let location = Location::start_of("/a.ps1");
        assert_eq!(
            Diagnostic::new(Category::Syntax, "  ", location.clone()),
            Err(DiagnosticError::EmptyMessage)
        );
        let diagnostic = Diagnostic::new(Category::Resolution, "Foo is not defined", location)
            .expect("valid diagnostic");
        assert_eq!(diagnostic.to_string(), "/a.ps1:1:1: Foo is not defined");
    }

    #[test]
    fn in_file_uses_line_index_and_snippet() {
        let source = SourceFile::new("/s/main.ps1", "Write-Host hi\n  Foo -x\n");
        let location = Location::in_file(&source, Span::new(16, 22));
        assert_eq!((location.line(), location.column()), (2, 3));
        assert_eq!(location.text(), "Foo -x");
    }

    #[test]
    fn identical_findings_are_equal() {
        let source = SourceFile::new("/s/main.ps1", "Foo\n");
        let a = Diagnostic::emit(Category::Resolution, "Foo is not defined", Location::in_file(&source, Span::new(0, 3)));
        let b = a.clone();
        let mut set = std::collections::HashSet::new();
        set.insert(a);
        assert!(!set.insert(b));
    }

    #[test]
    fn serializes_category_in_snake_case() {
        let diagnostic = Diagnostic::emit(Category::Unsupported, "Could not get command name", Location::start_of("/a.ps1"));
        let json = serde_json::to_value(&diagnostic).expect("serialize");
        assert_eq!(json["category"], "unsupported");
        assert_eq!(json["location"]["line"], 1);
    }
}
