//! Core filesystem trait.

use std::fmt;
use std::io;
use std::path::Path;

/// Read-only filesystem interface used by the analyzer.
///
/// Paths handed to implementations are already absolute and normalized.
pub trait SourceFs: fmt::Debug + Send + Sync {
    /// Read the entire contents of a file as UTF-8.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Check if a regular file exists at `path`.
    fn is_file(&self, path: &Path) -> bool;
}
