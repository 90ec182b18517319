//! Local filesystem backend.

use std::fs;
use std::io;
use std::path::Path;

use super::traits::SourceFs;

/// Reads scripts from the real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

impl LocalFs {
    pub fn new() -> Self {
        Self
    }
}

impl SourceFs for LocalFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        let bytes = fs::read(path)?;
        // A leading BOM is kept; the lexer skips it.
        String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }
}
