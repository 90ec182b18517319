//! In-memory filesystem implementation.
//!
//! Used for tests and for embedders that already hold script text.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use super::path::normalize;
use super::traits::SourceFs;

/// In-memory filesystem.
///
/// Thread-safe via internal `RwLock`. Keys are normalized absolute paths.
#[derive(Debug, Default)]
pub struct MemoryFs {
    files: RwLock<HashMap<PathBuf, String>>,
}

impl MemoryFs {
    /// Create a new empty in-memory filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`MemoryFs::insert`].
    pub fn with_file(self, path: impl AsRef<Path>, text: impl Into<String>) -> Self {
        self.insert(path, text);
        self
    }

    /// Add or replace a file.
    pub fn insert(&self, path: impl AsRef<Path>, text: impl Into<String>) {
        let mut files = match self.files.write() {
            Ok(files) => files,
            Err(poisoned) => poisoned.into_inner(),
        };
        files.insert(normalize(path.as_ref()), text.into());
    }

    /// Remove a file. Returns true if it existed.
    pub fn remove(&self, path: impl AsRef<Path>) -> bool {
        let mut files = match self.files.write() {
            Ok(files) => files,
            Err(poisoned) => poisoned.into_inner(),
        };
        files.remove(&normalize(path.as_ref())).is_some()
    }
}

impl SourceFs for MemoryFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        let files = self
            .files
            .read()
            .map_err(|_| io::Error::other("memory filesystem lock poisoned"))?;
        files.get(&normalize(path)).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("not found: {}", path.display()))
        })
    }

    fn is_file(&self, path: &Path) -> bool {
        self.files
            .read()
            .map(|files| files.contains_key(&normalize(path)))
            .unwrap_or(false)
    }
}
