//! Cross-file command resolution.
//!
//! The analyzer walks a script in execution order and checks that every
//! command it invokes exists at that point: as an external command from the
//! registry, or as a function defined earlier by the script itself or by a
//! file it dot-sourced. It reports:
//!
//! - **Syntax errors**: unparseable statements, unreadable includes
//! - **Resolution errors**: undefined commands, redefined functions
//! - **Unsupported constructs**: dynamic command names, recursion it declines
//!   to follow, type definitions
//!
//! # Example
//!
//! ```no_run
//! use pslint_engine::analysis::Analyzer;
//! use pslint_engine::registry::CommandRegistry;
//!
//! let commands = CommandRegistry::with_builtins().list_external_commands(&[]);
//! let result = Analyzer::new(commands).analyze("build.ps1")?;
//! for diagnostic in result.all_diagnostics() {
//!     println!("{diagnostic}");
//! }
//! # Ok::<(), pslint_engine::analysis::AnalysisError>(())
//! ```

mod diagnostic;
mod result;
mod scope;
mod walker;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

pub use diagnostic::{Category, Diagnostic, DiagnosticError, Location};
pub use result::AnalysisResult;
pub use scope::{LocalFunction, Resolution, ScopeState};

use crate::registry::ExternalCommands;
use crate::source::SourceFile;
use crate::vfs::{self, LocalFs, SourceFs};

/// The root script could not be analyzed at all.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Entry point for analysis. Holds the external command map and the
/// filesystem scripts are read from.
#[derive(Debug, Clone)]
pub struct Analyzer {
    external_commands: Arc<ExternalCommands>,
    fs: Arc<dyn SourceFs>,
    max_depth: usize,
}

impl Analyzer {
    /// Nested analyses allowed below the root file before giving up.
    pub const DEFAULT_MAX_DEPTH: usize = 64;

    /// Analyzer over the local filesystem.
    pub fn new(external_commands: ExternalCommands) -> Self {
        Self {
            external_commands: Arc::new(external_commands),
            fs: Arc::new(LocalFs::new()),
            max_depth: Self::DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_fs(mut self, fs: impl SourceFs + 'static) -> Self {
        self.fs = Arc::new(fs);
        self
    }

    pub fn with_shared_fs(mut self, fs: Arc<dyn SourceFs>) -> Self {
        self.fs = fs;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn external_commands(&self) -> &Arc<ExternalCommands> {
        &self.external_commands
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// A scope with no local functions, sharing this analyzer's externals.
    pub fn empty_scope(&self) -> ScopeState {
        ScopeState::new(self.external_commands.clone())
    }

    /// Analyze a root script and everything it reaches.
    ///
    /// Fails only when the root script cannot be read. Everything else,
    /// including unreadable includes, is a diagnostic.
    pub fn analyze(&self, path: impl AsRef<Path>) -> Result<AnalysisResult, AnalysisError> {
        let path = vfs::absolute(path.as_ref());
        let text = self
            .fs
            .read_to_string(&path)
            .map_err(|source| AnalysisError::Read { path: path.clone(), source })?;
        Ok(self.analyze_source(path, text, self.empty_scope()))
    }

    /// Analyze a script starting from an existing scope.
    ///
    /// An unreadable file yields a syntax diagnostic at its first line.
    pub fn analyze_with_scope(&self, path: impl AsRef<Path>, scope: ScopeState) -> AnalysisResult {
        let path = vfs::absolute(path.as_ref());
        let mut call_path = walker::CallPath::default();
        walker::analyze_file(self, &path, scope, None, &mut call_path)
    }

    /// Analyze text already in memory as if it were the file at `path`.
    ///
    /// Relative dot-sources resolve against `path`'s directory. A relative
    /// `path` is taken from the process working directory.
    pub fn analyze_source(
        &self,
        path: impl AsRef<Path>,
        text: impl Into<String>,
        scope: ScopeState,
    ) -> AnalysisResult {
        let source = Arc::new(SourceFile::new(vfs::absolute(path.as_ref()), text));
        let mut call_path = walker::CallPath::default();
        walker::analyze_source(self, source, scope, &mut call_path)
    }
}
