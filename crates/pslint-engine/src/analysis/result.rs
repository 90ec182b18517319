//! Aggregated analysis output.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::diagnostic::Diagnostic;
use super::scope::{LocalFunction, ScopeState};
use crate::registry::ExternalCommands;

/// Diagnostics from a file or function body, plus the scope it ended with.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisResult {
    pub syntax_errors: Vec<Diagnostic>,
    pub resolution_errors: Vec<Diagnostic>,
    pub unsupported: Vec<Diagnostic>,
    pub(crate) scope: ScopeState,
}

impl AnalysisResult {
    pub fn new(scope: ScopeState) -> Self {
        Self {
            syntax_errors: Vec::new(),
            resolution_errors: Vec::new(),
            unsupported: Vec::new(),
            scope,
        }
    }

    /// Fold a nested analysis into this one.
    ///
    /// Diagnostics append after ours. The child's scope replaces ours, since
    /// it started from a clone of it.
    pub fn merge(&mut self, child: AnalysisResult) {
        self.syntax_errors.extend(child.syntax_errors);
        self.resolution_errors.extend(child.resolution_errors);
        self.unsupported.extend(child.unsupported);
        self.scope = child.scope;
    }

    /// No syntax or resolution errors. Unsupported constructs don't count.
    pub fn is_clean(&self) -> bool {
        self.syntax_errors.is_empty() && self.resolution_errors.is_empty()
    }

    /// Syntax, then resolution, then unsupported.
    pub fn all_diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.syntax_errors
            .iter()
            .chain(&self.resolution_errors)
            .chain(&self.unsupported)
    }

    pub fn scope(&self) -> &ScopeState {
        &self.scope
    }

    pub fn into_scope(self) -> ScopeState {
        self.scope
    }

    pub fn local_functions(&self) -> &BTreeMap<String, LocalFunction> {
        self.scope.local_functions()
    }

    pub fn external_commands(&self) -> &Arc<ExternalCommands> {
        self.scope.external_commands()
    }

    pub fn function_names(&self) -> Vec<&str> {
        self.scope.function_names()
    }
}
