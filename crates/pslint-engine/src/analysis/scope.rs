//! Function scope tracking for resolution.
//!
//! Tracks which commands are callable at a point in a script. Unlike a
//! runtime scope this holds definitions, not values, and is threaded through
//! the walk by value: a nested analysis works on a clone and its final state
//! replaces the caller's when merged.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::ast::FunctionDef;
use crate::registry::{CommandDescriptor, ExternalCommands};
use crate::source::SourceFile;

/// A function defined by an analyzed script, with the file it came from.
///
/// The body is analyzed against its defining file, so relative dot-sources
/// inside it resolve next to that file rather than next to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalFunction {
    pub definition: Arc<FunctionDef>,
    pub source: Arc<SourceFile>,
}

impl LocalFunction {
    pub fn new(definition: Arc<FunctionDef>, source: Arc<SourceFile>) -> Self {
        Self { definition, source }
    }

    /// Name as written at the definition.
    pub fn name(&self) -> &str {
        &self.definition.name
    }
}

/// How a command name resolved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolution<'a> {
    External(&'a CommandDescriptor),
    Local(&'a LocalFunction),
    Unresolved,
}

/// Local functions plus the shared external command map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScopeState {
    /// Keyed by lowercased name.
    local_functions: BTreeMap<String, LocalFunction>,
    external_commands: Arc<ExternalCommands>,
}

impl ScopeState {
    pub fn new(external_commands: Arc<ExternalCommands>) -> Self {
        Self {
            local_functions: BTreeMap::new(),
            external_commands,
        }
    }

    /// Register a function. Returns `true` when it replaced an existing one.
    pub fn define(&mut self, function: LocalFunction) -> bool {
        self.local_functions
            .insert(function.name().to_lowercase(), function)
            .is_some()
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.local_functions.contains_key(&name.to_lowercase())
    }

    pub fn local_function(&self, name: &str) -> Option<&LocalFunction> {
        self.local_functions.get(&name.to_lowercase())
    }

    /// Classify a command name. External commands take precedence.
    pub fn resolve(&self, name: &str) -> Resolution<'_> {
        if let Some(descriptor) = self.external_commands.get(name) {
            Resolution::External(descriptor)
        } else if let Some(function) = self.local_function(name) {
            Resolution::Local(function)
        } else {
            Resolution::Unresolved
        }
    }

    pub fn local_functions(&self) -> &BTreeMap<String, LocalFunction> {
        &self.local_functions
    }

    pub fn external_commands(&self) -> &Arc<ExternalCommands> {
        &self.external_commands
    }

    /// Defined function names, original spelling, in lowercase-key order.
    pub fn function_names(&self) -> Vec<&str> {
        self.local_functions.values().map(LocalFunction::name).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ScriptBlock, Span};
    use crate::registry::CommandKind;

    fn function(name: &str, span: Span) -> LocalFunction {
        let definition = FunctionDef {
            name: name.to_string(),
            params: vec![],
            body: ScriptBlock { statements: vec![], span },
            span,
        };
        LocalFunction::new(Arc::new(definition), Arc::new(SourceFile::new("/s/lib.ps1", "")))
    }

    fn externals() -> Arc<ExternalCommands> {
        Arc::new(
            [CommandDescriptor::new("Write-Host", CommandKind::Cmdlet)]
                .into_iter()
                .collect(),
        )
    }

    #[test]
    fn define_is_case_insensitive_and_reports_overwrite() {
        let mut scope = ScopeState::new(externals());
        assert!(!scope.define(function("Get-Config", Span::new(0, 10))));
        assert!(scope.is_defined("get-config"));
        assert!(scope.define(function("GET-CONFIG", Span::new(20, 30))));
        assert_eq!(scope.function_names(), vec!["GET-CONFIG"]);
        assert_eq!(
            scope.local_function("Get-Config").map(|f| f.definition.span),
            Some(Span::new(20, 30))
        );
    }

    #[test]
    fn external_wins_over_local() {
        let mut scope = ScopeState::new(externals());
        scope.define(function("Write-Host", Span::default()));
        assert!(matches!(scope.resolve("write-host"), Resolution::External(_)));
        assert!(scope.is_defined("Write-Host"));
    }

    #[test]
    fn unknown_names_are_unresolved() {
        let mut scope = ScopeState::new(externals());
        scope.define(function("Build", Span::default()));
        assert!(matches!(scope.resolve("build"), Resolution::Local(_)));
        assert_eq!(scope.resolve("Deploy"), Resolution::Unresolved);
    }

    #[test]
    fn clones_are_independent() {
        let mut parent = ScopeState::new(externals());
        let mut child = parent.clone();
        child.define(function("Helper", Span::default()));
        assert!(!parent.is_defined("Helper"));
        parent.define(function("Other", Span::default()));
        assert!(!child.is_defined("Other"));
        assert!(Arc::ptr_eq(parent.external_commands(), child.external_commands()));
    }
}
