//! The resolver: walks a parsed script, tracking definitions and resolving
//! every command invocation against the scope at that point.
//!
//! Invoking a local function analyzes its body with a clone of the current
//! scope. Dot-sourcing a file analyzes that file the same way. Both merge
//! back into the caller, so definitions made by a callee are visible
//! afterwards.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, trace, warn};

use super::Analyzer;
use super::diagnostic::{Category, Diagnostic, Location};
use super::result::AnalysisResult;
use super::scope::{LocalFunction, Resolution, ScopeState};
use crate::ast::{
    Arg, Command, Element, Expr, FunctionDef, Invocation, LoopStmt, ParamDef, Pipeline, Span, Stmt,
};
use crate::parser;
use crate::source::SourceFile;
use crate::vfs;

/// One nested analysis in progress.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Frame {
    File(PathBuf),
    Function { file: PathBuf, span: Span },
}

/// The chain of files and function bodies currently being analyzed.
///
/// Guards against runaway recursion: cyclic dot-sourcing, recursive
/// functions, and pathologically deep call chains.
#[derive(Debug, Default)]
pub(crate) struct CallPath {
    frames: Vec<Frame>,
}

impl CallPath {
    fn contains(&self, frame: &Frame) -> bool {
        self.frames.contains(frame)
    }

    fn depth(&self) -> usize {
        self.frames.len()
    }
}

/// Analyze a file read through the analyzer's filesystem.
///
/// `origin` is where the read was requested from. An unreadable file becomes
/// a syntax diagnostic there, or at line 1 of the file when there is none.
pub(crate) fn analyze_file(
    analyzer: &Analyzer,
    path: &Path,
    scope: ScopeState,
    origin: Option<Location>,
    call_path: &mut CallPath,
) -> AnalysisResult {
    match analyzer.fs.read_to_string(path) {
        Ok(text) => analyze_source(analyzer, Arc::new(SourceFile::new(path, text)), scope, call_path),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "cannot read script");
            let location = origin.unwrap_or_else(|| Location::start_of(path));
            let mut result = AnalysisResult::new(scope);
            result.syntax_errors.push(Diagnostic::emit(
                Category::Syntax,
                format!("Cannot read {}: {err}", path.display()),
                location,
            ));
            result
        }
    }
}

/// Parse and walk a loaded file.
pub(crate) fn analyze_source(
    analyzer: &Analyzer,
    source: Arc<SourceFile>,
    scope: ScopeState,
    call_path: &mut CallPath,
) -> AnalysisResult {
    debug!(path = %source.path().display(), "analyzing file");
    let parsed = parser::parse(source.text());

    call_path.frames.push(Frame::File(source.path().to_path_buf()));
    let mut walker = Walker::new(analyzer, source, scope, call_path);
    for error in parsed.errors {
        let location = walker.location(error.span);
        walker.result.syntax_errors.push(Diagnostic::emit(Category::Syntax, error.message, location));
    }
    walker.walk_statements(&parsed.program.statements);
    let result = walker.finish();
    call_path.frames.pop();
    result
}

/// Walk a function body in the context of the file that defined it.
fn analyze_body(
    analyzer: &Analyzer,
    function: &LocalFunction,
    scope: ScopeState,
    call_path: &mut CallPath,
) -> AnalysisResult {
    let definition = &function.definition;
    trace!(function = %definition.name, file = %function.source.path().display(), "analyzing function body");

    call_path.frames.push(Frame::Function {
        file: function.source.path().to_path_buf(),
        span: definition.span,
    });
    let mut walker = Walker::new(analyzer, function.source.clone(), scope, call_path);
    walker.walk_params(&definition.params);
    walker.walk_statements(&definition.body.statements);
    let result = walker.finish();
    call_path.frames.pop();
    result
}

struct Walker<'a> {
    analyzer: &'a Analyzer,
    /// File whose text the spans being walked point into.
    source: Arc<SourceFile>,
    result: AnalysisResult,
    call_path: &'a mut CallPath,
}

impl<'a> Walker<'a> {
    fn new(
        analyzer: &'a Analyzer,
        source: Arc<SourceFile>,
        scope: ScopeState,
        call_path: &'a mut CallPath,
    ) -> Self {
        Self {
            analyzer,
            source,
            result: AnalysisResult::new(scope),
            call_path,
        }
    }

    fn finish(self) -> AnalysisResult {
        self.result
    }

    fn location(&self, span: Span) -> Location {
        Location::in_file(&self.source, span)
    }

    fn report(&mut self, category: Category, message: impl Into<String>, span: Span) {
        let diagnostic = Diagnostic::emit(category, message, self.location(span));
        match category {
            Category::Syntax => self.result.syntax_errors.push(diagnostic),
            Category::Resolution => self.result.resolution_errors.push(diagnostic),
            Category::Unsupported => self.result.unsupported.push(diagnostic),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Statements
    // ═══════════════════════════════════════════════════════════════════════

    fn walk_statements(&mut self, statements: &[Stmt]) {
        for stmt in statements {
            self.walk_stmt(stmt);
        }
    }

    fn walk_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Function(definition) => self.define_function(definition),
            Stmt::Pipeline(pipeline) => self.walk_pipeline(pipeline),
            Stmt::Chain(pipelines) => {
                for pipeline in pipelines {
                    self.walk_pipeline(pipeline);
                }
            }
            Stmt::Assignment(assignment) => {
                self.walk_expr(&assignment.target);
                self.walk_stmt(&assignment.value);
            }
            Stmt::If(if_stmt) => {
                for (condition, body) in &if_stmt.clauses {
                    self.walk_statements(condition);
                    self.walk_statements(&body.statements);
                }
                if let Some(else_branch) = &if_stmt.else_branch {
                    self.walk_statements(&else_branch.statements);
                }
            }
            Stmt::Switch(switch) => {
                self.walk_expr(&switch.subject);
                for (label, body) in &switch.clauses {
                    self.walk_expr(label);
                    self.walk_statements(&body.statements);
                }
            }
            Stmt::Loop(loop_stmt) => self.walk_loop(loop_stmt),
            Stmt::Try(try_stmt) => {
                self.walk_statements(&try_stmt.body.statements);
                for catch in &try_stmt.catches {
                    self.walk_statements(&catch.body.statements);
                }
                if let Some(finally) = &try_stmt.finally {
                    self.walk_statements(&finally.statements);
                }
            }
            Stmt::Flow(flow) => {
                if let Some(value) = &flow.value {
                    self.walk_stmt(value);
                }
            }
            Stmt::Param(params) => self.walk_params(params),
            Stmt::NamedBlock(block) => self.walk_statements(&block.body.statements),
            Stmt::TypeDef(def) => {
                self.report(Category::Unsupported, "Type definitions are not analyzed", def.span);
            }
            Stmt::Using(_) | Stmt::Empty | Stmt::Error(_) => {}
        }
    }

    fn walk_loop(&mut self, loop_stmt: &LoopStmt) {
        match loop_stmt {
            LoopStmt::Foreach { iterable, body, .. } => {
                self.walk_stmt(iterable);
                self.walk_statements(&body.statements);
            }
            LoopStmt::For { header, body } | LoopStmt::While { condition: header, body } => {
                self.walk_statements(header);
                self.walk_statements(&body.statements);
            }
            LoopStmt::Do { body, condition, .. } => {
                self.walk_statements(&body.statements);
                self.walk_statements(condition);
            }
        }
    }

    fn walk_params(&mut self, params: &[ParamDef]) {
        for default in params.iter().filter_map(|p| p.default.as_ref()) {
            self.walk_expr(default);
        }
    }

    fn walk_pipeline(&mut self, pipeline: &Pipeline) {
        for element in &pipeline.elements {
            match element {
                Element::Command(command) => self.visit_command(command),
                Element::Expr(expr) => self.walk_expr(expr),
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Expressions
    // ═══════════════════════════════════════════════════════════════════════

    fn walk_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Bareword(_)
            | Expr::Number(_)
            | Expr::String(_)
            | Expr::Variable(_)
            | Expr::Splat(_)
            | Expr::Type(_) => {}
            Expr::Expandable(s) => self.walk_statements(&s.nested),
            Expr::Paren(statements) | Expr::SubExpr(statements) | Expr::ArrayExpr(statements) => {
                self.walk_statements(statements);
            }
            Expr::ScriptBlock(block) => self.walk_statements(&block.statements),
            Expr::Hashtable(entries) => {
                for (key, value) in entries {
                    self.walk_expr(key);
                    self.walk_stmt(value);
                }
            }
            Expr::Array(items) => {
                for item in items {
                    self.walk_expr(item);
                }
            }
            Expr::Binary { left, right, .. } => {
                self.walk_expr(left);
                self.walk_expr(right);
            }
            Expr::Unary { operand, .. } | Expr::Cast { operand, .. } => self.walk_expr(operand),
            Expr::Member { target, args, .. } => {
                self.walk_expr(target);
                for arg in args.iter().flatten() {
                    self.walk_expr(arg);
                }
            }
            Expr::Index { target, index } => {
                self.walk_expr(target);
                self.walk_expr(index);
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Definitions and invocations
    // ═══════════════════════════════════════════════════════════════════════

    fn define_function(&mut self, definition: &Arc<FunctionDef>) {
        let function = LocalFunction::new(definition.clone(), self.source.clone());
        if self.result.scope.define(function) {
            self.report(Category::Resolution, "Overwriting existing function", definition.span);
        }
    }

    fn visit_command(&mut self, command: &Command) {
        match self.command_name(command) {
            None => {
                self.report(Category::Unsupported, "Could not get command name", command.span);
                self.walk_expr(&command.name);
            }
            Some(name) if command.invocation == Invocation::DotSource && is_path_like(&name) => {
                self.dot_source(&name, command.span);
            }
            Some(name) => self.resolve_command(&name, command.span),
        }
        self.walk_args(&command.args);
    }

    fn walk_args(&mut self, args: &[Arg]) {
        for arg in args {
            if let Arg::Value(value) = arg {
                self.walk_expr(value);
            }
        }
    }

    /// The invoked name, when it is known without running anything.
    ///
    /// `$PSScriptRoot` in an expandable name is the directory of the file
    /// being walked, so `. "$PSScriptRoot\lib.ps1"` is static.
    fn command_name(&self, command: &Command) -> Option<String> {
        match (&command.name, command.invocation) {
            (Expr::Expandable(s), Invocation::DotSource | Invocation::Call) => {
                let dir = self.source.dir().to_string_lossy();
                let expanded = replace_variable(&s.text, "PSScriptRoot", &dir);
                (!expanded.contains('$')).then_some(expanded)
            }
            _ => command.static_name().map(str::to_string),
        }
    }

    fn resolve_command(&mut self, name: &str, span: Span) {
        if is_module_import(name) {
            trace!(command = name, "module import skipped");
            return;
        }
        if is_path_like(name) {
            self.check_script(name, span);
            return;
        }

        let function = match self.result.scope.resolve(name) {
            Resolution::External(descriptor) => {
                trace!(command = name, kind = %descriptor.kind, "external command");
                return;
            }
            Resolution::Local(function) => function.clone(),
            Resolution::Unresolved => {
                self.report(Category::Resolution, format!("{name} is not defined"), span);
                return;
            }
        };
        self.call_function(&function, span);
    }

    /// `.\tool.ps1` or `& "$PSScriptRoot\tool.ps1"`: the script must exist.
    fn check_script(&mut self, name: &str, span: Span) {
        let path = vfs::resolve(self.source.dir(), name);
        if !self.analyzer.fs.is_file(&path) {
            self.report(Category::Resolution, format!("{name} is not defined"), span);
        }
    }

    fn call_function(&mut self, function: &LocalFunction, span: Span) {
        let frame = Frame::Function {
            file: function.source.path().to_path_buf(),
            span: function.definition.span,
        };
        if self.call_path.contains(&frame) {
            trace!(function = %function.name(), "recursive call, body already on the call path");
            return;
        }
        if self.depth_limit_reached(span) {
            return;
        }
        let child = analyze_body(self.analyzer, function, self.result.scope.clone(), self.call_path);
        self.result.merge(child);
    }

    fn dot_source(&mut self, target: &str, span: Span) {
        let path = vfs::resolve(self.source.dir(), target);
        if self.call_path.contains(&Frame::File(path.clone())) {
            warn!(path = %path.display(), "recursive dot-source skipped");
            self.report(
                Category::Unsupported,
                format!("Recursive dot-source of {} skipped", path.display()),
                span,
            );
            return;
        }
        if self.depth_limit_reached(span) {
            return;
        }
        let origin = self.location(span);
        let child = analyze_file(self.analyzer, &path, self.result.scope.clone(), Some(origin), self.call_path);
        self.result.merge(child);
    }

    fn depth_limit_reached(&mut self, span: Span) -> bool {
        if self.call_path.depth() <= self.analyzer.max_depth {
            return false;
        }
        warn!(depth = self.call_path.depth(), limit = self.analyzer.max_depth, "analysis depth limit reached");
        self.report(Category::Unsupported, "Analysis depth limit reached", span);
        true
    }
}

fn is_module_import(name: &str) -> bool {
    name.eq_ignore_ascii_case("Import-Module") || name.eq_ignore_ascii_case("ipmo")
}

/// Names containing a path separator or ending in a script extension are
/// files, not commands.
fn is_path_like(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    name.contains(['/', '\\'])
        || [".ps1", ".psm1", ".psd1"].iter().any(|ext| lower.ends_with(ext))
}

/// Replace `$name` and `${name}` (ignoring case) with `value`.
///
/// `$nameSuffix` is a different variable and is left alone.
fn replace_variable(text: &str, name: &str, value: &str) -> String {
    let lower = text.to_ascii_lowercase();
    let plain = format!("${}", name.to_ascii_lowercase());
    let braced = format!("${{{}}}", name.to_ascii_lowercase());

    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < text.len() {
        let rest = &lower[i..];
        if rest.starts_with(&braced) {
            out.push_str(value);
            i += braced.len();
        } else if rest.starts_with(&plain)
            && !rest[plain.len()..].starts_with(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == ':')
        {
            out.push_str(value);
            i += plain.len();
        } else {
            let Some(c) = text[i..].chars().next() else { break };
            out.push(c);
            i += c.len_utf8();
        }
    }
    out
}
