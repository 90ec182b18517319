//! Abstract Syntax Tree types for PowerShell-style scripts.
//!
//! The parser produces these; the resolver walks them. Only nodes that can
//! define functions, invoke commands, or contain nested statements carry
//! enough structure to be walked. Everything else is kept shallow.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

/// Byte range in a source file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

impl From<std::ops::Range<usize>> for Span {
    fn from(range: std::ops::Range<usize>) -> Self {
        Self::new(range.start, range.end)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// A complete script is a sequence of statements.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

/// A single statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// Function or filter definition: `function Name { ... }`
    Function(Arc<FunctionDef>),
    /// Pipeline: `Get-Item x | Select-Object Name`
    Pipeline(Pipeline),
    /// Pipelines joined by `&&` / `||`
    Chain(Vec<Pipeline>),
    /// Assignment: `$x = Get-Thing`
    Assignment(Assignment),
    /// `if (...) { } elseif (...) { } else { }`
    If(IfStmt),
    /// `switch (...) { label { } }`
    Switch(SwitchStmt),
    /// `foreach`, `for`, `while`, `do/while`, `do/until`
    Loop(LoopStmt),
    /// `try { } catch { } finally { }`
    Try(TryStmt),
    /// `return`, `throw`, `exit`, `break`, `continue`
    Flow(FlowStmt),
    /// `param(...)` block at the top of a script or script block
    Param(Vec<ParamDef>),
    /// `begin { }`, `process { }`, `end { }` inside a function body
    NamedBlock(NamedBlock),
    /// `class` or `enum` definition; body is skipped
    TypeDef(TypeDef),
    /// `using namespace ...` / `using module ...`
    Using(Span),
    /// Empty statement (newline or semicolon only)
    Empty,
    /// Tokens skipped during error recovery
    Error(Span),
}

/// Function definition. Shared by reference once registered in a scope.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    /// Name as written, minus any `global:`/`script:`/`local:`/`private:` prefix.
    pub name: String,
    /// Parameters declared inline: `function Foo($a, $b) { }`
    pub params: Vec<ParamDef>,
    pub body: ScriptBlock,
    /// Covers the whole definition, keyword through closing brace.
    pub span: Span,
}

/// Parameter declaration: `[string]$Name = 'default'`
#[derive(Debug, Clone, PartialEq)]
pub struct ParamDef {
    pub name: String,
    pub default: Option<Expr>,
}

/// A braced block of statements.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptBlock {
    pub statements: Vec<Stmt>,
    pub span: Span,
}

/// A pipeline of elements connected by `|`.
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    pub elements: Vec<Element>,
}

/// One stage of a pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Command(Command),
    /// Only the first stage can be a bare expression: `$items | Foo`
    Expr(Expr),
}

/// How a command is invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invocation {
    /// `Get-Thing`
    Plain,
    /// `& name`
    Call,
    /// `. target`
    DotSource,
}

/// A command invocation with its arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub invocation: Invocation,
    pub name: Expr,
    pub args: Vec<Arg>,
    pub span: Span,
}

impl Command {
    /// The command name, if it is known without evaluating anything.
    ///
    /// Barewords and quoted strings are static. Expandable strings are static
    /// only when they contain no `$`.
    pub fn static_name(&self) -> Option<&str> {
        match &self.name {
            Expr::Bareword(name) | Expr::String(name) => Some(name),
            Expr::Expandable(s) if !s.text.contains('$') => Some(&s.text),
            _ => None,
        }
    }
}

/// A command argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    /// `-Path`, `-Force:`
    Parameter(String),
    /// `>`, `2>&1`
    Redirect(String),
    /// Positional or parameter value
    Value(Expr),
}

/// Assignment: `$x = value`, `$x += value`
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub target: Expr,
    pub op: String,
    pub value: Box<Stmt>,
}

/// Conditional statement.
#[derive(Debug, Clone, PartialEq)]
pub struct IfStmt {
    /// `if` followed by any `elseif` clauses, in order.
    pub clauses: Vec<(Vec<Stmt>, ScriptBlock)>,
    pub else_branch: Option<ScriptBlock>,
}

/// Switch statement.
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchStmt {
    pub subject: Expr,
    pub clauses: Vec<(Expr, ScriptBlock)>,
}

/// Loop statements.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopStmt {
    /// `foreach ($item in <pipeline>) { }`
    Foreach {
        variable: String,
        iterable: Box<Stmt>,
        body: ScriptBlock,
    },
    /// `for (init; cond; step) { }`
    For { header: Vec<Stmt>, body: ScriptBlock },
    /// `while (cond) { }`
    While { condition: Vec<Stmt>, body: ScriptBlock },
    /// `do { } while (cond)` / `do { } until (cond)`
    Do {
        body: ScriptBlock,
        condition: Vec<Stmt>,
        until: bool,
    },
}

/// Exception handling.
#[derive(Debug, Clone, PartialEq)]
pub struct TryStmt {
    pub body: ScriptBlock,
    pub catches: Vec<CatchClause>,
    pub finally: Option<ScriptBlock>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatchClause {
    pub types: Vec<String>,
    pub body: ScriptBlock,
}

/// Control flow keywords.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowStmt {
    pub kind: FlowKind,
    /// Pipeline after `return`/`throw`/`exit`.
    pub value: Option<Box<Stmt>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowKind {
    Return,
    Throw,
    Exit,
    Break,
    Continue,
}

/// `begin`, `process`, `end`, `dynamicparam`, `clean`, `trap`
#[derive(Debug, Clone, PartialEq)]
pub struct NamedBlock {
    pub name: String,
    pub body: ScriptBlock,
}

/// `class Name { ... }` / `enum Name { ... }`
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDef {
    pub name: Option<String>,
    pub span: Span,
}

/// Double-quoted string content plus the statements of any `$(...)` inside it.
#[derive(Debug, Clone, PartialEq)]
pub struct Expandable {
    /// Raw content between the quotes, escapes untouched.
    pub text: String,
    /// Parsed sub-expressions, with spans pointing into the enclosing file.
    pub nested: Vec<Stmt>,
}

/// Expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Unquoted word: command name, argument, path
    Bareword(String),
    Number(String),
    /// Verbatim string, quotes and `''` escapes removed
    String(String),
    Expandable(Expandable),
    /// `$name` (without the `$`)
    Variable(String),
    /// `@name` (without the `@`)
    Splat(String),
    /// `[TypeName]`
    Type(String),
    /// `( ... )`
    Paren(Vec<Stmt>),
    /// `$( ... )`
    SubExpr(Vec<Stmt>),
    /// `@( ... )`
    ArrayExpr(Vec<Stmt>),
    /// `{ ... }`
    ScriptBlock(ScriptBlock),
    /// `@{ key = value; ... }`
    Hashtable(Vec<(Expr, Stmt)>),
    /// `a, b, c`
    Array(Vec<Expr>),
    Binary {
        left: Box<Expr>,
        op: String,
        right: Box<Expr>,
    },
    /// Prefix or postfix operator: `-not $x`, `!$x`, `$i++`
    Unary { op: String, operand: Box<Expr> },
    /// `[int]$x`
    Cast { ty: String, operand: Box<Expr> },
    /// `$x.Name`, `[Math]::Round(1.5)`
    Member {
        target: Box<Expr>,
        name: String,
        args: Option<Vec<Expr>>,
    },
    /// `$x[0]`
    Index { target: Box<Expr>, index: Box<Expr> },
}

impl fmt::Display for FlowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowKind::Return => write!(f, "return"),
            FlowKind::Throw => write!(f, "throw"),
            FlowKind::Exit => write!(f, "exit"),
            FlowKind::Break => write!(f, "break"),
            FlowKind::Continue => write!(f, "continue"),
        }
    }
}
