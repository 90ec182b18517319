//! Parser for PowerShell-style scripts.
//!
//! Transforms the lexer's token stream into an AST using chumsky. Recovery
//! works at statement granularity: a statement that fails to parse becomes
//! [`Stmt::Error`] and parsing resumes at the next newline, `;`, or closing
//! bracket. A partial tree is always produced alongside the errors.

use std::fmt;
use std::sync::Arc;

use chumsky::{input::ValueInput, prelude::*};

use crate::ast::{
    Arg, Assignment, CatchClause, Command, Element, Expandable, Expr, FlowKind, FlowStmt,
    FunctionDef, IfStmt, Invocation, LoopStmt, NamedBlock, ParamDef, Pipeline, Program,
    ScriptBlock, Span, Stmt, SwitchStmt, TryStmt, TypeDef,
};
use crate::lexer::{self, Token};

type Extra<'tokens> = extra::Err<Rich<'tokens, Token, SimpleSpan>>;

/// Parse error with location and context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub span: Span,
    pub message: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.message, self.span)
    }
}

impl std::error::Error for ParseError {}

/// A parsed script: the (possibly partial) tree and every syntax error found.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed {
    pub program: Program,
    pub errors: Vec<ParseError>,
}

impl Parsed {
    /// The tree if parsing was clean, otherwise the errors.
    pub fn into_result(self) -> Result<Program, Vec<ParseError>> {
        if self.errors.is_empty() {
            Ok(self.program)
        } else {
            Err(self.errors)
        }
    }
}

/// Parse script source into a Program AST.
///
/// Never fails outright. Lexer errors and unparseable statements show up in
/// [`Parsed::errors`]; the rest of the script is still in the tree.
pub fn parse(source: &str) -> Parsed {
    let (program, errors) = parse_tokens(lexer::tokenize(source), 0, source.len());
    Parsed { program, errors }
}

/// Parse a token stream whose spans are relative to `offset` in the enclosing file.
fn parse_tokens(tokens: Vec<lexer::Spanned>, offset: usize, end: usize) -> (Program, Vec<ParseError>) {
    let tokens: Vec<(Token, SimpleSpan)> = tokens
        .into_iter()
        .map(|spanned| {
            let span = (spanned.span.start + offset)..(spanned.span.end + offset);
            (spanned.token, SimpleSpan::from(span))
        })
        .collect();

    let end_span = SimpleSpan::from(end..end);
    let (output, errs) = program_parser()
        .parse(tokens.as_slice().map(end_span, |(t, s)| (t, s)))
        .into_output_errors();

    let errors = errs
        .into_iter()
        .map(|e| ParseError {
            span: to_span(*e.span()),
            message: e.to_string(),
        })
        .collect();

    let program = output.unwrap_or(Program { statements: Vec::new() });
    (program, errors)
}

fn to_span(span: SimpleSpan) -> Span {
    span.into_range().into()
}

// ═══════════════════════════════════════════════════════════════════════════
// Parser Combinators - generic over input type
// ═══════════════════════════════════════════════════════════════════════════

/// Top-level program parser.
///
/// A closing bracket with no opener can't start a statement and isn't skipped
/// by statement recovery, so it is consumed here with an error.
fn program_parser<'tokens, I>() -> impl Parser<'tokens, I, Program, Extra<'tokens>>
where
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
{
    let stray_closer = one_of([Token::RBrace, Token::RParen]).validate(|token, e, emitter| {
        let span: SimpleSpan = e.span();
        emitter.emit(Rich::custom(span, format!("Unexpected {token}")));
        Stmt::Error(to_span(span))
    });

    choice((statement_parser(), stray_closer))
        .repeated()
        .collect::<Vec<_>>()
        .map(|statements| Program {
            statements: strip_empty(statements),
        })
}

/// Statement parser - dispatches based on leading token.
fn statement_parser<'tokens, I>() -> impl Parser<'tokens, I, Stmt, Extra<'tokens>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
{
    recursive(|stmt| {
        let expr = expression_parser(stmt.clone());
        let operand = operand_parser(stmt.clone(), expr.clone());
        let block = block_parser(stmt.clone());
        let chain = chain_parser(command_parser(operand.clone()), expr_list_parser(expr.clone()));

        let terminator = one_of([Token::Newline, Token::Semi]).repeated();
        let recovery = none_of([Token::Newline, Token::Semi, Token::RBrace, Token::RParen])
            .repeated()
            .at_least(1)
            .map_with(|_, e| Stmt::Error(to_span(e.span())));

        choice((
            one_of([Token::Newline, Token::Semi]).to(Stmt::Empty),
            function_parser(expr.clone(), block.clone()).map(|def| Stmt::Function(Arc::new(def))),
            just(Token::Param)
                .ignore_then(param_list_parser(expr.clone()))
                .map(Stmt::Param),
            if_parser(stmt.clone(), block.clone()).map(Stmt::If),
            switch_parser(operand.clone(), block.clone()).map(Stmt::Switch),
            loop_parser(stmt.clone(), block.clone()).map(Stmt::Loop),
            try_parser(block.clone()).map(Stmt::Try),
            flow_parser(chain.clone()).map(Stmt::Flow),
            type_def_parser().map(Stmt::TypeDef),
            using_parser().map(Stmt::Using),
            named_block_parser(block).map(Stmt::NamedBlock),
            assignment_ahead()
                .ignore_then(assignment_parser(stmt, operand))
                .map(Stmt::Assignment),
            chain.map(chain_to_stmt),
        ))
        .recover_with(via_parser(recovery))
        .then_ignore(terminator)
        .boxed()
    })
}

/// Function or filter definition: `function [scope:]Name [(params)] { body }`
fn function_parser<'tokens, I, E, B>(
    expr: E,
    block: B,
) -> impl Parser<'tokens, I, FunctionDef, Extra<'tokens>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
    E: Parser<'tokens, I, Expr, Extra<'tokens>> + Clone + 'tokens,
    B: Parser<'tokens, I, ScriptBlock, Extra<'tokens>> + Clone + 'tokens,
{
    just(Token::Function)
        .ignore_then(select! { Token::Bareword(name) => name })
        .then(param_list_parser(expr).or_not())
        .then_ignore(nl())
        .then(block)
        .map_with(|((name, params), body), e| FunctionDef {
            name: strip_scope_prefix(&name).to_string(),
            params: params.unwrap_or_default(),
            body,
            span: to_span(e.span()),
        })
        .labelled("function definition")
        .boxed()
}

/// Parameter list: `( [attr] [type] $name [= default], ... )`
fn param_list_parser<'tokens, I, E>(
    expr: E,
) -> impl Parser<'tokens, I, Vec<ParamDef>, Extra<'tokens>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
    E: Parser<'tokens, I, Expr, Extra<'tokens>> + Clone + 'tokens,
{
    let attributes = select! { Token::TypeLit(_) => () }.then_ignore(nl()).repeated();
    let default = select! { Token::Assign(op) if op == "=" => () }
        .ignore_then(nl())
        .ignore_then(expr);

    let param = attributes
        .ignore_then(select! { Token::Variable(name) => name })
        .then(default.or_not())
        .then_ignore(nl())
        .map(|(name, default)| ParamDef { name, default });

    param
        .separated_by(just(Token::Comma).then(nl()))
        .allow_trailing()
        .collect::<Vec<_>>()
        .delimited_by(just(Token::LParen).then(nl()), just(Token::RParen))
        .labelled("parameter list")
        .boxed()
}

/// Braced statement block: `{ stmts }`
fn block_parser<'tokens, I, S>(stmt: S) -> impl Parser<'tokens, I, ScriptBlock, Extra<'tokens>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
    S: Parser<'tokens, I, Stmt, Extra<'tokens>> + Clone + 'tokens,
{
    stmt.repeated()
        .collect::<Vec<_>>()
        .delimited_by(just(Token::LBrace), just(Token::RBrace))
        .map_with(|statements, e| ScriptBlock {
            statements: strip_empty(statements),
            span: to_span(e.span()),
        })
        .labelled("script block")
        .boxed()
}

/// Statements inside an opener and `)`: `( )`, `$( )`, `@( )`
fn group_parser<'tokens, I, S>(
    open: Token,
    stmt: S,
) -> impl Parser<'tokens, I, Vec<Stmt>, Extra<'tokens>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
    S: Parser<'tokens, I, Stmt, Extra<'tokens>> + Clone + 'tokens,
{
    stmt.repeated()
        .collect::<Vec<_>>()
        .delimited_by(just(open), just(Token::RParen))
        .map(strip_empty)
        .boxed()
}

/// If statement: `if (cond) { } elseif (cond) { } else { }`
fn if_parser<'tokens, I, S, B>(stmt: S, block: B) -> impl Parser<'tokens, I, IfStmt, Extra<'tokens>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
    S: Parser<'tokens, I, Stmt, Extra<'tokens>> + Clone + 'tokens,
    B: Parser<'tokens, I, ScriptBlock, Extra<'tokens>> + Clone + 'tokens,
{
    let clause = group_parser(Token::LParen, stmt)
        .then_ignore(nl())
        .then(block.clone());

    just(Token::If)
        .ignore_then(clause.clone())
        .then(
            nl().ignore_then(just(Token::ElseIf))
                .ignore_then(clause)
                .repeated()
                .collect::<Vec<_>>(),
        )
        .then(
            nl().ignore_then(just(Token::Else))
                .ignore_then(nl())
                .ignore_then(block)
                .or_not(),
        )
        .map(|((first, rest), else_branch)| IfStmt {
            clauses: std::iter::once(first).chain(rest).collect(),
            else_branch,
        })
        .labelled("if statement")
        .boxed()
}

/// Switch statement: `switch [-flags] (subject) { label { body } ... }`
fn switch_parser<'tokens, I, O, B>(
    operand: O,
    block: B,
) -> impl Parser<'tokens, I, SwitchStmt, Extra<'tokens>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
    O: Parser<'tokens, I, Expr, Extra<'tokens>> + Clone + 'tokens,
    B: Parser<'tokens, I, ScriptBlock, Extra<'tokens>> + Clone + 'tokens,
{
    let separators = one_of([Token::Newline, Token::Semi]).repeated();
    let clause = operand
        .clone()
        .then_ignore(nl())
        .then(block)
        .then_ignore(separators.clone());

    just(Token::Switch)
        .ignore_then(select! { Token::Parameter(_) => () }.repeated())
        .ignore_then(operand)
        .then_ignore(nl())
        .then(
            separators
                .ignore_then(clause.repeated().collect::<Vec<_>>())
                .delimited_by(just(Token::LBrace), just(Token::RBrace)),
        )
        .map(|(subject, clauses)| SwitchStmt { subject, clauses })
        .labelled("switch statement")
        .boxed()
}

/// `foreach`, `for`, `while`, and `do` loops.
fn loop_parser<'tokens, I, S, B>(stmt: S, block: B) -> impl Parser<'tokens, I, LoopStmt, Extra<'tokens>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
    S: Parser<'tokens, I, Stmt, Extra<'tokens>> + Clone + 'tokens,
    B: Parser<'tokens, I, ScriptBlock, Extra<'tokens>> + Clone + 'tokens,
{
    let condition = group_parser(Token::LParen, stmt.clone());

    let foreach = just(Token::Foreach)
        .ignore_then(select! { Token::Parameter(_) => () }.repeated())
        .ignore_then(just(Token::LParen))
        .ignore_then(nl())
        .ignore_then(select! { Token::Variable(name) => name })
        .then_ignore(just(Token::In))
        .then_ignore(nl())
        .then(stmt)
        .then_ignore(just(Token::RParen))
        .then_ignore(nl())
        .then(block.clone())
        .map(|((variable, iterable), body)| LoopStmt::Foreach {
            variable,
            iterable: Box::new(iterable),
            body,
        });

    let for_loop = just(Token::For)
        .ignore_then(condition.clone())
        .then_ignore(nl())
        .then(block.clone())
        .map(|(header, body)| LoopStmt::For { header, body });

    let while_loop = just(Token::While)
        .ignore_then(condition.clone())
        .then_ignore(nl())
        .then(block.clone())
        .map(|(condition, body)| LoopStmt::While { condition, body });

    let do_loop = just(Token::Do)
        .ignore_then(nl())
        .ignore_then(block)
        .then_ignore(nl())
        .then(choice((just(Token::While).to(false), just(Token::Until).to(true))))
        .then(condition)
        .map(|((body, until), condition)| LoopStmt::Do { body, condition, until });

    choice((foreach, for_loop, while_loop, do_loop))
        .labelled("loop")
        .boxed()
}

/// `try { } catch [Type], [Type] { } finally { }`
fn try_parser<'tokens, I, B>(block: B) -> impl Parser<'tokens, I, TryStmt, Extra<'tokens>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
    B: Parser<'tokens, I, ScriptBlock, Extra<'tokens>> + Clone + 'tokens,
{
    let catch = nl()
        .ignore_then(just(Token::Catch))
        .ignore_then(
            select! { Token::TypeLit(ty) => ty }
                .separated_by(just(Token::Comma).then(nl()))
                .collect::<Vec<_>>(),
        )
        .then_ignore(nl())
        .then(block.clone())
        .map(|(types, body)| CatchClause { types, body });

    let finally = nl()
        .ignore_then(just(Token::Finally))
        .ignore_then(nl())
        .ignore_then(block.clone());

    just(Token::Try)
        .ignore_then(nl())
        .ignore_then(block)
        .then(catch.repeated().collect::<Vec<_>>())
        .then(finally.or_not())
        .map(|((body, catches), finally)| TryStmt { body, catches, finally })
        .labelled("try statement")
        .boxed()
}

/// `return`, `throw`, `exit` with an optional pipeline; `break`/`continue` with an optional label.
fn flow_parser<'tokens, I, C>(chain: C) -> impl Parser<'tokens, I, FlowStmt, Extra<'tokens>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
    C: Parser<'tokens, I, Vec<Pipeline>, Extra<'tokens>> + Clone + 'tokens,
{
    let with_value = select! {
        Token::Return => FlowKind::Return,
        Token::Throw => FlowKind::Throw,
        Token::Exit => FlowKind::Exit,
    }
    .then(chain.or_not())
    .map(|(kind, value)| FlowStmt {
        kind,
        value: value.map(|pipelines| Box::new(chain_to_stmt(pipelines))),
    });

    let jump = select! {
        Token::Break => FlowKind::Break,
        Token::Continue => FlowKind::Continue,
    }
    .then_ignore(select! { Token::Bareword(_) => () }.or_not())
    .map(|kind| FlowStmt { kind, value: None });

    choice((with_value, jump)).boxed()
}

/// `class`/`enum` definitions. The body is matched by brace depth and dropped.
fn type_def_parser<'tokens, I>() -> impl Parser<'tokens, I, TypeDef, Extra<'tokens>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
{
    let balanced = recursive(|balanced| {
        choice((balanced, none_of([Token::LBrace, Token::RBrace]).ignored()))
            .repeated()
            .delimited_by(just(Token::LBrace), just(Token::RBrace))
            .ignored()
    });

    just(Token::TypeDef)
        .ignore_then(select! { Token::Bareword(name) => name }.or_not())
        .then_ignore(none_of([Token::LBrace, Token::Newline, Token::Semi]).repeated())
        .then_ignore(nl())
        .then_ignore(balanced)
        .map_with(|name, e| TypeDef {
            name,
            span: to_span(e.span()),
        })
        .boxed()
}

/// `using namespace X` / `using module X`: the rest of the line is ignored.
fn using_parser<'tokens, I>() -> impl Parser<'tokens, I, Span, Extra<'tokens>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
{
    just(Token::Using)
        .then(none_of([Token::Newline, Token::Semi]).repeated())
        .map_with(|_, e| to_span(e.span()))
        .boxed()
}

/// `begin { }`, `process { }`, `end { }`, `trap [Type] { }`
fn named_block_parser<'tokens, I, B>(block: B) -> impl Parser<'tokens, I, NamedBlock, Extra<'tokens>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
    B: Parser<'tokens, I, ScriptBlock, Extra<'tokens>> + Clone + 'tokens,
{
    select! { Token::Bareword(name) if is_named_block(&name) => name }
        .then_ignore(select! { Token::TypeLit(_) => () }.or_not())
        .then_ignore(nl())
        .then(block)
        .map(|(name, body)| NamedBlock { name, body })
        .boxed()
}

/// Assignment: `$x = ...`, `[int]$x += ...`, `$a, $b = ...`
fn assignment_parser<'tokens, I, S, O>(
    stmt: S,
    operand: O,
) -> impl Parser<'tokens, I, Assignment, Extra<'tokens>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
    S: Parser<'tokens, I, Stmt, Extra<'tokens>> + Clone + 'tokens,
    O: Parser<'tokens, I, Expr, Extra<'tokens>> + Clone + 'tokens,
{
    let target = select! { Token::TypeLit(_) => () }
        .repeated()
        .ignore_then(
            operand
                .filter(|e| !matches!(e, Expr::Bareword(_)))
                .separated_by(just(Token::Comma))
                .at_least(1)
                .collect::<Vec<_>>(),
        )
        .map(one_or_array);

    target
        .then(select! { Token::Assign(op) => op })
        .then_ignore(nl())
        .then(stmt)
        .map(|((target, op), value)| Assignment {
            target,
            op,
            value: Box::new(value),
        })
        .labelled("assignment")
        .boxed()
}

/// Succeeds, without consuming anything, when an assignment operator follows
/// before the end of the statement and outside any brackets.
///
/// Gates [`assignment_parser`] so a statement that isn't an assignment never
/// parses its leading operand twice. Without it every nested group doubles
/// the work.
fn assignment_ahead<'tokens, I>() -> impl Parser<'tokens, I, (), Extra<'tokens>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
{
    let group = recursive(|group| {
        let inner = choice((group, any().filter(|t: &Token| !is_bracket(t)).ignored())).repeated();
        choice((
            inner
                .clone()
                .delimited_by(
                    one_of([Token::LParen, Token::SubExprStart, Token::ArrayExprStart]),
                    just(Token::RParen),
                ),
            inner
                .clone()
                .delimited_by(one_of([Token::LBrace, Token::HashStart]), just(Token::RBrace)),
            inner.delimited_by(just(Token::LBracket), just(Token::RBracket)),
        ))
        .boxed()
    });

    let flat = any().filter(|t: &Token| {
        !is_bracket(t) && !matches!(t, Token::Newline | Token::Semi | Token::Assign(_))
    });

    choice((group, flat.ignored()))
        .repeated()
        .then(select! { Token::Assign(_) => () })
        .ignored()
        .rewind()
        .boxed()
}

fn is_bracket(token: &Token) -> bool {
    matches!(
        token,
        Token::LParen
            | Token::RParen
            | Token::SubExprStart
            | Token::ArrayExprStart
            | Token::LBrace
            | Token::RBrace
            | Token::HashStart
            | Token::LBracket
            | Token::RBracket
    )
}

/// Pipelines joined by `&&` / `||`.
fn chain_parser<'tokens, I, C, X>(
    command: C,
    expr_list: X,
) -> impl Parser<'tokens, I, Vec<Pipeline>, Extra<'tokens>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
    C: Parser<'tokens, I, Command, Extra<'tokens>> + Clone + 'tokens,
    X: Parser<'tokens, I, Expr, Extra<'tokens>> + Clone + 'tokens,
{
    // Only the first stage may be an expression; later stages are commands.
    let first = choice((command.clone().map(Element::Command), expr_list.map(Element::Expr)));
    let rest = just(Token::Pipe)
        .ignore_then(nl())
        .ignore_then(command.map(Element::Command));

    let pipeline = first
        .then(rest.repeated().collect::<Vec<_>>())
        .map(|(first, rest)| Pipeline {
            elements: std::iter::once(first).chain(rest).collect(),
        });

    pipeline
        .separated_by(one_of([Token::AndAnd, Token::OrOr]).then(nl()))
        .at_least(1)
        .collect::<Vec<_>>()
        .labelled("pipeline")
        .boxed()
}

/// Command: `name args...`, `& target args...`, `. target args...`
fn command_parser<'tokens, I, O>(operand: O) -> impl Parser<'tokens, I, Command, Extra<'tokens>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
    O: Parser<'tokens, I, Expr, Extra<'tokens>> + Clone + 'tokens,
{
    let head = choice((
        just(Token::Amp)
            .ignore_then(operand.clone())
            .map(|name| (Invocation::Call, name)),
        just(Token::DotSource)
            .ignore_then(operand.clone())
            .map(|name| (Invocation::DotSource, name)),
        select! {
            Token::Bareword(name) => (Invocation::Plain, Expr::Bareword(name)),
            // `ForEach-Object`'s alias, only reachable in command position
            Token::Foreach => (Invocation::Plain, Expr::Bareword("foreach".to_string())),
        },
    ));

    let value = operand
        .separated_by(just(Token::Comma).then(nl()))
        .at_least(1)
        .collect::<Vec<_>>()
        .map(one_or_array);

    let arg = choice((
        select! {
            Token::Parameter(name) => Arg::Parameter(name),
            Token::Redirect(op) => Arg::Redirect(op),
            // In argument mode operators are just text.
            Token::Op(op) => Arg::Value(Expr::Bareword(op)),
            Token::Assign(op) => Arg::Value(Expr::Bareword(op)),
            Token::Range => Arg::Value(Expr::Bareword("..".to_string())),
        },
        value.map(Arg::Value),
    ));

    head.then(arg.repeated().collect::<Vec<_>>())
        .map_with(|((invocation, name), args), e| Command {
            invocation,
            name,
            args,
            span: to_span(e.span()),
        })
        .labelled("command")
        .boxed()
}

/// Comma list in expression mode: `1, 2, 3`
fn expr_list_parser<'tokens, I, E>(expr: E) -> impl Parser<'tokens, I, Expr, Extra<'tokens>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
    E: Parser<'tokens, I, Expr, Extra<'tokens>> + Clone + 'tokens,
{
    expr.separated_by(just(Token::Comma).then(nl()))
        .at_least(1)
        .collect::<Vec<_>>()
        .map(one_or_array)
        .boxed()
}

/// Expression parser: unary and binary operators over operands.
///
/// Precedence is flattened to left-to-right; the resolver only needs to
/// reach every nested statement, not evaluate anything.
fn expression_parser<'tokens, I, S>(stmt: S) -> impl Parser<'tokens, I, Expr, Extra<'tokens>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
    S: Parser<'tokens, I, Stmt, Extra<'tokens>> + Clone + 'tokens,
{
    recursive(|expr| {
        let operand = operand_parser(stmt, expr);

        let unary = recursive(|unary| {
            let prefix = select! {
                Token::Op(op) => op,
                Token::Parameter(op) if is_unary_operator(&op) => op,
            };

            choice((
                prefix.then(unary.clone()).map(|(op, operand)| Expr::Unary {
                    op,
                    operand: Box::new(operand),
                }),
                select! { Token::TypeLit(ty) => ty }
                    .then(unary)
                    .map(|(ty, operand)| Expr::Cast {
                        ty,
                        operand: Box::new(operand),
                    }),
                operand,
            ))
            .boxed()
        });

        let binary_op = select! {
            Token::Parameter(op) => op,
            Token::Op(op) if op != "!" => op,
            Token::Range => "..".to_string(),
            Token::Bareword(op) if matches!(op.as_str(), "*" | "/" | "%") => op,
        };

        unary
            .clone()
            .foldl(
                binary_op.then_ignore(nl()).then(unary).repeated(),
                |left, (op, right)| Expr::Binary {
                    left: Box::new(left),
                    op,
                    right: Box::new(right),
                },
            )
            .labelled("expression")
            .boxed()
    })
}

enum Postfix {
    Member(String, Option<Vec<Expr>>),
    Index(Expr),
    Step(String),
}

/// Primary value with member access, indexing, and `++`/`--`.
fn operand_parser<'tokens, I, S, E>(stmt: S, expr: E) -> impl Parser<'tokens, I, Expr, Extra<'tokens>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
    S: Parser<'tokens, I, Stmt, Extra<'tokens>> + Clone + 'tokens,
    E: Parser<'tokens, I, Expr, Extra<'tokens>> + Clone + 'tokens,
{
    let literal = select! {
        Token::Variable(name) => Expr::Variable(name),
        Token::Splat(name) => Expr::Splat(name),
        Token::Bareword(word) => Expr::Bareword(word),
        Token::Number(n) => Expr::Number(n),
        Token::String(s) => Expr::String(s),
        Token::TypeLit(ty) => Expr::Type(ty),
    };

    let primary = choice((
        literal,
        expandable_parser(),
        group_parser(Token::LParen, stmt.clone()).map(Expr::Paren),
        group_parser(Token::SubExprStart, stmt.clone()).map(Expr::SubExpr),
        group_parser(Token::ArrayExprStart, stmt.clone()).map(Expr::ArrayExpr),
        block_parser(stmt.clone()).map(Expr::ScriptBlock),
        hashtable_parser(stmt),
    ));

    let call_args = expr
        .clone()
        .separated_by(just(Token::Comma).then(nl()))
        .allow_trailing()
        .collect::<Vec<_>>()
        .delimited_by(just(Token::LParen).then(nl()), nl().then(just(Token::RParen)));

    let step_op = select! { Token::Op(op) if op == "+" || op == "-" => op };
    let postfix = choice((
        select! { Token::Member(name) => name }
            .then(call_args.or_not())
            .map(|(name, args)| Postfix::Member(name, args)),
        expr.delimited_by(just(Token::LBracket), just(Token::RBracket))
            .map(Postfix::Index),
        step_op
            .clone()
            .then(step_op)
            .filter(|(a, b)| a == b)
            .map(|(a, b)| Postfix::Step(a + &b)),
    ));

    primary
        .foldl(postfix.repeated(), |target, postfix| match postfix {
            Postfix::Member(name, args) => Expr::Member {
                target: Box::new(target),
                name,
                args,
            },
            Postfix::Index(index) => Expr::Index {
                target: Box::new(target),
                index: Box::new(index),
            },
            Postfix::Step(op) => Expr::Unary {
                op,
                operand: Box::new(target),
            },
        })
        .boxed()
}

/// Expandable string. Any `$( ... )` inside is parsed into statements.
fn expandable_parser<'tokens, I>() -> impl Parser<'tokens, I, Expr, Extra<'tokens>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
{
    select! { Token::Expandable(quoted) => quoted }.validate(|quoted, e, emitter| {
        let span: SimpleSpan = e.span();
        let (nested, errors) = parse_subexpressions(&quoted.text, span.start + quoted.offset);
        for error in errors {
            let span = SimpleSpan::from(error.span.start..error.span.end);
            emitter.emit(Rich::custom(span, error.message));
        }
        Expr::Expandable(Expandable {
            text: quoted.text,
            nested,
        })
    })
}

/// Hashtable literal: `@{ key = value; ... }`
fn hashtable_parser<'tokens, I, S>(stmt: S) -> impl Parser<'tokens, I, Expr, Extra<'tokens>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
    S: Parser<'tokens, I, Stmt, Extra<'tokens>> + Clone + 'tokens,
{
    let key = choice((
        select! {
            Token::Bareword(key) => Expr::Bareword(key),
            Token::String(key) => Expr::String(key),
            Token::Number(key) => Expr::Number(key),
            Token::Variable(key) => Expr::Variable(key),
        },
        expandable_parser(),
    ));

    let entry = key
        .then_ignore(select! { Token::Assign(op) if op == "=" => () })
        .then_ignore(nl())
        .then(stmt);

    one_of([Token::Newline, Token::Semi])
        .repeated()
        .ignore_then(entry.repeated().collect::<Vec<_>>())
        .delimited_by(just(Token::HashStart), just(Token::RBrace))
        .map(Expr::Hashtable)
        .labelled("hashtable")
        .boxed()
}

/// Optional newlines.
fn nl<'tokens, I>() -> impl Parser<'tokens, I, (), Extra<'tokens>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
{
    just(Token::Newline).repeated()
}

// ═══════════════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════════════

/// Find each `$( ... )` in expandable string content and parse its body.
///
/// `base` is the file offset of `text`, so nested spans land in the file.
fn parse_subexpressions(text: &str, base: usize) -> (Vec<Stmt>, Vec<ParseError>) {
    let bytes = text.as_bytes();
    let mut statements = Vec::new();
    let mut errors = Vec::new();
    let mut i = 0;

    while i + 1 < bytes.len() {
        match bytes[i] {
            b'`' => i += 2,
            b'$' if bytes[i + 1] == b'(' => {
                let start = i + 2;
                let end = closing_paren(bytes, start);
                let (program, mut errs) =
                    parse_tokens(lexer::tokenize(&text[start..end]), base + start, base + end);
                statements.extend(program.statements);
                errors.append(&mut errs);
                i = end + 1;
            }
            _ => i += 1,
        }
    }

    (statements, errors)
}

/// Index of the `)` closing a group opened just before `from`, or the end of input.
fn closing_paren(bytes: &[u8], from: usize) -> usize {
    let mut depth = 1usize;
    let mut quote = None;
    for (i, &b) in bytes.iter().enumerate().skip(from) {
        match (quote, b) {
            (Some(q), _) if b == q => quote = None,
            (Some(_), _) => {}
            (None, b'\'') => quote = Some(b'\''),
            (None, b'(') => depth += 1,
            (None, b')') => {
                depth -= 1;
                if depth == 0 {
                    return i;
                }
            }
            _ => {}
        }
    }
    bytes.len()
}

fn chain_to_stmt(pipelines: Vec<Pipeline>) -> Stmt {
    if pipelines.len() == 1 {
        match pipelines.into_iter().next() {
            Some(pipeline) => Stmt::Pipeline(pipeline),
            None => Stmt::Empty,
        }
    } else {
        Stmt::Chain(pipelines)
    }
}

fn one_or_array(mut items: Vec<Expr>) -> Expr {
    if items.len() == 1 {
        if let Some(item) = items.pop() {
            return item;
        }
    }
    Expr::Array(items)
}

fn strip_empty(statements: Vec<Stmt>) -> Vec<Stmt> {
    statements
        .into_iter()
        .filter(|s| !matches!(s, Stmt::Empty))
        .collect()
}

/// `global:Foo` → `Foo`
fn strip_scope_prefix(name: &str) -> &str {
    for prefix in ["global:", "script:", "local:", "private:"] {
        if let Some(head) = name.get(..prefix.len()) {
            if head.eq_ignore_ascii_case(prefix) && name.len() > prefix.len() {
                return &name[prefix.len()..];
            }
        }
    }
    name
}

fn is_unary_operator(op: &str) -> bool {
    ["-not", "-bnot", "-join", "-split"]
        .iter()
        .any(|u| op.eq_ignore_ascii_case(u))
}

fn is_named_block(name: &str) -> bool {
    ["begin", "process", "end", "dynamicparam", "clean", "trap"]
        .iter()
        .any(|b| name.eq_ignore_ascii_case(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> Vec<Stmt> {
        match parse(source).into_result() {
            Ok(program) => program.statements,
            Err(errors) => panic!("unexpected parse errors for {source:?}: {errors:?}"),
        }
    }

    fn single_command(stmt: &Stmt) -> &Command {
        match stmt {
            Stmt::Pipeline(Pipeline { elements }) => match elements.as_slice() {
                [Element::Command(cmd)] => cmd,
                other => panic!("expected one command, got {other:?}"),
            },
            other => panic!("expected pipeline, got {other:?}"),
        }
    }

    #[test]
    fn parse_simple_command() {
        let stmts = parse_ok("Get-ChildItem -Path C:\\temp -Recurse");
        assert_eq!(stmts.len(), 1);
        let cmd = single_command(&stmts[0]);
        assert_eq!(cmd.static_name(), Some("Get-ChildItem"));
        assert_eq!(cmd.invocation, Invocation::Plain);
        assert_eq!(
            cmd.args,
            vec![
                Arg::Parameter("-Path".into()),
                Arg::Value(Expr::Bareword("C:\\temp".into())),
                Arg::Parameter("-Recurse".into()),
            ]
        );
    }

    #[test]
    fn command_span_covers_arguments() {
        let source = "  Foo -Bar baz\nQux";
        let stmts = parse_ok(source);
        let cmd = single_command(&stmts[0]);
        assert_eq!(&source[cmd.span.start..cmd.span.end], "Foo -Bar baz");
    }

    #[test]
    fn parse_function_definition() {
        let stmts = parse_ok("function Get-Thing {\n  param($Name)\n  Write-Output $Name\n}");
        let Stmt::Function(def) = &stmts[0] else {
            panic!("expected function, got {:?}", stmts[0]);
        };
        assert_eq!(def.name, "Get-Thing");
        assert_eq!(def.body.statements.len(), 2);
        assert!(matches!(def.body.statements[0], Stmt::Param(_)));
    }

    #[test]
    fn filter_keyword_defines_a_function() {
        let stmts = parse_ok("filter Only-Even { if ($_ % 2 -eq 0) { $_ } }");
        assert!(matches!(&stmts[0], Stmt::Function(def) if def.name == "Only-Even"));
    }

    #[test]
    fn function_scope_prefix_is_stripped() {
        let stmts = parse_ok("function script:Helper { }");
        assert!(matches!(&stmts[0], Stmt::Function(def) if def.name == "Helper"));
    }

    #[test]
    fn function_with_inline_params() {
        let stmts = parse_ok("function Add($a, [int]$b = 2) { $a + $b }");
        let Stmt::Function(def) = &stmts[0] else {
            panic!("expected function");
        };
        assert_eq!(def.params.len(), 2);
        assert_eq!(def.params[1].name, "b");
        assert_eq!(def.params[1].default, Some(Expr::Number("2".into())));
    }

    #[test]
    fn parse_dot_source() {
        let stmts = parse_ok(". .\\lib\\helpers.ps1");
        let cmd = single_command(&stmts[0]);
        assert_eq!(cmd.invocation, Invocation::DotSource);
        assert_eq!(cmd.static_name(), Some(".\\lib\\helpers.ps1"));
    }

    #[test]
    fn parse_call_operator() {
        let stmts = parse_ok("& 'Get-Thing' -Force\n& $cmd");
        let first = single_command(&stmts[0]);
        assert_eq!(first.invocation, Invocation::Call);
        assert_eq!(first.static_name(), Some("Get-Thing"));
        let second = single_command(&stmts[1]);
        assert_eq!(second.static_name(), None);
    }

    #[test]
    fn parse_pipeline_with_aliases() {
        let stmts = parse_ok("Get-Item * | foreach { $_.Name } | ? { $_ }");
        let Stmt::Pipeline(pipeline) = &stmts[0] else {
            panic!("expected pipeline");
        };
        let names: Vec<_> = pipeline
            .elements
            .iter()
            .map(|e| match e {
                Element::Command(cmd) => cmd.static_name().unwrap_or("?"),
                Element::Expr(_) => "<expr>",
            })
            .collect();
        assert_eq!(names, vec!["Get-Item", "foreach", "?"]);
    }

    #[test]
    fn expression_can_start_a_pipeline() {
        let stmts = parse_ok("$items | Sort-Object");
        let Stmt::Pipeline(pipeline) = &stmts[0] else {
            panic!("expected pipeline");
        };
        assert!(matches!(pipeline.elements[0], Element::Expr(Expr::Variable(_))));
        assert!(matches!(pipeline.elements[1], Element::Command(_)));
    }

    #[test]
    fn parse_assignment_with_pipeline() {
        let stmts = parse_ok("$files = Get-ChildItem | Where-Object { $_.Length -gt 0 }");
        let Stmt::Assignment(assign) = &stmts[0] else {
            panic!("expected assignment, got {:?}", stmts[0]);
        };
        assert_eq!(assign.target, Expr::Variable("files".into()));
        assert!(matches!(*assign.value, Stmt::Pipeline(_)));
    }

    #[test]
    fn assignment_inside_groups_and_blocks() {
        let stmts = parse_ok("$h['k'] = 1\n[int]$n = ($m = 2)\nFoo { $x = 1 } -Bar ($y)");
        assert!(matches!(stmts[0], Stmt::Assignment(_)));
        assert!(matches!(stmts[1], Stmt::Assignment(_)));
        assert!(matches!(stmts[2], Stmt::Pipeline(_)), "{:?}", stmts[2]);
    }

    #[test]
    fn deeply_nested_groups_parse_in_linear_passes() {
        for (open, close) in [("(", ")"), ("$(", ")"), ("@(", ")")] {
            let depth = 40;
            let source = format!("{}Foo{}", open.repeat(depth), close.repeat(depth));
            let started = std::time::Instant::now();
            let stmts = parse_ok(&source);
            assert_eq!(stmts.len(), 1);
            assert!(
                started.elapsed() < std::time::Duration::from_secs(5),
                "{open} nested {depth} deep took {:?}",
                started.elapsed()
            );
        }
    }

    #[test]
    fn parse_if_elseif_else() {
        let stmts = parse_ok("if (Test-A) {\n  A\n}\nelseif ($x -eq 1) { B }\nelse {\n  C\n}");
        assert_eq!(stmts.len(), 1);
        let Stmt::If(if_stmt) = &stmts[0] else {
            panic!("expected if");
        };
        assert_eq!(if_stmt.clauses.len(), 2);
        assert!(if_stmt.else_branch.is_some());
    }

    #[test]
    fn parse_loops() {
        let stmts = parse_ok(
            "foreach ($f in Get-ChildItem) { Use $f }\n\
             for ($i = 0; $i -lt 3; $i++) { Step }\n\
             while ($true) { break }\n\
             do { Work } until (Done)",
        );
        assert_eq!(stmts.len(), 4);
        assert!(matches!(&stmts[0], Stmt::Loop(LoopStmt::Foreach { variable, .. }) if variable == "f"));
        assert!(matches!(&stmts[1], Stmt::Loop(LoopStmt::For { header, .. }) if header.len() == 3));
        assert!(matches!(&stmts[2], Stmt::Loop(LoopStmt::While { .. })));
        assert!(matches!(&stmts[3], Stmt::Loop(LoopStmt::Do { until: true, .. })));
    }

    #[test]
    fn parse_try_catch_finally() {
        let stmts = parse_ok("try { Risky }\ncatch [System.IO.IOException] { Recover }\nfinally { Cleanup }");
        let Stmt::Try(try_stmt) = &stmts[0] else {
            panic!("expected try");
        };
        assert_eq!(try_stmt.catches.len(), 1);
        assert_eq!(try_stmt.catches[0].types, vec!["[System.IO.IOException]".to_string()]);
        assert!(try_stmt.finally.is_some());
    }

    #[test]
    fn parse_switch() {
        let stmts = parse_ok("switch ($x) {\n  'a' { Do-A }\n  default { Do-Default }\n}");
        let Stmt::Switch(switch) = &stmts[0] else {
            panic!("expected switch");
        };
        assert_eq!(switch.clauses.len(), 2);
    }

    #[test]
    fn parse_hashtable_and_splat() {
        let stmts = parse_ok("$p = @{\n  Name = 'x'\n  Value = (Get-Value)\n}\nSet-Thing @p");
        let Stmt::Assignment(assign) = &stmts[0] else {
            panic!("expected assignment");
        };
        let Stmt::Pipeline(pipeline) = assign.value.as_ref() else {
            panic!("expected pipeline value");
        };
        assert!(matches!(&pipeline.elements[0], Element::Expr(Expr::Hashtable(entries)) if entries.len() == 2));
        let cmd = single_command(&stmts[1]);
        assert_eq!(cmd.args, vec![Arg::Value(Expr::Splat("p".into()))]);
    }

    #[test]
    fn parse_member_calls_and_casts() {
        let stmts = parse_ok("[void]$list.Add((Get-Item x))\n[Math]::Round(1.5)");
        assert_eq!(stmts.len(), 2);
    }

    #[test]
    fn parse_param_block_with_attributes() {
        let stmts = parse_ok(
            "[CmdletBinding()]\nparam(\n  [Parameter(Mandatory = $true)]\n  [string]$Path,\n  [switch]$Force\n)",
        );
        let params = stmts.iter().find_map(|s| match s {
            Stmt::Param(params) => Some(params),
            _ => None,
        });
        let names: Vec<_> = params
            .map(|p| p.iter().map(|d| d.name.as_str()).collect())
            .unwrap_or_default();
        assert_eq!(names, vec!["Path", "Force"]);
    }

    #[test]
    fn parse_named_blocks() {
        let stmts = parse_ok("function F {\n  begin { A }\n  process { B }\n  end { C }\n}");
        let Stmt::Function(def) = &stmts[0] else {
            panic!("expected function");
        };
        assert_eq!(def.body.statements.len(), 3);
        assert!(def.body.statements.iter().all(|s| matches!(s, Stmt::NamedBlock(_))));
    }

    #[test]
    fn parse_chain_operators() {
        let stmts = parse_ok("Build && Test || Report");
        assert!(matches!(&stmts[0], Stmt::Chain(p) if p.len() == 3));
    }

    #[test]
    fn class_bodies_are_skipped() {
        let stmts = parse_ok("class Widget : Base {\n  [string]$Name\n  Widget() { Init-Widget }\n}\nAfter");
        assert!(matches!(&stmts[0], Stmt::TypeDef(def) if def.name.as_deref() == Some("Widget")));
        assert_eq!(single_command(&stmts[1]).static_name(), Some("After"));
    }

    #[test]
    fn subexpressions_in_strings_are_parsed() {
        let source = "Write-Host \"Total: $(Get-Total -All) items\"";
        let stmts = parse_ok(source);
        let cmd = single_command(&stmts[0]);
        let Arg::Value(Expr::Expandable(s)) = &cmd.args[0] else {
            panic!("expected expandable argument");
        };
        assert_eq!(s.nested.len(), 1);
        let inner = single_command(&s.nested[0]);
        assert_eq!(inner.static_name(), Some("Get-Total"));
        assert_eq!(&source[inner.span.start..inner.span.end], "Get-Total -All");
    }

    #[test]
    fn escaped_subexpression_is_text() {
        let stmts = parse_ok("Write-Host \"cost: `$(Not-A-Call)\"");
        let cmd = single_command(&stmts[0]);
        assert!(matches!(&cmd.args[0], Arg::Value(Expr::Expandable(s)) if s.nested.is_empty()));
    }

    #[test]
    fn recovers_after_bad_statement() {
        let parsed = parse("Good-One\nBad ^ stuff\nGood-Two");
        assert!(!parsed.errors.is_empty());
        let names: Vec<_> = parsed
            .program
            .statements
            .iter()
            .filter_map(|s| match s {
                Stmt::Pipeline(p) => match p.elements.first() {
                    Some(Element::Command(cmd)) => cmd.static_name(),
                    _ => None,
                },
                _ => None,
            })
            .collect();
        assert!(names.contains(&"Good-One"));
        assert!(names.contains(&"Good-Two"));
    }

    #[test]
    fn stray_closing_brace_is_an_error() {
        let parsed = parse("Foo\n}\nBar");
        assert_eq!(parsed.errors.len(), 1);
        assert!(parsed.errors[0].message.contains("Unexpected"));
        assert_eq!(parsed.program.statements.len(), 3);
    }

    #[test]
    fn unclosed_block_is_an_error() {
        let parsed = parse("function Broken {\n  Foo\n");
        assert!(!parsed.errors.is_empty());
    }

    #[test]
    fn empty_source() {
        assert!(parse_ok("").is_empty());
        assert!(parse_ok("\n\n# just a comment\n").is_empty());
    }

    #[test]
    fn error_display_includes_span() {
        let err = ParseError {
            span: Span::new(3, 4),
            message: "Unexpected '}'".into(),
        };
        assert_eq!(err.to_string(), "Unexpected '}' at 3..4");
    }
}
