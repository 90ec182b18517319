//! Lexer for PowerShell-style scripts.
//!
//! Tokenizes source text with logos. The token set covers the subset of the
//! language the resolver cares about: statements, command invocations with
//! their arguments, and every construct that can hide a nested command
//! (sub-expressions, script blocks, hashtables, parenthesized pipelines).
//!
//! Keywords are case-insensitive, like the host language. Characters the
//! lexer doesn't recognize become [`Token::Error`] so the parser can report
//! them and recover at the next statement boundary.

use std::fmt;
use std::ops::Range;

use logos::Logos;

/// A token with its byte range in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub span: Range<usize>,
}

/// Content of an expandable string.
#[derive(Debug, Clone, PartialEq)]
pub struct Quoted {
    pub text: String,
    /// Where `text` starts, relative to the start of the token.
    pub offset: usize,
}

impl Quoted {
    fn new(text: &str, offset: usize) -> Self {
        Self { text: text.to_string(), offset }
    }
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\f\u{FEFF}]+")]
#[logos(skip r"`\r?\n")]
#[logos(skip(r"#[^\n]*", allow_greedy = true))]
#[logos(skip r"<#([^#]|#+[^#>])*#+>")]
pub enum Token {
    // ═══════════════════════════════════════════════════════════════════
    // Keywords
    // ═══════════════════════════════════════════════════════════════════
    #[token("function", ignore(case))]
    #[token("filter", ignore(case))]
    Function,
    #[token("param", ignore(case))]
    Param,
    #[token("if", ignore(case))]
    If,
    #[token("elseif", ignore(case))]
    ElseIf,
    #[token("else", ignore(case))]
    Else,
    #[token("switch", ignore(case))]
    Switch,
    #[token("foreach", ignore(case))]
    Foreach,
    #[token("for", ignore(case))]
    For,
    #[token("while", ignore(case))]
    While,
    #[token("do", ignore(case))]
    Do,
    #[token("until", ignore(case))]
    Until,
    #[token("in", ignore(case))]
    In,
    #[token("try", ignore(case))]
    Try,
    #[token("catch", ignore(case))]
    Catch,
    #[token("finally", ignore(case))]
    Finally,
    #[token("return", ignore(case))]
    Return,
    #[token("throw", ignore(case))]
    Throw,
    #[token("exit", ignore(case))]
    Exit,
    #[token("break", ignore(case))]
    Break,
    #[token("continue", ignore(case))]
    Continue,
    #[token("class", ignore(case))]
    #[token("enum", ignore(case))]
    TypeDef,
    #[token("using", ignore(case))]
    Using,

    // ═══════════════════════════════════════════════════════════════════
    // Punctuation
    // ═══════════════════════════════════════════════════════════════════
    #[token("\n")]
    Newline,
    #[token(";")]
    Semi,
    #[token("|")]
    Pipe,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("&")]
    Amp,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("$(")]
    SubExprStart,
    #[token("@(")]
    ArrayExprStart,
    #[token("@{")]
    HashStart,
    #[token(",")]
    Comma,
    #[token("..")]
    Range,

    /// The dot-source operator: a lone `.` followed by whitespace.
    #[regex(r"\.[ \t]+")]
    DotSource,

    /// Assignment operators: `=`, `+=`, `-=`, `*=`, `/=`, `%=`.
    #[regex(r"[+\-*/%]?=", |lex| lex.slice().to_string())]
    Assign(String),

    /// Unary/binary operator characters that aren't also bareword characters.
    #[regex(r"[+\-!]", |lex| lex.slice().to_string())]
    Op(String),

    /// Output redirection: `>`, `>>`, `2>`, `2>&1`, `*>`.
    #[regex(r"[0-9*]?>>?(&[0-9])?", |lex| lex.slice().to_string())]
    Redirect(String),

    // ═══════════════════════════════════════════════════════════════════
    // Values
    // ═══════════════════════════════════════════════════════════════════
    /// `$name`, `$env:PATH`, `$_`, `$?`, `${weird name}`.
    #[regex(r"\$([A-Za-z_][A-Za-z0-9_:]*|[?$^]|\{[^}\n]*\})", |lex| lex.slice()[1..].to_string())]
    Variable(String),

    /// Splatted variable: `@params`.
    #[regex(r"@[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice()[1..].to_string())]
    Splat(String),

    /// Command parameter or comparison operator: `-Path`, `-eq`, `-Force:`.
    #[regex(r"-[A-Za-z_][A-Za-z0-9_]*:?", |lex| lex.slice().to_string())]
    Parameter(String),

    /// Numeric literal, including multiplier and hex suffixes: `42`, `1.5`, `10MB`, `0x1F`.
    #[regex(r"[0-9][0-9A-Za-z]*(\.[0-9]+)?", |lex| lex.slice().to_string())]
    Number(String),

    /// Verbatim string: `'text'` or `@'...'@`.
    #[regex(r"'([^']|'')*'", |lex| unquote_verbatim(lex.slice()))]
    #[regex(r"@'([^']|'[^@])*'@", |lex| here_string_body(lex.slice()).text)]
    String(String),

    /// Expandable string: `"text $var"` or `@"..."@`. Content is kept raw.
    ///
    /// A variable glued to a path (`$PSScriptRoot\lib.ps1`) lexes as an
    /// expandable string too, which is how the host treats it in argument mode.
    #[regex(r#""([^"`]|`(.|\n)|"")*""#, |lex| { let s = lex.slice(); Quoted::new(&s[1..s.len() - 1], 1) })]
    #[regex(r#"@"([^"]|"[^@])*"@"#, |lex| here_string_body(lex.slice()))]
    #[regex(r"\$[A-Za-z_][A-Za-z0-9_:]*[\\/][A-Za-z0-9_.\\/:~\-]*", |lex| Quoted::new(lex.slice(), 0))]
    Expandable(Quoted),

    /// Type literal or attribute: `[string]`, `[int[]]`, `[Parameter(Mandatory)]`.
    #[regex(r"\[[A-Za-z_][A-Za-z0-9_.]*(\[\])?(\([^)\n]*\))?\]", |lex| lex.slice().to_string())]
    TypeLit(String),

    /// Member access: `.Name`, `::Method`.
    #[regex(r"(\.|::)[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Member(String),

    /// Bareword: command names, unquoted arguments, relative paths, globs.
    #[regex(r"([A-Za-z_~*?%\\/]|\.\.?[\\/])[A-Za-z0-9_.\\/:~\-*?]*", |lex| lex.slice().to_string())]
    Bareword(String),

    /// A character sequence the lexer couldn't tokenize.
    Error(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Function => write!(f, "function"),
            Token::Param => write!(f, "param"),
            Token::If => write!(f, "if"),
            Token::ElseIf => write!(f, "elseif"),
            Token::Else => write!(f, "else"),
            Token::Switch => write!(f, "switch"),
            Token::Foreach => write!(f, "foreach"),
            Token::For => write!(f, "for"),
            Token::While => write!(f, "while"),
            Token::Do => write!(f, "do"),
            Token::Until => write!(f, "until"),
            Token::In => write!(f, "in"),
            Token::Try => write!(f, "try"),
            Token::Catch => write!(f, "catch"),
            Token::Finally => write!(f, "finally"),
            Token::Return => write!(f, "return"),
            Token::Throw => write!(f, "throw"),
            Token::Exit => write!(f, "exit"),
            Token::Break => write!(f, "break"),
            Token::Continue => write!(f, "continue"),
            Token::TypeDef => write!(f, "class"),
            Token::Using => write!(f, "using"),
            Token::Newline => write!(f, "newline"),
            Token::Semi => write!(f, "';'"),
            Token::Pipe => write!(f, "'|'"),
            Token::AndAnd => write!(f, "'&&'"),
            Token::OrOr => write!(f, "'||'"),
            Token::Amp => write!(f, "'&'"),
            Token::LBrace => write!(f, "'{{'"),
            Token::RBrace => write!(f, "'}}'"),
            Token::LParen => write!(f, "'('"),
            Token::RParen => write!(f, "')'"),
            Token::LBracket => write!(f, "'['"),
            Token::RBracket => write!(f, "']'"),
            Token::SubExprStart => write!(f, "'$('"),
            Token::ArrayExprStart => write!(f, "'@('"),
            Token::HashStart => write!(f, "'@{{'"),
            Token::Comma => write!(f, "','"),
            Token::Range => write!(f, "'..'"),
            Token::DotSource => write!(f, "'.'"),
            Token::Assign(op) => write!(f, "'{op}'"),
            Token::Op(op) => write!(f, "'{op}'"),
            Token::Redirect(r) => write!(f, "'{r}'"),
            Token::Variable(name) => write!(f, "${name}"),
            Token::Splat(name) => write!(f, "@{name}"),
            Token::Parameter(p) => write!(f, "{p}"),
            Token::Number(n) => write!(f, "{n}"),
            Token::String(s) => write!(f, "'{s}'"),
            Token::Expandable(s) => write!(f, "\"{}\"", s.text),
            Token::TypeLit(t) => write!(f, "{t}"),
            Token::Member(m) => write!(f, "{m}"),
            Token::Bareword(w) => write!(f, "{w}"),
            Token::Error(text) => write!(f, "unrecognized input {text:?}"),
        }
    }
}

/// `'it''s'` → `it's`
fn unquote_verbatim(slice: &str) -> String {
    slice[1..slice.len() - 1].replace("''", "'")
}

/// `@'\nbody\n'@` → `body`
fn here_string_body(slice: &str) -> Quoted {
    let inner = &slice[2..slice.len() - 2];
    let (inner, lead) = match inner.strip_prefix("\r\n") {
        Some(rest) => (rest, 2),
        None => match inner.strip_prefix('\n') {
            Some(rest) => (rest, 1),
            None => (inner, 0),
        },
    };
    let inner = inner.strip_suffix("\r\n").or_else(|| inner.strip_suffix('\n')).unwrap_or(inner);
    Quoted::new(inner, 2 + lead)
}

/// Tokenize source text.
///
/// Never fails: unrecognized input becomes [`Token::Error`] in the stream.
pub fn tokenize(source: &str) -> Vec<Spanned> {
    Token::lexer(source)
        .spanned()
        .map(|(result, span)| {
            let token = match result {
                Ok(token) => token,
                Err(()) => Token::Error(source[span.clone()].to_string()),
            };
            Spanned { token, span }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(source: &str) -> Vec<Token> {
        tokenize(source).into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn command_with_parameters() {
        assert_eq!(
            tokens("Get-ChildItem -Path C:\\temp -Recurse"),
            vec![
                Token::Bareword("Get-ChildItem".into()),
                Token::Parameter("-Path".into()),
                Token::Bareword("C:\\temp".into()),
                Token::Parameter("-Recurse".into()),
            ]
        );
    }

    #[test]
    fn keywords_ignore_case() {
        assert_eq!(
            tokens("FUNCTION Foo { }"),
            vec![Token::Function, Token::Bareword("Foo".into()), Token::LBrace, Token::RBrace]
        );
        assert_eq!(tokens("Filter"), vec![Token::Function]);
        assert_eq!(tokens("ForEach"), vec![Token::Foreach]);
    }

    #[test]
    fn keyword_prefix_is_a_bareword() {
        assert_eq!(tokens("iffy"), vec![Token::Bareword("iffy".into())]);
        assert_eq!(tokens("Invoke-Thing"), vec![Token::Bareword("Invoke-Thing".into())]);
    }

    #[test]
    fn dot_source_operator() {
        assert_eq!(
            tokens(". .\\lib.ps1"),
            vec![Token::DotSource, Token::Bareword(".\\lib.ps1".into())]
        );
        assert_eq!(
            tokens(". ./lib/util.ps1"),
            vec![Token::DotSource, Token::Bareword("./lib/util.ps1".into())]
        );
        assert_eq!(
            tokens(". ../shared.ps1"),
            vec![Token::DotSource, Token::Bareword("../shared.ps1".into())]
        );
    }

    #[test]
    fn variables() {
        assert_eq!(
            tokens("$x $env:PATH $_ $? ${my var}"),
            vec![
                Token::Variable("x".into()),
                Token::Variable("env:PATH".into()),
                Token::Variable("_".into()),
                Token::Variable("?".into()),
                Token::Variable("{my var}".into()),
            ]
        );
    }

    #[test]
    fn variable_glued_to_path_is_expandable() {
        assert_eq!(
            tokens(". $PSScriptRoot\\lib.ps1"),
            vec![Token::DotSource, Token::Expandable(Quoted::new("$PSScriptRoot\\lib.ps1", 0))]
        );
    }

    #[test]
    fn member_access() {
        assert_eq!(
            tokens("$x.Count [Math]::Round"),
            vec![
                Token::Variable("x".into()),
                Token::Member(".Count".into()),
                Token::TypeLit("[Math]".into()),
                Token::Member("::Round".into()),
            ]
        );
    }

    #[test]
    fn strings() {
        assert_eq!(tokens("'it''s'"), vec![Token::String("it's".into())]);
        assert_eq!(tokens(r#""hello $name""#), vec![Token::Expandable(Quoted::new("hello $name", 1))]);
        assert_eq!(tokens("\"a `\" b\""), vec![Token::Expandable(Quoted::new("a `\" b", 1))]);
        assert_eq!(tokens("@\"\nx $(Foo)\n\"@"), vec![Token::Expandable(Quoted::new("x $(Foo)", 3))]);
        assert_eq!(tokens("@'\nbody\n'@"), vec![Token::String("body".into())]);
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            tokens("Foo # trailing\n<# block\n comment #>Bar"),
            vec![Token::Bareword("Foo".into()), Token::Newline, Token::Bareword("Bar".into())]
        );
    }

    #[test]
    fn line_continuation_is_skipped() {
        assert_eq!(
            tokens("Foo `\n  -Bar"),
            vec![Token::Bareword("Foo".into()), Token::Parameter("-Bar".into())]
        );
    }

    #[test]
    fn operators_and_assignment() {
        assert_eq!(
            tokens("$x += 1..10"),
            vec![
                Token::Variable("x".into()),
                Token::Assign("+=".into()),
                Token::Number("1".into()),
                Token::Range,
                Token::Number("10".into()),
            ]
        );
        assert_eq!(
            tokens("Foo 2>&1 > $null"),
            vec![
                Token::Bareword("Foo".into()),
                Token::Redirect("2>&1".into()),
                Token::Redirect(">".into()),
                Token::Variable("null".into()),
            ]
        );
    }

    #[test]
    fn pipeline_aliases() {
        assert_eq!(
            tokens("gci | % { $_ } | ? { $_ }"),
            vec![
                Token::Bareword("gci".into()),
                Token::Pipe,
                Token::Bareword("%".into()),
                Token::LBrace,
                Token::Variable("_".into()),
                Token::RBrace,
                Token::Pipe,
                Token::Bareword("?".into()),
                Token::LBrace,
                Token::Variable("_".into()),
                Token::RBrace,
            ]
        );
    }

    #[test]
    fn attributes_are_type_literals() {
        assert_eq!(
            tokens("[Parameter(Mandatory = $true)][string[]]"),
            vec![
                Token::TypeLit("[Parameter(Mandatory = $true)]".into()),
                Token::TypeLit("[string[]]".into()),
            ]
        );
    }

    #[test]
    fn unrecognized_input_becomes_error_token() {
        let toks = tokens("Foo ^ Bar");
        assert_eq!(toks.len(), 3);
        assert!(matches!(toks[1], Token::Error(_)));
    }

    #[test]
    fn spans_point_into_source() {
        let source = "Foo\n  Bar";
        let spanned = tokenize(source);
        assert_eq!(&source[spanned[2].span.clone()], "Bar");
    }
}
