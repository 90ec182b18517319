//! Command-line arguments.

use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};

#[derive(Debug, Clone, Parser)]
#[command(name = "pslint", version)]
#[command(about = "Find PowerShell commands that are called before they exist")]
pub struct Args {
    /// Scripts to analyze. Each is a root; files it dot-sources are followed.
    #[arg(required = true, value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// Configuration file. Defaults to ./pslint.toml, then the user config directory.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Only accept commands from these modules (repeatable). Host built-ins always resolve.
    #[arg(short = 'm', long = "module", value_name = "NAME")]
    pub modules: Vec<String>,

    /// JSON command manifest from `Get-Command | ConvertTo-Json` (repeatable).
    #[arg(long = "manifest", value_name = "PATH")]
    pub manifests: Vec<PathBuf>,

    /// Don't seed the registry with the host's built-in commands.
    #[arg(long)]
    pub no_builtins: bool,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = Format::Text)]
    pub format: Format,

    /// Also fail when unsupported constructs are found.
    #[arg(long)]
    pub strict: bool,

    /// Nested analyses allowed below each root before giving up.
    #[arg(long, value_name = "N")]
    pub max_depth: Option<usize>,

    /// More logging on stderr (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Plain text grouped by category
    #[default]
    Text,
    /// Source excerpts with labels
    Pretty,
    /// One JSON document
    Json,
}
