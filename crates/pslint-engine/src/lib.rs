//! pslint-engine: static command resolution for PowerShell-style scripts.
//!
//! This crate provides:
//!
//! - **Lexer**: Tokenizes script source using logos
//! - **Parser**: Builds an AST from tokens using chumsky, with recovery
//! - **AST**: Type definitions for the abstract syntax tree
//! - **VFS**: Script file access, real or in memory
//! - **Registry**: Commands that exist outside the analyzed scripts
//! - **Analysis**: Walks scripts across dot-sourced files and reports
//!   commands that would not resolve at run time

pub mod analysis;
pub mod ast;
pub mod lexer;
pub mod parser;
pub mod registry;
pub mod source;
pub mod vfs;

pub use analysis::{AnalysisError, AnalysisResult, Analyzer, Category, Diagnostic, Location, ScopeState};
pub use registry::{CommandDescriptor, CommandKind, CommandRegistry, ExternalCommands};
pub use source::SourceFile;
