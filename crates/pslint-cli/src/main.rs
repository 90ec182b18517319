//! pslint entry point.
//!
//! ```bash
//! pslint build.ps1 --module Pester --manifest commands.json
//! ```

use std::io::{self, IsTerminal};
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use pslint_cli::Args;

fn main() -> ExitCode {
    let args = Args::parse();

    // RUST_LOG wins over -v
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match args.verbose {
            0 => "warn",
            1 => "warn,pslint_engine=debug,pslint_cli=debug",
            _ => "warn,pslint_engine=trace,pslint_cli=trace",
        })
    });
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();

    let stdout = io::stdout();
    let color = stdout.is_terminal();
    let mut out = stdout.lock();
    match pslint_cli::run(&args, &mut out, color) {
        Ok(outcome) => ExitCode::from(outcome.exit_code()),
        Err(err) => {
            eprintln!("pslint: {err:#}");
            ExitCode::from(2)
        }
    }
}
