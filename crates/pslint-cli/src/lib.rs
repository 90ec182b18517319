//! pslint command-line front end.
//!
//! Reads configuration, builds the external command map, analyzes each root
//! script, and renders one combined report.
//!
//! Exit codes: 0 when every command resolves, 1 when syntax or resolution
//! errors were found (or unsupported constructs with `--strict`), 2 when the
//! run itself failed.

pub mod args;
pub mod config;
pub mod report;

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info};

use pslint_engine::analysis::Analyzer;
use pslint_engine::registry::{CommandDescriptor, CommandKind, CommandRegistry};

pub use args::{Args, Format};
pub use config::{Config, Settings};
pub use report::Report;

/// What a finished run found.
#[derive(Debug)]
pub struct Outcome {
    pub report: Report,
    pub strict: bool,
}

impl Outcome {
    pub fn exit_code(&self) -> u8 {
        let failed = !self.report.is_clean() || (self.strict && !self.report.unsupported().is_empty());
        u8::from(failed)
    }
}

/// Run against the process working directory, writing the report to `out`.
pub fn run(args: &Args, out: &mut dyn Write, color: bool) -> Result<Outcome> {
    let cwd = std::env::current_dir().context("reading working directory")?;
    run_in(args, &cwd, out, color)
}

/// Run with relative paths taken from `cwd`.
pub fn run_in(args: &Args, cwd: &Path, out: &mut dyn Write, color: bool) -> Result<Outcome> {
    let explicit = args.config.as_ref().map(|path| cwd.join(path));
    let (config, config_path) = Config::discover(explicit.as_deref(), cwd)?;
    if let Some(path) = &config_path {
        info!(path = %path.display(), "loaded config");
    }
    let mut settings = config.apply(args);
    settings.manifests = settings.manifests.iter().map(|m| cwd.join(m)).collect();

    let registry = build_registry(&settings)?;
    let commands = registry.list_external_commands(&settings.modules);
    let analyzer = Analyzer::new(commands).with_max_depth(settings.max_depth);

    let mut report = Report::new(cwd);
    for file in &args.files {
        let path = cwd.join(file);
        let result = analyzer
            .analyze(&path)
            .with_context(|| format!("analyzing {}", file.display()))?;
        debug!(
            file = %path.display(),
            syntax = result.syntax_errors.len(),
            resolution = result.resolution_errors.len(),
            unsupported = result.unsupported.len(),
            "analyzed root script"
        );
        report.add(&path, &result);
    }

    match settings.format {
        Format::Text => report.write_text(out),
        Format::Json => report.write_json(out),
        Format::Pretty => report.write_pretty(out, color),
    }
    .and_then(|()| out.flush())
    .context("writing report")?;

    Ok(Outcome {
        report,
        strict: settings.strict,
    })
}

fn build_registry(settings: &Settings) -> Result<CommandRegistry> {
    let mut registry = if settings.builtins {
        CommandRegistry::with_builtins()
    } else {
        CommandRegistry::new()
    };
    for manifest in &settings.manifests {
        let count = registry.load_manifest(manifest)?;
        info!(path = %manifest.display(), count, "loaded command manifest");
    }
    for name in &settings.extra_commands {
        registry.register(CommandDescriptor::new(name.clone(), CommandKind::Unknown));
    }
    Ok(registry)
}
